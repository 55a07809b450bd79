//! Session results

use crate::state::{Failure, NodeState};
use kiln_errors::{BuildError, Error};
use kiln_hash::Hash;
use kiln_resolver::NodeId;
use std::time::Duration;

/// Terminal outcome of one node
#[derive(Clone, Debug)]
pub struct NodeReport {
    pub id: NodeId,
    /// `name/version`
    pub package: String,
    pub identity: Option<Hash>,
    pub state: NodeState,
    /// Steps this node ran in this session, the failing one included
    pub steps_executed: usize,
}

impl NodeReport {
    #[must_use]
    pub fn name(&self) -> &str {
        self.package
            .split_once('/')
            .map_or(self.package.as_str(), |(name, _)| name)
    }
}

/// Outcome of a build session
#[derive(Clone, Debug)]
pub struct SessionReport {
    pub session_id: String,
    /// Indexed by node id; the root comes first
    pub nodes: Vec<NodeReport>,
    /// Nodes that ran their install step, in the order they did
    pub install_order: Vec<NodeId>,
    pub steps_executed: usize,
    pub duration: Duration,
}

impl SessionReport {
    #[must_use]
    pub fn root(&self) -> Option<&NodeReport> {
        self.nodes.first()
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&NodeReport> {
        self.nodes.get(id)
    }

    #[must_use]
    pub fn find(&self, name: &str) -> Option<&NodeReport> {
        self.nodes.iter().find(|node| node.name() == name)
    }

    /// Whether the root package ended up installed
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.root().is_some_and(|root| root.state.is_installed())
    }

    #[must_use]
    pub fn installed_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.state.is_installed()).count()
    }

    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.nodes.len() - self.installed_count()
    }

    /// Packages in install order
    #[must_use]
    pub fn install_order_names(&self) -> Vec<&str> {
        self.install_order
            .iter()
            .filter_map(|&id| self.node(id))
            .map(NodeReport::name)
            .collect()
    }

    /// Error that kept the root from being installed, if any
    ///
    /// Dependency failures are followed down to the step failure that
    /// started them.
    #[must_use]
    pub fn root_failure(&self) -> Option<Error> {
        let mut current = self.root()?;

        // Each hop moves to a distinct dependency, so the chain is bounded
        for _ in 0..=self.nodes.len() {
            match &current.state {
                NodeState::Installed { .. } => return None,
                NodeState::Failed(Failure::Step { step, error }) => {
                    return Some(
                        BuildError::step_failure(current.package.clone(), step.as_str(), error)
                            .into(),
                    );
                }
                NodeState::Failed(Failure::Dependency { dependency }) => {
                    match self.nodes.iter().find(|n| n.package == *dependency) {
                        Some(next) => current = next,
                        None => {
                            return Some(Error::internal(format!(
                                "{} failed on unknown dependency {dependency}",
                                current.package
                            )))
                        }
                    }
                }
                NodeState::Failed(Failure::Cancelled) => return Some(Error::Cancelled),
                NodeState::Failed(Failure::Aborted { message }) => {
                    return Some(Error::internal(message.clone()))
                }
                state => {
                    return Some(Error::internal(format!(
                        "{} never settled (last state: {state})",
                        current.package
                    )))
                }
            }
        }

        Some(Error::internal("dependency failure chain does not terminate"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_types::BuildStep;
    use std::path::PathBuf;

    fn node(id: NodeId, package: &str, state: NodeState) -> NodeReport {
        NodeReport {
            id,
            package: package.to_string(),
            identity: None,
            state,
            steps_executed: 0,
        }
    }

    fn report(nodes: Vec<NodeReport>) -> SessionReport {
        SessionReport {
            session_id: "test".to_string(),
            nodes,
            install_order: vec![2],
            steps_executed: 0,
            duration: Duration::ZERO,
        }
    }

    #[test]
    fn test_root_failure_follows_dependencies() {
        let report = report(vec![
            node(
                0,
                "a/1.0.0",
                NodeState::Failed(Failure::Dependency {
                    dependency: "b/1.0.0".to_string(),
                }),
            ),
            node(
                1,
                "b/1.0.0",
                NodeState::Failed(Failure::Step {
                    step: BuildStep::Configure,
                    error: BuildError::ConfigureFailed {
                        message: "boom".to_string(),
                    }
                    .into(),
                }),
            ),
            node(
                2,
                "d/2.1.0",
                NodeState::Installed {
                    location: PathBuf::from("/cache/d"),
                    cached: false,
                },
            ),
        ]);

        assert!(!report.is_success());
        assert_eq!(report.installed_count(), 1);
        assert_eq!(report.failed_count(), 2);
        assert_eq!(report.install_order_names(), vec!["d"]);

        match report.root_failure() {
            Some(Error::Build(BuildError::StepFailure { node, step, cause })) => {
                assert_eq!(node, "b/1.0.0");
                assert_eq!(step, "configure");
                assert!(cause.contains("boom"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_cancelled_root() {
        let report = report(vec![node(0, "a/1.0.0", NodeState::Failed(Failure::Cancelled))]);
        assert!(matches!(report.root_failure(), Some(Error::Cancelled)));
    }
}
