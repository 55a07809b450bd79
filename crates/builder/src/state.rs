//! Per-node lifecycle state machine

use kiln_errors::Error;
use kiln_types::BuildStep;
use std::fmt;
use std::path::{Path, PathBuf};

/// Why a node ended up failed
#[derive(Clone, Debug)]
pub enum Failure {
    /// One of the node's own steps failed
    Step { step: BuildStep, error: Error },
    /// A dependency failed; no step was attempted
    Dependency { dependency: String },
    /// The session was cancelled before the node settled
    Cancelled,
    /// The node's task ended without settling
    Aborted { message: String },
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Step { step, error } => write!(f, "{step} failed: {error}"),
            Self::Dependency { dependency } => write!(f, "dependency {dependency} failed"),
            Self::Cancelled => f.write_str("cancelled"),
            Self::Aborted { message } => write!(f, "aborted: {message}"),
        }
    }
}

/// Lifecycle state of one node
///
/// `Pending → Generated → Configured → Built → Packaged → Installed`, or
/// `Failed` from any non-terminal state.
#[derive(Clone, Debug)]
pub enum NodeState {
    Pending,
    Generated,
    Configured,
    Built,
    Packaged,
    Installed { location: PathBuf, cached: bool },
    Failed(Failure),
}

impl NodeState {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Installed { .. } | Self::Failed(_))
    }

    #[must_use]
    pub fn is_installed(&self) -> bool {
        matches!(self, Self::Installed { .. })
    }

    /// State reached once `step` completes
    #[must_use]
    pub fn after(step: BuildStep, location: &Path) -> Self {
        match step {
            BuildStep::Generate => Self::Generated,
            BuildStep::Configure => Self::Configured,
            BuildStep::Build => Self::Built,
            BuildStep::Package => Self::Packaged,
            BuildStep::Install => Self::Installed {
                location: location.to_path_buf(),
                cached: false,
            },
        }
    }

    #[must_use]
    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Self::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
            Self::Generated => f.write_str("generated"),
            Self::Configured => f.write_str("configured"),
            Self::Built => f.write_str("built"),
            Self::Packaged => f.write_str("packaged"),
            Self::Installed { cached: true, .. } => f.write_str("installed (cached)"),
            Self::Installed { .. } => f.write_str("installed"),
            Self::Failed(failure) => write!(f, "failed: {failure}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions() {
        let location = PathBuf::from("/cache/artifacts/abc");
        let states: Vec<NodeState> = BuildStep::ALL
            .iter()
            .map(|step| NodeState::after(*step, &location))
            .collect();

        assert!(states[..4].iter().all(|s| !s.is_terminal()));
        assert!(states[4].is_installed());
        assert_eq!(states[1].to_string(), "configured");
        assert!(NodeState::Failed(Failure::Cancelled).is_terminal());
        assert!(!NodeState::Pending.is_terminal());
    }
}
