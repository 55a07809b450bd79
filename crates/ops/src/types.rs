//! Operation requests and reports

use kiln_builder::{NodeState, SessionReport};
use kiln_options::OptionOverride;
use kiln_resolver::{DependencyGraph, ExecutionPlan};
use kiln_types::{RequirementKind, Settings};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Inputs shared by every session operation
#[derive(Clone, Debug, Default)]
pub struct SessionRequest {
    /// Root recipe file
    pub recipe: PathBuf,
    /// `pattern:option=value` overrides
    pub overrides: Vec<OptionOverride>,
    /// `key=value` settings applied over the configured ones
    pub settings: Vec<String>,
    /// Recipe directory; falls back to `paths.registry_dir`
    pub registry: Option<PathBuf>,
    /// Job count; falls back to `build.jobs`
    pub jobs: Option<usize>,
    /// Resolve the root's test requirements too
    pub include_tests: bool,
}

impl SessionRequest {
    #[must_use]
    pub fn new(recipe: impl Into<PathBuf>) -> Self {
        Self {
            recipe: recipe.into(),
            ..Self::default()
        }
    }
}

/// One node of a resolved graph
#[derive(Clone, Debug, Serialize)]
pub struct GraphNode {
    pub package: String,
    pub context: String,
    pub depth: usize,
    pub options: BTreeMap<String, String>,
    pub settings: Settings,
    pub identity: Option<String>,
}

/// One requirement edge
#[derive(Clone, Debug, Serialize)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
    pub kind: RequirementKind,
    pub constraint: String,
}

/// Resolved graph with options and identities
#[derive(Clone, Debug, Serialize)]
pub struct GraphReport {
    pub root: String,
    /// Widening restarts the resolver needed
    pub restarts: usize,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    /// Nodes that may build concurrently, dependencies first
    pub batches: Vec<Vec<String>>,
}

impl GraphReport {
    pub(crate) fn new(graph: &DependencyGraph, plan: &ExecutionPlan, restarts: usize) -> Self {
        let label = |id| graph.node(id).map(ToString::to_string).unwrap_or_default();

        Self {
            root: graph.root().to_string(),
            restarts,
            nodes: graph
                .nodes()
                .map(|node| GraphNode {
                    package: node.to_string(),
                    context: node.context.to_string(),
                    depth: node.depth,
                    options: node
                        .options
                        .iter()
                        .map(|(name, value)| (name.clone(), value.to_string()))
                        .collect(),
                    settings: node.settings.clone(),
                    identity: node.identity.map(|h| h.to_hex()),
                })
                .collect(),
            edges: graph
                .edges()
                .iter()
                .map(|edge| GraphEdge {
                    from: label(edge.from),
                    to: label(edge.to),
                    kind: edge.kind,
                    constraint: edge.constraint.to_string(),
                })
                .collect(),
            batches: plan
                .batches()
                .iter()
                .map(|batch| batch.iter().map(|&id| label(id)).collect())
                .collect(),
        }
    }
}

/// Identity of one package
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NodeIdentity {
    pub package: String,
    pub identity: String,
}

/// Package identities of a session, root first
#[derive(Clone, Debug, Serialize)]
pub struct IdentityReport {
    pub root: NodeIdentity,
    pub nodes: Vec<NodeIdentity>,
}

/// Result of a successful build session
#[derive(Clone, Debug, Serialize)]
pub struct BuildReport {
    pub session_id: String,
    pub package: String,
    /// Packages that ran their install step, in order
    pub installed: Vec<String>,
    /// Packages reused from the artifact cache
    pub cached: Vec<String>,
    pub steps_executed: usize,
    pub duration_ms: u64,
}

impl From<&SessionReport> for BuildReport {
    fn from(report: &SessionReport) -> Self {
        Self {
            session_id: report.session_id.clone(),
            package: report
                .root()
                .map(|root| root.package.clone())
                .unwrap_or_default(),
            installed: report
                .install_order
                .iter()
                .filter_map(|&id| report.node(id))
                .map(|node| node.package.clone())
                .collect(),
            cached: report
                .nodes
                .iter()
                .filter(|node| matches!(node.state, NodeState::Installed { cached: true, .. }))
                .map(|node| node.package.clone())
                .collect(),
            steps_executed: report.steps_executed,
            duration_ms: u64::try_from(report.duration.as_millis()).unwrap_or(u64::MAX),
        }
    }
}
