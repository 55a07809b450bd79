use serde::{Deserialize, Serialize};

use super::FailureContext;
use kiln_types::{RequirementKind, Version};

/// Requirement resolution and option propagation events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResolverEvent {
    /// Resolution of a root recipe started
    ResolutionStarted {
        root: String,
        include_test_requirements: bool,
    },

    /// A requirement was bound to a concrete recipe version
    NodeResolved {
        name: String,
        version: Version,
        kind: RequirementKind,
        required_by: Option<String>,
    },

    /// A requirement was present in a recipe but disabled
    RequirementDisabled { name: String, required_by: String },

    /// Conflicting constraints forced a name onto a narrower version and a
    /// fresh resolution pass
    VersionWidened {
        name: String,
        constraints: String,
        selected: Version,
        iteration: usize,
    },

    /// Resolution finished successfully
    ResolutionCompleted {
        root: String,
        nodes: usize,
        edges: usize,
    },

    /// Resolution failed before any build work
    ResolutionFailed { root: String, failure: FailureContext },

    /// Concrete option values were assigned to every node
    OptionsPropagated { nodes: usize, overrides: usize },
}
