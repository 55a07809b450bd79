use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::FailureContext;
use kiln_types::BuildStep;

/// Lifecycle driver events
///
/// Nodes are named `name/version`; identities are hex digests.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BuildEvent {
    /// A build session was started for a resolved graph
    SessionStarted {
        session_id: String,
        root: String,
        nodes: usize,
        jobs: usize,
    },

    /// The cached artifact for a node was reused without running any step
    NodeCached { node: String, identity: String },

    /// A lifecycle step started for a node
    StepStarted { node: String, step: BuildStep },

    /// A lifecycle step completed for a node
    StepCompleted {
        node: String,
        step: BuildStep,
        duration: Duration,
    },

    /// A node reached the installed state
    NodeInstalled {
        node: String,
        identity: String,
        location: PathBuf,
    },

    /// A node failed during one of its own steps
    NodeFailed {
        node: String,
        step: BuildStep,
        failure: FailureContext,
    },

    /// A node was not attempted because a dependency failed
    NodeSkipped { node: String, dependency: String },

    /// A node was not attempted because the session was cancelled
    NodeCancelled { node: String },

    /// The session finished, successfully or not
    SessionCompleted {
        session_id: String,
        installed: usize,
        failed: usize,
        steps_executed: usize,
        duration: Duration,
    },
}
