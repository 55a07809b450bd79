#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! High-level operations orchestration for kiln
//!
//! This crate sits between the CLI and the specialized crates. Every
//! operation runs the same pre-build pipeline (load the root recipe,
//! resolve, propagate options, compute identities); `build` then hands the
//! graph to the lifecycle driver.

mod build;
mod context;
mod inspect;
mod session;
mod types;

pub use context::{OpsContextBuilder, OpsCtx};
pub use types::{
    BuildReport, GraphEdge, GraphNode, GraphReport, IdentityReport, NodeIdentity, SessionRequest,
};

pub use build::build;
pub use inspect::{graph, identity};

use kiln_errors::Error;
use serde::Serialize;

/// Operation result that can be serialized for CLI output
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum OperationResult {
    Build(BuildReport),
    Graph(GraphReport),
    Identity(IdentityReport),
}

impl OperationResult {
    /// Convert to JSON string
    ///
    /// # Errors
    ///
    /// Returns an error if the report cannot be serialized.
    pub fn to_json(&self) -> Result<String, Error> {
        serde_json::to_string_pretty(self).map_err(Error::from)
    }
}
