#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Requirement resolution for kiln
//!
//! Turns a root recipe plus a [`kiln_index::RecipeSource`] into a
//! [`DependencyGraph`] of name-unique nodes and an [`ExecutionPlan`] of
//! dependency-ordered batches.

mod execution;
mod graph;
mod resolver;

pub use execution::ExecutionPlan;
pub use graph::{Context, DependencyGraph, Edge, NodeId, ResolvedNode};
pub use resolver::{Resolution, ResolveOptions, Resolver, DEFAULT_MAX_ITERATIONS};

impl Resolution {
    /// Nodes in execution order
    #[must_use]
    pub fn nodes_in_order(&self) -> Vec<&ResolvedNode> {
        self.plan
            .order()
            .filter_map(|id| self.graph.node(id))
            .collect()
    }
}
