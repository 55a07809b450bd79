//! Dependency-ordered batches of a resolved graph

use crate::graph::{DependencyGraph, NodeId};

/// Execution plan with batched parallel operations
///
/// Batch `n` only depends on batches `0..n`, so every batch can run
/// concurrently once the previous ones are done.
#[derive(Clone, Debug)]
pub struct ExecutionPlan {
    batches: Vec<Vec<NodeId>>,
}

impl ExecutionPlan {
    /// Build the plan from an acyclic graph; `None` if the graph has a cycle
    #[must_use]
    pub fn from_graph(graph: &DependencyGraph) -> Option<Self> {
        let order = graph.topological_order()?;

        let mut level = vec![0usize; graph.len()];
        for &id in &order {
            level[id] = graph
                .build_prerequisites(id)
                .map(|dep| level[dep] + 1)
                .max()
                .unwrap_or(0);
        }

        let batch_count = level.iter().copied().max().map_or(0, |max| max + 1);
        let mut batches = vec![Vec::new(); batch_count];
        for &id in &order {
            batches[level[id]].push(id);
        }
        for batch in &mut batches {
            batch.sort_unstable();
        }

        Some(Self { batches })
    }

    /// Get execution batches
    #[must_use]
    pub fn batches(&self) -> &[Vec<NodeId>] {
        &self.batches
    }

    /// Nodes in batch order
    pub fn order(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.batches.iter().flatten().copied()
    }
}
