//! Dependency graph types and operations

use kiln_hash::Hash;
use kiln_recipe::Recipe;
use kiln_types::{OptionSet, PackageId, RequirementKind, Settings, VersionSpec};
use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

/// Index of a node inside its [`DependencyGraph`]
pub type NodeId = usize;

/// Why a node is part of the session
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Context {
    /// Reachable from the root through regular requirements
    Host,
    /// Needed to build some node
    BuildTool,
    /// Needed to test the root
    Test,
}

impl Context {
    /// Context of a node introduced from `parent` through a `kind` edge
    #[must_use]
    pub fn derive(parent: Self, kind: RequirementKind) -> Self {
        match kind {
            RequirementKind::Regular => parent,
            RequirementKind::BuildTool => Self::BuildTool,
            RequirementKind::Test => Self::Test,
        }
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host => write!(f, "host"),
            Self::BuildTool => write!(f, "build_tool"),
            Self::Test => write!(f, "test"),
        }
    }
}

/// Dependency edge in the resolution graph
#[derive(Clone, Debug)]
pub struct Edge {
    /// Dependent
    pub from: NodeId,
    /// Dependency
    pub to: NodeId,
    pub kind: RequirementKind,
    /// Constraint as written on the requirement
    pub constraint: VersionSpec,
    /// Option overrides carried by the requirement
    pub options: OptionSet,
}

/// One recipe placed in the graph
#[derive(Clone, Debug)]
pub struct ResolvedNode {
    pub id: NodeId,
    pub recipe: Arc<Recipe>,
    pub context: Context,
    /// BFS distance from the root
    pub depth: usize,
    /// Edge that first reached this node; `None` for the root
    pub introduced_by: Option<usize>,
    /// Final option values, filled by option propagation
    pub options: OptionSet,
    /// Session settings restricted to the recipe's declared keys
    pub settings: Settings,
    /// Package identity, filled after options and settings are known
    pub identity: Option<Hash>,
}

impl ResolvedNode {
    fn new(
        id: NodeId,
        recipe: Arc<Recipe>,
        context: Context,
        depth: usize,
        introduced_by: Option<usize>,
    ) -> Self {
        Self {
            id,
            recipe,
            context,
            depth,
            introduced_by,
            options: OptionSet::new(),
            settings: Settings::new(),
            identity: None,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.recipe.name
    }

    #[must_use]
    pub fn package_id(&self) -> PackageId {
        self.recipe.id()
    }
}

impl fmt::Display for ResolvedNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.recipe.name, self.recipe.version)
    }
}

/// Dependency graph with name-unique nodes; node 0 is the root
#[derive(Clone, Debug)]
pub struct DependencyGraph {
    nodes: Vec<ResolvedNode>,
    edges: Vec<Edge>,
    /// Outgoing edge indices per node
    outgoing: Vec<Vec<usize>>,
    /// Incoming edge indices per node
    incoming: Vec<Vec<usize>>,
}

impl DependencyGraph {
    /// Create a graph holding only the root recipe
    #[must_use]
    pub fn new(root: Arc<Recipe>) -> Self {
        Self {
            nodes: vec![ResolvedNode::new(0, root, Context::Host, 0, None)],
            edges: Vec::new(),
            outgoing: vec![Vec::new()],
            incoming: vec![Vec::new()],
        }
    }

    /// Add a node reached from `from` and the edge that reached it
    pub fn add_node(
        &mut self,
        recipe: Arc<Recipe>,
        from: NodeId,
        kind: RequirementKind,
        constraint: VersionSpec,
        options: OptionSet,
    ) -> NodeId {
        let id = self.nodes.len();
        let parent = &self.nodes[from];
        let context = Context::derive(parent.context, kind);
        let depth = parent.depth + 1;
        let edge = self.edges.len();

        self.nodes
            .push(ResolvedNode::new(id, recipe, context, depth, Some(edge)));
        self.outgoing.push(Vec::new());
        self.incoming.push(Vec::new());
        self.add_edge(from, id, kind, constraint, options);
        id
    }

    /// Add an edge between two existing nodes
    pub fn add_edge(
        &mut self,
        from: NodeId,
        to: NodeId,
        kind: RequirementKind,
        constraint: VersionSpec,
        options: OptionSet,
    ) {
        let index = self.edges.len();
        self.edges.push(Edge {
            from,
            to,
            kind,
            constraint,
            options,
        });
        self.outgoing[from].push(index);
        self.incoming[to].push(index);
    }

    #[must_use]
    pub fn root(&self) -> &ResolvedNode {
        &self.nodes[0]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&ResolvedNode> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut ResolvedNode> {
        self.nodes.get_mut(id)
    }

    /// Look a node up by package name
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&ResolvedNode> {
        self.nodes.iter().find(|node| node.recipe.name == name)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &ResolvedNode> {
        self.nodes.iter()
    }

    #[must_use]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    #[must_use]
    pub fn edge(&self, index: usize) -> Option<&Edge> {
        self.edges.get(index)
    }

    /// Outgoing edges of `id`, in declaration order
    pub fn dependencies(&self, id: NodeId) -> impl Iterator<Item = &Edge> {
        self.outgoing
            .get(id)
            .into_iter()
            .flatten()
            .map(|&index| &self.edges[index])
    }

    /// Incoming edges of `id`
    pub fn dependents(&self, id: NodeId) -> impl Iterator<Item = &Edge> {
        self.incoming
            .get(id)
            .into_iter()
            .flatten()
            .map(|&index| &self.edges[index])
    }

    /// Distinct nodes `id` must wait for before building
    pub fn build_prerequisites(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let mut seen = HashSet::new();
        self.dependencies(id)
            .map(|edge| edge.to)
            .filter(move |to| seen.insert(*to))
    }

    /// Transitive regular dependencies of `id` in BFS order, excluding `id`
    ///
    /// Build-tool and test edges are never followed, so this is what a
    /// consumer of `id` links against.
    #[must_use]
    pub fn regular_closure(&self, id: NodeId) -> Vec<NodeId> {
        let mut seen = HashSet::from([id]);
        let mut queue = VecDeque::from([id]);
        let mut closure = Vec::new();

        while let Some(current) = queue.pop_front() {
            for edge in self.dependencies(current) {
                if edge.kind == RequirementKind::Regular && seen.insert(edge.to) {
                    closure.push(edge.to);
                    queue.push_back(edge.to);
                }
            }
        }

        closure
    }

    /// Find a dependency cycle, returned as the node path `a -> b -> a`
    #[must_use]
    pub fn find_cycle(&self) -> Option<Vec<NodeId>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            OnStack,
            Done,
        }

        let mut marks = vec![Mark::Unvisited; self.nodes.len()];

        for start in 0..self.nodes.len() {
            if marks[start] != Mark::Unvisited {
                continue;
            }

            // Iterative DFS; each frame is (node, next outgoing position)
            let mut stack: Vec<(NodeId, usize)> = vec![(start, 0)];
            marks[start] = Mark::OnStack;

            while let Some(frame) = stack.last_mut() {
                let (node, position) = *frame;
                if let Some(&edge_index) = self.outgoing[node].get(position) {
                    frame.1 += 1;
                    let next = self.edges[edge_index].to;
                    match marks[next] {
                        Mark::Unvisited => {
                            marks[next] = Mark::OnStack;
                            stack.push((next, 0));
                        }
                        Mark::OnStack => {
                            let begin = stack
                                .iter()
                                .position(|(n, _)| *n == next)
                                .unwrap_or(0);
                            let mut path: Vec<NodeId> =
                                stack[begin..].iter().map(|(n, _)| *n).collect();
                            path.push(next);
                            return Some(path);
                        }
                        Mark::Done => {}
                    }
                } else {
                    marks[node] = Mark::Done;
                    stack.pop();
                }
            }
        }

        None
    }

    /// Nodes on the introducing path from the root down to `id`
    #[must_use]
    pub fn path_from_root(&self, id: NodeId) -> Vec<NodeId> {
        let mut path = vec![id];
        let mut current = id;
        while let Some(edge) = self
            .nodes
            .get(current)
            .and_then(|node| node.introduced_by)
            .and_then(|edge| self.edges.get(edge))
        {
            current = edge.from;
            path.push(current);
        }
        path.reverse();
        path
    }

    /// Render a node path with package names
    #[must_use]
    pub fn path_names(&self, path: &[NodeId]) -> Vec<String> {
        path.iter()
            .filter_map(|&id| self.nodes.get(id))
            .map(|node| node.recipe.name.clone())
            .collect()
    }

    /// Depth-first post-order from the root: every node after all of its
    /// dependencies
    #[must_use]
    pub fn post_order(&self) -> Vec<NodeId> {
        let mut visited = vec![false; self.nodes.len()];
        let mut order = Vec::with_capacity(self.nodes.len());

        for start in 0..self.nodes.len() {
            if visited[start] {
                continue;
            }
            visited[start] = true;
            let mut stack: Vec<(NodeId, usize)> = vec![(start, 0)];

            while let Some(frame) = stack.last_mut() {
                let (node, position) = *frame;
                if let Some(&edge_index) = self.outgoing[node].get(position) {
                    frame.1 += 1;
                    let next = self.edges[edge_index].to;
                    if !visited[next] {
                        visited[next] = true;
                        stack.push((next, 0));
                    }
                } else {
                    order.push(node);
                    stack.pop();
                }
            }
        }

        order
    }

    /// Perform topological sort using Kahn's algorithm, dependencies first
    ///
    /// Ties are broken by node id so the order is deterministic. Returns
    /// `None` when the graph contains a cycle.
    #[must_use]
    pub fn topological_order(&self) -> Option<Vec<NodeId>> {
        // Remaining unsettled dependencies per node
        let mut pending: Vec<usize> = (0..self.nodes.len())
            .map(|id| self.build_prerequisites(id).count())
            .collect();

        let mut ready: std::collections::BTreeSet<NodeId> = pending
            .iter()
            .enumerate()
            .filter_map(|(id, &count)| (count == 0).then_some(id))
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(id) = ready.pop_first() {
            order.push(id);
            let mut seen = HashSet::new();
            for edge in self.dependents(id) {
                if seen.insert(edge.from) {
                    pending[edge.from] -= 1;
                    if pending[edge.from] == 0 {
                        ready.insert(edge.from);
                    }
                }
            }
        }

        (order.len() == self.nodes.len()).then_some(order)
    }
}
