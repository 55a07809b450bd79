//! Requirement resolver
//!
//! Resolution is breadth-first from the root. The regular closure is
//! settled first, then build-tool requirements of every node, then test
//! requirements of the root when the session asks for them.
//!
//! Versions follow a nearest-wins policy: the first requirement that reaches
//! a name picks the highest matching version. When a later requirement is not
//! satisfied by that pick, the name is pinned to the conjunction of every
//! constraint seen for it and resolution starts over.

use crate::execution::ExecutionPlan;
use crate::graph::{DependencyGraph, NodeId};
use kiln_errors::{Error, ResolveError};
use kiln_events::{AppEvent, EventEmitter, EventSender, FailureContext, ResolverEvent};
use kiln_index::RecipeSource;
use kiln_recipe::{Recipe, Requirement};
use kiln_types::{RequirementKind, VersionSpec};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// Default bound on widening restarts
pub const DEFAULT_MAX_ITERATIONS: usize = 16;

/// Knobs for one resolution
#[derive(Clone, Debug)]
pub struct ResolveOptions {
    /// Follow the root's `test_requires`
    pub include_test_requirements: bool,
    /// Bound on widening restarts
    pub max_iterations: usize,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            include_test_requirements: false,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

/// Result of dependency resolution
#[derive(Clone, Debug)]
pub struct Resolution {
    pub graph: DependencyGraph,
    pub plan: ExecutionPlan,
    /// Widening restarts that were needed
    pub restarts: usize,
}

/// Requirement resolver
pub struct Resolver<'a, S: RecipeSource + ?Sized> {
    source: &'a S,
    options: ResolveOptions,
    event_sender: Option<EventSender>,
}

impl<S: RecipeSource + ?Sized> EventEmitter for Resolver<'_, S> {
    fn event_sender(&self) -> Option<&EventSender> {
        self.event_sender.as_ref()
    }
}

/// Outcome of one pass that did not produce a graph
enum PassError {
    Restart { name: String, pin: VersionSpec },
    Fatal(ResolveError),
}

/// A constraint seen on a name and who stated it
#[derive(Clone, Debug)]
struct Seen {
    spec: VersionSpec,
    required_by: String,
}

impl<'a, S: RecipeSource + ?Sized> Resolver<'a, S> {
    /// Create new resolver over a recipe source
    pub fn new(source: &'a S) -> Self {
        Self {
            source,
            options: ResolveOptions::default(),
            event_sender: None,
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: ResolveOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn with_event_sender(mut self, event_sender: EventSender) -> Self {
        self.event_sender = Some(event_sender);
        self
    }

    /// Resolve the requirements of `root` into a graph and execution plan
    ///
    /// # Errors
    ///
    /// Returns `ResolveError::MissingRequirement` when no recipe matches a
    /// single requirement, `VersionConflict` when no version satisfies the
    /// competing constraints on a name, `CycleDetected` when the graph has a
    /// cycle and `NotConverged` when widening does not settle.
    pub fn resolve(&self, root: Arc<Recipe>) -> Result<Resolution, Error> {
        self.emit(AppEvent::Resolver(ResolverEvent::ResolutionStarted {
            root: root.id().to_string(),
            include_test_requirements: self.options.include_test_requirements,
        }));

        match self.resolve_inner(&root) {
            Ok(resolution) => {
                self.emit(AppEvent::Resolver(ResolverEvent::ResolutionCompleted {
                    root: root.id().to_string(),
                    nodes: resolution.graph.len(),
                    edges: resolution.graph.edges().len(),
                }));
                Ok(resolution)
            }
            Err(err) => {
                self.emit(AppEvent::Resolver(ResolverEvent::ResolutionFailed {
                    root: root.id().to_string(),
                    failure: FailureContext::from_error(&err),
                }));
                Err(err.into())
            }
        }
    }

    fn resolve_inner(&self, root: &Arc<Recipe>) -> Result<Resolution, ResolveError> {
        let mut pins: HashMap<String, VersionSpec> = HashMap::new();

        for iteration in 0..self.options.max_iterations.max(1) {
            match self.pass(root, &pins) {
                Ok(graph) => {
                    if let Some(cycle) = graph.find_cycle() {
                        return Err(ResolveError::CycleDetected {
                            path: graph.path_names(&cycle),
                        });
                    }
                    let plan =
                        ExecutionPlan::from_graph(&graph).ok_or_else(|| {
                            ResolveError::CycleDetected {
                                path: vec![root.name.clone()],
                            }
                        })?;
                    return Ok(Resolution {
                        graph,
                        plan,
                        restarts: iteration,
                    });
                }
                Err(PassError::Restart { name, pin }) => {
                    tracing::debug!(%name, pin = %pin, iteration, "widening version selection");
                    if let Some(selected) = self.source.resolve(&name, &pin) {
                        self.emit(AppEvent::Resolver(ResolverEvent::VersionWidened {
                            name: name.clone(),
                            constraints: pin.to_string(),
                            selected: selected.version.clone(),
                            iteration: iteration + 1,
                        }));
                    }
                    pins.insert(name, pin);
                }
                Err(PassError::Fatal(err)) => return Err(err),
            }
        }

        Err(ResolveError::NotConverged {
            iterations: self.options.max_iterations,
        })
    }

    /// One breadth-first pass under the current pins
    fn pass(
        &self,
        root: &Arc<Recipe>,
        pins: &HashMap<String, VersionSpec>,
    ) -> Result<DependencyGraph, PassError> {
        let mut state = PassState {
            graph: DependencyGraph::new(Arc::clone(root)),
            by_name: HashMap::from([(root.name.clone(), 0)]),
            seen: HashMap::new(),
            regular_queue: VecDeque::from([0]),
            tools_expanded: 0,
        };
        let mut tests_expanded = !self.options.include_test_requirements;

        loop {
            while let Some(node) = state.regular_queue.pop_front() {
                self.expand(&mut state, pins, node, RequirementKind::Regular)?;
            }

            if state.tools_expanded < state.graph.len() {
                let node = state.tools_expanded;
                state.tools_expanded += 1;
                self.expand(&mut state, pins, node, RequirementKind::BuildTool)?;
                continue;
            }

            if !tests_expanded {
                tests_expanded = true;
                self.expand(&mut state, pins, 0, RequirementKind::Test)?;
                continue;
            }

            break;
        }

        Ok(state.graph)
    }

    fn expand(
        &self,
        state: &mut PassState,
        pins: &HashMap<String, VersionSpec>,
        from: NodeId,
        kind: RequirementKind,
    ) -> Result<(), PassError> {
        let Some(node) = state.graph.node(from) else {
            return Ok(());
        };
        let recipe = Arc::clone(&node.recipe);
        let label = node.to_string();

        for requirement in recipe.requirements_of(kind) {
            if !requirement.enabled {
                self.emit(AppEvent::Resolver(ResolverEvent::RequirementDisabled {
                    name: requirement.reference.name.clone(),
                    required_by: label.clone(),
                }));
                continue;
            }
            self.bind(state, pins, from, &label, requirement)?;
        }

        Ok(())
    }

    /// Bind one requirement to an existing node or a newly selected recipe
    fn bind(
        &self,
        state: &mut PassState,
        pins: &HashMap<String, VersionSpec>,
        from: NodeId,
        label: &str,
        requirement: &Requirement,
    ) -> Result<(), PassError> {
        let name = &requirement.reference.name;
        let spec = &requirement.reference.version_spec;

        state.seen.entry(name.clone()).or_default().push(Seen {
            spec: spec.clone(),
            required_by: label.to_string(),
        });

        if let Some(&existing) = state.by_name.get(name) {
            let satisfied = state
                .graph
                .node(existing)
                .is_some_and(|node| spec.matches(&node.recipe.version));

            if !satisfied {
                // Reaching back to the root is a cycle whatever the version
                if existing == 0 {
                    let mut path = state.graph.path_from_root(from);
                    path.push(0);
                    return Err(PassError::Fatal(ResolveError::CycleDetected {
                        path: state.graph.path_names(&path),
                    }));
                }
                return Err(self.widen(state, pins, name));
            }

            state.graph.add_edge(
                from,
                existing,
                requirement.kind,
                spec.clone(),
                requirement.options.clone(),
            );
            return Ok(());
        }

        let effective = match pins.get(name) {
            Some(pin) => pin.intersect(spec),
            None => spec.clone(),
        };

        let Some(recipe) = self.source.resolve(name, &effective) else {
            let competing = pins.contains_key(name)
                || state.seen.get(name).is_some_and(|seen| seen.len() > 1);
            return Err(if competing && self.source.contains(name) {
                PassError::Fatal(self.conflict(state, name))
            } else {
                PassError::Fatal(ResolveError::MissingRequirement {
                    name: name.clone(),
                    constraint: spec.to_string(),
                    required_by: label.to_string(),
                })
            });
        };

        self.emit(AppEvent::Resolver(ResolverEvent::NodeResolved {
            name: name.clone(),
            version: recipe.version.clone(),
            kind: requirement.kind,
            required_by: Some(label.to_string()),
        }));

        let id = state.graph.add_node(
            recipe,
            from,
            requirement.kind,
            spec.clone(),
            requirement.options.clone(),
        );
        state.by_name.insert(name.clone(), id);
        state.regular_queue.push_back(id);
        Ok(())
    }

    /// Decide between a restart with a narrower pin and a hard conflict
    fn widen(
        &self,
        state: &PassState,
        pins: &HashMap<String, VersionSpec>,
        name: &str,
    ) -> PassError {
        let mut pin = pins.get(name).cloned().unwrap_or_default();
        for seen in state.seen.get(name).into_iter().flatten() {
            pin = pin.intersect(&seen.spec);
        }

        if self.source.resolve(name, &pin).is_some() {
            PassError::Restart {
                name: name.to_string(),
                pin,
            }
        } else {
            PassError::Fatal(self.conflict(state, name))
        }
    }

    fn conflict(&self, state: &PassState, name: &str) -> ResolveError {
        let seen = state.seen.get(name).cloned().unwrap_or_default();
        let constraints: Vec<String> = seen.iter().map(|s| s.spec.to_string()).collect();
        let required_by: Vec<String> = seen.into_iter().map(|s| s.required_by).collect();

        tracing::debug!(%name, ?constraints, "no version satisfies every constraint");
        ResolveError::VersionConflict {
            name: name.to_string(),
            constraints: constraints.join(", "),
            required_by,
        }
    }
}

struct PassState {
    graph: DependencyGraph,
    by_name: HashMap<String, NodeId>,
    seen: HashMap<String, Vec<Seen>>,
    regular_queue: VecDeque<NodeId>,
    /// Nodes `0..tools_expanded` had their build-tool requirements bound
    tools_expanded: usize,
}
