//! Post-order option propagation over a resolved graph

use crate::overrides::{OptionOverride, PackagePattern};
use kiln_errors::{Error, OptionError};
use kiln_events::{AppEvent, EventEmitter, EventSender, ResolverEvent};
use kiln_resolver::{DependencyGraph, NodeId, ResolvedNode};
use kiln_types::{OptionSet, OptionValue};
use std::cmp::Reverse;
use std::collections::{HashSet, VecDeque};

/// A `pattern:option` default declared by some recipe in the graph
struct DeclaredDefault {
    pattern: PackagePattern,
    option: String,
    value: OptionValue,
}

/// Computes final option sets for graph nodes
pub struct OptionPropagator<'a> {
    overrides: &'a [OptionOverride],
    event_sender: Option<EventSender>,
}

impl EventEmitter for OptionPropagator<'_> {
    fn event_sender(&self) -> Option<&EventSender> {
        self.event_sender.as_ref()
    }
}

impl<'a> OptionPropagator<'a> {
    #[must_use]
    pub fn new(overrides: &'a [OptionOverride]) -> Self {
        Self {
            overrides,
            event_sender: None,
        }
    }

    #[must_use]
    pub fn with_event_sender(mut self, event_sender: EventSender) -> Self {
        self.event_sender = Some(event_sender);
        self
    }

    /// Annotate every node with its final option set, dependencies first
    ///
    /// Returns the number of session and edge overrides applied.
    ///
    /// # Errors
    ///
    /// Returns `OptionError::InvalidOptionValue` when a final value lies
    /// outside its domain, `OptionError::UnknownOption` when an exact or
    /// edge override names an undeclared option and
    /// `OptionError::InvalidOverride` for a malformed `default_options`
    /// pattern.
    pub fn propagate(&self, graph: &mut DependencyGraph) -> Result<usize, Error> {
        let declared = declared_defaults(graph)?;
        let mut applied = 0;

        for id in graph.post_order() {
            let Some(node) = graph.node(id) else {
                continue;
            };
            let options = self.resolve_node(graph, node, &declared, &mut applied)?;
            tracing::trace!(node = %node, ?options, "options resolved");

            if let Some(node) = graph.node_mut(id) {
                node.options = options;
            }
        }

        self.emit(AppEvent::Resolver(ResolverEvent::OptionsPropagated {
            nodes: graph.len(),
            overrides: applied,
        }));

        Ok(applied)
    }

    fn resolve_node(
        &self,
        graph: &DependencyGraph,
        node: &ResolvedNode,
        declared: &[Vec<DeclaredDefault>],
        applied: &mut usize,
    ) -> Result<OptionSet, OptionError> {
        let mut options = node.recipe.default_option_set();

        // Farthest from the root first, so the nearest declaration wins
        let mut upstream = ancestors(graph, node.id);
        upstream.sort_by_key(|&id| {
            Reverse((graph.node(id).map_or(0, |n| n.depth), id))
        });
        for owner in upstream {
            for default in declared.get(owner).into_iter().flatten() {
                if default.pattern.matches(node) {
                    set_option(
                        node,
                        &mut options,
                        &default.option,
                        &default.value,
                        !default.pattern.is_wildcard(),
                    )?;
                }
            }
        }

        let (wildcards, exact): (Vec<_>, Vec<_>) = self
            .overrides
            .iter()
            .partition(|o| o.pattern.is_wildcard());
        for o in wildcards.into_iter().chain(exact) {
            if o.pattern.matches(node)
                && set_option(node, &mut options, &o.option, &o.value, !o.pattern.is_wildcard())?
            {
                *applied += 1;
            }
        }

        if let Some(edge) = node.introduced_by.and_then(|index| graph.edge(index)) {
            for (option, value) in &edge.options {
                set_option(node, &mut options, option, value, true)?;
                *applied += 1;
            }
        }

        for (option, value) in &options {
            if let Some(decl) = node.recipe.options.get(option) {
                if !decl.domain.contains(value) {
                    return Err(OptionError::InvalidOptionValue {
                        package: node.to_string(),
                        option: option.clone(),
                        value: value.to_string(),
                        allowed: decl.domain.to_string(),
                    });
                }
            }
        }

        Ok(options)
    }
}

/// Set `option` on `node`, returning whether it was applied
///
/// Undeclared options are an error when `strict`, and ignored otherwise.
fn set_option(
    node: &ResolvedNode,
    options: &mut OptionSet,
    option: &str,
    value: &OptionValue,
    strict: bool,
) -> Result<bool, OptionError> {
    if !node.recipe.declares_option(option) {
        if strict {
            return Err(OptionError::UnknownOption {
                package: node.to_string(),
                option: option.to_string(),
            });
        }
        tracing::debug!(node = %node, option, "ignoring override for undeclared option");
        return Ok(false);
    }

    options.insert(option.to_string(), value.clone());
    Ok(true)
}

/// Parse every recipe's `default_options` patterns, indexed by node
fn declared_defaults(graph: &DependencyGraph) -> Result<Vec<Vec<DeclaredDefault>>, OptionError> {
    graph
        .nodes()
        .map(|node| {
            node.recipe
                .dependency_defaults
                .iter()
                .map(|default| {
                    Ok(DeclaredDefault {
                        pattern: PackagePattern::parse(&default.pattern)?,
                        option: default.option.clone(),
                        value: default.value.clone(),
                    })
                })
                .collect()
        })
        .collect()
}

/// Every node from which `id` is reachable
fn ancestors(graph: &DependencyGraph, id: NodeId) -> Vec<NodeId> {
    let mut seen = HashSet::from([id]);
    let mut queue = VecDeque::from([id]);
    let mut found = Vec::new();

    while let Some(current) = queue.pop_front() {
        for edge in graph.dependents(current) {
            if seen.insert(edge.from) {
                found.push(edge.from);
                queue.push_back(edge.from);
            }
        }
    }

    found
}
