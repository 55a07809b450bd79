//! Structured logging integration for events
//!
//! Converts domain events into tracing records with structured fields, so
//! `--debug` logs carry the same information the terminal shows.

use kiln_events::{AppEvent, BuildEvent, CacheEvent, EventMessage, GeneralEvent, ResolverEvent};
use tracing::{debug, error, info, warn};

/// Log an `AppEvent` using the tracing infrastructure with structured fields
pub fn log_event_with_tracing(message: &EventMessage) {
    let meta = &message.meta;
    let source = meta.source.as_str();
    let correlation = meta.correlation_id.as_deref().unwrap_or("");

    match &message.event {
        AppEvent::General(event) => match event {
            GeneralEvent::Warning { message, context } => {
                warn!(source, correlation, context = ?context, "{message}");
            }
            GeneralEvent::Error { message, details } => {
                error!(source, correlation, details = ?details, "{message}");
            }
            GeneralEvent::DebugLog { message, context } => {
                debug!(source, correlation, context = ?context, "{message}");
            }
            GeneralEvent::OperationStarted { operation } => {
                info!(source, correlation, operation = %operation, "Operation started");
            }
            GeneralEvent::OperationCompleted { operation, success } => {
                info!(source, correlation, operation = %operation, success, "Operation completed");
            }
            GeneralEvent::OperationFailed { operation, error } => {
                error!(source, correlation, operation = %operation, error = %error, "Operation failed");
            }
        },

        AppEvent::Resolver(event) => match event {
            ResolverEvent::ResolutionStarted {
                root,
                include_test_requirements,
            } => {
                info!(source, root = %root, include_test_requirements, "Resolution started");
            }
            ResolverEvent::NodeResolved {
                name,
                version,
                kind,
                required_by,
            } => {
                debug!(source, name = %name, version = %version, kind = ?kind, required_by = ?required_by, "Requirement resolved");
            }
            ResolverEvent::RequirementDisabled { name, required_by } => {
                debug!(source, name = %name, required_by = %required_by, "Requirement disabled");
            }
            ResolverEvent::VersionWidened {
                name,
                constraints,
                selected,
                iteration,
            } => {
                info!(source, name = %name, constraints = %constraints, selected = %selected, iteration, "Version selection widened");
            }
            ResolverEvent::ResolutionCompleted { root, nodes, edges } => {
                info!(source, root = %root, nodes, edges, "Resolution completed");
            }
            ResolverEvent::ResolutionFailed { root, failure } => {
                error!(source, root = %root, code = ?failure.code, message = %failure.message, hint = ?failure.hint, "Resolution failed");
            }
            ResolverEvent::OptionsPropagated { nodes, overrides } => {
                info!(source, nodes, overrides, "Options propagated");
            }
        },

        AppEvent::Build(event) => match event {
            BuildEvent::SessionStarted {
                session_id,
                root,
                nodes,
                jobs,
            } => {
                info!(source, session = %session_id, root = %root, nodes, jobs, "Build session started");
            }
            BuildEvent::NodeCached { node, identity } => {
                info!(source, correlation, node = %node, identity = %identity, "Reused cached artifact");
            }
            BuildEvent::StepStarted { node, step } => {
                debug!(source, correlation, node = %node, step = %step, "Step started");
            }
            BuildEvent::StepCompleted {
                node,
                step,
                duration,
            } => {
                debug!(source, correlation, node = %node, step = %step, duration_ms = duration.as_millis(), "Step completed");
            }
            BuildEvent::NodeInstalled {
                node,
                identity,
                location,
            } => {
                info!(source, correlation, node = %node, identity = %identity, location = %location.display(), "Package installed");
            }
            BuildEvent::NodeFailed {
                node,
                step,
                failure,
            } => {
                error!(
                    source,
                    correlation,
                    node = %node,
                    step = %step,
                    code = ?failure.code,
                    message = %failure.message,
                    hint = ?failure.hint,
                    retryable = failure.retryable,
                    "Package failed"
                );
            }
            BuildEvent::NodeSkipped { node, dependency } => {
                warn!(source, correlation, node = %node, dependency = %dependency, "Package skipped");
            }
            BuildEvent::NodeCancelled { node } => {
                warn!(source, correlation, node = %node, "Package cancelled");
            }
            BuildEvent::SessionCompleted {
                session_id,
                installed,
                failed,
                steps_executed,
                duration,
            } => {
                info!(source, session = %session_id, installed, failed, steps_executed, duration_ms = duration.as_millis(), "Build session completed");
            }
        },

        AppEvent::Cache(event) => match event {
            CacheEvent::IndexLoaded { path, entries } => {
                debug!(source, path = %path.display(), entries, "Cache index loaded");
            }
            CacheEvent::Lookup { identity, hit } => {
                debug!(source, identity = %identity, hit, "Cache lookup");
            }
            CacheEvent::ArtifactRecorded {
                node,
                identity,
                location,
            } => {
                debug!(source, node = %node, identity = %identity, location = %location.display(), "Artifact recorded");
            }
        },
    }
}
