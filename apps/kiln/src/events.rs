//! Event handling and user feedback

use crate::logging::log_event_with_tracing;
use console::{style, Term};
use kiln_events::{AppEvent, BuildEvent, EventMessage, GeneralEvent, ResolverEvent};

/// Turns domain events into log records and terminal status lines
pub struct EventHandler {
    term: Term,
    colors: bool,
    /// Status lines are suppressed in JSON mode
    quiet: bool,
    /// Mirror events into the tracing log
    log: bool,
}

impl EventHandler {
    pub fn new(colors: bool, quiet: bool, log: bool) -> Self {
        Self {
            term: Term::stderr(),
            colors,
            quiet,
            log,
        }
    }

    /// Handle incoming event
    pub fn handle_event(&self, message: &EventMessage) {
        if self.log {
            log_event_with_tracing(message);
        }
        if self.quiet {
            return;
        }

        if let Some(line) = status_line(&message.event) {
            let line = if self.colors {
                line
            } else {
                console::strip_ansi_codes(&line).into_owned()
            };
            // A closed stderr is not worth failing the build over
            let _ = self.term.write_line(&line);
        }
    }
}

/// One-line summary for the events a user wants to see
fn status_line(event: &AppEvent) -> Option<String> {
    let line = match event {
        AppEvent::General(GeneralEvent::Warning { message, .. }) => {
            format!("{} {message}", style("warning:").yellow().bold())
        }
        AppEvent::Resolver(ResolverEvent::ResolutionCompleted { root, nodes, .. }) => {
            format!("{} {root} ({nodes} packages)", style("Resolved").green().bold())
        }
        AppEvent::Resolver(ResolverEvent::VersionWidened { name, selected, .. }) => {
            format!("{} {name} to {selected}", style("Narrowed").cyan())
        }
        AppEvent::Build(event) => match event {
            BuildEvent::NodeCached { node, .. } => {
                format!("{} {node}", style("   Cached").green())
            }
            BuildEvent::StepStarted { node, step } => {
                format!("{} {node}: {step}", style("  Running").cyan())
            }
            BuildEvent::NodeInstalled { node, .. } => {
                format!("{} {node}", style("Installed").green().bold())
            }
            BuildEvent::NodeFailed {
                node,
                step,
                failure,
            } => format!(
                "{} {node}: {step}: {}",
                style("   Failed").red().bold(),
                failure.message
            ),
            BuildEvent::NodeSkipped { node, dependency } => format!(
                "{} {node} (dependency {dependency} failed)",
                style("  Skipped").yellow()
            ),
            BuildEvent::NodeCancelled { node } => {
                format!("{} {node}", style("Cancelled").yellow())
            }
            _ => return None,
        },
        _ => return None,
    };
    Some(line)
}
