//! Concurrent lifecycle driver
//!
//! Every node of the graph gets its own task. A task first checks the
//! artifact cache, then waits for the nodes it builds against to settle,
//! takes a job permit and walks the lifecycle steps in order. Node states
//! are published on per-node watch channels so dependents wake up as soon
//! as their inputs are installed or failed.

use crate::report::{NodeReport, SessionReport};
use crate::state::{Failure, NodeState};
use crate::tool::{BuildContext, BuildTool, BuildToolFactory};
use dashmap::DashMap;
use kiln_errors::Error;
use kiln_events::{
    AppEvent, BuildEvent, CorrelatedEmitter, EventEmitter, EventSender, FailureContext,
};
use kiln_generator::{build_inputs, generate, InstalledPackage, ToolchainPayload};
use kiln_hash::Hash;
use kiln_resolver::{DependencyGraph, NodeId, ResolvedNode};
use kiln_store::{ArtifactCache, ArtifactRecord};
use kiln_types::BuildStep;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{watch, Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Session-wide driver settings
#[derive(Clone, Debug)]
pub struct DriverOptions {
    /// Nodes allowed to run steps at the same time
    pub jobs: usize,
    /// Parent of the per-node build directories
    pub build_root: PathBuf,
}

/// Runs the build lifecycle over a resolved graph
pub struct LifecycleDriver {
    cache: Arc<ArtifactCache>,
    factory: Arc<dyn BuildToolFactory>,
    options: DriverOptions,
    event_sender: Option<EventSender>,
    cancel: CancellationToken,
}

impl LifecycleDriver {
    #[must_use]
    pub fn new(
        cache: Arc<ArtifactCache>,
        factory: Arc<dyn BuildToolFactory>,
        options: DriverOptions,
    ) -> Self {
        Self {
            cache,
            factory,
            options,
            event_sender: None,
            cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn with_event_sender(mut self, event_sender: EventSender) -> Self {
        self.event_sender = Some(event_sender);
        self
    }

    /// Use an externally owned cancellation token
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that stops the session when cancelled
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Drive every node of `graph` to a terminal state
    ///
    /// Node failures do not make this return an error; they are recorded
    /// in the report and only affect the nodes that depend on them.
    ///
    /// # Errors
    ///
    /// Returns an error if the build root cannot be created.
    pub async fn run(&self, graph: Arc<DependencyGraph>) -> Result<SessionReport, Error> {
        let started = Instant::now();
        let session_id = Uuid::new_v4().to_string();
        let jobs = self.options.jobs.max(1);

        tokio::fs::create_dir_all(&self.options.build_root)
            .await
            .map_err(|e| Error::io_with_path(&e, &self.options.build_root))?;

        let emitter = CorrelatedEmitter::new(self.event_sender.clone(), session_id.clone());
        emitter.emit(AppEvent::Build(BuildEvent::SessionStarted {
            session_id: session_id.clone(),
            root: graph.root().to_string(),
            nodes: graph.len(),
            jobs,
        }));
        tracing::info!(session = %session_id, root = %graph.root(), nodes = graph.len(), jobs, "build session started");

        let (senders, receivers): (Vec<_>, Vec<_>) = (0..graph.len())
            .map(|_| watch::channel(NodeState::Pending))
            .unzip();

        let session = Arc::new(Session {
            graph: Arc::clone(&graph),
            cache: Arc::clone(&self.cache),
            factory: Arc::clone(&self.factory),
            build_root: self.options.build_root.clone(),
            jobs,
            permits: Semaphore::new(jobs),
            cancel: self.cancel.clone(),
            states: receivers,
            installed: DashMap::new(),
            install_order: Mutex::new(Vec::new()),
            emitter,
        });

        let mut tasks = JoinSet::new();
        for (id, sender) in senders.into_iter().enumerate() {
            let session = Arc::clone(&session);
            tasks.spawn(async move {
                let mut steps = 0;
                let state = session.drive(id, &sender, &mut steps).await;
                sender.send_replace(state);
                (id, steps)
            });
        }

        let mut steps = vec![0usize; graph.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((id, count)) => steps[id] = count,
                Err(e) => tracing::error!(error = %e, "node task ended abnormally"),
            }
        }

        let nodes = node_reports(&session, &steps);

        let report = SessionReport {
            session_id,
            nodes,
            install_order: session.install_order.lock().await.clone(),
            steps_executed: steps.iter().sum(),
            duration: started.elapsed(),
        };

        session
            .emitter
            .emit(AppEvent::Build(BuildEvent::SessionCompleted {
                session_id: report.session_id.clone(),
                installed: report.installed_count(),
                failed: report.failed_count(),
                steps_executed: report.steps_executed,
                duration: report.duration,
            }));
        tracing::info!(
            session = %report.session_id,
            installed = report.installed_count(),
            failed = report.failed_count(),
            steps = report.steps_executed,
            "build session completed"
        );

        Ok(report)
    }
}

impl std::fmt::Debug for LifecycleDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleDriver")
            .field("cache", &self.cache.root())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// State shared by the node tasks of one session
struct Session {
    graph: Arc<DependencyGraph>,
    cache: Arc<ArtifactCache>,
    factory: Arc<dyn BuildToolFactory>,
    build_root: PathBuf,
    jobs: usize,
    permits: Semaphore,
    cancel: CancellationToken,
    states: Vec<watch::Receiver<NodeState>>,
    /// Finished packages by name, cached ones included
    installed: DashMap<String, InstalledPackage>,
    install_order: Mutex<Vec<NodeId>>,
    emitter: CorrelatedEmitter,
}

/// Per-node values carried between steps
struct NodeWork<'a> {
    id: NodeId,
    node: &'a ResolvedNode,
    package: String,
    identity: Hash,
    context: BuildContext,
    tool: Arc<dyn BuildTool>,
    payload: Option<ToolchainPayload>,
    toolchain: Option<PathBuf>,
    staging: Option<PathBuf>,
    location: Option<PathBuf>,
}

impl Session {
    /// Take one node from `Pending` to a terminal state
    async fn drive(
        &self,
        id: NodeId,
        state: &watch::Sender<NodeState>,
        steps: &mut usize,
    ) -> NodeState {
        let Some(node) = self.graph.node(id) else {
            return NodeState::Failed(Failure::Aborted {
                message: format!("node {id} is not in the graph"),
            });
        };
        let package = node.to_string();
        let Some(identity) = node.identity else {
            return NodeState::Failed(Failure::Aborted {
                message: format!("{package} has no package identity"),
            });
        };

        if let Some(record) = self.cache.lookup(&identity).await {
            return self.reuse_cached(node, &package, record);
        }

        if let Some(failed) = self.wait_for_inputs(id, &package).await {
            return failed;
        }

        let _permit = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return self.cancelled(&package),
            permit = self.permits.acquire() => match permit {
                Ok(permit) => permit,
                Err(_) => return self.cancelled(&package),
            },
        };

        let build_dir = self
            .build_root
            .join(format!("{}-{}", node.name(), identity.short()));
        let context = BuildContext {
            package: package.clone(),
            source_dir: node.recipe.resolved_source_dir(),
            generators_dir: build_dir.join("generators"),
            build_dir,
            build_type: node.settings.get("build_type").cloned(),
            jobs: self.jobs,
        };
        let mut work = NodeWork {
            id,
            node,
            package,
            identity,
            tool: self.factory.create(context.clone()),
            context,
            payload: None,
            toolchain: None,
            staging: None,
            location: None,
        };

        let settled = self.run_steps(&mut work, state, steps).await;
        release_build_dir(&work.package, &work.context.build_dir).await;
        settled
    }

    /// Settle a node from its cache record without running any step
    fn reuse_cached(
        &self,
        node: &ResolvedNode,
        package: &str,
        record: ArtifactRecord,
    ) -> NodeState {
        tracing::debug!(node = %package, identity = %record.identity.short(), "reusing cached artifact");
        self.installed.insert(
            node.name().to_string(),
            InstalledPackage {
                name: node.name().to_string(),
                version: node.recipe.version.clone(),
                identity: record.identity,
                prefix: record.location.clone(),
                libs: record.libs.clone(),
            },
        );
        self.emit(BuildEvent::NodeCached {
            node: package.to_string(),
            identity: record.identity.to_hex(),
        });
        NodeState::Installed {
            location: record.location,
            cached: true,
        }
    }

    /// Walk the lifecycle steps in order, stopping at the first failure
    async fn run_steps(
        &self,
        work: &mut NodeWork<'_>,
        state: &watch::Sender<NodeState>,
        steps: &mut usize,
    ) -> NodeState {
        let mut current = NodeState::Pending;
        for step in BuildStep::ALL {
            if self.cancel.is_cancelled() {
                return self.cancelled(&work.package);
            }

            self.emit(BuildEvent::StepStarted {
                node: work.package.clone(),
                step,
            });
            let step_started = Instant::now();
            *steps += 1;

            if let Err(error) = self.execute(step, work).await {
                tracing::warn!(node = %work.package, step = %step, error = %error, "step failed");
                self.emit(BuildEvent::NodeFailed {
                    node: work.package.clone(),
                    step,
                    failure: FailureContext::from_error(&error),
                });
                return NodeState::Failed(Failure::Step { step, error });
            }

            self.emit(BuildEvent::StepCompleted {
                node: work.package.clone(),
                step,
                duration: step_started.elapsed(),
            });

            let location = work.location.as_deref().unwrap_or(&work.context.build_dir);
            current = NodeState::after(step, location);
            if !current.is_terminal() {
                state.send_replace(current.clone());
            }
        }

        current
    }

    /// Wait until everything `id` builds against is settled
    ///
    /// Returns the terminal state of `id` when an input failed or the
    /// session was cancelled.
    async fn wait_for_inputs(&self, id: NodeId, package: &str) -> Option<NodeState> {
        for (dep, _) in build_inputs(&self.graph, id) {
            let Some(rx) = self.states.get(dep) else {
                continue;
            };
            let settled = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Some(self.cancelled(package)),
                state = settled(rx.clone()) => state,
            };

            if !settled.is_installed() {
                let dependency = self
                    .graph
                    .node(dep)
                    .map_or_else(|| dep.to_string(), ToString::to_string);
                tracing::debug!(node = %package, %dependency, "skipping node after dependency failure");
                self.emit(BuildEvent::NodeSkipped {
                    node: package.to_string(),
                    dependency: dependency.clone(),
                });
                return Some(NodeState::Failed(Failure::Dependency { dependency }));
            }
        }
        None
    }

    async fn execute(&self, step: BuildStep, work: &mut NodeWork<'_>) -> Result<(), Error> {
        match step {
            BuildStep::Generate => {
                let installed: BTreeMap<String, InstalledPackage> = self
                    .installed
                    .iter()
                    .map(|entry| (entry.key().clone(), entry.value().clone()))
                    .collect();
                let payload = generate(work.node, &self.graph, &installed)?;
                let files = kiln_generator::write(&payload, &work.context.generators_dir).await?;
                work.toolchain = Some(files.toolchain);
                work.payload = Some(payload);
                Ok(())
            }
            BuildStep::Configure => {
                let (Some(payload), Some(toolchain)) = (&work.payload, &work.toolchain) else {
                    return Err(Error::internal(format!(
                        "{} reached configure without a toolchain",
                        work.package
                    )));
                };
                work.tool.configure(payload, toolchain).await
            }
            BuildStep::Build => work.tool.build().await,
            BuildStep::Package => {
                let staging = work.context.build_dir.join("package");
                reset_dir(&staging).await?;
                work.tool.install(&staging).await?;
                work.staging = Some(staging);
                Ok(())
            }
            BuildStep::Install => {
                let Some(staging) = work.staging.take() else {
                    return Err(Error::internal(format!(
                        "{} reached install without a packaged tree",
                        work.package
                    )));
                };
                let recipe = &work.node.recipe;
                let record = ArtifactRecord::new(
                    recipe.name.clone(),
                    recipe.version.to_string(),
                    work.identity,
                )
                .with_libs(recipe.package_info.libs.clone());
                let record = self.cache.install(&staging, record).await?;

                self.installed.insert(
                    recipe.name.clone(),
                    InstalledPackage {
                        name: recipe.name.clone(),
                        version: recipe.version.clone(),
                        identity: work.identity,
                        prefix: record.location.clone(),
                        libs: record.libs.clone(),
                    },
                );
                self.install_order.lock().await.push(work.id);

                tracing::info!(node = %work.package, location = %record.location.display(), "installed");
                self.emit(BuildEvent::NodeInstalled {
                    node: work.package.clone(),
                    identity: work.identity.to_hex(),
                    location: record.location.clone(),
                });
                work.location = Some(record.location);
                Ok(())
            }
        }
    }

    fn cancelled(&self, package: &str) -> NodeState {
        self.emit(BuildEvent::NodeCancelled {
            node: package.to_string(),
        });
        NodeState::Failed(Failure::Cancelled)
    }

    fn emit(&self, event: BuildEvent) {
        self.emitter.emit(AppEvent::Build(event));
    }
}

/// Final per-node reports; tasks that never settled count as aborted
fn node_reports(session: &Session, steps: &[usize]) -> Vec<NodeReport> {
    session
        .graph
        .nodes()
        .map(|node| {
            let state = session.states[node.id].borrow().clone();
            let state = if state.is_terminal() {
                state
            } else {
                NodeState::Failed(Failure::Aborted {
                    message: format!("{node} stopped while {state}"),
                })
            };
            NodeReport {
                id: node.id,
                package: node.to_string(),
                identity: node.identity,
                state,
                steps_executed: steps.get(node.id).copied().unwrap_or(0),
            }
        })
        .collect()
}

/// Wait for a node to reach a terminal state
async fn settled(mut rx: watch::Receiver<NodeState>) -> NodeState {
    let state = match rx.wait_for(NodeState::is_terminal).await {
        Ok(state) => state.clone(),
        Err(_) => NodeState::Failed(Failure::Aborted {
            message: "node task ended without settling".to_string(),
        }),
    };
    state
}

/// Remove a node's build directory once the node has settled; failures are
/// logged and leave the node state alone
async fn release_build_dir(package: &str, build_dir: &Path) {
    if !tokio::fs::try_exists(build_dir).await.unwrap_or(false) {
        return;
    }
    match tokio::fs::remove_dir_all(build_dir).await {
        Ok(()) => tracing::debug!(node = %package, dir = %build_dir.display(), "released build directory"),
        Err(e) => {
            tracing::warn!(node = %package, dir = %build_dir.display(), error = %e, "failed to release build directory");
        }
    }
}

async fn reset_dir(path: &Path) -> Result<(), Error> {
    if tokio::fs::try_exists(path).await.unwrap_or(false) {
        tokio::fs::remove_dir_all(path)
            .await
            .map_err(|e| Error::io_with_path(&e, path))?;
    }
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| Error::io_with_path(&e, path))
}
