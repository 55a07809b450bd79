//! Build command implementation

use crate::session::prepare;
use crate::{BuildReport, OpsCtx, SessionRequest};
use kiln_builder::{DriverOptions, LifecycleDriver};
use kiln_config::calculate_build_jobs;
use kiln_errors::Error;
use kiln_events::EventEmitter;
use kiln_store::ArtifactCache;
use std::sync::Arc;

/// Resolve the root recipe and drive every node to installation
///
/// # Errors
///
/// Returns recipe, resolution and option errors before any step runs. If
/// the root is not installed, returns the step failure that started the
/// failing chain, or `Error::Cancelled`.
pub async fn build(ctx: &OpsCtx, request: &SessionRequest) -> Result<BuildReport, Error> {
    ctx.emit_operation_started("build");

    let prepared = match prepare(ctx, request).await {
        Ok(prepared) => prepared,
        Err(e) => {
            ctx.emit_operation_failed("build", e.to_string());
            return Err(e);
        }
    };

    let cache =
        ArtifactCache::open_with_events(ctx.config.cache_dir(), Some(ctx.tx.clone())).await?;
    let jobs = request
        .jobs
        .map_or_else(|| ctx.config.jobs(), calculate_build_jobs);

    let driver = LifecycleDriver::new(
        Arc::new(cache),
        Arc::clone(&ctx.factory),
        DriverOptions {
            jobs,
            build_root: ctx.config.build_root(),
        },
    )
    .with_event_sender(ctx.tx.clone())
    .with_cancellation(ctx.cancel.clone());

    let session = driver.run(Arc::new(prepared.graph)).await?;

    if let Some(error) = session.root_failure() {
        ctx.emit_operation_failed("build", error.to_string());
        return Err(error);
    }

    ctx.emit_operation_completed("build", true);
    Ok(BuildReport::from(&session))
}
