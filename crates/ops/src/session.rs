//! Shared session pipeline: load, resolve, propagate options, fingerprint

use crate::{OpsCtx, SessionRequest};
use kiln_errors::{ConfigError, Error};
use kiln_events::EventEmitter;
use kiln_index::RecipeIndex;
use kiln_options::OptionPropagator;
use kiln_resolver::{DependencyGraph, ExecutionPlan, ResolveOptions, Resolver};
use kiln_types::Settings;
use std::sync::Arc;

/// A graph ready to be inspected or built
pub(crate) struct PreparedSession {
    pub graph: DependencyGraph,
    pub plan: ExecutionPlan,
    pub restarts: usize,
}

/// Run every pre-build stage for `request`
///
/// Any recipe, resolution or option error surfaces here, before a single
/// lifecycle step has run.
pub(crate) async fn prepare(
    ctx: &OpsCtx,
    request: &SessionRequest,
) -> Result<PreparedSession, Error> {
    let root = Arc::new(kiln_recipe::load_file(&request.recipe).await?);
    let index = load_index(ctx, request).await?;

    let resolution = Resolver::new(&index)
        .with_options(ResolveOptions {
            include_test_requirements: request.include_tests,
            ..ResolveOptions::default()
        })
        .with_event_sender(ctx.tx.clone())
        .resolve(root)?;

    let mut graph = resolution.graph;
    let applied = OptionPropagator::new(&request.overrides)
        .with_event_sender(ctx.tx.clone())
        .propagate(&mut graph)?;

    let settings = session_settings(ctx, &request.settings)?;
    kiln_identity::annotate(&mut graph, &settings)?;

    tracing::debug!(
        root = %graph.root(),
        nodes = graph.len(),
        overrides = applied,
        restarts = resolution.restarts,
        "session prepared"
    );

    Ok(PreparedSession {
        graph,
        plan: resolution.plan,
        restarts: resolution.restarts,
    })
}

async fn load_index(ctx: &OpsCtx, request: &SessionRequest) -> Result<RecipeIndex, Error> {
    let registry = request
        .registry
        .as_deref()
        .or_else(|| ctx.config.registry_dir());

    if let Some(dir) = registry {
        let index = RecipeIndex::load_dir(dir).await?;
        ctx.emit_debug(format!(
            "loaded {} recipes from {}",
            index.len(),
            dir.display()
        ));
        Ok(index)
    } else {
        ctx.emit_debug("no recipe registry configured");
        Ok(RecipeIndex::new())
    }
}

/// Configured settings with `key=value` overrides applied on top
fn session_settings(ctx: &OpsCtx, overrides: &[String]) -> Result<Settings, Error> {
    let mut settings = ctx.config.session_settings();
    for raw in overrides {
        let (key, value) = raw
            .split_once('=')
            .map(|(k, v)| (k.trim(), v.trim()))
            .filter(|(k, _)| !k.is_empty())
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "setting".to_string(),
                value: raw.clone(),
            })?;
        settings.insert(key.to_string(), value.to_string());
    }
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OpsContextBuilder;

    fn ctx() -> OpsCtx {
        let (tx, _rx) = kiln_events::channel();
        OpsContextBuilder::new().with_event_sender(tx).build().unwrap()
    }

    #[test]
    fn test_setting_overrides() {
        let ctx = ctx();
        let settings = session_settings(
            &ctx,
            &["build_type=Debug".to_string(), "compiler = gcc".to_string()],
        )
        .unwrap();

        assert_eq!(settings["build_type"], "Debug");
        assert_eq!(settings["compiler"], "gcc");
        assert!(settings.contains_key("os"));
    }

    #[test]
    fn test_malformed_setting() {
        let ctx = ctx();
        assert!(session_settings(&ctx, &["build_type".to_string()]).is_err());
        assert!(session_settings(&ctx, &["=Debug".to_string()]).is_err());
    }
}
