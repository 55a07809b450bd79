//! Operations context for dependency injection

use kiln_builder::{BuildToolFactory, CMakeFactory, CancellationToken};
use kiln_config::Config;
use kiln_errors::{ConfigError, Error};
use kiln_events::{EventEmitter, EventSender};
use std::sync::Arc;

/// Everything an operation needs besides its request
pub struct OpsCtx {
    /// Effective configuration (file, environment and CLI flags merged)
    pub config: Config,
    /// Event sender for progress reporting
    pub tx: EventSender,
    /// Creates the build tool adapter for each node
    pub factory: Arc<dyn BuildToolFactory>,
    /// Cancels a running build session
    pub cancel: CancellationToken,
}

impl EventEmitter for OpsCtx {
    fn event_sender(&self) -> Option<&EventSender> {
        Some(&self.tx)
    }
}

impl std::fmt::Debug for OpsCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpsCtx")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Builder for [`OpsCtx`]
#[derive(Default)]
pub struct OpsContextBuilder {
    config: Option<Config>,
    tx: Option<EventSender>,
    factory: Option<Arc<dyn BuildToolFactory>>,
    cancel: Option<CancellationToken>,
}

impl OpsContextBuilder {
    /// Create new context builder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set configuration
    #[must_use]
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Set event sender
    #[must_use]
    pub fn with_event_sender(mut self, tx: EventSender) -> Self {
        self.tx = Some(tx);
        self
    }

    /// Replace the CMake adapter
    #[must_use]
    pub fn with_build_tool_factory(mut self, factory: Arc<dyn BuildToolFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Build the context
    ///
    /// Configuration defaults to [`Config::default`] and the build tool to
    /// CMake as configured under `[build]`.
    ///
    /// # Errors
    ///
    /// Returns an error if no event sender was provided.
    pub fn build(self) -> Result<OpsCtx, Error> {
        let tx = self.tx.ok_or_else(|| ConfigError::MissingField {
            field: "event_sender".to_string(),
        })?;
        let config = self.config.unwrap_or_default();
        let factory = self.factory.unwrap_or_else(|| {
            Arc::new(CMakeFactory::new(
                config.build.cmake.clone(),
                config.build.generator.clone(),
            ))
        });

        Ok(OpsCtx {
            config,
            tx,
            factory,
            cancel: self.cancel.unwrap_or_default(),
        })
    }
}
