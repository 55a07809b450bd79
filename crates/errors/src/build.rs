//! Build lifecycle error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum BuildError {
    #[error("{node}: {step} step failed: {cause}")]
    StepFailure {
        node: String,
        step: String,
        cause: String,
    },

    #[error("configure failed: {message}")]
    ConfigureFailed { message: String },

    #[error("compile failed: {message}")]
    CompileFailed { message: String },

    #[error("install failed: {message}")]
    InstallFailed { message: String },

    #[error("build tool not available: {tool}")]
    ToolNotFound { tool: String },

    #[error("{command} exited with status {status}")]
    CommandFailed { command: String, status: String },

    #[error("source directory missing for {package}: {path}")]
    MissingSources { package: String, path: String },

    #[error("generator failed: {message}")]
    GeneratorFailed { message: String },

    #[error("node {node} not present in the build graph")]
    UnknownNode { node: String },
}

impl BuildError {
    /// Wrap a lower-level failure as a step failure of `node`
    pub fn step_failure(
        node: impl Into<String>,
        step: impl Into<String>,
        cause: impl std::fmt::Display,
    ) -> Self {
        Self::StepFailure {
            node: node.into(),
            step: step.into(),
            cause: cause.to_string(),
        }
    }
}

impl UserFacingError for BuildError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::ToolNotFound { .. } => Some("Install the build tool and make sure it is on PATH."),
            Self::MissingSources { .. } => {
                Some("Set source_dir in the recipe or place the sources next to it.")
            }
            Self::StepFailure { .. } | Self::CommandFailed { .. } => {
                Some("Inspect the build tool output above; resubmit once the cause is fixed.")
            }
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        false
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::StepFailure { .. } => "build.step_failure",
            Self::ConfigureFailed { .. } => "build.configure_failed",
            Self::CompileFailed { .. } => "build.compile_failed",
            Self::InstallFailed { .. } => "build.install_failed",
            Self::ToolNotFound { .. } => "build.tool_not_found",
            Self::CommandFailed { .. } => "build.command_failed",
            Self::MissingSources { .. } => "build.missing_sources",
            Self::GeneratorFailed { .. } => "build.generator_failed",
            Self::UnknownNode { .. } => "build.unknown_node",
        };
        Some(code)
    }
}
