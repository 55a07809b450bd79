//! Requirement resolution error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum ResolveError {
    #[error("dependency cycle detected: {}", path.join(" -> "))]
    CycleDetected { path: Vec<String> },

    #[error("version conflict for {name}: {constraints} cannot be satisfied together")]
    VersionConflict {
        name: String,
        constraints: String,
        required_by: Vec<String>,
    },

    #[error("missing requirement {name}/{constraint} (required by {required_by})")]
    MissingRequirement {
        name: String,
        constraint: String,
        required_by: String,
    },

    #[error("resolution did not converge after {iterations} passes")]
    NotConverged { iterations: usize },
}

impl UserFacingError for ResolveError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::CycleDetected { .. } => {
                Some("Break the cycle by removing one of the listed requirements.")
            }
            Self::VersionConflict { .. } => {
                Some("Relax one of the version requirements so a common version exists.")
            }
            Self::MissingRequirement { .. } => {
                Some("Add the recipe to the registry or fix the requirement reference.")
            }
            Self::NotConverged { .. } => None,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::CycleDetected { .. } => "resolve.cycle_detected",
            Self::VersionConflict { .. } => "resolve.version_conflict",
            Self::MissingRequirement { .. } => "resolve.missing_requirement",
            Self::NotConverged { .. } => "resolve.not_converged",
        };
        Some(code)
    }
}
