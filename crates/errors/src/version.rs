//! Version and constraint parsing error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum VersionError {
    #[error("invalid version: {input}")]
    InvalidVersion { input: String },

    #[error("invalid version constraint: {input}")]
    InvalidConstraint { input: String },

    #[error("invalid package reference: {input}")]
    InvalidReference { input: String },

    #[error("version parse error: {message}")]
    ParseError { message: String },
}

impl UserFacingError for VersionError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::InvalidVersion { .. } | Self::ParseError { .. } => {
                Some("Use semantic-version strings like 1.2.3 (1.2 is read as 1.2.0).")
            }
            Self::InvalidConstraint { .. } => Some(
                "Use caret (`^`), tilde (`~`), range (`>=1.0 <2.0`) or exact version constraints.",
            ),
            Self::InvalidReference { .. } => {
                Some("Write requirements as name/constraint, e.g. boost/1.86.0 or zlib/^1.2.")
            }
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::InvalidVersion { .. } => "version.invalid_version",
            Self::InvalidConstraint { .. } => "version.invalid_constraint",
            Self::InvalidReference { .. } => "version.invalid_reference",
            Self::ParseError { .. } => "version.parse_error",
        };
        Some(code)
    }
}
