//! Option propagation error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum OptionError {
    #[error("invalid value {value:?} for option {package}:{option} (allowed: {allowed})")]
    InvalidOptionValue {
        package: String,
        option: String,
        value: String,
        allowed: String,
    },

    #[error("package {package} has no option named {option}")]
    UnknownOption { package: String, option: String },

    #[error("invalid option override {input:?}: {reason}")]
    InvalidOverride { input: String, reason: String },
}

impl UserFacingError for OptionError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::InvalidOptionValue { .. } => {
                Some("Pick one of the allowed values listed in the recipe's option domain.")
            }
            Self::UnknownOption { .. } => {
                Some("Check the option name against the package recipe.")
            }
            Self::InvalidOverride { .. } => {
                Some("Write overrides as name:option=value, e.g. boost/*:shared=False.")
            }
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::InvalidOptionValue { .. } => "options.invalid_value",
            Self::UnknownOption { .. } => "options.unknown_option",
            Self::InvalidOverride { .. } => "options.invalid_override",
        };
        Some(code)
    }
}
