//! Recipe parsing and validation error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum RecipeError {
    #[error("malformed recipe {recipe}: {message}")]
    Malformed { recipe: String, message: String },

    #[error("recipe file not found: {path}")]
    NotFound { path: String },
}

impl RecipeError {
    /// Shorthand for a `Malformed` error
    pub fn malformed(recipe: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Malformed {
            recipe: recipe.into(),
            message: message.into(),
        }
    }
}

impl UserFacingError for RecipeError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::Malformed { .. } => {
                Some("Correct the recipe definition before retrying the build.")
            }
            Self::NotFound { .. } => Some("Check the recipe path passed on the command line."),
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::Malformed { .. } => "recipe.malformed",
            Self::NotFound { .. } => "recipe.not_found",
        };
        Some(code)
    }
}
