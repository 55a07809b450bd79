//! Recipe option values, domains and resolved option sets

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single option value
///
/// Values are kept as normalised strings; booleans are spelled `True` and
/// `False` whatever their source spelling, so `true`, `TRUE` and `True`
/// compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionValue(String);

impl OptionValue {
    /// Normalise a raw value
    pub fn new(raw: impl AsRef<str>) -> Self {
        let raw = raw.as_ref().trim();
        match raw.to_ascii_lowercase().as_str() {
            "true" => Self("True".to_string()),
            "false" => Self("False".to_string()),
            _ => Self(raw.to_string()),
        }
    }

    /// Boolean value
    #[must_use]
    pub fn boolean(value: bool) -> Self {
        Self(if value { "True" } else { "False" }.to_string())
    }

    /// Interpret the value as a boolean, if it is one
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self.0.as_str() {
            "True" => Some(true),
            "False" => Some(false),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        Self::boolean(value)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// The set of values an option may take
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionDomain {
    /// Any value is accepted
    Any,
    /// One of an enumerated list
    Values(Vec<OptionValue>),
}

impl OptionDomain {
    /// Check whether `value` belongs to this domain
    #[must_use]
    pub fn contains(&self, value: &OptionValue) -> bool {
        match self {
            Self::Any => true,
            Self::Values(values) => values.contains(value),
        }
    }

    /// Whether every value in the domain is a boolean
    #[must_use]
    pub fn is_boolean(&self) -> bool {
        match self {
            Self::Any => false,
            Self::Values(values) => {
                !values.is_empty() && values.iter().all(|v| v.as_bool().is_some())
            }
        }
    }
}

impl fmt::Display for OptionDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("ANY"),
            Self::Values(values) => {
                let strs: Vec<_> = values.iter().map(OptionValue::as_str).collect();
                f.write_str(&strs.join(", "))
            }
        }
    }
}

/// Concrete option values of one graph node, keyed by option name
pub type OptionSet = BTreeMap<String, OptionValue>;

/// Resolved build-context settings (os, compiler, `build_type`, arch)
pub type Settings = BTreeMap<String, String>;
