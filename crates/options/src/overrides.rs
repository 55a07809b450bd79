//! Option override parsing
//!
//! Overrides are written `pattern:option=value`. The pattern is a package
//! name (`boost`), a name with version (`boost/1.86.0`) or a glob over
//! either (`boost/*`, `*`). A bare `option=value` targets the root.

use globset::{Glob, GlobMatcher};
use kiln_errors::OptionError;
use kiln_resolver::ResolvedNode;
use kiln_types::OptionValue;
use std::fmt;
use std::str::FromStr;

/// Which graph nodes an override applies to
#[derive(Clone, Debug)]
pub enum PackagePattern {
    /// The root package
    Root,
    /// `name` or `name/version`
    Exact(String),
    /// Glob over `name/version` and `name`
    Wildcard { pattern: String, matcher: GlobMatcher },
}

impl PackagePattern {
    /// Parse a package pattern
    ///
    /// # Errors
    ///
    /// Returns `OptionError::InvalidOverride` for empty or malformed globs.
    pub fn parse(pattern: &str) -> Result<Self, OptionError> {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return Err(OptionError::InvalidOverride {
                input: pattern.to_string(),
                reason: "empty package pattern".to_string(),
            });
        }

        if !pattern.contains(['*', '?', '[', '{']) {
            return Ok(Self::Exact(pattern.to_string()));
        }

        let matcher = Glob::new(pattern)
            .map_err(|e| OptionError::InvalidOverride {
                input: pattern.to_string(),
                reason: e.to_string(),
            })?
            .compile_matcher();

        Ok(Self::Wildcard {
            pattern: pattern.to_string(),
            matcher,
        })
    }

    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        matches!(self, Self::Wildcard { .. })
    }

    /// Whether the pattern selects `node`
    #[must_use]
    pub fn matches(&self, node: &ResolvedNode) -> bool {
        match self {
            Self::Root => node.id == 0,
            Self::Exact(name) => name == node.name() || *name == node.to_string(),
            Self::Wildcard { matcher, .. } => {
                matcher.is_match(node.to_string()) || matcher.is_match(node.name())
            }
        }
    }
}

impl fmt::Display for PackagePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root => f.write_str("&"),
            Self::Exact(pattern) | Self::Wildcard { pattern, .. } => f.write_str(pattern),
        }
    }
}

/// A session-wide `pattern:option=value` override
#[derive(Clone, Debug)]
pub struct OptionOverride {
    pub pattern: PackagePattern,
    pub option: String,
    pub value: OptionValue,
}

impl OptionOverride {
    /// Parse `pattern:option=value` or `option=value`
    ///
    /// # Errors
    ///
    /// Returns `OptionError::InvalidOverride` when the input is malformed.
    pub fn parse(input: &str) -> Result<Self, OptionError> {
        let invalid = |reason: &str| OptionError::InvalidOverride {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        let (target, value) = input
            .split_once('=')
            .ok_or_else(|| invalid("expected option=value"))?;

        let (pattern, option) = match target.rsplit_once(':') {
            Some((pattern, option)) => (PackagePattern::parse(pattern)?, option.trim()),
            None => (PackagePattern::Root, target.trim()),
        };

        if option.is_empty() {
            return Err(invalid("missing option name"));
        }
        let value = value.trim();
        if value.is_empty() {
            return Err(invalid("missing value"));
        }

        Ok(Self {
            pattern,
            option: option.to_string(),
            value: OptionValue::new(value),
        })
    }
}

impl FromStr for OptionOverride {
    type Err = OptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for OptionOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.pattern {
            PackagePattern::Root => write!(f, "{}={}", self.option, self.value),
            _ => write!(f, "{}:{}={}", self.pattern, self.option, self.value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_forms() {
        let o = OptionOverride::parse("boost/*:shared=False").unwrap();
        assert!(o.pattern.is_wildcard());
        assert_eq!(o.option, "shared");
        assert_eq!(o.value, OptionValue::boolean(false));

        let o: OptionOverride = "zlib:fPIC=true".parse().unwrap();
        assert!(matches!(o.pattern, PackagePattern::Exact(ref name) if name == "zlib"));
        assert_eq!(o.value.as_str(), "True");

        let o = OptionOverride::parse("with_tests=False").unwrap();
        assert!(matches!(o.pattern, PackagePattern::Root));
        assert_eq!(o.to_string(), "with_tests=False");

        let o = OptionOverride::parse("*:shared=True").unwrap();
        assert!(o.pattern.is_wildcard());
        assert_eq!(o.to_string(), "*:shared=True");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for input in ["shared", "boost:=True", "boost:shared=", ":shared=True", "a[:x=1"] {
            assert!(
                OptionOverride::parse(input).is_err(),
                "{input} should be rejected"
            );
        }
    }
}
