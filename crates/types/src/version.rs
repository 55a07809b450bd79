//! Version specification and constraint parsing
//!
//! Accepts the constraint dialects recipes are written in:
//! - `1.2.3` or `==1.2.3` - Exact version
//! - `>=1.2.0`, `<=2.0.0`, `>1.0`, `<2.0` - Bounds
//! - `~=1.2.0` - Compatible release (>=1.2.0,<1.3.0)
//! - `^1.2` - Caret (>=1.2.0,<2.0.0)
//! - `~1.2.3` - Tilde (>=1.2.3,<1.3.0)
//! - `!=1.5.0` - Exclude version
//! - Conjunctions: `>=1.2,<2.0,!=1.5.0` or `[>=1.2 <2.0]`
//!
//! Two-component versions such as `1.0` are read as `1.0.0`.

use semver::Version;
use serde::{Deserialize, Serialize};
use kiln_errors::VersionError;
use std::fmt;
use std::str::FromStr;

/// Parse a version, padding missing minor/patch components with zero
///
/// # Errors
///
/// Returns an error if the input is not a version even after padding.
pub fn parse_version(input: &str) -> Result<Version, VersionError> {
    let input = input.trim();
    if let Ok(version) = Version::parse(input) {
        return Ok(version);
    }

    let split_at = input.find(['-', '+']).unwrap_or(input.len());
    let (core, suffix) = input.split_at(split_at);
    let components = core.split('.').count();
    if core.is_empty() || components >= 3 {
        return Err(VersionError::InvalidVersion {
            input: input.to_string(),
        });
    }

    let padded = format!("{core}{}{suffix}", ".0".repeat(3 - components));
    Version::parse(&padded).map_err(|_| VersionError::InvalidVersion {
        input: input.to_string(),
    })
}

/// A single version constraint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VersionConstraint {
    Exact(Version),
    GreaterEqual(Version),
    LessEqual(Version),
    Greater(Version),
    Less(Version),
    Compatible(Version),
    Caret(Version),
    Tilde(Version),
    NotEqual(Version),
}

impl VersionConstraint {
    /// Check if a version satisfies this constraint
    #[must_use]
    pub fn matches(&self, version: &Version) -> bool {
        match self {
            Self::Exact(v) => version == v,
            Self::GreaterEqual(v) => version >= v,
            Self::LessEqual(v) => version <= v,
            Self::Greater(v) => version > v,
            Self::Less(v) => version < v,
            Self::NotEqual(v) => version != v,
            Self::Compatible(v) | Self::Tilde(v) => {
                version >= v && version.major == v.major && version.minor == v.minor
            }
            Self::Caret(v) => {
                if version < v {
                    return false;
                }
                if v.major > 0 {
                    version.major == v.major
                } else if v.minor > 0 {
                    version.major == 0 && version.minor == v.minor
                } else {
                    version.major == 0 && version.minor == 0 && version.patch == v.patch
                }
            }
        }
    }

    /// Whether this constraint pins exactly one version
    #[must_use]
    pub fn is_exact(&self) -> bool {
        matches!(self, Self::Exact(_))
    }

    /// Parse a single constraint from a string
    fn parse(s: &str) -> Result<Self, VersionError> {
        let s = s.trim();

        // Two-character operators must be tried before their one-character prefixes
        let (ctor, rest): (fn(Version) -> Self, &str) = if let Some(rest) = s.strip_prefix("==") {
            (Self::Exact, rest)
        } else if let Some(rest) = s.strip_prefix(">=") {
            (Self::GreaterEqual, rest)
        } else if let Some(rest) = s.strip_prefix("<=") {
            (Self::LessEqual, rest)
        } else if let Some(rest) = s.strip_prefix("!=") {
            (Self::NotEqual, rest)
        } else if let Some(rest) = s.strip_prefix("~=") {
            (Self::Compatible, rest)
        } else if let Some(rest) = s.strip_prefix('>') {
            (Self::Greater, rest)
        } else if let Some(rest) = s.strip_prefix('<') {
            (Self::Less, rest)
        } else if let Some(rest) = s.strip_prefix('^') {
            (Self::Caret, rest)
        } else if let Some(rest) = s.strip_prefix('~') {
            (Self::Tilde, rest)
        } else if let Some(rest) = s.strip_prefix('=') {
            (Self::Exact, rest)
        } else if s.starts_with(|c: char| c.is_ascii_digit()) {
            (Self::Exact, s)
        } else {
            return Err(VersionError::InvalidConstraint {
                input: s.to_string(),
            });
        };

        let version = parse_version(rest).map_err(|_| VersionError::InvalidConstraint {
            input: s.to_string(),
        })?;
        Ok(ctor(version))
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(v) => write!(f, "=={v}"),
            Self::GreaterEqual(v) => write!(f, ">={v}"),
            Self::LessEqual(v) => write!(f, "<={v}"),
            Self::Greater(v) => write!(f, ">{v}"),
            Self::Less(v) => write!(f, "<{v}"),
            Self::Compatible(v) => write!(f, "~={v}"),
            Self::Caret(v) => write!(f, "^{v}"),
            Self::Tilde(v) => write!(f, "~{v}"),
            Self::NotEqual(v) => write!(f, "!={v}"),
        }
    }
}

/// A version specification that can contain multiple constraints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionSpec {
    constraints: Vec<VersionConstraint>,
}

impl VersionSpec {
    /// A spec that matches every version
    #[must_use]
    pub fn any() -> Self {
        Self {
            constraints: Vec::new(),
        }
    }

    /// Create a version spec from a single constraint
    #[must_use]
    pub fn single(constraint: VersionConstraint) -> Self {
        Self {
            constraints: vec![constraint],
        }
    }

    /// Create an exact version spec
    #[must_use]
    pub fn exact(version: Version) -> Self {
        Self::single(VersionConstraint::Exact(version))
    }

    /// Check if a version satisfies all constraints
    #[must_use]
    pub fn matches(&self, version: &Version) -> bool {
        self.constraints.iter().all(|c| c.matches(version))
    }

    /// Get the constraints
    #[must_use]
    pub fn constraints(&self) -> &[VersionConstraint] {
        &self.constraints
    }

    /// Check if this spec has any constraints
    #[must_use]
    pub fn is_any(&self) -> bool {
        self.constraints.is_empty()
    }

    /// The conjunction of two specs; a version matches it only if it matches both
    #[must_use]
    pub fn intersect(&self, other: &Self) -> Self {
        let mut constraints = self.constraints.clone();
        for constraint in &other.constraints {
            if !constraints.contains(constraint) {
                constraints.push(constraint.clone());
            }
        }
        Self { constraints }
    }

    /// Pick the highest version from `candidates` that satisfies this spec
    #[must_use]
    pub fn best_match<'a, I>(&self, candidates: I) -> Option<&'a Version>
    where
        I: IntoIterator<Item = &'a Version>,
    {
        candidates.into_iter().filter(|v| self.matches(v)).max()
    }
}

impl Default for VersionSpec {
    fn default() -> Self {
        Self::any()
    }
}

impl FromStr for VersionSpec {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let s = s
            .strip_prefix('[')
            .and_then(|inner| inner.strip_suffix(']'))
            .unwrap_or(s)
            .trim();

        if s.is_empty() || s == "*" {
            return Ok(Self::any());
        }

        // Operators may be separated from their version by whitespace (">= 1.0"),
        // so glue bare operator tokens onto the token that follows them.
        let mut parts: Vec<String> = Vec::new();
        let mut pending_op: Option<&str> = None;
        for token in s.split([',', ' ', '\t']).filter(|t| !t.is_empty()) {
            let is_operator = token.chars().all(|c| "<>=!~^".contains(c));
            match (pending_op.take(), is_operator) {
                (Some(op), false) => parts.push(format!("{op}{token}")),
                (Some(op), true) => {
                    return Err(VersionError::InvalidConstraint {
                        input: format!("{op} {token}"),
                    })
                }
                (None, true) => pending_op = Some(token),
                (None, false) => parts.push(token.to_string()),
            }
        }
        if let Some(op) = pending_op {
            return Err(VersionError::InvalidConstraint {
                input: op.to_string(),
            });
        }

        let constraints = parts
            .iter()
            .map(|part| VersionConstraint::parse(part))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { constraints })
    }
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.constraints.is_empty() {
            write!(f, "*")
        } else {
            let strs: Vec<_> = self.constraints.iter().map(ToString::to_string).collect();
            write!(f, "{}", strs.join(","))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        parse_version(s).unwrap()
    }

    #[test]
    fn test_parse_version_padding() {
        assert_eq!(v("1.0"), Version::new(1, 0, 0));
        assert_eq!(v("3"), Version::new(3, 0, 0));
        assert_eq!(v("0.0.14"), Version::new(0, 0, 14));
        assert!(parse_version("1.x").is_err());
        assert!(parse_version("").is_err());
    }

    #[test]
    fn test_bare_version_is_exact() {
        let spec = VersionSpec::from_str("1.86.0").unwrap();
        assert!(spec.matches(&v("1.86.0")));
        assert!(!spec.matches(&v("1.86.1")));
        assert!(spec.constraints()[0].is_exact());
    }

    #[test]
    fn test_range_constraints() {
        let spec = VersionSpec::from_str(">=1.2.0,<2.0.0").unwrap();

        assert!(!spec.matches(&v("1.1.9")));
        assert!(spec.matches(&v("1.2.0")));
        assert!(spec.matches(&v("1.9.9")));
        assert!(!spec.matches(&v("2.0.0")));
    }

    #[test]
    fn test_bracket_range() {
        let spec = VersionSpec::from_str("[>=1.0 <2.0]").unwrap();
        assert!(spec.matches(&v("1.5")));
        assert!(!spec.matches(&v("2.0")));

        let spaced = VersionSpec::from_str(">= 1.0, < 2.0").unwrap();
        assert_eq!(spec, spaced);
    }

    #[test]
    fn test_caret_constraint() {
        let spec = VersionSpec::from_str("^1.0").unwrap();
        assert!(spec.matches(&v("1.0.0")));
        assert!(spec.matches(&v("1.9.3")));
        assert!(!spec.matches(&v("2.0.0")));
        assert!(!spec.matches(&v("0.9.0")));

        let zero = VersionSpec::from_str("^0.2.3").unwrap();
        assert!(zero.matches(&v("0.2.9")));
        assert!(!zero.matches(&v("0.3.0")));
    }

    #[test]
    fn test_tilde_and_compatible() {
        let spec = VersionSpec::from_str("~1.2.3").unwrap();
        assert!(spec.matches(&v("1.2.9")));
        assert!(!spec.matches(&v("1.3.0")));

        let spec = VersionSpec::from_str("~=1.2.0").unwrap();
        assert!(spec.matches(&v("1.2.5")));
        assert!(!spec.matches(&v("1.3.0")));
    }

    #[test]
    fn test_not_equal_constraint() {
        let spec = VersionSpec::from_str(">=1.0.0,!=1.5.0,<2.0.0").unwrap();

        assert!(spec.matches(&v("1.4.9")));
        assert!(!spec.matches(&v("1.5.0")));
        assert!(spec.matches(&v("1.5.1")));
    }

    #[test]
    fn test_any_version() {
        let spec = VersionSpec::from_str("*").unwrap();
        assert!(spec.is_any());
        assert!(spec.matches(&v("0.0.1")));
        assert!(spec.matches(&v("999.999.999")));
    }

    #[test]
    fn test_intersect_and_best_match() {
        let a = VersionSpec::from_str("^1.0").unwrap();
        let b = VersionSpec::from_str(">=1.2,<1.5").unwrap();
        let both = a.intersect(&b);

        let candidates = [v("1.0"), v("1.4"), v("1.9"), v("2.1")];
        assert_eq!(a.best_match(&candidates), Some(&v("1.9")));
        assert_eq!(both.best_match(&candidates), Some(&v("1.4")));

        let conflicting = VersionSpec::exact(v("1.0")).intersect(&VersionSpec::exact(v("1.4")));
        assert_eq!(conflicting.best_match(&candidates), None);
    }

    #[test]
    fn test_invalid_constraints() {
        assert!(VersionSpec::from_str("latest").is_err());
        assert!(VersionSpec::from_str(">=").is_err());
        assert!(VersionSpec::from_str(">= <= 1.0").is_err());
    }
}
