//! Package-related type definitions

use crate::{Version, VersionSpec};
use kiln_errors::VersionError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a recipe instance (name + version)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackageId {
    pub name: String,
    pub version: Version,
}

impl PackageId {
    /// Create a new package ID
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.version)
    }
}

/// Check a package name against the characters recipes may use
#[must_use]
pub fn is_valid_package_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '+'))
}

/// Reference to a dependency: a package name plus a version constraint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRef {
    pub name: String,
    pub version_spec: VersionSpec,
}

impl PackageRef {
    /// Create a reference from parts
    pub fn new(name: impl Into<String>, version_spec: VersionSpec) -> Self {
        Self {
            name: name.into(),
            version_spec,
        }
    }

    /// Parse a reference such as `boost/1.86.0`, `zlib/[>=1.2 <2]`, `b@^1.0`
    /// or `openssl>=3.0`
    ///
    /// # Errors
    ///
    /// Returns `VersionError` if the name is empty or contains invalid
    /// characters, or if the constraint does not parse.
    pub fn parse(s: &str) -> Result<Self, VersionError> {
        let s = s.trim();
        let invalid = || VersionError::InvalidReference {
            input: s.to_string(),
        };

        let (name, version_str) = if let Some(pos) = s.find(['/', '@']) {
            (s[..pos].trim(), s[pos + 1..].trim())
        } else if let Some(pos) = s.find(['<', '>', '=', '!', '~', '^']) {
            (s[..pos].trim(), s[pos..].trim())
        } else {
            // No version constraint means any version
            (s, "*")
        };

        if !is_valid_package_name(name) {
            return Err(invalid());
        }

        Ok(Self {
            name: name.to_string(),
            version_spec: version_str.parse()?,
        })
    }
}

impl fmt::Display for PackageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.version_spec)
    }
}

/// Dependency kind tag carried by every requirement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementKind {
    /// Linked into the package and exposed to its consumers
    Regular,
    /// Needed only to build the package (code generators, cmake modules)
    BuildTool,
    /// Needed only to test the package
    Test,
}

impl RequirementKind {
    /// All kinds in the order the resolver visits them
    pub const VISIT_ORDER: [Self; 3] = [Self::Regular, Self::BuildTool, Self::Test];

    /// Whether requirements of this kind stay local to the resolution session
    #[must_use]
    pub fn is_session_local(self) -> bool {
        !matches!(self, Self::Regular)
    }
}

impl fmt::Display for RequirementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Regular => write!(f, "regular"),
            Self::BuildTool => write!(f, "build_tool"),
            Self::Test => write!(f, "test"),
        }
    }
}

/// One step of the build lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStep {
    Generate,
    Configure,
    Build,
    Package,
    Install,
}

impl BuildStep {
    /// Every step in lifecycle order
    pub const ALL: [Self; 5] = [
        Self::Generate,
        Self::Configure,
        Self::Build,
        Self::Package,
        Self::Install,
    ];

    /// Lowercase step name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Generate => "generate",
            Self::Configure => "configure",
            Self::Build => "build",
            Self::Package => "package",
            Self::Install => "install",
        }
    }
}

impl fmt::Display for BuildStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
