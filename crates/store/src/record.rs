//! Cache index records

use chrono::{DateTime, Utc};
use kiln_hash::Hash;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One installed package in the artifact cache
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub name: String,
    pub version: String,
    pub identity: Hash,
    /// Slot directory holding the installed files
    pub location: PathBuf,
    /// Libraries exported to consumers
    #[serde(default)]
    pub libs: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl ArtifactRecord {
    /// New record; `location` is filled in when the artifact is installed
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>, identity: Hash) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            identity,
            location: PathBuf::new(),
            libs: Vec::new(),
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_libs(mut self, libs: Vec<String>) -> Self {
        self.libs = libs;
        self
    }

    /// `name/version`
    #[must_use]
    pub fn package(&self) -> String {
        format!("{}/{}", self.name, self.version)
    }
}
