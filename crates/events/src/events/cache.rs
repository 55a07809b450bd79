use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Artifact cache events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CacheEvent {
    /// Cache index loaded from disk
    IndexLoaded { path: PathBuf, entries: usize },

    /// An identity was looked up
    Lookup { identity: String, hit: bool },

    /// A new artifact was recorded
    ArtifactRecorded {
        node: String,
        identity: String,
        location: PathBuf,
    },
}
