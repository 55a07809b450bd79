#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Artifact cache for kiln
//!
//! Installed packages live under `<cache>/artifacts/<identity>`, one slot per
//! package identity. `<cache>/index.json` records every slot with the
//! package it holds, so a later session can skip nodes whose identity is
//! already present.

mod fileops;
mod record;

pub use fileops::{copy_directory_recursive, move_directory};
pub use record::ArtifactRecord;

use dashmap::DashMap;
use kiln_config::constants::{ARTIFACTS_DIR, CACHE_INDEX_FILE};
use kiln_errors::{Error, StorageError};
use kiln_events::{AppEvent, CacheEvent, EventEmitter, EventSender};
use kiln_hash::Hash;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

const INDEX_FORMAT_VERSION: u32 = 1;

/// On-disk shape of `index.json`
#[derive(Debug, Default, Serialize, Deserialize)]
struct IndexFile {
    version: u32,
    artifacts: BTreeMap<String, ArtifactRecord>,
}

/// Identity-keyed store of installed packages
pub struct ArtifactCache {
    root: PathBuf,
    entries: DashMap<Hash, ArtifactRecord>,
    /// Serialises writes of `index.json`
    persist_lock: Mutex<()>,
    event_sender: Option<EventSender>,
}

impl EventEmitter for ArtifactCache {
    fn event_sender(&self) -> Option<&EventSender> {
        self.event_sender.as_ref()
    }
}

impl std::fmt::Debug for ArtifactCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactCache")
            .field("root", &self.root)
            .field("entries", &self.entries.len())
            .finish_non_exhaustive()
    }
}

impl ArtifactCache {
    /// Open the cache rooted at `root`, creating it if needed
    ///
    /// # Errors
    ///
    /// Returns an error if the directories cannot be created or if an
    /// existing `index.json` cannot be parsed.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, Error> {
        Self::open_with_events(root, None).await
    }

    /// Open the cache and report loading through `event_sender`
    ///
    /// # Errors
    ///
    /// Same as [`ArtifactCache::open`].
    pub async fn open_with_events(
        root: impl Into<PathBuf>,
        event_sender: Option<EventSender>,
    ) -> Result<Self, Error> {
        let root = root.into();
        let artifacts = root.join(ARTIFACTS_DIR);
        fs::create_dir_all(&artifacts)
            .await
            .map_err(|e| StorageError::from_io_with_path(&e, &artifacts))?;

        let cache = Self {
            root,
            entries: DashMap::new(),
            persist_lock: Mutex::new(()),
            event_sender,
        };
        cache.load_index().await?;
        Ok(cache)
    }

    async fn load_index(&self) -> Result<(), Error> {
        let path = self.index_path();
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(StorageError::from_io_with_path(&e, &path).into()),
        };

        let index: IndexFile =
            serde_json::from_str(&content).map_err(|e| StorageError::CorruptedIndex {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        for record in index.artifacts.into_values() {
            self.entries.insert(record.identity, record);
        }

        tracing::debug!(path = %path.display(), entries = self.entries.len(), "cache index loaded");
        self.emit(AppEvent::Cache(CacheEvent::IndexLoaded {
            path,
            entries: self.entries.len(),
        }));
        Ok(())
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn index_path(&self) -> PathBuf {
        self.root.join(CACHE_INDEX_FILE)
    }

    /// Directory reserved for `identity`
    #[must_use]
    pub fn slot(&self, identity: &Hash) -> PathBuf {
        self.root.join(ARTIFACTS_DIR).join(identity.to_hex())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Recorded artifact for `identity`, if its slot is still on disk
    ///
    /// Records whose slot disappeared are dropped from memory; the next
    /// persist removes them from the index.
    pub async fn lookup(&self, identity: &Hash) -> Option<ArtifactRecord> {
        let mut hit = self.entries.get(identity).map(|entry| entry.value().clone());

        if let Some(record) = &hit {
            if !fs::try_exists(&record.location).await.unwrap_or(false) {
                tracing::warn!(
                    identity = %identity.short(),
                    location = %record.location.display(),
                    "cached artifact missing on disk, dropping record"
                );
                self.entries.remove(identity);
                hit = None;
            }
        }

        self.emit(AppEvent::Cache(CacheEvent::Lookup {
            identity: identity.to_hex(),
            hit: hit.is_some(),
        }));
        hit
    }

    /// All records, ordered by package name then version
    #[must_use]
    pub fn records(&self) -> Vec<ArtifactRecord> {
        let mut records: Vec<_> = self.entries.iter().map(|e| e.value().clone()).collect();
        records.sort_by(|a, b| (&a.name, &a.version).cmp(&(&b.name, &b.version)));
        records
    }

    /// Move `staging` into the slot for `record.identity` and persist it
    ///
    /// Any previous content of the slot is replaced.
    ///
    /// # Errors
    ///
    /// Returns an error if the staging directory cannot be moved or the
    /// index cannot be written.
    pub async fn install(
        &self,
        staging: &Path,
        mut record: ArtifactRecord,
    ) -> Result<ArtifactRecord, Error> {
        let slot = self.slot(&record.identity);
        if fs::try_exists(&slot).await.unwrap_or(false) {
            fs::remove_dir_all(&slot)
                .await
                .map_err(|e| StorageError::from_io_with_path(&e, &slot))?;
        }

        move_directory(staging, &slot).await?;
        record.location = slot;

        self.entries.insert(record.identity, record.clone());
        self.persist().await?;

        self.emit(AppEvent::Cache(CacheEvent::ArtifactRecorded {
            node: record.package(),
            identity: record.identity.to_hex(),
            location: record.location.clone(),
        }));
        Ok(record)
    }

    /// Forget `identity` and delete its slot
    ///
    /// # Errors
    ///
    /// Returns an error if the slot cannot be removed or the index cannot
    /// be written.
    pub async fn remove(&self, identity: &Hash) -> Result<bool, Error> {
        let removed = self.entries.remove(identity).is_some();
        let slot = self.slot(identity);
        if fs::try_exists(&slot).await.unwrap_or(false) {
            fs::remove_dir_all(&slot)
                .await
                .map_err(|e| StorageError::from_io_with_path(&e, &slot))?;
        }
        if removed {
            self.persist().await?;
        }
        Ok(removed)
    }

    /// Write `index.json` through a temporary file and an atomic rename
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be serialized or written.
    pub async fn persist(&self) -> Result<(), Error> {
        let _guard = self.persist_lock.lock().await;

        let index = IndexFile {
            version: INDEX_FORMAT_VERSION,
            artifacts: self
                .entries
                .iter()
                .map(|entry| (entry.key().to_hex(), entry.value().clone()))
                .collect(),
        };
        let json = serde_json::to_string_pretty(&index)?;

        let path = self.index_path();
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, json)
            .await
            .map_err(|e| StorageError::from_io_with_path(&e, &temp_path))?;
        fs::rename(&temp_path, &path)
            .await
            .map_err(|e| StorageError::from_io_with_path(&e, &path))?;

        Ok(())
    }
}
