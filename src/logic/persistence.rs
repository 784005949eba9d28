// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Alexander Minges

//! Mirrors a node's snapshot into its document field and a local backup cache,
//! and decides which of the two wins when a node is loaded.
//!
//! Nothing here fails loudly: unreadable data degrades to "no data" and an
//! unavailable cache degrades to a log line.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::rc::Rc;

use log::{debug, info, warn};
use serde_json::Value;
use thiserror::Error;

use crate::models::stack::{Snapshot, SnapshotError};
use crate::models::workflow::NodeId;
use crate::utils::sanitize_component;

/// Namespace for backup cache keys.
pub const CACHE_PREFIX: &str = "AdvancedLoraStacker";

/// Backup cache key of a node.
pub fn cache_key(node: NodeId) -> String {
    format!("{CACHE_PREFIX}_{node}")
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("backup cache entry {key} could not be read: {source}")]
    Read {
        key: String,
        #[source]
        source: io::Error,
    },
    #[error("backup cache entry {key} could not be written: {source}")]
    Write {
        key: String,
        #[source]
        source: io::Error,
    },
}

/// Keyed string storage that outlives a single document.
pub trait BackupCache {
    fn read(&self, key: &str) -> Result<Option<String>, CacheError>;
    fn write(&self, key: &str, value: &str) -> Result<(), CacheError>;
}

pub type SharedCache = Rc<dyn BackupCache>;

/// One JSON file per key inside a cache directory.
#[derive(Clone, Debug)]
pub struct FileBackupCache {
    dir: PathBuf,
}

impl FileBackupCache {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_component(key)))
    }
}

impl BackupCache for FileBackupCache {
    fn read(&self, key: &str) -> Result<Option<String>, CacheError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(raw) => Ok(Some(raw)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(CacheError::Read {
                key: key.to_string(),
                source,
            }),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), CacheError> {
        let to_error = |source| CacheError::Write {
            key: key.to_string(),
            source,
        };
        fs::create_dir_all(&self.dir).map_err(to_error)?;
        fs::write(self.path_for(key), value).map_err(to_error)
    }
}

/// Volatile in-process cache; entries last only as long as the value. Backs
/// `AppModel::default()`.
#[derive(Debug, Default)]
pub struct MemoryBackupCache {
    entries: RefCell<HashMap<String, String>>,
}

impl BackupCache for MemoryBackupCache {
    fn read(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), CacheError> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Held while a save runs; a second acquire fails until it is dropped.
pub struct SaveGuard<'a> {
    flag: &'a Cell<bool>,
}

impl<'a> SaveGuard<'a> {
    pub fn acquire(flag: &'a Cell<bool>) -> Option<Self> {
        if flag.replace(true) {
            None
        } else {
            Some(Self { flag })
        }
    }
}

impl Drop for SaveGuard<'_> {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}

/// Where a loaded snapshot came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadSource {
    Document,
    Cache,
    Empty,
}

#[derive(Debug)]
pub struct LoadOutcome {
    pub snapshot: Snapshot,
    pub source: LoadSource,
}

/// Save/load bridge of one node.
pub struct PersistenceBridge {
    key: String,
    cache: SharedCache,
    saving: Cell<bool>,
}

impl PersistenceBridge {
    pub fn new(node: NodeId, cache: SharedCache) -> Self {
        Self {
            key: cache_key(node),
            cache,
            saving: Cell::new(false),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Write `snapshot` into `field` and the backup cache.
    ///
    /// Returns `false` when a save is already running or serialization failed;
    /// a cache failure is logged and still counts as saved.
    pub fn save(&self, snapshot: &Snapshot, field: &mut String) -> bool {
        let Some(_guard) = SaveGuard::acquire(&self.saving) else {
            debug!("Save for {} already in progress; skipping", self.key);
            return false;
        };
        let json = match snapshot.to_json() {
            Ok(json) => json,
            Err(err) => {
                warn!("Could not serialize stack for {}: {err}", self.key);
                return false;
            }
        };
        field.clone_from(&json);
        if let Err(err) = self.cache.write(&self.key, &json) {
            warn!("Backup cache unavailable, kept document copy only: {err}");
        }
        debug!(
            "Saved {} group(s), {} LoRA(s) for {}",
            snapshot.groups.len(),
            snapshot.loras.len(),
            self.key
        );
        true
    }

    /// Resolve the snapshot for a node being loaded.
    ///
    /// `prior` are the widget values recorded at the last save and
    /// `field_index` is the position of the stack-data field among them. The
    /// recorded value is copied into `field` first; if that position does not
    /// hold a string, the first string that looks like a JSON object is used.
    /// A readable document value wins; otherwise the backup cache is tried.
    pub fn load(&self, prior: &[Value], field_index: usize, field: &mut String) -> LoadOutcome {
        let recorded = prior
            .get(field_index)
            .and_then(Value::as_str)
            .or_else(|| {
                prior
                    .iter()
                    .filter_map(Value::as_str)
                    .find(|s| s.trim_start().starts_with('{'))
            });
        if let Some(recorded) = recorded {
            *field = recorded.to_string();
        }

        match Snapshot::from_json(field) {
            Ok(snapshot) => {
                info!("Restored stack for {} from document", self.key);
                return LoadOutcome {
                    snapshot,
                    source: LoadSource::Document,
                };
            }
            Err(SnapshotError::Empty) => debug!("Document holds no stack for {}", self.key),
            Err(err) => warn!("Ignoring unreadable document stack for {}: {err}", self.key),
        }

        match self.cache.read(&self.key) {
            Ok(Some(raw)) => match Snapshot::from_json(&raw) {
                Ok(snapshot) => {
                    info!("Restored stack for {} from backup cache", self.key);
                    return LoadOutcome {
                        snapshot,
                        source: LoadSource::Cache,
                    };
                }
                Err(err) => warn!("Ignoring unreadable cached stack for {}: {err}", self.key),
            },
            Ok(None) => debug!("No cached stack for {}", self.key),
            Err(err) => warn!("Backup cache unavailable: {err}"),
        }

        LoadOutcome {
            snapshot: Snapshot::default(),
            source: LoadSource::Empty,
        }
    }
}
