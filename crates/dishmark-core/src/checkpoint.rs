//! Persisted set of fully processed parent keys.
//!
//! On disk this is a JSON array of strings in insertion order. The whole
//! array is rewritten on every update instead of appended to, so an
//! interrupted write can only leave the previous complete version.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::AppError;
use crate::persist;

/// In-memory checkpoint bound to its file.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
    keys: Vec<String>,
    index: HashSet<String>,
}

impl CheckpointStore {
    /// Load keys from `path`.
    ///
    /// A missing file starts an empty set. So does an unreadable or
    /// malformed one: the run starts fresh with a warning instead of failing.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let keys = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<Vec<String>>(&raw) {
                Ok(keys) => keys,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Corrupt checkpoint, starting fresh");
                    Vec::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Unreadable checkpoint, starting fresh");
                Vec::new()
            }
        };

        let mut store = Self {
            path,
            keys: Vec::with_capacity(keys.len()),
            index: HashSet::with_capacity(keys.len()),
        };
        for key in keys {
            if store.index.insert(key.clone()) {
                store.keys.push(key);
            }
        }
        store
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_processed(&self, key: &str) -> bool {
        self.index.contains(key)
    }

    /// Record `key` as done and rewrite the checkpoint file.
    ///
    /// Returns `Ok(false)` without touching the file if the key was already
    /// present. On a write error the key is rolled back from memory so the
    /// in-memory set never claims more than the file holds.
    pub fn mark_processed(&mut self, key: &str) -> Result<bool, AppError> {
        if !self.index.insert(key.to_string()) {
            return Ok(false);
        }
        self.keys.push(key.to_string());

        if let Err(e) = persist::write_json_atomic(&self.path, &self.keys) {
            self.keys.pop();
            self.index.remove(key);
            return Err(e);
        }
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }
}
