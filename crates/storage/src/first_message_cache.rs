// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistent first-user-message cache.
//!
//! Keyed by journal path, one small JSON file per journal under the cache
//! directory. Entries are invalidated (removed) when the repository sees a
//! `sessionChanged` event for the journal; corrupt or missing cache files
//! simply mean a recompute.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CacheEntry {
    journal_path: String,
    first_user_message: Option<String>,
}

/// On-disk key-value cache of first user messages by journal path.
#[derive(Clone)]
pub struct FirstMessageCache {
    dir: PathBuf,
}

impl FirstMessageCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn entry_path(&self, journal_path: &Path) -> PathBuf {
        let digest = Sha256::digest(journal_path.to_string_lossy().as_bytes());
        self.dir.join(format!("{digest:x}.json"))
    }

    /// Cached value for a journal, when present and readable.
    ///
    /// The outer `Option` is a cache miss; the inner one is a cached
    /// "this journal has no first user message".
    pub fn get(&self, journal_path: &Path) -> Option<Option<String>> {
        let content = std::fs::read_to_string(self.entry_path(journal_path)).ok()?;
        let entry: CacheEntry = serde_json::from_str(&content).ok()?;
        Some(entry.first_user_message)
    }

    pub fn put(&self, journal_path: &Path, first_user_message: Option<String>) {
        if std::fs::create_dir_all(&self.dir).is_err() {
            return;
        }
        let entry = CacheEntry {
            journal_path: journal_path.to_string_lossy().into_owned(),
            first_user_message,
        };
        if let Ok(json) = serde_json::to_string(&entry) {
            if let Err(e) = std::fs::write(self.entry_path(journal_path), json) {
                tracing::debug!(error = %e, "failed to write first-message cache entry");
            }
        }
    }

    pub fn invalidate(&self, journal_path: &Path) {
        let _ = std::fs::remove_file(self.entry_path(journal_path));
    }
}

#[cfg(test)]
#[path = "first_message_cache_tests.rs"]
mod tests;
