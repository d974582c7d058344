// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persisted scheduler job list.
//!
//! A single JSON file `{jobs: [...]}` under the config base. Reads
//! tolerate a missing file (empty list) and a corrupt file (reset to
//! empty on disk). Mutations take a writer-exclusive file lock so the
//! read-modify-write cycle is atomic within the process group.

use fs2::FileExt;
use lo_core::{JobId, SchedulerJob};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerStoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialize error: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ConfigFile {
    jobs: Vec<SchedulerJob>,
}

/// Single-writer store for scheduler jobs.
#[derive(Clone)]
pub struct SchedulerStore {
    path: PathBuf,
}

impl SchedulerStore {
    /// Store backed by `<config_base>/scheduler.json`.
    pub fn new(config_base: impl Into<PathBuf>) -> Self {
        Self {
            path: config_base.into().join("scheduler.json"),
        }
    }

    /// Load all persisted jobs. Missing file → empty; corrupt file →
    /// reset to empty on disk.
    pub fn load(&self) -> Result<Vec<SchedulerJob>, SchedulerStoreError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str::<ConfigFile>(&content) {
            Ok(config) => Ok(config.jobs),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "scheduler config corrupt, resetting");
                self.save(&[])?;
                Ok(Vec::new())
            }
        }
    }

    /// Replace the persisted job list.
    pub fn save(&self, jobs: &[SchedulerJob]) -> Result<(), SchedulerStoreError> {
        self.with_locked_file(|file| {
            write_jobs(file, jobs)?;
            Ok(())
        })
    }

    /// Read-modify-write under the exclusive lock. The mutator returns
    /// whether anything changed; unchanged lists are not rewritten.
    pub fn update(
        &self,
        mutate: impl FnOnce(&mut Vec<SchedulerJob>) -> bool,
    ) -> Result<Vec<SchedulerJob>, SchedulerStoreError> {
        self.with_locked_file(|file| {
            let mut content = String::new();
            file.read_to_string(&mut content)?;
            let mut jobs = serde_json::from_str::<ConfigFile>(&content)
                .map(|c| c.jobs)
                .unwrap_or_default();
            if mutate(&mut jobs) {
                write_jobs(file, &jobs)?;
            }
            Ok(jobs)
        })
    }

    /// Remove one job by id; no-op when absent.
    pub fn remove(&self, id: &JobId) -> Result<(), SchedulerStoreError> {
        self.update(|jobs| {
            let before = jobs.len();
            jobs.retain(|j| &j.id != id);
            jobs.len() != before
        })?;
        Ok(())
    }

    fn with_locked_file<T>(
        &self,
        f: impl FnOnce(&mut File) -> Result<T, SchedulerStoreError>,
    ) -> Result<T, SchedulerStoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)?;
        file.lock_exclusive()?;
        let result = f(&mut file);
        let _ = fs2::FileExt::unlock(&file);
        result
    }
}

fn write_jobs(file: &mut File, jobs: &[SchedulerJob]) -> Result<(), SchedulerStoreError> {
    let json = serde_json::to_string_pretty(&ConfigFile {
        jobs: jobs.to_vec(),
    })?;
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(json.as_bytes())?;
    Ok(())
}

#[cfg(test)]
#[path = "scheduler_store_tests.rs"]
mod tests;
