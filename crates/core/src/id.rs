// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identifier types and the project-path codec.
//!
//! Project ids are derived from filesystem paths with a reversible escape
//! (see [`ProjectId::encode`]). Session ids are journal file stems; a
//! session is always addressed as a (project, session) pair. Process and
//! task ids are minted monotonically by [`SeqIdGen`].

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Define a newtype ID wrapper around `String`.
///
/// Generates `new()`, `as_str()`, `Display`, `From<String>`, `From<&str>`,
/// `PartialEq<str>`, `PartialEq<&str>`, and `Borrow<str>` implementations.
#[macro_export]
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident;
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id! {
    /// Identifier for a project: its working directory path, escaped into a
    /// single URL- and filename-safe component.
    pub struct ProjectId;
}

define_id! {
    /// Identifier for a session: the stem of its journal file.
    ///
    /// Only meaningful together with the owning [`ProjectId`]; the pair
    /// addresses exactly one journal file on disk.
    pub struct SessionId;
}

define_id! {
    /// Identifier for an agent side-channel session (`agent-<id>.jsonl`).
    pub struct AgentSessionId;
}

define_id! {
    /// Identifier for a live session process, minted monotonically at spawn.
    pub struct SessionProcessId;
}

define_id! {
    /// Identifier for one user turn within a session process.
    pub struct TaskId;
}

define_id! {
    /// Identifier for a scheduler job.
    pub struct JobId;
}

define_id! {
    /// Identifier for a pending permission request.
    pub struct RequestId;
}

/// Errors from decoding a project id back into a path.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProjectIdError {
    #[error("truncated escape sequence at end of project id")]
    TruncatedEscape,
    #[error("invalid escape sequence `_{0}` in project id")]
    InvalidEscape(char),
}

impl ProjectId {
    /// Encode a filesystem path into a project id.
    ///
    /// `/` maps to `-`; a literal `-` escapes to `_d` and a literal `_`
    /// to `_u`, so the mapping is reversible. Paths without dashes or
    /// underscores encode to the same shape the agent uses for its journal
    /// directory names (`/root/crate` → `-root-crate`).
    pub fn encode(path: &Path) -> Self {
        let mut out = String::new();
        for c in path.to_string_lossy().chars() {
            match c {
                '/' => out.push('-'),
                '-' => out.push_str("_d"),
                '_' => out.push_str("_u"),
                other => out.push(other),
            }
        }
        Self(out)
    }

    /// Decode a project id back into the path it was encoded from.
    pub fn decode(&self) -> Result<PathBuf, ProjectIdError> {
        let mut out = String::new();
        let mut chars = self.0.chars();
        while let Some(c) = chars.next() {
            match c {
                '-' => out.push('/'),
                '_' => match chars.next() {
                    Some('d') => out.push('-'),
                    Some('u') => out.push('_'),
                    Some(other) => return Err(ProjectIdError::InvalidEscape(other)),
                    None => return Err(ProjectIdError::TruncatedEscape),
                },
                other => out.push(other),
            }
        }
        Ok(PathBuf::from(out))
    }
}

impl SessionId {
    /// Derive a session id from a journal file path (the file stem).
    ///
    /// Returns `None` for paths without a usable stem.
    pub fn from_journal_path(path: &Path) -> Option<Self> {
        path.file_stem()
            .map(|s| Self(s.to_string_lossy().into_owned()))
    }
}

/// Monotonic id mint shared by the registry for process and task ids.
#[derive(Clone)]
pub struct SeqIdGen {
    prefix: &'static str,
    counter: Arc<AtomicU64>,
}

impl SeqIdGen {
    pub fn new(prefix: &'static str) -> Self {
        Self {
            prefix,
            counter: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn next(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        format!("{}-{}", self.prefix, n)
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
