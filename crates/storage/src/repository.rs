// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session repository: journal reads merged with the virtual overlay.
//!
//! All UI reads go through here. On-disk entries always come first; the
//! overlay is appended, minus any entry whose uuid has already landed in
//! the journal, so a read never returns the same uuid twice. When the
//! merged view shows a summary entry referencing a leaf that appears
//! *after* it, the journal is treated as inconsistent and the overlay is
//! dropped for that read.
//!
//! Two caches back the metadata path: an in-memory per-session meta cache
//! and the persistent first-user-message cache. Both are invalidated by
//! `sessionChanged` bus events.

use crate::first_message_cache::FirstMessageCache;
use crate::journal::read_journal;
use crate::meta::{self, SessionMeta};
use crate::virtual_store::VirtualConversationStore;
use lo_core::{
    format_iso_utc, BusEvent, ConversationEntry, EventBus, ProjectId, SessionId, Subscription,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Default page size for session listings.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// A project known to the journal directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectInfo {
    pub id: ProjectId,
    pub path: String,
}

/// One session in a paged listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub meta: SessionMeta,
}

/// A page of sessions, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPage {
    pub sessions: Vec<SessionSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<SessionId>,
}

/// Full session detail: metadata plus the merged conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDetail {
    pub session_id: SessionId,
    pub meta: SessionMeta,
    pub conversations: Vec<ConversationEntry>,
}

struct RepoInner {
    projects_dir: PathBuf,
    virtual_store: VirtualConversationStore,
    first_message_cache: FirstMessageCache,
    meta_cache: Mutex<HashMap<(ProjectId, SessionId), SessionMeta>>,
    subscription: Mutex<Option<Subscription>>,
}

/// Read-side access to sessions, shared across the engine and HTTP layer.
#[derive(Clone)]
pub struct SessionRepository {
    inner: Arc<RepoInner>,
}

impl SessionRepository {
    pub fn new(
        projects_dir: impl Into<PathBuf>,
        virtual_store: VirtualConversationStore,
        cache_dir: impl Into<PathBuf>,
        bus: &EventBus,
    ) -> Self {
        let inner = Arc::new(RepoInner {
            projects_dir: projects_dir.into(),
            virtual_store,
            first_message_cache: FirstMessageCache::new(cache_dir),
            meta_cache: Mutex::new(HashMap::new()),
            subscription: Mutex::new(None),
        });

        let weak = Arc::downgrade(&inner);
        let subscription = bus.subscribe(move |event| {
            if let BusEvent::SessionChanged {
                project_id,
                session_id,
            } = event
            {
                if let Some(inner) = weak.upgrade() {
                    inner
                        .meta_cache
                        .lock()
                        .remove(&(project_id.clone(), session_id.clone()));
                    let path =
                        journal_path_in(&inner.projects_dir, project_id, session_id);
                    inner.first_message_cache.invalidate(&path);
                }
            }
        });
        *inner.subscription.lock() = Some(subscription);

        Self { inner }
    }

    /// Path of a session's journal file.
    pub fn journal_path(&self, project_id: &ProjectId, session_id: &SessionId) -> PathBuf {
        journal_path_in(&self.inner.projects_dir, project_id, session_id)
    }

    /// Last modification time of a session's journal, when it exists.
    pub fn last_modified(
        &self,
        project_id: &ProjectId,
        session_id: &SessionId,
    ) -> Option<SystemTime> {
        self.journal_path(project_id, session_id)
            .metadata()
            .ok()
            .and_then(|m| m.modified().ok())
    }

    /// All projects present in the journal directory.
    pub fn list_projects(&self) -> io::Result<Vec<ProjectInfo>> {
        let read = match std::fs::read_dir(&self.inner.projects_dir) {
            Ok(read) => read,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut projects = Vec::new();
        for entry in read.filter_map(Result::ok) {
            if !entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                continue;
            }
            let id = ProjectId::new(entry.file_name().to_string_lossy().into_owned());
            let path = id
                .decode()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|_| id.as_str().to_string());
            projects.push(ProjectInfo { id, path });
        }
        projects.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        Ok(projects)
    }

    /// Parse a session's journal, merge the overlay, and derive metadata.
    ///
    /// Returns `None` when the session has neither a journal file nor an
    /// overlay.
    pub fn get_session(
        &self,
        project_id: &ProjectId,
        session_id: &SessionId,
    ) -> io::Result<Option<SessionDetail>> {
        let path = self.journal_path(project_id, session_id);
        let disk = read_journal(&path)?;
        let overlay = self.inner.virtual_store.get_for_session(session_id);
        if disk.is_empty() && overlay.is_none() && !path.exists() {
            return Ok(None);
        }
        let conversations = merge_with_overlay(disk, overlay);
        let meta = self.meta_for(project_id, session_id, &conversations, &path)?;
        Ok(Some(SessionDetail {
            session_id: session_id.clone(),
            meta,
            conversations,
        }))
    }

    /// Paged session listing for a project, sorted by last modification
    /// descending. The cursor is the id of the last session of the
    /// previous page; an unknown cursor restarts from the top.
    pub fn get_sessions(
        &self,
        project_id: &ProjectId,
        cursor: Option<&SessionId>,
        max_count: usize,
    ) -> io::Result<SessionPage> {
        let mut listed: Vec<(SessionId, SystemTime)> = Vec::new();
        let mut on_disk: HashSet<SessionId> = HashSet::new();
        let project_dir = self.inner.projects_dir.join(project_id.as_str());
        match std::fs::read_dir(&project_dir) {
            Ok(read) => {
                for entry in read.filter_map(Result::ok) {
                    let name = entry.file_name().to_string_lossy().into_owned();
                    let Some(stem) = name.strip_suffix(".jsonl") else {
                        continue;
                    };
                    if stem.is_empty() || stem.starts_with("agent-") {
                        continue;
                    }
                    let modified = entry
                        .metadata()
                        .ok()
                        .and_then(|m| m.modified().ok())
                        .unwrap_or(UNIX_EPOCH);
                    let session_id = SessionId::new(stem);
                    on_disk.insert(session_id.clone());
                    listed.push((session_id, modified));
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }

        // Sessions that exist only as an overlay (journal not written yet)
        // surface at the top of the list.
        for (session_id, _) in self.inner.virtual_store.get_for_project(project_id) {
            if !on_disk.contains(&session_id) {
                listed.push((session_id, SystemTime::now()));
            }
        }

        listed.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.as_str().cmp(b.0.as_str())));

        let start = match cursor {
            Some(cursor) => listed
                .iter()
                .position(|(id, _)| id == cursor)
                .map(|i| i + 1)
                .unwrap_or(0),
            None => 0,
        };
        let page: Vec<(SessionId, SystemTime)> =
            listed.iter().skip(start).take(max_count).cloned().collect();
        let next_cursor = if start + page.len() < listed.len() {
            page.last().map(|(id, _)| id.clone())
        } else {
            None
        };

        let mut sessions = Vec::with_capacity(page.len());
        for (session_id, _) in page {
            if let Some(detail) = self.get_session(project_id, &session_id)? {
                sessions.push(SessionSummary {
                    session_id,
                    meta: detail.meta,
                });
            }
        }
        Ok(SessionPage {
            sessions,
            next_cursor,
        })
    }

    fn meta_for(
        &self,
        project_id: &ProjectId,
        session_id: &SessionId,
        conversations: &[ConversationEntry],
        path: &Path,
    ) -> io::Result<SessionMeta> {
        let key = (project_id.clone(), session_id.clone());
        if let Some(meta) = self.inner.meta_cache.lock().get(&key) {
            return Ok(meta.clone());
        }

        let first_user_message = match self.inner.first_message_cache.get(path) {
            Some(cached) => cached,
            None => {
                let computed = meta::first_user_message(conversations);
                self.inner.first_message_cache.put(path, computed.clone());
                computed
            }
        };

        let agent_entries = self.agent_entries_for(project_id, session_id)?;
        let cost = meta::aggregate_cost(conversations.iter().chain(agent_entries.iter()));

        let last_modified_at = path
            .metadata()
            .ok()
            .and_then(|m| m.modified().ok())
            .map(iso_from_system_time)
            .or_else(|| {
                conversations
                    .iter()
                    .rev()
                    .find_map(|e| e.timestamp.clone())
            })
            .unwrap_or_else(|| iso_from_system_time(SystemTime::now()));

        let meta = SessionMeta {
            message_count: meta::message_count(conversations),
            first_user_message,
            cost,
            current_context_usage: meta::current_context_usage(conversations),
            model_name: meta::model_name(conversations),
            last_modified_at,
        };
        self.inner.meta_cache.lock().insert(key, meta.clone());
        Ok(meta)
    }

    /// Entries of every `agent-*.jsonl` side-channel file in the project
    /// that belong to the given session.
    fn agent_entries_for(
        &self,
        project_id: &ProjectId,
        session_id: &SessionId,
    ) -> io::Result<Vec<ConversationEntry>> {
        let project_dir = self.inner.projects_dir.join(project_id.as_str());
        let read = match std::fs::read_dir(&project_dir) {
            Ok(read) => read,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut entries = Vec::new();
        for dir_entry in read.filter_map(Result::ok) {
            let name = dir_entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with("agent-") || !name.ends_with(".jsonl") {
                continue;
            }
            entries.extend(
                read_journal(&dir_entry.path())?
                    .into_iter()
                    .filter(|e| e.session_id.as_deref() == Some(session_id.as_str())),
            );
        }
        Ok(entries)
    }
}

fn journal_path_in(
    projects_dir: &Path,
    project_id: &ProjectId,
    session_id: &SessionId,
) -> PathBuf {
    projects_dir
        .join(project_id.as_str())
        .join(format!("{session_id}.jsonl"))
}

fn iso_from_system_time(time: SystemTime) -> String {
    let ms = time
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    format_iso_utc(ms)
}

/// Append overlay entries after the on-disk ones, skipping overlay
/// entries the journal already contains; drop the overlay entirely when
/// the merged view has a broken summary.
fn merge_with_overlay(
    disk: Vec<ConversationEntry>,
    overlay: Option<Vec<ConversationEntry>>,
) -> Vec<ConversationEntry> {
    let Some(overlay) = overlay else { return disk };
    let on_disk: HashSet<&str> = disk.iter().filter_map(|e| e.uuid.as_deref()).collect();
    let fresh: Vec<ConversationEntry> = overlay
        .into_iter()
        .filter(|e| e.uuid.as_deref().map(|u| !on_disk.contains(u)).unwrap_or(true))
        .collect();
    drop(on_disk);

    let mut merged = disk;
    let disk_len = merged.len();
    merged.extend(fresh);
    if has_broken_summary(&merged) {
        merged.truncate(disk_len);
    }
    merged
}

/// A summary entry referencing a leaf that appears after it marks the
/// journal as inconsistent.
fn has_broken_summary(entries: &[ConversationEntry]) -> bool {
    let index_of: HashMap<&str, usize> = entries
        .iter()
        .enumerate()
        .filter_map(|(i, e)| e.uuid.as_deref().map(|u| (u, i)))
        .collect();
    entries.iter().enumerate().any(|(i, entry)| {
        entry
            .summary_leaf_uuid()
            .and_then(|leaf| index_of.get(leaf))
            .map(|&j| j > i)
            .unwrap_or(false)
    })
}

#[cfg(test)]
#[path = "repository_tests.rs"]
mod tests;
