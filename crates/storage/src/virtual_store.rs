// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Virtual conversation store.
//!
//! Holds predicted conversation entries per session — what the user just
//! typed and what was copied forward on resume — until the agent's journal
//! catches up. Purely in-memory; the lifecycle coordinator creates an
//! overlay when a turn starts and deletes it once the journal has received
//! the corresponding entries.

use lo_core::{ConversationEntry, ProjectId, SessionId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone)]
struct Overlay {
    project_id: ProjectId,
    entries: Vec<ConversationEntry>,
}

/// In-memory map of session id → predicted entries not yet on disk.
#[derive(Clone, Default)]
pub struct VirtualConversationStore {
    inner: Arc<Mutex<HashMap<SessionId, Overlay>>>,
}

impl VirtualConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install (or replace) the overlay for a session.
    pub fn create(
        &self,
        project_id: ProjectId,
        session_id: SessionId,
        entries: Vec<ConversationEntry>,
    ) {
        self.inner
            .lock()
            .insert(session_id, Overlay { project_id, entries });
    }

    /// Append an entry to an existing overlay, creating one if absent.
    pub fn append(
        &self,
        project_id: ProjectId,
        session_id: SessionId,
        entry: ConversationEntry,
    ) {
        let mut inner = self.inner.lock();
        inner
            .entry(session_id)
            .or_insert_with(|| Overlay {
                project_id,
                entries: Vec::new(),
            })
            .entries
            .push(entry);
    }

    pub fn get_for_session(&self, session_id: &SessionId) -> Option<Vec<ConversationEntry>> {
        self.inner
            .lock()
            .get(session_id)
            .map(|o| o.entries.clone())
    }

    /// All overlays belonging to a project, in no particular order.
    pub fn get_for_project(&self, project_id: &ProjectId) -> Vec<(SessionId, Vec<ConversationEntry>)> {
        self.inner
            .lock()
            .iter()
            .filter(|(_, o)| &o.project_id == project_id)
            .map(|(id, o)| (id.clone(), o.entries.clone()))
            .collect()
    }

    pub fn delete(&self, session_id: &SessionId) {
        self.inner.lock().remove(session_id);
    }
}

#[cfg(test)]
#[path = "virtual_store_tests.rs"]
mod tests;
