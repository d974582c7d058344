// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session process and task state.
//!
//! A session process is one live agent subprocess bound to a session (or
//! about to create one). Its state is a tagged union with strict
//! transitions, validated by the registry:
//!
//! ```text
//! pending ──▶ not_initialized ──▶ initialized ──▶ file_created ──▶ paused
//!                                      └──────────(local command)────┘
//! paused ──▶ pending (continuation); any ──▶ completed (terminal)
//! ```

use crate::id::{ProjectId, SessionId, SessionProcessId, TaskId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;

/// Permission mode an agent subprocess runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum PermissionMode {
    #[default]
    Default,
    AcceptEdits,
    BypassPermissions,
    Plan,
}

/// What a task was asked to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum TaskDef {
    /// Start a brand-new session.
    New,
    /// Start a new session seeded from an existing one.
    Resume { base_session_id: SessionId },
    /// Continue a live paused process in place.
    Continue {
        session_id: SessionId,
        base_session_id: SessionId,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

/// One user turn within a session process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub def: TaskDef,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The tagged state of a session process.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionProcessState {
    Pending,
    NotInitialized {
        user_text: String,
    },
    Initialized {
        session_id: SessionId,
    },
    FileCreated {
        session_id: SessionId,
    },
    Paused {
        session_id: SessionId,
        result: Value,
    },
    Completed {
        session_id: Option<SessionId>,
        error: Option<String>,
    },
}

/// State tag without payload, for transition checks and error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateTag {
    Pending,
    NotInitialized,
    Initialized,
    FileCreated,
    Paused,
    Completed,
}

impl fmt::Display for StateTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StateTag::Pending => "pending",
            StateTag::NotInitialized => "not_initialized",
            StateTag::Initialized => "initialized",
            StateTag::FileCreated => "file_created",
            StateTag::Paused => "paused",
            StateTag::Completed => "completed",
        };
        write!(f, "{s}")
    }
}

impl SessionProcessState {
    pub fn tag(&self) -> StateTag {
        match self {
            SessionProcessState::Pending => StateTag::Pending,
            SessionProcessState::NotInitialized { .. } => StateTag::NotInitialized,
            SessionProcessState::Initialized { .. } => StateTag::Initialized,
            SessionProcessState::FileCreated { .. } => StateTag::FileCreated,
            SessionProcessState::Paused { .. } => StateTag::Paused,
            SessionProcessState::Completed { .. } => StateTag::Completed,
        }
    }

    /// The session id confirmed by the agent, once known.
    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            SessionProcessState::Initialized { session_id }
            | SessionProcessState::FileCreated { session_id }
            | SessionProcessState::Paused { session_id, .. } => Some(session_id),
            SessionProcessState::Completed { session_id, .. } => session_id.as_ref(),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionProcessState::Completed { .. })
    }
}

/// A live session process owned by the registry.
#[derive(Debug, Clone)]
pub struct SessionProcess {
    pub id: SessionProcessId,
    pub project_id: ProjectId,
    pub project_cwd: PathBuf,
    pub permission_mode: PermissionMode,
    pub state: SessionProcessState,
    pub tasks: Vec<Task>,
}

/// Public status of a session process, as projected to the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PublicStatus {
    Starting,
    Pending,
    Running,
    Paused,
}

/// Projection of a non-terminal session process for UI consumption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicSessionProcess {
    pub id: SessionProcessId,
    pub project_id: ProjectId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    pub status: PublicStatus,
    pub permission_mode: PermissionMode,
}

impl SessionProcess {
    /// The latest non-terminal task, when one is in flight.
    pub fn current_task(&self) -> Option<&Task> {
        self.tasks.iter().rev().find(|t| !t.status.is_terminal())
    }

    pub fn current_task_mut(&mut self) -> Option<&mut Task> {
        self.tasks.iter_mut().rev().find(|t| !t.status.is_terminal())
    }

    /// Session id exposed publicly: confirmed when known, otherwise taken
    /// from the task definition (continue keeps its session, resume shows
    /// the base session, a fresh start has none yet).
    pub fn public_session_id(&self) -> Option<SessionId> {
        if let Some(id) = self.state.session_id() {
            return Some(id.clone());
        }
        match self.tasks.last().map(|t| &t.def) {
            Some(TaskDef::Continue { session_id, .. }) => Some(session_id.clone()),
            Some(TaskDef::Resume { base_session_id }) => Some(base_session_id.clone()),
            _ => None,
        }
    }

    /// UI projection; `None` once the process is terminal.
    pub fn public(&self) -> Option<PublicSessionProcess> {
        let status = match self.state.tag() {
            StateTag::Paused => PublicStatus::Paused,
            StateTag::Initialized | StateTag::FileCreated => PublicStatus::Running,
            StateTag::Pending | StateTag::NotInitialized => {
                if self.tasks.len() > 1 {
                    PublicStatus::Pending
                } else {
                    PublicStatus::Starting
                }
            }
            StateTag::Completed => return None,
        };
        Some(PublicSessionProcess {
            id: self.id.clone(),
            project_id: self.project_id.clone(),
            session_id: self.public_session_id(),
            status,
            permission_mode: self.permission_mode,
        })
    }
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
