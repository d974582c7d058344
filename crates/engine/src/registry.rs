// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session process registry.
//!
//! Exclusive owner of all session process state. Operations are
//! synchronous and serialized through one internal lock, so every
//! transition is atomic for observers; each tag-changing transition emits
//! a `sessionProcessChanged` bus event carrying a snapshot of all public
//! processes plus the one that changed. Bus listeners run under that lock
//! and must never call back into the registry synchronously.
//!
//! At most one non-completed process exists per session id; violations
//! are rejected with `SessionProcessAlreadyAliveError` before any state
//! is touched.

use crate::error::RegistryError;
use lo_core::{
    BusEvent, EventBus, PermissionMode, ProjectId, PublicSessionProcess, SeqIdGen, SessionId,
    SessionProcess, SessionProcessState, SessionProcessId, StateTag, Task, TaskDef, TaskId,
    TaskStatus,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

/// Parameters for registering a new session process.
#[derive(Debug, Clone)]
pub struct StartParams {
    pub project_id: ProjectId,
    pub project_cwd: PathBuf,
    pub permission_mode: PermissionMode,
    pub def: TaskDef,
}

/// Holder of live session process state machines.
#[derive(Clone)]
pub struct SessionProcessRegistry {
    inner: Arc<Mutex<Vec<SessionProcess>>>,
    process_ids: SeqIdGen,
    task_ids: SeqIdGen,
    bus: EventBus,
}

impl SessionProcessRegistry {
    pub fn new(bus: EventBus) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Vec::new())),
            process_ids: SeqIdGen::new("proc"),
            task_ids: SeqIdGen::new("task"),
            bus,
        }
    }

    /// Register a new process in `pending` with its first task.
    pub fn start(&self, params: StartParams) -> Result<SessionProcess, RegistryError> {
        let mut inner = self.inner.lock();
        if let Some(target) = def_session(&params.def) {
            ensure_no_live_process(&inner, target)?;
        }
        let process = SessionProcess {
            id: SessionProcessId::new(self.process_ids.next()),
            project_id: params.project_id,
            project_cwd: params.project_cwd,
            permission_mode: params.permission_mode,
            state: SessionProcessState::Pending,
            tasks: vec![Task {
                id: TaskId::new(self.task_ids.next()),
                def: params.def,
                status: TaskStatus::Pending,
                error: None,
            }],
        };
        inner.push(process.clone());
        if let Some(public) = process.public() {
            emit_changed(&self.bus, &inner, public);
        }
        Ok(process)
    }

    /// Append a continuation task to a paused process and return it to
    /// `pending`.
    pub fn continue_process(
        &self,
        id: &SessionProcessId,
        def: TaskDef,
    ) -> Result<(SessionProcess, Task), RegistryError> {
        let mut inner = self.inner.lock();
        let process = find_mut(&mut inner, id)?;
        if process.state.tag() != StateTag::Paused {
            return Err(RegistryError::SessionProcessNotPaused(id.clone()));
        }
        if let Some(task) = process.current_task() {
            let session = process
                .public_session_id()
                .unwrap_or_else(|| SessionId::new(""));
            tracing::warn!(process_id = %id, task_id = %task.id, "continue refused: task in flight");
            return Err(RegistryError::SessionProcessAlreadyAlive(session));
        }
        let task = Task {
            id: TaskId::new(self.task_ids.next()),
            def,
            status: TaskStatus::Pending,
            error: None,
        };
        process.tasks.push(task.clone());
        process.state = SessionProcessState::Pending;
        let snapshot = process.clone();
        let public = process.public();
        if let Some(public) = public {
            emit_changed(&self.bus, &inner, public);
        }
        Ok((snapshot, task))
    }

    pub fn get(&self, id: &SessionProcessId) -> Option<SessionProcess> {
        self.inner.lock().iter().find(|p| &p.id == id).cloned()
    }

    pub fn list(&self) -> Vec<SessionProcess> {
        self.inner.lock().clone()
    }

    /// Current state tag of a process, when it exists.
    pub fn state_tag(&self, id: &SessionProcessId) -> Option<StateTag> {
        self.inner
            .lock()
            .iter()
            .find(|p| &p.id == id)
            .map(|p| p.state.tag())
    }

    pub fn get_task(&self, task_id: &TaskId) -> Option<(SessionProcess, Task)> {
        let inner = self.inner.lock();
        for process in inner.iter() {
            if let Some(task) = process.tasks.iter().find(|t| &t.id == task_id) {
                return Some((process.clone(), task.clone()));
            }
        }
        None
    }

    /// Projection of all non-terminal processes.
    pub fn snapshot_public(&self) -> Vec<PublicSessionProcess> {
        self.inner.lock().iter().filter_map(|p| p.public()).collect()
    }

    /// `pending → not_initialized`: the subprocess consumed the user text.
    pub fn to_not_initialized(
        &self,
        id: &SessionProcessId,
        user_text: impl Into<String>,
    ) -> Result<(), RegistryError> {
        self.transition(id, StateTag::NotInitialized, |process| {
            expect_tag(process, StateTag::Pending, StateTag::NotInitialized)?;
            process.state = SessionProcessState::NotInitialized {
                user_text: user_text.into(),
            };
            if let Some(task) = process.current_task_mut() {
                task.status = TaskStatus::Running;
            }
            Ok(())
        })
    }

    /// `not_initialized → initialized`: the agent confirmed a session id.
    pub fn to_initialized(
        &self,
        id: &SessionProcessId,
        session_id: SessionId,
    ) -> Result<(), RegistryError> {
        self.transition(id, StateTag::Initialized, |process| {
            expect_tag(process, StateTag::NotInitialized, StateTag::Initialized)?;
            process.state = SessionProcessState::Initialized { session_id };
            Ok(())
        })
    }

    /// `initialized → file_created`: first assistant message observed.
    pub fn to_file_created(&self, id: &SessionProcessId) -> Result<(), RegistryError> {
        self.transition(id, StateTag::FileCreated, |process| {
            let session_id = match &process.state {
                SessionProcessState::Initialized { session_id } => session_id.clone(),
                _ => {
                    return Err(illegal(process, StateTag::FileCreated));
                }
            };
            process.state = SessionProcessState::FileCreated { session_id };
            Ok(())
        })
    }

    /// `file_created → paused` — or `initialized → paused` for local
    /// command turns, which produce no assistant output.
    pub fn to_paused(&self, id: &SessionProcessId, result: Value) -> Result<(), RegistryError> {
        self.transition(id, StateTag::Paused, |process| {
            let session_id = match &process.state {
                SessionProcessState::FileCreated { session_id }
                | SessionProcessState::Initialized { session_id } => session_id.clone(),
                _ => return Err(illegal(process, StateTag::Paused)),
            };
            process.state = SessionProcessState::Paused { session_id, result };
            if let Some(task) = process.current_task_mut() {
                task.status = TaskStatus::Completed;
            }
            Ok(())
        })
    }

    /// Terminal transition, legal from any state. Idempotent: an unknown
    /// id or an already-completed process is a silent no-op. Any task
    /// still in flight is marked failed.
    pub fn to_completed(&self, id: &SessionProcessId, error: Option<String>) {
        let mut inner = self.inner.lock();
        let Some(process) = inner.iter_mut().find(|p| &p.id == id) else {
            return;
        };
        if process.state.is_terminal() {
            return;
        }
        // The event's `changed` field carries the last public projection,
        // while the snapshot no longer contains the process.
        let last_public = process.public();
        let session_id = process.state.session_id().cloned();
        let failure = error
            .clone()
            .unwrap_or_else(|| "Task aborted".to_string());
        for task in process.tasks.iter_mut().filter(|t| !t.status.is_terminal()) {
            task.status = TaskStatus::Failed;
            task.error = Some(failure.clone());
        }
        process.state = SessionProcessState::Completed { session_id, error };
        if let Some(public) = last_public {
            emit_changed(&self.bus, &inner, public);
        }
    }

    /// Update one task's status without touching the process tag.
    pub fn set_task_status(
        &self,
        process_id: &SessionProcessId,
        task_id: &TaskId,
        status: TaskStatus,
        error: Option<String>,
    ) -> Result<(), RegistryError> {
        let mut inner = self.inner.lock();
        let process = find_mut(&mut inner, process_id)?;
        let task = process
            .tasks
            .iter_mut()
            .find(|t| &t.id == task_id)
            .ok_or_else(|| RegistryError::TaskNotFound(task_id.clone()))?;
        task.status = status;
        task.error = error;
        Ok(())
    }

    fn transition(
        &self,
        id: &SessionProcessId,
        _to: StateTag,
        apply: impl FnOnce(&mut SessionProcess) -> Result<(), RegistryError>,
    ) -> Result<(), RegistryError> {
        let mut inner = self.inner.lock();
        let process = find_mut(&mut inner, id)?;
        apply(process)?;
        let public = process.public();
        if let Some(public) = public {
            emit_changed(&self.bus, &inner, public);
        }
        Ok(())
    }
}

fn find_mut<'a>(
    inner: &'a mut Vec<SessionProcess>,
    id: &SessionProcessId,
) -> Result<&'a mut SessionProcess, RegistryError> {
    inner
        .iter_mut()
        .find(|p| &p.id == id)
        .ok_or_else(|| RegistryError::NotFound(id.clone()))
}

fn expect_tag(
    process: &SessionProcess,
    expected: StateTag,
    to: StateTag,
) -> Result<(), RegistryError> {
    if process.state.tag() == expected {
        Ok(())
    } else {
        Err(illegal(process, to))
    }
}

fn illegal(process: &SessionProcess, to: StateTag) -> RegistryError {
    RegistryError::IllegalStateChange {
        from: process.state.tag(),
        to,
    }
}

/// The session a task definition binds to, when it names one.
fn def_session(def: &TaskDef) -> Option<&SessionId> {
    match def {
        TaskDef::New => None,
        TaskDef::Resume { base_session_id } => Some(base_session_id),
        TaskDef::Continue { session_id, .. } => Some(session_id),
    }
}

fn ensure_no_live_process(
    inner: &[SessionProcess],
    session_id: &SessionId,
) -> Result<(), RegistryError> {
    let alive = inner.iter().any(|p| {
        !p.state.is_terminal() && p.public_session_id().as_ref() == Some(session_id)
    });
    if alive {
        Err(RegistryError::SessionProcessAlreadyAlive(session_id.clone()))
    } else {
        Ok(())
    }
}

fn emit_changed(bus: &EventBus, inner: &[SessionProcess], changed: PublicSessionProcess) {
    let processes = inner.iter().filter_map(|p| p.public()).collect();
    bus.emit(&BusEvent::SessionProcessChanged { processes, changed });
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
