// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle coordinator.
//!
//! Starts, continues, stops, and aborts agent subprocesses, and bridges
//! each subprocess's message stream to registry transitions:
//!
//! - the message feed's resolved hook steps `pending → not_initialized`
//!   (and straight to `initialized` for continuation turns, whose session
//!   id is already known);
//! - `init` confirms the session id and installs the virtual overlay;
//! - the first `assistant` message moves to `file_created` and drops the
//!   overlay (the journal now owns those entries);
//! - `result` pauses the turn — from `initialized` directly for local
//!   command turns, which produce no assistant output.
//!
//! A per-message transition error fails the current task but keeps the
//! pump alive; the final block always completes the process, denies
//! pending permissions, and resolves outstanding promises as aborted.

use crate::error::CoordinatorError;
use crate::permissions::PermissionMediator;
use crate::registry::{SessionProcessRegistry, StartParams};
use lo_adapters::{
    message_feed, AgentHandle, AgentLauncher, AgentMessage, LaunchConfig, MessageFeed,
};
use lo_core::{
    format_iso_utc, BusEvent, Clock, ConversationEntry, EventBus, PermissionMode, ProjectId,
    SessionId, SessionProcessId, StateTag, SystemClock, TaskDef, TaskStatus, UserInput,
};
use lo_storage::{SessionRepository, VirtualConversationStore};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// Rejection value for the start promises when the task never got there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("task aborted")]
pub struct TaskAborted;

/// Handle returned by [`Coordinator::start_task`].
#[derive(Debug)]
pub struct StartedTask {
    pub process_id: SessionProcessId,
    /// Resolves with the confirmed session id when `init` arrives.
    pub session_initialized: oneshot::Receiver<Result<SessionId, TaskAborted>>,
    /// Resolves when the first assistant message lands in the journal.
    pub session_file_created: oneshot::Receiver<Result<(), TaskAborted>>,
    /// Resolves when the first turn reaches `paused` (Err carries the
    /// failure reason when it never does).
    pub turn_done: oneshot::Receiver<Result<(), String>>,
}

#[derive(Clone)]
struct LiveProcess {
    feed: MessageFeed,
    cancel: CancellationToken,
}

/// Starts and supervises session processes.
#[derive(Clone)]
pub struct Coordinator<L: AgentLauncher> {
    registry: SessionProcessRegistry,
    virtual_store: VirtualConversationStore,
    repository: SessionRepository,
    permissions: PermissionMediator,
    launcher: L,
    bus: EventBus,
    live: Arc<Mutex<HashMap<SessionProcessId, LiveProcess>>>,
}

impl<L: AgentLauncher> Coordinator<L> {
    pub fn new(
        registry: SessionProcessRegistry,
        virtual_store: VirtualConversationStore,
        repository: SessionRepository,
        permissions: PermissionMediator,
        launcher: L,
        bus: EventBus,
    ) -> Self {
        Self {
            registry,
            virtual_store,
            repository,
            permissions,
            launcher,
            bus,
            live: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn registry(&self) -> &SessionProcessRegistry {
        &self.registry
    }

    pub fn permissions(&self) -> &PermissionMediator {
        &self.permissions
    }

    pub fn repository(&self) -> &SessionRepository {
        &self.repository
    }

    /// Spawn a new agent subprocess for a fresh or resumed session.
    pub async fn start_task(
        &self,
        project_cwd: PathBuf,
        project_id: ProjectId,
        base_session_id: Option<SessionId>,
        permission_mode: PermissionMode,
        input: UserInput,
    ) -> Result<StartedTask, CoordinatorError> {
        let def = match &base_session_id {
            Some(base) => TaskDef::Resume {
                base_session_id: base.clone(),
            },
            None => TaskDef::New,
        };
        let process = self.registry.start(StartParams {
            project_id: project_id.clone(),
            project_cwd: project_cwd.clone(),
            permission_mode,
            def,
        })?;
        let process_id = process.id.clone();
        let task_id = process.tasks[0].id.clone();

        let (feed, source) = message_feed();
        {
            let registry = self.registry.clone();
            let pid = process_id.clone();
            let tid = task_id.clone();
            feed.on_message_resolved(move |input| {
                if let Err(e) = registry.to_not_initialized(&pid, input.text.clone()) {
                    tracing::error!(process_id = %pid, error = %e, "user message resolved in unexpected state");
                    let _ = registry.set_task_status(
                        &pid,
                        &tid,
                        TaskStatus::Failed,
                        Some(e.to_string()),
                    );
                }
            });
        }

        let handle = match self
            .launcher
            .launch(
                LaunchConfig {
                    cwd: project_cwd,
                    resume_session_id: base_session_id.clone(),
                    permission_mode,
                },
                source,
            )
            .await
        {
            Ok(handle) => handle,
            Err(e) => {
                self.registry
                    .to_completed(&process_id, Some(e.to_string()));
                return Err(e.into());
            }
        };
        self.live.lock().insert(
            process_id.clone(),
            LiveProcess {
                feed: feed.clone(),
                cancel: handle.cancel.clone(),
            },
        );

        let (init_tx, init_rx) = oneshot::channel();
        let (file_tx, file_rx) = oneshot::channel();
        let (done_tx, done_rx) = oneshot::channel();

        feed.set_next_message(input);

        let pump = Pump {
            registry: self.registry.clone(),
            virtual_store: self.virtual_store.clone(),
            repository: self.repository.clone(),
            permissions: self.permissions.clone(),
            bus: self.bus.clone(),
            live: Arc::clone(&self.live),
            project_id,
            process_id: process_id.clone(),
            resume_base: base_session_id,
            init_tx: Some(init_tx),
            file_tx: Some(file_tx),
            done_tx: Some(done_tx),
        };
        tokio::spawn(pump.run(handle));

        Ok(StartedTask {
            process_id,
            session_initialized: init_rx,
            session_file_created: file_rx,
            turn_done: done_rx,
        })
    }

    /// Push another user turn into a live paused process.
    pub fn continue_task(
        &self,
        process_id: &SessionProcessId,
        base_session_id: SessionId,
        input: UserInput,
    ) -> Result<(), CoordinatorError> {
        // The live handle must exist before the registry is touched, so a
        // stale process id fails cleanly into the start-task fallback.
        let live = self
            .live
            .lock()
            .get(process_id)
            .cloned()
            .ok_or_else(|| crate::error::RegistryError::NotFound(process_id.clone()))?;

        let def = TaskDef::Continue {
            session_id: base_session_id.clone(),
            base_session_id: base_session_id.clone(),
        };
        let (process, task) = self.registry.continue_process(process_id, def)?;

        // The predicted entry is visible immediately, before the agent
        // echoes it into the journal.
        self.virtual_store.append(
            process.project_id.clone(),
            base_session_id.clone(),
            user_entry(&base_session_id, &input.text, None),
        );

        // Continuation turns already know their session: step through
        // not_initialized into initialized the moment the subprocess
        // consumes the message.
        {
            let registry = self.registry.clone();
            let pid = process_id.clone();
            let tid = task.id.clone();
            let sid = base_session_id;
            live.feed.on_message_resolved(move |input| {
                let stepped = registry
                    .to_not_initialized(&pid, input.text.clone())
                    .and_then(|()| registry.to_initialized(&pid, sid.clone()));
                if let Err(e) = stepped {
                    tracing::error!(process_id = %pid, error = %e, "continuation message resolved in unexpected state");
                    let _ = registry.set_task_status(
                        &pid,
                        &tid,
                        TaskStatus::Failed,
                        Some(e.to_string()),
                    );
                }
            });
        }
        live.feed.set_next_message(input);
        Ok(())
    }

    /// Stop a process cleanly: current task completes, subprocess dies.
    /// Unknown ids are a silent no-op.
    pub fn stop_task(&self, process_id: &SessionProcessId) {
        self.finish(process_id, TaskStatus::Completed, None);
    }

    /// Abort a process: current task fails with "Task aborted".
    /// Unknown ids are a silent no-op.
    pub fn abort_task(&self, process_id: &SessionProcessId) {
        self.finish(process_id, TaskStatus::Failed, Some("Task aborted".to_string()));
    }

    fn finish(&self, process_id: &SessionProcessId, status: TaskStatus, error: Option<String>) {
        let Some(process) = self.registry.get(process_id) else {
            return;
        };
        if let Some(task) = process.current_task() {
            let _ = self
                .registry
                .set_task_status(process_id, &task.id, status, error);
        }
        if let Some(live) = self.live.lock().get(process_id) {
            live.cancel.cancel();
        }
        self.registry.to_completed(process_id, None);
        self.live.lock().remove(process_id);
    }
}

/// One subprocess's message loop and its cleanup.
struct Pump {
    registry: SessionProcessRegistry,
    virtual_store: VirtualConversationStore,
    repository: SessionRepository,
    permissions: PermissionMediator,
    bus: EventBus,
    live: Arc<Mutex<HashMap<SessionProcessId, LiveProcess>>>,
    project_id: ProjectId,
    process_id: SessionProcessId,
    resume_base: Option<SessionId>,
    init_tx: Option<oneshot::Sender<Result<SessionId, TaskAborted>>>,
    file_tx: Option<oneshot::Sender<Result<(), TaskAborted>>>,
    done_tx: Option<oneshot::Sender<Result<(), String>>>,
}

impl Pump {
    async fn run(mut self, mut handle: AgentHandle) {
        loop {
            let Some(message) = handle.messages.recv().await else {
                break;
            };
            match self.registry.state_tag(&self.process_id) {
                Some(StateTag::Completed) | None => break,
                _ => {}
            }
            match message {
                AgentMessage::Init { session_id, .. } => self.on_init(session_id),
                AgentMessage::Assistant { .. } => self.on_assistant(),
                AgentMessage::Result { is_error, raw } => self.on_result(is_error, raw),
                AgentMessage::CanUseTool { request, reply } => {
                    let Some(task_id) = self
                        .registry
                        .get(&self.process_id)
                        .and_then(|p| p.current_task().map(|t| t.id.clone()))
                    else {
                        continue;
                    };
                    self.permissions
                        .register(self.process_id.clone(), task_id, request, reply);
                }
                AgentMessage::User { .. } | AgentMessage::Other { .. } => {}
            }
        }

        // Always runs, whatever ended the stream.
        let aborted = handle.cancel.is_cancelled();
        if aborted {
            tracing::info!(process_id = %self.process_id, "agent subprocess aborted");
        }
        self.permissions.cancel_for_process(&self.process_id);
        if let Some(session_id) = self
            .registry
            .get(&self.process_id)
            .and_then(|p| p.state.session_id().cloned())
        {
            self.virtual_store.delete(&session_id);
        }
        let error = if aborted {
            None
        } else {
            Some("Agent process exited".to_string())
        };
        self.registry.to_completed(&self.process_id, error);
        self.live.lock().remove(&self.process_id);
        if let Some(tx) = self.init_tx.take() {
            let _ = tx.send(Err(TaskAborted));
        }
        if let Some(tx) = self.file_tx.take() {
            let _ = tx.send(Err(TaskAborted));
        }
        if let Some(tx) = self.done_tx.take() {
            let _ = tx.send(Err("Task aborted".to_string()));
        }
    }

    fn on_init(&mut self, session_id: SessionId) {
        let Some(process) = self.registry.get(&self.process_id) else {
            return;
        };
        // A redundant init for a session we already confirmed is noise.
        if process.state.session_id() == Some(&session_id) {
            return;
        }
        let user_text = match &process.state {
            lo_core::SessionProcessState::NotInitialized { user_text } => user_text.clone(),
            _ => String::new(),
        };
        if self.fallible(self.registry.to_initialized(&self.process_id, session_id.clone())) {
            return;
        }

        let mut entries = Vec::new();
        if let Some(base) = &self.resume_base {
            match self.repository.get_session(&self.project_id, base) {
                Ok(Some(detail)) => entries = detail.conversations,
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "failed to copy prior conversation for resume");
                }
            }
        }
        let parent_uuid = entries.iter().rev().find_map(|e| e.uuid.clone());
        entries.push(user_entry(&session_id, &user_text, parent_uuid));
        self.virtual_store
            .create(self.project_id.clone(), session_id.clone(), entries);

        self.bus.emit(&BusEvent::SessionListChanged {
            project_id: self.project_id.clone(),
        });
        self.bus.emit(&BusEvent::SessionChanged {
            project_id: self.project_id.clone(),
            session_id: session_id.clone(),
        });
        if let Some(tx) = self.init_tx.take() {
            let _ = tx.send(Ok(session_id));
        }
    }

    fn on_assistant(&mut self) {
        if self.registry.state_tag(&self.process_id) != Some(StateTag::Initialized) {
            return;
        }
        if self.fallible(self.registry.to_file_created(&self.process_id)) {
            return;
        }
        if let Some(session_id) = self.current_session() {
            self.virtual_store.delete(&session_id);
        }
        if let Some(tx) = self.file_tx.take() {
            let _ = tx.send(Ok(()));
        }
    }

    fn on_result(&mut self, is_error: bool, raw: serde_json::Value) {
        let tag = self.registry.state_tag(&self.process_id);
        let local_command = tag == Some(StateTag::Initialized);
        let task_id = self
            .registry
            .get(&self.process_id)
            .and_then(|p| p.current_task().map(|t| t.id.clone()));
        if self.fallible(self.registry.to_paused(&self.process_id, raw)) {
            return;
        }
        if let Some(session_id) = self.current_session() {
            if local_command {
                // No assistant message ever showed up, so the journal
                // never absorbed the overlay.
                self.virtual_store.delete(&session_id);
            }
            self.bus.emit(&BusEvent::SessionChanged {
                project_id: self.project_id.clone(),
                session_id,
            });
        }
        if let Some(task_id) = task_id {
            self.permissions.cancel_for_task(&task_id);
        }
        if let Some(tx) = self.done_tx.take() {
            let _ = tx.send(if is_error {
                Err("Agent reported an error".to_string())
            } else {
                Ok(())
            });
        }
    }

    fn current_session(&self) -> Option<SessionId> {
        self.registry
            .get(&self.process_id)
            .and_then(|p| p.state.session_id().cloned())
    }

    /// Log a per-message transition error and fail the current task;
    /// returns true when an error occurred. The pump keeps iterating.
    fn fallible(&self, result: Result<(), crate::error::RegistryError>) -> bool {
        let Err(e) = result else { return false };
        tracing::error!(process_id = %self.process_id, error = %e, "state transition rejected");
        if let Some(task_id) = self
            .registry
            .get(&self.process_id)
            .and_then(|p| p.current_task().map(|t| t.id.clone()))
        {
            let _ = self.registry.set_task_status(
                &self.process_id,
                &task_id,
                TaskStatus::Failed,
                Some(e.to_string()),
            );
        }
        true
    }
}

fn user_entry(session_id: &SessionId, text: &str, parent_uuid: Option<String>) -> ConversationEntry {
    ConversationEntry::user(
        session_id.as_str(),
        uuid::Uuid::new_v4().to_string(),
        parent_uuid,
        format_iso_utc(SystemClock.epoch_ms()),
        text,
    )
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
