// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Permission mediator.
//!
//! When the agent asks "may I run this tool?", the request is parked here
//! with its reply channel, a `permissionRequested` bus event is emitted
//! for the UI, and the answer arrives later through `respond`. Multiple
//! requests may be pending per task; whatever is still pending when the
//! task ends is denied with "Task ended".

use lo_adapters::{PermissionDecision, PermissionRequest};
use lo_core::{BusEvent, EventBus, RequestId, SessionProcessId, TaskId};
use crate::error::PermissionError;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::oneshot;

/// A pending request as projected for listings.
#[derive(Debug, Clone)]
pub struct PendingPermission {
    pub request_id: RequestId,
    pub process_id: SessionProcessId,
    pub task_id: TaskId,
    pub tool_name: String,
    pub input: serde_json::Value,
    pub suggestions: Vec<serde_json::Value>,
}

struct Pending {
    process_id: SessionProcessId,
    task_id: TaskId,
    request: PermissionRequest,
    reply: oneshot::Sender<PermissionDecision>,
}

/// Relay between agent tool-use callbacks and the HTTP layer.
#[derive(Clone)]
pub struct PermissionMediator {
    inner: Arc<Mutex<HashMap<RequestId, Pending>>>,
    bus: EventBus,
}

impl PermissionMediator {
    pub fn new(bus: EventBus) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            bus,
        }
    }

    /// Park a request and announce it on the bus.
    pub fn register(
        &self,
        process_id: SessionProcessId,
        task_id: TaskId,
        request: PermissionRequest,
        reply: oneshot::Sender<PermissionDecision>,
    ) -> RequestId {
        let request_id = RequestId::new(uuid::Uuid::new_v4().to_string());
        let event = BusEvent::PermissionRequested {
            process_id: process_id.clone(),
            task_id: task_id.clone(),
            request_id: request_id.clone(),
            tool_name: request.tool_name.clone(),
            input: request.input.clone(),
            suggestions: request.suggestions.clone(),
        };
        self.inner.lock().insert(
            request_id.clone(),
            Pending {
                process_id,
                task_id,
                request,
                reply,
            },
        );
        self.bus.emit(&event);
        request_id
    }

    /// Resolve a pending request with the user's decision.
    pub fn respond(
        &self,
        request_id: &RequestId,
        decision: PermissionDecision,
    ) -> Result<(), PermissionError> {
        let pending = self
            .inner
            .lock()
            .remove(request_id)
            .ok_or_else(|| PermissionError::NotFound(request_id.clone()))?;
        // The agent may have gone away while the user was deciding; a
        // closed reply channel is not an error for the HTTP caller.
        let _ = pending.reply.send(decision);
        Ok(())
    }

    /// Deny every request still pending for a task.
    pub fn cancel_for_task(&self, task_id: &TaskId) {
        self.cancel_where(|p| &p.task_id == task_id);
    }

    /// Deny every request still pending for a process.
    pub fn cancel_for_process(&self, process_id: &SessionProcessId) {
        self.cancel_where(|p| &p.process_id == process_id);
    }

    /// All pending requests, for listings.
    pub fn pending(&self) -> Vec<PendingPermission> {
        self.inner
            .lock()
            .iter()
            .map(|(request_id, p)| PendingPermission {
                request_id: request_id.clone(),
                process_id: p.process_id.clone(),
                task_id: p.task_id.clone(),
                tool_name: p.request.tool_name.clone(),
                input: p.request.input.clone(),
                suggestions: p.request.suggestions.clone(),
            })
            .collect()
    }

    fn cancel_where(&self, matches: impl Fn(&Pending) -> bool) {
        let cancelled: Vec<Pending> = {
            let mut inner = self.inner.lock();
            let ids: Vec<RequestId> = inner
                .iter()
                .filter(|(_, p)| matches(p))
                .map(|(id, _)| id.clone())
                .collect();
            ids.into_iter().filter_map(|id| inner.remove(&id)).collect()
        };
        for pending in cancelled {
            tracing::info!(
                task_id = %pending.task_id,
                tool_name = %pending.request.tool_name,
                "denying pending permission request: task ended"
            );
            let _ = pending.reply.send(PermissionDecision::Deny {
                message: "Task ended".to_string(),
            });
        }
    }
}

#[cfg(test)]
#[path = "permissions_tests.rs"]
mod tests;
