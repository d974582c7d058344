// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bus event types.
//!
//! Serializes with `{"type": "sessionChanged", ...fields}` format; the tag
//! doubles as the SSE event name.

use crate::id::{AgentSessionId, JobId, ProjectId, RequestId, SessionId, SessionProcessId, TaskId};
use crate::process::PublicSessionProcess;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Events published on the in-process bus and fanned out to SSE clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum BusEvent {
    /// A project's session list changed (file added/removed/touched).
    SessionListChanged { project_id: ProjectId },

    /// A single session's journal changed.
    SessionChanged {
        project_id: ProjectId,
        session_id: SessionId,
    },

    /// An agent side-channel file changed.
    AgentSessionChanged {
        project_id: ProjectId,
        agent_session_id: AgentSessionId,
    },

    /// A session process transitioned. Carries a snapshot of all public
    /// processes plus the one that changed.
    SessionProcessChanged {
        processes: Vec<PublicSessionProcess>,
        changed: PublicSessionProcess,
    },

    /// The persisted scheduler job list changed.
    SchedulerJobsChanged {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        deleted_job_id: Option<JobId>,
    },

    /// An agent subprocess is waiting for a tool-use decision.
    PermissionRequested {
        process_id: SessionProcessId,
        task_id: TaskId,
        request_id: RequestId,
        tool_name: String,
        input: Value,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        suggestions: Vec<Value>,
    },

    /// Keep-alive, emitted every 10 s.
    Heartbeat {},
}

/// The named channels of the bus, used for SSE subscription filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    SessionListChanged,
    SessionChanged,
    AgentSessionChanged,
    SessionProcessChanged,
    SchedulerJobsChanged,
    PermissionRequested,
    Heartbeat,
}

impl Channel {
    pub const ALL: [Channel; 7] = [
        Channel::SessionListChanged,
        Channel::SessionChanged,
        Channel::AgentSessionChanged,
        Channel::SessionProcessChanged,
        Channel::SchedulerJobsChanged,
        Channel::PermissionRequested,
        Channel::Heartbeat,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Channel::SessionListChanged => "sessionListChanged",
            Channel::SessionChanged => "sessionChanged",
            Channel::AgentSessionChanged => "agentSessionChanged",
            Channel::SessionProcessChanged => "sessionProcessChanged",
            Channel::SchedulerJobsChanged => "schedulerJobsChanged",
            Channel::PermissionRequested => "permissionRequested",
            Channel::Heartbeat => "heartbeat",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Channel {
    type Err = UnknownChannel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Channel::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| UnknownChannel(s.to_string()))
    }
}

/// Error for an unrecognized channel name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown bus channel: {0}")]
pub struct UnknownChannel(pub String);

impl BusEvent {
    /// The channel this event is delivered on.
    pub fn channel(&self) -> Channel {
        match self {
            BusEvent::SessionListChanged { .. } => Channel::SessionListChanged,
            BusEvent::SessionChanged { .. } => Channel::SessionChanged,
            BusEvent::AgentSessionChanged { .. } => Channel::AgentSessionChanged,
            BusEvent::SessionProcessChanged { .. } => Channel::SessionProcessChanged,
            BusEvent::SchedulerJobsChanged { .. } => Channel::SchedulerJobsChanged,
            BusEvent::PermissionRequested { .. } => Channel::PermissionRequested,
            BusEvent::Heartbeat {} => Channel::Heartbeat,
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
