// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduler job model.
//!
//! Jobs are persisted as JSON in the scheduler config file. A schedule is
//! one of: a recurring cron expression, a one-shot reserved time, or a
//! "queued" message that fires when its target session pauses.

use crate::id::{JobId, ProjectId, SessionId};
use crate::input::Attachment;
use serde::{Deserialize, Serialize};

/// What to do when a cron fire overlaps a still-running previous fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum ConcurrencyPolicy {
    /// Drop the new fire while the previous one is still executing.
    #[default]
    Skip,
    /// Fire unconditionally; overlapping runs are allowed.
    Run,
}

/// Outcome of the most recent run of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RunStatus {
    Success,
    Failed,
}

/// When a job fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Schedule {
    /// Recurring, driven by a cron expression.
    Cron {
        expr: String,
        #[serde(default)]
        concurrency_policy: ConcurrencyPolicy,
    },
    /// One-shot at a fixed wall-clock time.
    Reserved { at_iso: String },
    /// Fires when the target session's process transitions into `paused`.
    Queued { target_session_id: SessionId },
}

/// The message a job delivers when it fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobMessage {
    pub content: String,
    pub project_id: ProjectId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_session_id: Option<SessionId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub documents: Vec<Attachment>,
}

/// A persisted scheduler job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerJob {
    pub id: JobId,
    pub name: String,
    pub schedule: Schedule,
    pub message: JobMessage,
    pub enabled: bool,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_status: Option<RunStatus>,
}

impl SchedulerJob {
    pub fn is_queued(&self) -> bool {
        matches!(self.schedule, Schedule::Queued { .. })
    }

    /// Whether a queued job targets the given session.
    pub fn targets_session(&self, session_id: &SessionId) -> bool {
        matches!(&self.schedule, Schedule::Queued { target_session_id } if target_session_id == session_id)
    }

    /// Whether the batch message carries any attachments.
    pub fn has_attachments(&self) -> bool {
        !self.message.images.is_empty() || !self.message.documents.is_empty()
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
