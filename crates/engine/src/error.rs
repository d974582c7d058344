// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error types.

use lo_core::{JobId, RequestId, SessionId, SessionProcessId, StateTag, TaskId};
use thiserror::Error;

/// Errors from the session process registry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// A transition was requested that the state machine forbids. The
    /// process state is left unchanged; the caller logs and fails the
    /// current task, keeping the process alive.
    #[error("illegal state change from {from} to {to}")]
    IllegalStateChange { from: StateTag, to: StateTag },

    #[error("session process not found: {0}")]
    NotFound(SessionProcessId),

    #[error("session process {0} is not paused")]
    SessionProcessNotPaused(SessionProcessId),

    #[error("a live session process already exists for session {0}")]
    SessionProcessAlreadyAlive(SessionId),

    #[error("task not found: {0}")]
    TaskNotFound(TaskId),
}

/// Errors from the lifecycle coordinator.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Launch(#[from] lo_adapters::AgentLaunchError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the permission mediator.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PermissionError {
    #[error("permission request not found: {0}")]
    NotFound(RequestId),
}

/// Errors from the scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("scheduler job not found: {0}")]
    JobNotFound(JobId),

    #[error("invalid cron expression `{expr}`: {reason}")]
    InvalidCron { expr: String, reason: String },

    #[error("invalid reserved time `{0}`")]
    InvalidReservedTime(String),

    #[error(transparent)]
    Store(#[from] lo_storage::SchedulerStoreError),
}
