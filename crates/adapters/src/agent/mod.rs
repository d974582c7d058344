// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent subprocess abstraction.
//!
//! The `AgentLauncher` trait hides how an agent process is spawned and
//! spoken to. The production implementation drives the Claude Code CLI
//! over a duplex stream-json channel; tests substitute a fake that
//! scripts the protocol and writes journal files itself.
//!
//! Outbound protocol messages surface as [`AgentMessage`] values on a
//! channel; inbound user turns are pulled on demand from a
//! [`feed::MessageSource`] (the subprocess consumes a message exactly when
//! it is ready for one, which is what steps the session state machine).

pub mod feed;

mod claude;
pub use claude::ClaudeLauncher;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub mod fake;

use async_trait::async_trait;
use feed::MessageSource;
use lo_core::{PermissionMode, SessionId};
use serde_json::Value;
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

/// Errors from launching or driving an agent subprocess.
#[derive(Debug, Error)]
pub enum AgentLaunchError {
    #[error("agent executable not found (set --executable or LOOKOUT_EXECUTABLE)")]
    ExecutableNotFound,
    #[error("spawn failed: {0}")]
    SpawnFailed(String),
    #[error("version probe failed: {0}")]
    VersionProbeFailed(String),
}

/// Configuration for one agent subprocess.
#[derive(Debug, Clone)]
pub struct LaunchConfig {
    /// Working directory the agent runs in.
    pub cwd: PathBuf,
    /// Session to seed the new session from (`--resume`).
    pub resume_session_id: Option<SessionId>,
    /// Permission mode for the run.
    pub permission_mode: PermissionMode,
}

/// A tool-use approval request raised by the agent.
#[derive(Debug, Clone, PartialEq)]
pub struct PermissionRequest {
    pub tool_name: String,
    pub input: Value,
    pub suggestions: Vec<Value>,
    pub tool_use_id: Option<String>,
}

/// The decision returned to the agent's permission callback.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "behavior", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum PermissionDecision {
    Allow {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        updated_input: Option<Value>,
    },
    Deny { message: String },
}

/// A message received from the agent subprocess.
#[derive(Debug)]
pub enum AgentMessage {
    /// `system{subtype:"init"}` — the agent confirmed its session id.
    Init { session_id: SessionId, raw: Value },
    /// An assistant turn (text, thinking, tool_use blocks).
    Assistant { raw: Value },
    /// Echo of a user message.
    User { raw: Value },
    /// End of a turn.
    Result { is_error: bool, raw: Value },
    /// The agent asks whether it may run a tool; answer via `reply`.
    CanUseTool {
        request: PermissionRequest,
        reply: oneshot::Sender<PermissionDecision>,
    },
    /// Anything the core does not interpret; carried through for logging.
    Other { raw: Value },
}

/// Handle to a running agent subprocess.
pub struct AgentHandle {
    /// Outbound protocol messages, in arrival order. Closes when the
    /// subprocess exits or is aborted.
    pub messages: mpsc::Receiver<AgentMessage>,
    /// Cancelling kills the subprocess and ends the message stream.
    pub cancel: CancellationToken,
}

/// Spawns agent subprocesses.
#[async_trait]
pub trait AgentLauncher: Clone + Send + Sync + 'static {
    /// Spawn an agent. The subprocess pulls user turns from `source` on
    /// demand; its outbound messages arrive on the returned handle.
    async fn launch(
        &self,
        config: LaunchConfig,
        source: MessageSource,
    ) -> Result<AgentHandle, AgentLaunchError>;
}
