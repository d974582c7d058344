// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Claude Code launcher: drives the CLI over duplex stream-json.
//!
//! The subprocess runs in print mode with `--input-format stream-json
//! --output-format stream-json`; one JSON object per line in each
//! direction. Tool-use approval arrives as `control_request` frames and is
//! answered with `control_response` frames on stdin, when the installed
//! binary is new enough to speak that protocol; older binaries fall back
//! to `--permission-mode bypassPermissions`.

use super::feed::MessageSource;
use super::{
    AgentHandle, AgentLaunchError, AgentLauncher, AgentMessage, LaunchConfig, PermissionDecision,
    PermissionRequest,
};
use async_trait::async_trait;
use lo_core::{Attachment, PermissionMode, SessionId, UserInput};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

/// First CLI version that speaks the can_use_tool control protocol.
const MIN_CONTROL_PROTOCOL: (u64, u64, u64) = (1, 0, 82);

/// Launcher for the Claude Code CLI.
#[derive(Clone)]
pub struct ClaudeLauncher {
    executable: PathBuf,
    supports_can_use_tool: bool,
}

impl ClaudeLauncher {
    /// Locate the agent binary and probe its version.
    ///
    /// Discovery order: explicit override → PATH search skipping npx cache
    /// shims, preferring system prefixes.
    pub async fn discover(executable: Option<PathBuf>) -> Result<Self, AgentLaunchError> {
        let executable = match executable.or_else(crate::env::executable_override) {
            Some(path) => path,
            None => find_executable().ok_or(AgentLaunchError::ExecutableNotFound)?,
        };
        let version = probe_version(&executable).await?;
        let supports_can_use_tool = version.map(supports_control_protocol).unwrap_or(false);
        tracing::info!(
            executable = %executable.display(),
            ?version,
            supports_can_use_tool,
            "agent executable discovered"
        );
        Ok(Self {
            executable,
            supports_can_use_tool,
        })
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    pub fn supports_can_use_tool(&self) -> bool {
        self.supports_can_use_tool
    }
}

#[async_trait]
impl AgentLauncher for ClaudeLauncher {
    async fn launch(
        &self,
        config: LaunchConfig,
        source: MessageSource,
    ) -> Result<AgentHandle, AgentLaunchError> {
        let mut cmd = Command::new(&self.executable);
        cmd.arg("-p")
            .arg("--verbose")
            .arg("--input-format")
            .arg("stream-json")
            .arg("--output-format")
            .arg("stream-json");
        if let Some(session_id) = &config.resume_session_id {
            cmd.arg("--resume").arg(session_id.as_str());
        }
        let mode = if self.supports_can_use_tool {
            config.permission_mode
        } else {
            PermissionMode::BypassPermissions
        };
        cmd.arg("--permission-mode").arg(permission_mode_arg(mode));
        cmd.current_dir(&config.cwd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| AgentLaunchError::SpawnFailed(e.to_string()))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| AgentLaunchError::SpawnFailed("no stdin pipe".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AgentLaunchError::SpawnFailed("no stdout pipe".to_string()))?;
        let stderr = child.stderr.take();

        let cancel = CancellationToken::new();
        let (message_tx, message_rx) = mpsc::channel(64);
        let (control_tx, control_rx) = mpsc::channel::<String>(16);

        tokio::spawn(stdin_pump(stdin, source, control_rx, cancel.clone()));
        tokio::spawn(stdout_pump(stdout, message_tx, control_tx, cancel.clone()));
        if let Some(stderr) = stderr {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::debug!(target: "lo_adapters::agent_stderr", "{line}");
                }
            });
        }

        let supervise = cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                status = child.wait() => match status {
                    Ok(status) => tracing::info!(code = ?status.code(), "agent process exited"),
                    Err(e) => tracing::warn!(error = %e, "failed waiting for agent process"),
                },
                _ = supervise.cancelled() => {
                    if let Err(e) = child.kill().await {
                        tracing::warn!(error = %e, "failed to kill agent process");
                    }
                }
            }
        });

        Ok(AgentHandle {
            messages: message_rx,
            cancel,
        })
    }
}

/// Pump user turns and control responses into the subprocess stdin.
async fn stdin_pump(
    mut stdin: tokio::process::ChildStdin,
    mut source: MessageSource,
    mut control_rx: mpsc::Receiver<String>,
    cancel: CancellationToken,
) {
    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = control_rx.recv() => match line {
                Some(line) => line,
                None => break,
            },
            input = source.next() => match input {
                Some(input) => user_message_line(&input),
                None => break,
            },
        };
        if stdin.write_all(line.as_bytes()).await.is_err() {
            break;
        }
        if stdin.write_all(b"\n").await.is_err() || stdin.flush().await.is_err() {
            break;
        }
    }
}

/// Read protocol lines from stdout and surface them as [`AgentMessage`]s.
async fn stdout_pump(
    stdout: tokio::process::ChildStdout,
    message_tx: mpsc::Sender<AgentMessage>,
    control_tx: mpsc::Sender<String>,
    cancel: CancellationToken,
) {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => match line {
                Ok(Some(line)) => line,
                Ok(None) | Err(_) => break,
            },
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let value: Value = match serde_json::from_str(trimmed) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "unparseable agent protocol line");
                continue;
            }
        };
        match parse_protocol_line(&value) {
            ProtocolLine::Init { session_id } => {
                let _ = message_tx
                    .send(AgentMessage::Init {
                        session_id,
                        raw: value,
                    })
                    .await;
            }
            ProtocolLine::Assistant => {
                let _ = message_tx.send(AgentMessage::Assistant { raw: value }).await;
            }
            ProtocolLine::User => {
                let _ = message_tx.send(AgentMessage::User { raw: value }).await;
            }
            ProtocolLine::Result { is_error } => {
                let _ = message_tx
                    .send(AgentMessage::Result {
                        is_error,
                        raw: value,
                    })
                    .await;
            }
            ProtocolLine::CanUseTool {
                request_id,
                request,
            } => {
                let (reply_tx, reply_rx) = oneshot::channel();
                let control = control_tx.clone();
                tokio::spawn(async move {
                    // A dropped reply means the task ended; deny so the
                    // subprocess is never left waiting.
                    let decision = reply_rx.await.unwrap_or(PermissionDecision::Deny {
                        message: "Task ended".to_string(),
                    });
                    let _ = control.send(control_response_line(&request_id, &decision)).await;
                });
                let _ = message_tx
                    .send(AgentMessage::CanUseTool {
                        request,
                        reply: reply_tx,
                    })
                    .await;
            }
            ProtocolLine::UnknownControl { request_id } => {
                // Acknowledge control frames the core does not interpret.
                let ack = json!({
                    "type": "control_response",
                    "response": { "subtype": "success", "request_id": request_id, "response": {} },
                })
                .to_string();
                let _ = control_tx.send(ack).await;
            }
            ProtocolLine::Other => {
                let _ = message_tx.send(AgentMessage::Other { raw: value }).await;
            }
        }
    }
}

/// A classified protocol line.
#[derive(Debug, PartialEq)]
enum ProtocolLine {
    Init { session_id: SessionId },
    Assistant,
    User,
    Result { is_error: bool },
    CanUseTool {
        request_id: String,
        request: PermissionRequest,
    },
    UnknownControl { request_id: String },
    Other,
}

fn parse_protocol_line(value: &Value) -> ProtocolLine {
    match value.get("type").and_then(Value::as_str) {
        Some("system") => {
            let subtype = value.get("subtype").and_then(Value::as_str);
            let session_id = value.get("session_id").and_then(Value::as_str);
            match (subtype, session_id) {
                (Some("init"), Some(id)) => ProtocolLine::Init {
                    session_id: SessionId::new(id),
                },
                _ => ProtocolLine::Other,
            }
        }
        Some("assistant") => ProtocolLine::Assistant,
        Some("user") => ProtocolLine::User,
        Some("result") => ProtocolLine::Result {
            is_error: value
                .get("is_error")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        },
        Some("control_request") => {
            let request_id = value
                .get("request_id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let request = value.get("request");
            match request.and_then(|r| r.get("subtype")).and_then(Value::as_str) {
                Some("can_use_tool") => {
                    let request = request.unwrap_or(&Value::Null);
                    ProtocolLine::CanUseTool {
                        request_id,
                        request: PermissionRequest {
                            tool_name: request
                                .get("tool_name")
                                .and_then(Value::as_str)
                                .unwrap_or_default()
                                .to_string(),
                            input: request.get("input").cloned().unwrap_or(Value::Null),
                            suggestions: request
                                .get("permission_suggestions")
                                .and_then(Value::as_array)
                                .cloned()
                                .unwrap_or_default(),
                            tool_use_id: request
                                .get("tool_use_id")
                                .and_then(Value::as_str)
                                .map(String::from),
                        },
                    }
                }
                _ => ProtocolLine::UnknownControl { request_id },
            }
        }
        _ => ProtocolLine::Other,
    }
}

/// Encode one user turn as a stream-json input line.
fn user_message_line(input: &UserInput) -> String {
    let mut content = vec![json!({ "type": "text", "text": input.text })];
    content.extend(input.images.iter().map(|a| attachment_block("image", a)));
    content.extend(input.documents.iter().map(|a| attachment_block("document", a)));
    json!({
        "type": "user",
        "message": { "role": "user", "content": content },
    })
    .to_string()
}

fn attachment_block(kind: &str, attachment: &Attachment) -> Value {
    json!({
        "type": kind,
        "source": {
            "type": "base64",
            "media_type": attachment.media_type,
            "data": attachment.data,
        },
    })
}

/// Encode a permission decision as a control_response line.
fn control_response_line(request_id: &str, decision: &PermissionDecision) -> String {
    json!({
        "type": "control_response",
        "response": {
            "subtype": "success",
            "request_id": request_id,
            "response": decision,
        },
    })
    .to_string()
}

fn permission_mode_arg(mode: PermissionMode) -> &'static str {
    match mode {
        PermissionMode::Default => "default",
        PermissionMode::AcceptEdits => "acceptEdits",
        PermissionMode::BypassPermissions => "bypassPermissions",
        PermissionMode::Plan => "plan",
    }
}

/// PATH search for the agent binary, skipping npx cache shims and
/// preferring system prefixes.
fn find_executable() -> Option<PathBuf> {
    let mut candidates: Vec<PathBuf> = which::which_all("claude")
        .map(|found| found.filter(|p| !is_npx_shim(p)).collect())
        .unwrap_or_default();
    candidates.sort_by_key(|p| if is_system_path(p) { 0 } else { 1 });
    candidates.into_iter().next()
}

fn is_npx_shim(path: &Path) -> bool {
    let s = path.to_string_lossy();
    s.contains("_npx") && s.contains("/.bin/")
}

fn is_system_path(path: &Path) -> bool {
    ["/usr/bin", "/usr/local/bin", "/opt/homebrew/bin"]
        .iter()
        .any(|prefix| path.starts_with(prefix))
}

/// Run `<bin> --version` and parse a semver triple from its output.
async fn probe_version(executable: &Path) -> Result<Option<(u64, u64, u64)>, AgentLaunchError> {
    let output = Command::new(executable)
        .arg("--version")
        .output()
        .await
        .map_err(|e| AgentLaunchError::VersionProbeFailed(e.to_string()))?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(parse_version(&stdout))
}

fn parse_version(output: &str) -> Option<(u64, u64, u64)> {
    let first = output.split_whitespace().next()?;
    let mut parts = first.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    let patch: u64 = parts
        .next()
        .map(|p| {
            p.chars()
                .take_while(|c| c.is_ascii_digit())
                .collect::<String>()
        })
        .and_then(|p| p.parse().ok())?;
    Some((major, minor, patch))
}

fn supports_control_protocol(version: (u64, u64, u64)) -> bool {
    version >= MIN_CONTROL_PROTOCOL
}

#[cfg(test)]
#[path = "claude_tests.rs"]
mod tests;
