// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted agent launcher for tests.
//!
//! Speaks the same protocol shape as the real launcher and, like the real
//! agent, writes the session journal itself: a `file-history-snapshot`
//! entry on session creation, then one user + one assistant entry per
//! turn. Inputs beginning with `/` are treated as local commands (user
//! entry, no assistant output, straight to result).

use super::feed::MessageSource;
use super::{AgentHandle, AgentLaunchError, AgentLauncher, AgentMessage, LaunchConfig};
use lo_core::{format_iso_utc, Clock, ProjectId, SessionId, SystemClock, UserInput};
use parking_lot::Mutex;
use serde_json::json;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

/// One launched fake agent, for assertions.
#[derive(Clone)]
pub struct RecordedLaunch {
    pub cwd: PathBuf,
    pub resume_session_id: Option<SessionId>,
    pub session_id: SessionId,
    pub inputs: Arc<Mutex<Vec<UserInput>>>,
}

struct FakeState {
    queued_session_ids: VecDeque<String>,
    reply_text: String,
    launches: Vec<RecordedLaunch>,
}

/// Test double for [`AgentLauncher`].
#[derive(Clone)]
pub struct FakeAgentLauncher {
    projects_dir: PathBuf,
    state: Arc<Mutex<FakeState>>,
    gated: bool,
    assistant_gate: Arc<Semaphore>,
    result_gate: Arc<Semaphore>,
}

impl FakeAgentLauncher {
    pub fn new(projects_dir: impl Into<PathBuf>) -> Self {
        Self {
            projects_dir: projects_dir.into(),
            state: Arc::new(Mutex::new(FakeState {
                queued_session_ids: VecDeque::new(),
                reply_text: "ok".to_string(),
                launches: Vec::new(),
            })),
            gated: false,
            assistant_gate: Arc::new(Semaphore::new(0)),
            result_gate: Arc::new(Semaphore::new(0)),
        }
    }

    /// Make each turn wait for [`release_assistant`](Self::release_assistant)
    /// and [`release_result`](Self::release_result), so tests can observe
    /// intermediate states.
    pub fn gated(mut self) -> Self {
        self.gated = true;
        self
    }

    /// Predetermine the session id of the next launch.
    pub fn queue_session_id(&self, id: impl Into<String>) {
        self.state.lock().queued_session_ids.push_back(id.into());
    }

    /// Change the canned assistant reply text.
    pub fn set_reply_text(&self, text: impl Into<String>) {
        self.state.lock().reply_text = text.into();
    }

    /// Allow the next gated turn to emit its assistant message.
    pub fn release_assistant(&self) {
        self.assistant_gate.add_permits(1);
    }

    /// Allow the next gated turn to emit its result message.
    pub fn release_result(&self) {
        self.result_gate.add_permits(1);
    }

    /// All launches so far, in order.
    pub fn launches(&self) -> Vec<RecordedLaunch> {
        self.state.lock().launches.clone()
    }

    fn mint_session_id(&self) -> SessionId {
        let queued = self.state.lock().queued_session_ids.pop_front();
        SessionId::new(queued.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()))
    }
}

#[async_trait::async_trait]
impl AgentLauncher for FakeAgentLauncher {
    async fn launch(
        &self,
        config: LaunchConfig,
        mut source: MessageSource,
    ) -> Result<AgentHandle, AgentLaunchError> {
        let session_id = self.mint_session_id();
        let inputs = Arc::new(Mutex::new(Vec::new()));
        self.state.lock().launches.push(RecordedLaunch {
            cwd: config.cwd.clone(),
            resume_session_id: config.resume_session_id.clone(),
            session_id: session_id.clone(),
            inputs: Arc::clone(&inputs),
        });

        let cancel = CancellationToken::new();
        let (message_tx, message_rx) = mpsc::channel(16);

        let journal_dir = self
            .projects_dir
            .join(ProjectId::encode(&config.cwd).as_str());
        let journal_path = journal_dir.join(format!("{session_id}.jsonl"));
        let reply_text = self.state.lock().reply_text.clone();
        let run = FakeRun {
            session_id,
            journal_dir,
            journal_path,
            reply_text,
            gated: self.gated,
            assistant_gate: Arc::clone(&self.assistant_gate),
            result_gate: Arc::clone(&self.result_gate),
        };
        let run_cancel = cancel.clone();
        tokio::spawn(async move {
            let mut first_turn = true;
            loop {
                let input = tokio::select! {
                    _ = run_cancel.cancelled() => break,
                    input = source.next() => match input {
                        Some(input) => input,
                        None => break,
                    },
                };
                inputs.lock().push(input.clone());
                if run
                    .play_turn(&message_tx, &run_cancel, &input, first_turn)
                    .await
                    .is_err()
                {
                    break;
                }
                first_turn = false;
            }
        });

        Ok(AgentHandle {
            messages: message_rx,
            cancel,
        })
    }
}

struct FakeRun {
    session_id: SessionId,
    journal_dir: PathBuf,
    journal_path: PathBuf,
    reply_text: String,
    gated: bool,
    assistant_gate: Arc<Semaphore>,
    result_gate: Arc<Semaphore>,
}

enum TurnEnded {
    Cancelled,
}

impl FakeRun {
    async fn play_turn(
        &self,
        tx: &mpsc::Sender<AgentMessage>,
        cancel: &CancellationToken,
        input: &UserInput,
        first_turn: bool,
    ) -> Result<(), TurnEnded> {
        let now = || format_iso_utc(SystemClock.epoch_ms());
        let sid = self.session_id.as_str().to_string();

        if first_turn {
            self.send(
                tx,
                cancel,
                AgentMessage::Init {
                    session_id: self.session_id.clone(),
                    raw: json!({ "type": "system", "subtype": "init", "session_id": sid }),
                },
            )
            .await?;
        }

        let local_command = input.text.starts_with('/');
        if !local_command {
            if self.gated {
                self.wait(cancel, &self.assistant_gate).await?;
            }
            let mut lines = Vec::new();
            if first_turn {
                lines.push(
                    json!({
                        "type": "file-history-snapshot",
                        "uuid": uuid::Uuid::new_v4().to_string(),
                        "sessionId": sid,
                        "timestamp": now(),
                        "isSidechain": false,
                    })
                    .to_string(),
                );
            }
            lines.push(
                json!({
                    "type": "user",
                    "uuid": uuid::Uuid::new_v4().to_string(),
                    "parentUuid": null,
                    "sessionId": sid,
                    "timestamp": now(),
                    "isSidechain": false,
                    "message": { "role": "user", "content": input.text },
                })
                .to_string(),
            );
            let assistant_raw = json!({
                "type": "assistant",
                "uuid": uuid::Uuid::new_v4().to_string(),
                "parentUuid": null,
                "sessionId": sid,
                "timestamp": now(),
                "isSidechain": false,
                "message": {
                    "role": "assistant",
                    "model": "fake-model-1",
                    "content": [{ "type": "text", "text": self.reply_text }],
                    "usage": { "input_tokens": 1000, "output_tokens": 10 },
                },
            });
            lines.push(assistant_raw.to_string());
            self.append_journal(&lines);
            self.send(
                tx,
                cancel,
                AgentMessage::Assistant {
                    raw: json!({ "type": "assistant", "session_id": sid, "message": assistant_raw["message"] }),
                },
            )
            .await?;
        }

        if self.gated {
            self.wait(cancel, &self.result_gate).await?;
        }
        self.send(
            tx,
            cancel,
            AgentMessage::Result {
                is_error: false,
                raw: json!({ "type": "result", "subtype": "success", "session_id": sid, "is_error": false }),
            },
        )
        .await?;
        Ok(())
    }

    async fn send(
        &self,
        tx: &mpsc::Sender<AgentMessage>,
        cancel: &CancellationToken,
        message: AgentMessage,
    ) -> Result<(), TurnEnded> {
        tokio::select! {
            _ = cancel.cancelled() => Err(TurnEnded::Cancelled),
            sent = tx.send(message) => sent.map_err(|_| TurnEnded::Cancelled),
        }
    }

    async fn wait(&self, cancel: &CancellationToken, gate: &Semaphore) -> Result<(), TurnEnded> {
        tokio::select! {
            _ = cancel.cancelled() => Err(TurnEnded::Cancelled),
            permit = gate.acquire() => {
                permit.map_err(|_| TurnEnded::Cancelled)?.forget();
                Ok(())
            }
        }
    }

    fn append_journal(&self, lines: &[String]) {
        let _ = std::fs::create_dir_all(&self.journal_dir);
        use std::io::Write;
        if let Ok(mut f) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.journal_path)
        {
            for line in lines {
                let _ = writeln!(f, "{line}");
            }
        }
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
