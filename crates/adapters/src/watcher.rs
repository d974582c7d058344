// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Journal directory watcher.
//!
//! Watches the agent's projects directory recursively, classifies raw
//! change notifications into per-session (or per-agent-file) debounce
//! keys, and emits bus events on a 300 ms trailing edge: any new change
//! for a key resets its timer, and one event pair fires when the timer
//! lapses. A missing or unreadable directory is logged and leaves the
//! watcher quiescent; it does not retry.

use lo_core::{AgentSessionId, BusEvent, EventBus, ProjectId, SessionId};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Debounce key: one timer per session file or agent side-channel file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum DebounceKey {
    Session {
        project_id: ProjectId,
        session_id: SessionId,
    },
    Agent {
        project_id: ProjectId,
        agent_session_id: AgentSessionId,
    },
}

/// Handle to a running watcher; shutting down cancels pending timers
/// without firing them.
pub struct WatcherHandle {
    cancel: CancellationToken,
}

impl WatcherHandle {
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl Drop for WatcherHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Start watching the journal directory, emitting change events on `bus`.
pub fn start_watcher(projects_dir: PathBuf, bus: EventBus) -> WatcherHandle {
    let cancel = CancellationToken::new();
    let (key_tx, key_rx) = mpsc::channel(256);

    let root = projects_dir.clone();
    let watcher = create_fs_watcher(&projects_dir, key_tx, root);
    let guard = match watcher {
        Ok(w) => Some(w),
        Err(e) => {
            tracing::error!(
                dir = %projects_dir.display(),
                error = %e,
                "journal watcher failed to start; file changes will not be observed"
            );
            None
        }
    };

    tokio::spawn(debounce_loop(
        key_rx,
        bus,
        crate::env::debounce_ms(),
        cancel.clone(),
        guard,
    ));

    WatcherHandle { cancel }
}

fn create_fs_watcher(
    projects_dir: &Path,
    key_tx: mpsc::Sender<DebounceKey>,
    root: PathBuf,
) -> Result<RecommendedWatcher, notify::Error> {
    let mut watcher = notify::recommended_watcher(move |res: Result<notify::Event, _>| {
        let Ok(event) = res else { return };
        for path in event.paths {
            let Ok(rel) = path.strip_prefix(&root) else {
                continue;
            };
            if let Some(key) = classify(rel) {
                // Blocking send from notify's callback thread; the channel
                // is drained promptly by the debounce loop.
                let _ = key_tx.blocking_send(key);
            }
        }
    })?;
    watcher.watch(projects_dir, RecursiveMode::Recursive)?;
    Ok(watcher)
}

/// Map a path relative to the projects directory onto a debounce key.
///
/// Accepts only `<projectDir>/<name>.jsonl`; agent side-channel files are
/// recognized by their `agent-` prefix. Everything else is ignored.
pub(crate) fn classify(rel: &Path) -> Option<DebounceKey> {
    let mut components = rel.components();
    let project_dir = components.next()?.as_os_str().to_str()?;
    let file_name = components.next()?.as_os_str().to_str()?;
    if components.next().is_some() {
        return None;
    }
    let stem = file_name.strip_suffix(".jsonl")?;
    if stem.is_empty() {
        return None;
    }
    let project_id = ProjectId::new(project_dir);
    match stem.strip_prefix("agent-") {
        Some(agent_id) if !agent_id.is_empty() => Some(DebounceKey::Agent {
            project_id,
            agent_session_id: AgentSessionId::new(agent_id),
        }),
        _ => Some(DebounceKey::Session {
            project_id,
            session_id: SessionId::new(stem),
        }),
    }
}

pub(crate) async fn debounce_loop(
    mut key_rx: mpsc::Receiver<DebounceKey>,
    bus: EventBus,
    window: Duration,
    cancel: CancellationToken,
    _guard: Option<RecommendedWatcher>,
) {
    let mut pending: HashMap<DebounceKey, Instant> = HashMap::new();
    loop {
        let next_deadline = pending.values().min().copied();
        tokio::select! {
            _ = cancel.cancelled() => break,

            key = key_rx.recv() => match key {
                Some(key) => {
                    pending.insert(key, Instant::now() + window);
                }
                None => break,
            },

            _ = async {
                match next_deadline {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending().await,
                }
            } => {
                let now = Instant::now();
                let due: Vec<DebounceKey> = pending
                    .iter()
                    .filter(|(_, deadline)| **deadline <= now)
                    .map(|(key, _)| key.clone())
                    .collect();
                for key in due {
                    pending.remove(&key);
                    emit_for_key(&bus, key);
                }
            }
        }
    }
}

fn emit_for_key(bus: &EventBus, key: DebounceKey) {
    match key {
        DebounceKey::Session {
            project_id,
            session_id,
        } => {
            bus.emit(&BusEvent::SessionChanged {
                project_id: project_id.clone(),
                session_id,
            });
            bus.emit(&BusEvent::SessionListChanged { project_id });
        }
        DebounceKey::Agent {
            project_id,
            agent_session_id,
        } => {
            bus.emit(&BusEvent::AgentSessionChanged {
                project_id,
                agent_session_id,
            });
        }
    }
}

#[cfg(test)]
#[path = "watcher_tests.rs"]
mod tests;
