// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Auto-abort daemon.
//!
//! Every five minutes, paused processes whose session file has been idle
//! longer than the configured threshold are aborted. A failure for one
//! process is logged and never stops the sweep.

use crate::coordinator::Coordinator;
use lo_adapters::AgentLauncher;
use lo_core::SessionProcessState;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Sweep cadence.
const SCAN_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Handle to the running daemon; shutting down stops future sweeps.
pub struct AutoAbortHandle {
    cancel: CancellationToken,
}

impl AutoAbortHandle {
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl Drop for AutoAbortHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Start the periodic sweep over paused processes.
pub fn start_auto_abort<L: AgentLauncher>(
    coordinator: Coordinator<L>,
    idle_threshold: Duration,
) -> AutoAbortHandle {
    let cancel = CancellationToken::new();
    let task_cancel = cancel.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SCAN_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately; skip it so a fresh start
        // does not sweep sessions the user paused moments ago elsewhere.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = task_cancel.cancelled() => return,
                _ = ticker.tick() => scan_once(&coordinator, idle_threshold),
            }
        }
    });
    AutoAbortHandle { cancel }
}

/// One sweep: abort every paused process idle past the threshold.
pub(crate) fn scan_once<L: AgentLauncher>(coordinator: &Coordinator<L>, idle_threshold: Duration) {
    for process in coordinator.registry().list() {
        let SessionProcessState::Paused { ref session_id, .. } = process.state else {
            continue;
        };
        let idle = coordinator
            .repository()
            .last_modified(&process.project_id, session_id)
            .and_then(|mtime| mtime.elapsed().ok());
        match idle {
            Some(idle) if idle > idle_threshold => {
                tracing::info!(
                    process_id = %process.id,
                    %session_id,
                    idle_secs = idle.as_secs(),
                    "aborting idle paused session process"
                );
                coordinator.abort_task(&process.id);
            }
            Some(_) => {}
            None => {
                tracing::warn!(
                    process_id = %process.id,
                    %session_id,
                    "paused process has no readable session file; skipping"
                );
            }
        }
    }
}

#[cfg(test)]
#[path = "auto_abort_tests.rs"]
mod tests;
