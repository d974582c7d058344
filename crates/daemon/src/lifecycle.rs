// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: startup wiring and graceful shutdown.
//!
//! Startup order: clock → bus → virtual store → repository → registry →
//! coordinator (with permission mediator) → watcher → scheduler →
//! auto-abort → heartbeat. Shutdown walks the same list in reverse; every
//! step is idempotent.

use crate::listener::{self, AppState};
use lo_adapters::{start_watcher, AgentLauncher, WatcherHandle};
use lo_core::{BusEvent, EventBus, SystemClock, UserConfig};
use lo_engine::{
    start_auto_abort, AutoAbortHandle, Coordinator, PermissionMediator, Scheduler, SchedulerError,
    SessionProcessRegistry,
};
use lo_storage::{SchedulerStore, SessionRepository, VirtualConversationStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Bus heartbeat cadence.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

/// Daemon configuration, resolved from flags and environment by main.
#[derive(Debug, Clone)]
pub struct Config {
    /// The agent's journal directory (`<claude_dir>/projects`).
    pub projects_dir: PathBuf,
    /// Base directory for the daemon's own state (scheduler config,
    /// caches, logs).
    pub state_dir: PathBuf,
    pub user_config: UserConfig,
    pub password: Option<String>,
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A running daemon's components, in startup order.
pub struct Daemon<L: AgentLauncher> {
    config: Config,
    bus: EventBus,
    repository: SessionRepository,
    coordinator: Coordinator<L>,
    scheduler: Scheduler<L>,
    watcher: Option<WatcherHandle>,
    auto_abort: Option<AutoAbortHandle>,
    heartbeat: CancellationToken,
}

/// Wire all components and start the background workers.
pub async fn startup<L: AgentLauncher>(
    config: Config,
    launcher: L,
) -> Result<Daemon<L>, StartupError> {
    std::fs::create_dir_all(&config.state_dir)?;

    let bus = EventBus::new();
    let virtual_store = VirtualConversationStore::new();
    let repository = SessionRepository::new(
        &config.projects_dir,
        virtual_store.clone(),
        config.state_dir.join("first-user-message-cache"),
        &bus,
    );
    let registry = SessionProcessRegistry::new(bus.clone());
    let permissions = PermissionMediator::new(bus.clone());
    let coordinator = Coordinator::new(
        registry,
        virtual_store,
        repository.clone(),
        permissions,
        launcher,
        bus.clone(),
    );

    let watcher = start_watcher(config.projects_dir.clone(), bus.clone());

    let scheduler = Scheduler::new(
        SchedulerStore::new(&config.state_dir),
        coordinator.clone(),
        bus.clone(),
        config.user_config,
        SystemClock,
    );
    scheduler.start()?;

    let auto_abort = start_auto_abort(
        coordinator.clone(),
        Duration::from_secs(config.user_config.auto_abort_minutes * 60),
    );

    let heartbeat = CancellationToken::new();
    {
        let bus = bus.clone();
        let cancel = heartbeat.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(HEARTBEAT_INTERVAL);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = ticker.tick() => bus.emit(&BusEvent::Heartbeat {}),
                }
            }
        });
    }

    tracing::info!(
        projects_dir = %config.projects_dir.display(),
        state_dir = %config.state_dir.display(),
        "daemon started"
    );

    Ok(Daemon {
        config,
        bus,
        repository,
        coordinator,
        scheduler,
        watcher: Some(watcher),
        auto_abort: Some(auto_abort),
        heartbeat,
    })
}

impl<L: AgentLauncher> Daemon<L> {
    /// Build the HTTP router over this daemon's components.
    pub fn router(&self) -> axum::Router {
        listener::router(Arc::new(AppState {
            coordinator: self.coordinator.clone(),
            scheduler: self.scheduler.clone(),
            repository: self.repository.clone(),
            bus: self.bus.clone(),
            user_config: self.config.user_config,
            password: self.config.password.clone(),
        }))
    }

    pub fn coordinator(&self) -> &Coordinator<L> {
        &self.coordinator
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Stop background workers and live subprocesses, reverse of startup.
    /// Safe to call more than once.
    pub fn shutdown(&mut self) {
        tracing::info!("shutting down daemon");
        self.heartbeat.cancel();
        if let Some(auto_abort) = self.auto_abort.take() {
            auto_abort.shutdown();
        }
        self.scheduler.shutdown();
        if let Some(watcher) = self.watcher.take() {
            watcher.shutdown();
        }
        for process in self.coordinator.registry().list() {
            if !process.state.is_terminal() {
                self.coordinator.stop_task(&process.id);
            }
        }
        tracing::info!("daemon shutdown complete");
    }
}

impl<L: AgentLauncher> Drop for Daemon<L> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
