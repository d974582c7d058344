// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::permissions::PermissionMediator;
use crate::registry::SessionProcessRegistry;
use lo_adapters::FakeAgentLauncher;
use lo_core::{EventBus, PermissionMode, ProjectId, StateTag, UserInput};
use lo_storage::{SessionRepository, VirtualConversationStore};
use tempfile::TempDir;

struct Fx {
    _dir: TempDir,
    cwd: std::path::PathBuf,
    project_id: ProjectId,
    launcher: FakeAgentLauncher,
    coordinator: Coordinator<FakeAgentLauncher>,
}

fn fixture() -> Fx {
    let dir = TempDir::new().unwrap();
    let projects_dir = dir.path().join("projects");
    let cwd = dir.path().join("work");
    std::fs::create_dir_all(&projects_dir).unwrap();
    std::fs::create_dir_all(&cwd).unwrap();

    let bus = EventBus::new();
    let virtual_store = VirtualConversationStore::new();
    let repository = SessionRepository::new(
        &projects_dir,
        virtual_store.clone(),
        dir.path().join("cache"),
        &bus,
    );
    let launcher = FakeAgentLauncher::new(&projects_dir);
    let coordinator = Coordinator::new(
        SessionProcessRegistry::new(bus.clone()),
        virtual_store,
        repository,
        PermissionMediator::new(bus.clone()),
        launcher.clone(),
        bus,
    );
    Fx {
        project_id: ProjectId::encode(&cwd),
        _dir: dir,
        cwd,
        launcher,
        coordinator,
    }
}

async fn paused_process(fx: &Fx) -> lo_core::SessionProcessId {
    fx.launcher.queue_session_id("S1");
    let started = fx
        .coordinator
        .start_task(
            fx.cwd.clone(),
            fx.project_id.clone(),
            None,
            PermissionMode::Default,
            UserInput::text("hello"),
        )
        .await
        .unwrap();
    started.turn_done.await.unwrap().unwrap();
    let registry = fx.coordinator.registry();
    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    while registry.state_tag(&started.process_id) != Some(StateTag::Paused) {
        assert!(std::time::Instant::now() < deadline);
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    started.process_id
}

#[tokio::test]
async fn idle_paused_process_is_aborted() {
    let fx = fixture();
    let process_id = paused_process(&fx).await;

    // Zero threshold: any measurable idle time exceeds it.
    tokio::time::sleep(Duration::from_millis(20)).await;
    scan_once(&fx.coordinator, Duration::ZERO);

    let registry = fx.coordinator.registry();
    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    while registry.state_tag(&process_id) != Some(StateTag::Completed) {
        assert!(std::time::Instant::now() < deadline);
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let process = registry.get(&process_id).unwrap();
    assert_eq!(
        process.tasks.last().unwrap().error.as_deref(),
        Some("Task aborted")
    );
}

#[tokio::test]
async fn fresh_paused_process_survives_the_sweep() {
    let fx = fixture();
    let process_id = paused_process(&fx).await;

    scan_once(&fx.coordinator, Duration::from_secs(3600));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(
        fx.coordinator.registry().state_tag(&process_id),
        Some(StateTag::Paused)
    );
}

#[tokio::test]
async fn non_paused_processes_are_ignored() {
    let fx = fixture();
    let gated = FakeAgentLauncher::new(fx._dir.path().join("projects")).gated();
    let coordinator = Coordinator::new(
        fx.coordinator.registry().clone(),
        VirtualConversationStore::new(),
        fx.coordinator.repository().clone(),
        PermissionMediator::new(EventBus::new()),
        gated.clone(),
        EventBus::new(),
    );
    gated.queue_session_id("S2");
    let started = coordinator
        .start_task(
            fx.cwd.clone(),
            fx.project_id.clone(),
            None,
            PermissionMode::Default,
            UserInput::text("working"),
        )
        .await
        .unwrap();
    started.session_initialized.await.unwrap().unwrap();

    scan_once(&coordinator, Duration::ZERO);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_ne!(
        coordinator.registry().state_tag(&started.process_id),
        Some(StateTag::Completed)
    );
    coordinator.abort_task(&started.process_id);
}

#[tokio::test]
async fn shutdown_stops_the_daemon() {
    let fx = fixture();
    let handle = start_auto_abort(fx.coordinator.clone(), Duration::from_secs(60));
    handle.shutdown();
}
