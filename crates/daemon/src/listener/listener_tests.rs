// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use lo_adapters::FakeAgentLauncher;
use lo_core::{ProjectId, SystemClock};
use lo_engine::PermissionMediator;
use lo_storage::{SchedulerStore, VirtualConversationStore};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

struct Fx {
    _dir: TempDir,
    pid: String,
    launcher: FakeAgentLauncher,
    app: Router,
}

fn fixture_with_password(password: Option<String>) -> Fx {
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
        lo_engine::SessionProcessRegistry::new(bus.clone()),
        virtual_store,
        repository.clone(),
        PermissionMediator::new(bus.clone()),
        launcher.clone(),
        bus.clone(),
    );
    let scheduler = Scheduler::new(
        SchedulerStore::new(dir.path().join("config")),
        coordinator.clone(),
        bus.clone(),
        UserConfig::default(),
        SystemClock,
    );
    let app = router(Arc::new(AppState {
        coordinator,
        scheduler,
        repository,
        bus,
        user_config: UserConfig::default(),
        password,
    }));

    Fx {
        pid: ProjectId::encode(&cwd).as_str().to_string(),
        _dir: dir,
        launcher,
        app,
    }
}

fn fixture() -> Fx {
    fixture_with_password(None)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = match body {
        Some(body) => Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

#[tokio::test]
async fn projects_list_starts_empty_then_shows_sessions() {
    let fx = fixture();
    let (status, body) = send(&fx.app, Method::GET, "/api/projects", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["projects"], json!([]));

    fx.launcher.queue_session_id("S1");
    let (status, body) = send(
        &fx.app,
        Method::POST,
        &format!("/api/projects/{}/sessions", fx.pid),
        Some(json!({ "input": { "text": "hello" } })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["sessionProcess"]["sessionId"], "S1");
    assert_eq!(body["sessionProcess"]["projectId"], fx.pid);

    let (status, body) = send(
        &fx.app,
        Method::GET,
        &format!("/api/projects/{}", fx.pid),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sessions"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn session_detail_is_404_when_unknown() {
    let fx = fixture();
    let (status, _) = send(
        &fx.app,
        Method::GET,
        &format!("/api/projects/{}/sessions/nope", fx.pid),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn continue_falls_back_to_start_when_process_is_gone() {
    let fx = fixture();
    fx.launcher.queue_session_id("FRESH");
    let (status, body) = send(
        &fx.app,
        Method::POST,
        &format!("/api/projects/{}/sessions/OLD/continue", fx.pid),
        Some(json!({
            "input": { "text": "pick this back up" },
            "sessionProcessId": "proc-from-before-restart",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "fallback path returns 201");
    assert_eq!(body["sessionProcess"]["sessionId"], "FRESH");

    let launches = fx.launcher.launches();
    assert_eq!(launches.len(), 1);
    assert_eq!(
        launches[0].resume_session_id.as_ref().map(|s| s.as_str()),
        Some("OLD")
    );
}

#[tokio::test]
async fn stop_and_abort_return_ok_even_for_unknown_ids() {
    let fx = fixture();
    for verb in ["stop", "abort"] {
        let (status, _) = send(
            &fx.app,
            Method::POST,
            &format!("/api/sessionProcesses/proc-404/{verb}"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }
}

#[tokio::test]
async fn scheduler_jobs_crud_round_trip() {
    let fx = fixture();
    let draft = json!({
        "name": "nightly",
        "schedule": { "type": "cron", "expr": "0 3 * * *", "concurrencyPolicy": "skip" },
        "message": { "content": "tidy up", "projectId": fx.pid },
    });
    let (status, body) = send(&fx.app, Method::POST, "/api/scheduler/jobs", Some(draft)).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["job"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(&fx.app, Method::GET, "/api/scheduler/jobs", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["jobs"].as_array().unwrap().len(), 1);

    let (status, body) = send(
        &fx.app,
        Method::PATCH,
        &format!("/api/scheduler/jobs/{id}"),
        Some(json!({ "enabled": false })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["job"]["enabled"], false);

    let (status, _) = send(
        &fx.app,
        Method::DELETE,
        &format!("/api/scheduler/jobs/{id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &fx.app,
        Method::DELETE,
        &format!("/api/scheduler/jobs/{id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_cron_expression_is_a_400() {
    let fx = fixture();
    let draft = json!({
        "name": "broken",
        "schedule": { "type": "cron", "expr": "whenever" },
        "message": { "content": "x", "projectId": fx.pid },
    });
    let (status, _) = send(&fx.app, Method::POST, "/api/scheduler/jobs", Some(draft)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn events_rejects_unknown_channel_names() {
    let fx = fixture();
    let (status, _) = send(&fx.app, Method::GET, "/api/events?channels=bogus", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn password_guard_rejects_missing_and_wrong_tokens() {
    let fx = fixture_with_password(Some("hunter2".to_string()));

    let (status, _) = send(&fx.app, Method::GET, "/api/projects", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .method(Method::GET)
        .uri("/api/projects")
        .header(header::AUTHORIZATION, "Bearer wrong")
        .body(Body::empty())
        .unwrap();
    assert_eq!(
        fx.app.clone().oneshot(request).await.unwrap().status(),
        StatusCode::UNAUTHORIZED
    );

    let request = Request::builder()
        .method(Method::GET)
        .uri("/api/projects")
        .header(header::AUTHORIZATION, "Bearer hunter2")
        .body(Body::empty())
        .unwrap();
    assert_eq!(
        fx.app.clone().oneshot(request).await.unwrap().status(),
        StatusCode::OK
    );
}
