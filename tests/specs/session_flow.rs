//! Session lifecycle specs: fresh start, continuation, restart fallback.

use crate::prelude::{gated_server, server};
use axum::http::{Method, StatusCode};
use serde_json::json;

#[tokio::test]
async fn new_session_happy_path() {
    let server = server().await;
    server.launcher.queue_session_id("S1");

    let (status, body) = server
        .request(
            Method::POST,
            &format!("/api/projects/{}/sessions", server.pid),
            Some(json!({ "input": { "text": "hello" } })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let process_id = body["sessionProcess"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["sessionProcess"]["sessionId"], "S1");

    server.wait_for_process_status(&process_id, "paused").await;

    let (status, body) = server
        .request(
            Method::GET,
            &format!("/api/projects/{}/sessions/S1", server.pid),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let conversations = body["session"]["conversations"].as_array().unwrap();
    assert_eq!(conversations.len(), 3);
    assert_eq!(body["session"]["meta"]["messageCount"], 3);
    assert_eq!(
        body["session"]["meta"]["firstUserMessage"], "hello",
        "metadata derives the first real user turn"
    );
}

#[tokio::test]
async fn overlay_predicts_the_turn_until_the_journal_catches_up() {
    let server = gated_server().await;
    server.launcher.queue_session_id("S1");

    let (status, _) = server
        .request(
            Method::POST,
            &format!("/api/projects/{}/sessions", server.pid),
            Some(json!({ "input": { "text": "hello" } })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    // The journal file does not exist yet; the overlay serves the read.
    let (status, body) = server
        .request(
            Method::GET,
            &format!("/api/projects/{}/sessions/S1", server.pid),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let conversations = body["session"]["conversations"].as_array().unwrap();
    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0]["type"], "user");

    // And the session already shows up in the project listing.
    let (_, body) = server
        .request(Method::GET, &format!("/api/projects/{}", server.pid), None)
        .await;
    assert_eq!(body["sessions"].as_array().unwrap().len(), 1);

    server.launcher.release_assistant();
    server.launcher.release_result();
}

#[tokio::test]
async fn continue_on_live_paused_process() {
    let server = server().await;
    server.launcher.queue_session_id("S2");

    let (_, body) = server
        .request(
            Method::POST,
            &format!("/api/projects/{}/sessions", server.pid),
            Some(json!({ "input": { "text": "first" } })),
        )
        .await;
    let process_id = body["sessionProcess"]["id"].as_str().unwrap().to_string();
    server.wait_for_process_status(&process_id, "paused").await;

    let (status, body) = server
        .request(
            Method::POST,
            &format!("/api/projects/{}/sessions/S2/continue", server.pid),
            Some(json!({
                "input": { "text": "more" },
                "sessionProcessId": process_id,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sessionProcess"]["id"], process_id);

    server.wait_for_process_status(&process_id, "paused").await;
    let launches = server.launcher.launches();
    assert_eq!(launches.len(), 1, "no second subprocess is spawned");

    let (_, body) = server
        .request(
            Method::GET,
            &format!("/api/projects/{}/sessions/S2", server.pid),
            None,
        )
        .await;
    // One snapshot entry, then user+assistant per turn.
    assert_eq!(body["session"]["conversations"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn continue_after_backend_restart_falls_back_to_start() {
    let server = server().await;

    // The paused session exists only on disk; no live process knows it.
    let project_dir = server._dir.path().join("projects").join(&server.pid);
    std::fs::create_dir_all(&project_dir).unwrap();
    std::fs::write(
        project_dir.join("S3.jsonl"),
        concat!(
            "{\"type\":\"user\",\"uuid\":\"u1\",\"message\":{\"content\":\"before the restart\"}}\n",
            "{\"type\":\"assistant\",\"uuid\":\"a1\",\"message\":{\"content\":[]}}\n",
        ),
    )
    .unwrap();

    server.launcher.queue_session_id("S3-resumed");
    let (status, body) = server
        .request(
            Method::POST,
            &format!("/api/projects/{}/sessions/S3/continue", server.pid),
            Some(json!({
                "input": { "text": "pick it back up" },
                "sessionProcessId": "proc-from-before-restart",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "fallback start returns 201");
    assert_eq!(body["sessionProcess"]["sessionId"], "S3-resumed");

    let launches = server.launcher.launches();
    assert_eq!(
        launches[0].resume_session_id.as_ref().map(|s| s.as_str()),
        Some("S3"),
        "the new subprocess resumes from the stale session"
    );
}

#[tokio::test]
async fn stop_and_abort_remove_the_process_from_the_public_list() {
    let server = gated_server().await;
    server.launcher.queue_session_id("S4");

    let (_, body) = server
        .request(
            Method::POST,
            &format!("/api/projects/{}/sessions", server.pid),
            Some(json!({ "input": { "text": "long running" } })),
        )
        .await;
    let process_id = body["sessionProcess"]["id"].as_str().unwrap().to_string();
    server.wait_for_process_status(&process_id, "running").await;

    let (status, _) = server
        .request(
            Method::POST,
            &format!("/api/sessionProcesses/{process_id}/abort"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    server
        .wait_until(|| {
            server
                .daemon
                .coordinator()
                .registry()
                .snapshot_public()
                .is_empty()
        })
        .await;
}
