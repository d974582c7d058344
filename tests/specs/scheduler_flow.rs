//! Scheduler specs: queued aggregation and reserved one-shots.

use crate::prelude::{gated_server, server};
use axum::http::{Method, StatusCode};
use serde_json::json;

#[tokio::test]
async fn queued_follow_ups_aggregate_on_pause() {
    let server = gated_server().await;
    server.launcher.queue_session_id("S5");

    let (status, _) = server
        .request(
            Method::POST,
            &format!("/api/projects/{}/sessions", server.pid),
            Some(json!({ "input": { "text": "work on it" } })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    // Three follow-ups queued while the agent is busy; the first carries
    // an image.
    for (content, images) in [
        ("a", json!([{ "mediaType": "image/png", "data": "aGk=" }])),
        ("b", json!([])),
        ("c", json!([])),
    ] {
        let (status, _) = server
            .request(
                Method::POST,
                "/api/scheduler/jobs",
                Some(json!({
                    "name": format!("follow-up {content}"),
                    "schedule": { "type": "queued", "targetSessionId": "S5" },
                    "message": {
                        "content": content,
                        "projectId": server.pid,
                        "images": images,
                    },
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        // Distinct createdAt timestamps keep the aggregation order stable.
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    server.launcher.release_assistant();
    server.launcher.release_result();

    let launches = server.launcher.launches();
    let inputs = launches[0].inputs.clone();
    server.wait_until(|| inputs.lock().len() == 2).await;

    let delivered = inputs.lock()[1].clone();
    assert_eq!(
        delivered.text,
        "[Note: While you were working, the user added 3 follow-up messages.]\n\n\
         --- Follow-up message 1 ---\n\
         Attachments included: #1 (image/png)\n\n\
         a\n\n\
         --- Follow-up message 2 ---\n\
         No attachments included.\n\n\
         b\n\n\
         --- Follow-up message 3 ---\n\
         No attachments included.\n\n\
         c"
    );
    assert_eq!(delivered.images.len(), 1);
    assert_eq!(delivered.images[0].media_type, "image/png");

    // All three fired jobs are gone from persistence.
    server.wait_until(|| jobs_file_empty(&server)).await;

    server.launcher.release_assistant();
    server.launcher.release_result();
}

#[tokio::test]
async fn reserved_job_fires_once_and_never_resurrects() {
    let server = server().await;

    let at_iso = "2020-01-01T00:00:00Z"; // already due
    let (status, body) = server
        .request(
            Method::POST,
            "/api/scheduler/jobs",
            Some(json!({
                "name": "one shot",
                "schedule": { "type": "reserved", "atIso": at_iso },
                "message": { "content": "fire now", "projectId": server.pid },
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let job_id = body["job"]["id"].as_str().unwrap().to_string();

    server
        .wait_until(|| !server.launcher.launches().is_empty())
        .await;

    // After firing the job is gone from the list.
    server.wait_until(|| jobs_file_empty(&server)).await;

    let (_, body) = server.request(Method::GET, "/api/scheduler/jobs", None).await;
    assert!(body["jobs"]
        .as_array()
        .unwrap()
        .iter()
        .all(|j| j["id"] != job_id.as_str()));
}

fn jobs_file_empty(server: &crate::prelude::TestServer) -> bool {
    let path = server._dir.path().join("state").join("scheduler.json");
    match std::fs::read_to_string(path) {
        Ok(content) => serde_json::from_str::<serde_json::Value>(&content)
            .map(|v| {
                v["jobs"]
                    .as_array()
                    .map(|jobs| jobs.is_empty())
                    .unwrap_or(false)
            })
            .unwrap_or(false),
        Err(_) => false,
    }
}

#[tokio::test]
async fn cron_jobs_arm_without_firing_at_creation() {
    let server = server().await;
    let (status, _) = server
        .request(
            Method::POST,
            "/api/scheduler/jobs",
            Some(json!({
                "name": "hourly",
                "schedule": { "type": "cron", "expr": "0 * * * *", "concurrencyPolicy": "skip" },
                "message": { "content": "tick", "projectId": server.pid },
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    tokio::time::sleep(std::time::Duration::from_millis(150)).await;
    assert!(
        server.launcher.launches().is_empty(),
        "cron jobs wait for the next natural boundary"
    );
}
