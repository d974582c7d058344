//! Shared fixtures for the behavioral specs.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use lo_adapters::FakeAgentLauncher;
use lo_core::{ProjectId, UserConfig};
use lo_daemon::{startup, Config, Daemon};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

pub struct TestServer {
    pub _dir: TempDir,
    pub cwd: PathBuf,
    pub pid: String,
    pub launcher: FakeAgentLauncher,
    pub daemon: Daemon<FakeAgentLauncher>,
    pub app: Router,
}

pub async fn server() -> TestServer {
    server_inner(false).await
}

pub async fn gated_server() -> TestServer {
    server_inner(true).await
}

async fn server_inner(gated: bool) -> TestServer {
    let dir = TempDir::new().unwrap();
    let projects_dir = dir.path().join("projects");
    let cwd = dir.path().join("work");
    std::fs::create_dir_all(&projects_dir).unwrap();
    std::fs::create_dir_all(&cwd).unwrap();

    let mut launcher = FakeAgentLauncher::new(&projects_dir);
    if gated {
        launcher = launcher.gated();
    }
    let daemon = startup(
        Config {
            projects_dir,
            state_dir: dir.path().join("state"),
            user_config: UserConfig::default(),
            password: None,
        },
        launcher.clone(),
    )
    .await
    .unwrap();
    let app = daemon.router();

    TestServer {
        pid: ProjectId::encode(&cwd).as_str().to_string(),
        cwd,
        _dir: dir,
        launcher,
        daemon,
        app,
    }
}

impl TestServer {
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
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
        let response = self.app.clone().oneshot(request).await.unwrap();
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

    /// Poll until the check passes or the deadline elapses.
    pub async fn wait_until(&self, mut check: impl FnMut() -> bool) {
        let deadline = std::time::Instant::now() + Duration::from_secs(3);
        while !check() {
            assert!(
                std::time::Instant::now() < deadline,
                "condition not met in 3s"
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Poll the public process list until one entry reports the status.
    pub async fn wait_for_process_status(&self, process_id: &str, status: &str) {
        let deadline = std::time::Instant::now() + Duration::from_secs(3);
        loop {
            let (_, body) = self
                .request(Method::GET, "/api/sessionProcesses", None)
                .await;
            let found = body["sessionProcesses"]
                .as_array()
                .map(|list| {
                    list.iter()
                        .any(|p| p["id"] == process_id && p["status"] == status)
                })
                .unwrap_or(false);
            if found {
                return;
            }
            assert!(
                std::time::Instant::now() < deadline,
                "process {process_id} never reached {status}"
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}
