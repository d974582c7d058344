// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP surface.
//!
//! Thin axum routing over the engine: extraction and status codes live
//! here, semantics live in lo-engine and lo-storage.

mod events;
mod jobs;
mod permissions;
mod projects;
mod sessions;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use lo_adapters::AgentLauncher;
use lo_core::{EventBus, UserConfig};
use lo_engine::{Coordinator, PermissionError, RegistryError, Scheduler, SchedulerError};
use lo_storage::SessionRepository;
use std::sync::Arc;

/// Shared handler state.
pub struct AppState<L: AgentLauncher> {
    pub coordinator: Coordinator<L>,
    pub scheduler: Scheduler<L>,
    pub repository: SessionRepository,
    pub bus: EventBus,
    pub user_config: UserConfig,
    pub password: Option<String>,
}

/// Build the API router.
pub fn router<L: AgentLauncher>(state: Arc<AppState<L>>) -> Router {
    let authed = state.password.clone();
    let api = Router::new()
        .route("/api/projects", get(projects::list_projects::<L>))
        .route("/api/projects/{pid}", get(projects::get_project::<L>))
        .route(
            "/api/projects/{pid}/sessions",
            post(sessions::start_session::<L>),
        )
        .route(
            "/api/projects/{pid}/sessions/{sid}",
            get(projects::get_session::<L>),
        )
        .route(
            "/api/projects/{pid}/sessions/{sid}/continue",
            post(sessions::continue_session::<L>),
        )
        .route(
            "/api/sessionProcesses",
            get(sessions::list_session_processes::<L>),
        )
        .route(
            "/api/sessionProcesses/{id}/stop",
            post(sessions::stop_session_process::<L>),
        )
        .route(
            "/api/sessionProcesses/{id}/abort",
            post(sessions::abort_session_process::<L>),
        )
        .route(
            "/api/scheduler/jobs",
            get(jobs::list_jobs::<L>).post(jobs::add_job::<L>),
        )
        .route(
            "/api/scheduler/jobs/{id}",
            axum::routing::patch(jobs::update_job::<L>).delete(jobs::delete_job::<L>),
        )
        .route(
            "/api/permissions/{requestId}",
            post(permissions::respond::<L>),
        )
        .route("/api/events", get(events::events::<L>))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http());

    match authed {
        Some(password) => api.layer(middleware::from_fn_with_state(password, require_password)),
        None => api,
    }
}

/// Bearer-password check applied to every API route when configured.
async fn require_password(
    State(password): State<String>,
    request: Request,
    next: Next,
) -> Response {
    let authorized = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|token| token == password)
        .unwrap_or(false);
    if !authorized {
        return ApiError::unauthorized().into_response();
    }
    next.run(request).await
}

/// Error payload shared by all handlers.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized")
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.message }));
        (self.status, body).into_response()
    }
}

impl From<std::io::Error> for ApiError {
    fn from(e: std::io::Error) -> Self {
        ApiError::internal(e.to_string())
    }
}

impl From<RegistryError> for ApiError {
    fn from(e: RegistryError) -> Self {
        let status = match &e {
            RegistryError::NotFound(_) | RegistryError::TaskNotFound(_) => StatusCode::NOT_FOUND,
            RegistryError::SessionProcessNotPaused(_)
            | RegistryError::SessionProcessAlreadyAlive(_) => StatusCode::CONFLICT,
            RegistryError::IllegalStateChange { .. } => StatusCode::CONFLICT,
        };
        ApiError::new(status, e.to_string())
    }
}

impl From<SchedulerError> for ApiError {
    fn from(e: SchedulerError) -> Self {
        let status = match &e {
            SchedulerError::JobNotFound(_) => StatusCode::NOT_FOUND,
            SchedulerError::InvalidCron { .. } | SchedulerError::InvalidReservedTime(_) => {
                StatusCode::BAD_REQUEST
            }
            SchedulerError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError::new(status, e.to_string())
    }
}

impl From<PermissionError> for ApiError {
    fn from(e: PermissionError) -> Self {
        ApiError::not_found(e.to_string())
    }
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
