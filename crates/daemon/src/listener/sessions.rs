// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session process control endpoints.

use super::{ApiError, AppState};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use lo_adapters::AgentLauncher;
use lo_core::{PermissionMode, ProjectId, SessionId, SessionProcessId, UserInput};
use lo_engine::{CoordinatorError, RegistryError, StartedTask};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionBody {
    input: UserInput,
    base_session_id: Option<SessionId>,
    permission_mode_override: Option<PermissionMode>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContinueSessionBody {
    input: UserInput,
    session_process_id: SessionProcessId,
}

pub async fn start_session<L: AgentLauncher>(
    State(state): State<Arc<AppState<L>>>,
    Path(pid): Path<String>,
    Json(body): Json<StartSessionBody>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let project_id = ProjectId::new(pid);
    let started = start_task(&state, &project_id, body.base_session_id, body.permission_mode_override, body.input).await?;
    let response = await_started(&project_id, started).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn continue_session<L: AgentLauncher>(
    State(state): State<Arc<AppState<L>>>,
    Path((pid, sid)): Path<(String, String)>,
    Json(body): Json<ContinueSessionBody>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let project_id = ProjectId::new(pid);
    let session_id = SessionId::new(sid);
    match state.coordinator.continue_task(
        &body.session_process_id,
        session_id.clone(),
        body.input.clone(),
    ) {
        Ok(()) => Ok((
            StatusCode::OK,
            Json(json!({
                "sessionProcess": {
                    "id": body.session_process_id,
                    "projectId": project_id,
                    "sessionId": session_id,
                },
            })),
        )),
        // The backend restarted since the client learned this process id:
        // fall back to a fresh start resumed from the same session.
        Err(CoordinatorError::Registry(RegistryError::NotFound(_))) => {
            let started =
                start_task(&state, &project_id, Some(session_id), None, body.input).await?;
            let response = await_started(&project_id, started).await?;
            Ok((StatusCode::CREATED, Json(response)))
        }
        Err(e) => Err(coordinator_error(e)),
    }
}

pub async fn list_session_processes<L: AgentLauncher>(
    State(state): State<Arc<AppState<L>>>,
) -> Json<serde_json::Value> {
    Json(json!({
        "sessionProcesses": state.coordinator.registry().snapshot_public(),
    }))
}

pub async fn stop_session_process<L: AgentLauncher>(
    State(state): State<Arc<AppState<L>>>,
    Path(id): Path<String>,
) -> StatusCode {
    state.coordinator.stop_task(&SessionProcessId::new(id));
    StatusCode::OK
}

pub async fn abort_session_process<L: AgentLauncher>(
    State(state): State<Arc<AppState<L>>>,
    Path(id): Path<String>,
) -> StatusCode {
    state.coordinator.abort_task(&SessionProcessId::new(id));
    StatusCode::OK
}

async fn start_task<L: AgentLauncher>(
    state: &AppState<L>,
    project_id: &ProjectId,
    base_session_id: Option<SessionId>,
    permission_mode_override: Option<PermissionMode>,
    input: UserInput,
) -> Result<StartedTask, ApiError> {
    let cwd = project_id
        .decode()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    let permission_mode = permission_mode_override.unwrap_or(state.user_config.permission_mode);
    state
        .coordinator
        .start_task(cwd, project_id.clone(), base_session_id, permission_mode, input)
        .await
        .map_err(coordinator_error)
}

async fn await_started(
    project_id: &ProjectId,
    started: StartedTask,
) -> Result<serde_json::Value, ApiError> {
    let session_id = started
        .session_initialized
        .await
        .map_err(|_| ApiError::internal("agent ended before init"))?
        .map_err(|_| ApiError::internal("task aborted before init"))?;
    Ok(json!({
        "sessionProcess": {
            "id": started.process_id,
            "projectId": project_id,
            "sessionId": session_id,
        },
    }))
}

fn coordinator_error(e: CoordinatorError) -> ApiError {
    match e {
        CoordinatorError::Registry(e) => e.into(),
        CoordinatorError::Launch(e) => ApiError::internal(e.to_string()),
        CoordinatorError::Io(e) => e.into(),
    }
}
