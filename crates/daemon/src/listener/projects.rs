// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Project and session read endpoints.

use super::{ApiError, AppState};
use axum::extract::{Path, Query, State};
use axum::Json;
use lo_adapters::AgentLauncher;
use lo_core::{ProjectId, SessionId};
use lo_storage::repository::DEFAULT_PAGE_SIZE;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

pub async fn list_projects<L: AgentLauncher>(
    State(state): State<Arc<AppState<L>>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let projects = state.repository.list_projects()?;
    Ok(Json(json!({ "projects": projects })))
}

#[derive(Deserialize)]
pub struct SessionsQuery {
    cursor: Option<String>,
    #[serde(rename = "maxCount")]
    max_count: Option<usize>,
}

pub async fn get_project<L: AgentLauncher>(
    State(state): State<Arc<AppState<L>>>,
    Path(pid): Path<String>,
    Query(query): Query<SessionsQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let project_id = ProjectId::new(pid);
    let path = project_id
        .decode()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    let cursor = query.cursor.map(SessionId::new);
    let page = state.repository.get_sessions(
        &project_id,
        cursor.as_ref(),
        query.max_count.unwrap_or(DEFAULT_PAGE_SIZE),
    )?;
    Ok(Json(json!({
        "project": { "id": project_id, "path": path.display().to_string() },
        "sessions": page.sessions,
        "nextCursor": page.next_cursor,
    })))
}

pub async fn get_session<L: AgentLauncher>(
    State(state): State<Arc<AppState<L>>>,
    Path((pid, sid)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let detail = state
        .repository
        .get_session(&ProjectId::new(pid), &SessionId::new(sid))?
        .ok_or_else(|| ApiError::not_found("session not found"))?;
    Ok(Json(json!({ "session": detail })))
}
