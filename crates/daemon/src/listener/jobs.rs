// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduler job CRUD endpoints.

use super::{ApiError, AppState};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use lo_adapters::AgentLauncher;
use lo_core::JobId;
use lo_engine::{JobDraft, JobUpdate};
use serde_json::json;
use std::sync::Arc;

pub async fn list_jobs<L: AgentLauncher>(
    State(state): State<Arc<AppState<L>>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let jobs = state.scheduler.list_jobs()?;
    Ok(Json(json!({ "jobs": jobs })))
}

pub async fn add_job<L: AgentLauncher>(
    State(state): State<Arc<AppState<L>>>,
    Json(draft): Json<JobDraft>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let job = state.scheduler.add_job(draft)?;
    Ok((StatusCode::CREATED, Json(json!({ "job": job }))))
}

pub async fn update_job<L: AgentLauncher>(
    State(state): State<Arc<AppState<L>>>,
    Path(id): Path<String>,
    Json(update): Json<JobUpdate>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let job = state.scheduler.update_job(&JobId::new(id), update)?;
    Ok(Json(json!({ "job": job })))
}

pub async fn delete_job<L: AgentLauncher>(
    State(state): State<Arc<AppState<L>>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.scheduler.delete_job(&JobId::new(id))?;
    Ok(StatusCode::OK)
}
