// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tool-use permission resolution endpoint.

use super::{ApiError, AppState};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use lo_adapters::{AgentLauncher, PermissionDecision};
use lo_core::RequestId;
use std::sync::Arc;

pub async fn respond<L: AgentLauncher>(
    State(state): State<Arc<AppState<L>>>,
    Path(request_id): Path<String>,
    Json(decision): Json<PermissionDecision>,
) -> Result<StatusCode, ApiError> {
    state
        .coordinator
        .permissions()
        .respond(&RequestId::new(request_id), decision)?;
    Ok(StatusCode::OK)
}
