//! Job lifecycle handlers — open/update/close runs, the error log, and
//! the audit queries operators diagnose failures with.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use granary_core::{Metadata, RunStatus};
use granary_store::CountDelta;

use crate::auth::{Caller, Role};
use crate::state::AppState;

use super::{not_found, store_error, ApiResult};

#[derive(Deserialize)]
pub struct OpenRunRequest {
    pub source_code: String,
    pub job_name: String,
    pub agent_id: String,
    pub agent_type: String,
    #[serde(default)]
    pub parameters: Metadata,
}

/// POST /api/runs — open an ingest run.
pub async fn open_run(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(req): Json<OpenRunRequest>,
) -> ApiResult {
    caller.require(Role::Writer)?;
    let run_id = state
        .store
        .open_run(
            &req.source_code,
            &req.job_name,
            &req.agent_id,
            &req.agent_type,
            req.parameters,
        )
        .map_err(store_error)?;
    Ok(Json(json!({ "run_id": run_id })))
}

/// POST /api/runs/{id}/counts — apply counter deltas.
pub async fn update_counts(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(delta): Json<CountDelta>,
) -> ApiResult {
    caller.require(Role::Writer)?;
    state.store.update_counts(id, delta).map_err(store_error)?;
    Ok(Json(json!({ "run_id": id })))
}

#[derive(Deserialize)]
pub struct CloseRunRequest {
    pub status: RunStatus,
    pub error_message: Option<String>,
    pub error_detail: Option<String>,
}

/// POST /api/runs/{id}/close — terminal close, exactly once.
pub async fn close_run(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(req): Json<CloseRunRequest>,
) -> ApiResult {
    caller.require(Role::Writer)?;
    state
        .store
        .close_run(id, req.status, req.error_message, req.error_detail)
        .map_err(store_error)?;
    Ok(Json(json!({ "run_id": id, "status": req.status })))
}

#[derive(Deserialize)]
pub struct LogErrorRequest {
    pub error_type: String,
    pub message: String,
    pub record_key: Option<String>,
    pub record_data: Option<serde_json::Value>,
    pub error_code: Option<String>,
}

/// POST /api/runs/{id}/errors — append an error record.
pub async fn log_error(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(req): Json<LogErrorRequest>,
) -> ApiResult {
    caller.require(Role::Writer)?;
    let error_id = state
        .store
        .log_ingest_error(
            id,
            &req.error_type,
            &req.message,
            req.record_key,
            req.record_data,
            req.error_code,
        )
        .map_err(store_error)?;
    Ok(Json(json!({ "error_id": error_id })))
}

#[derive(Deserialize)]
pub struct ListRunsParams {
    pub limit: Option<usize>,
}

/// GET /api/runs — recent runs, newest last.
pub async fn list_runs(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Query(params): Query<ListRunsParams>,
) -> ApiResult {
    caller.require(Role::Reader)?;
    let runs = state.store.runs.recent(params.limit.unwrap_or(100));
    Ok(Json(json!(runs)))
}

/// GET /api/runs/{id} — one run's audit view.
pub async fn get_run(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult {
    caller.require(Role::Reader)?;
    let run = state
        .store
        .runs
        .get(id)
        .ok_or_else(|| not_found(&format!("run not found: {id}")))?;
    Ok(Json(json!(run.view())))
}

/// GET /api/runs/{id}/errors — the run's error log.
pub async fn run_errors(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult {
    caller.require(Role::Reader)?;
    if !state.store.runs.contains(id) {
        return Err(not_found(&format!("run not found: {id}")));
    }
    Ok(Json(json!(state.store.runs.errors_for(id))))
}
