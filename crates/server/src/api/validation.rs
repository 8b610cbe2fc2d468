//! Validation handlers — checker agents report verdicts here; verdicts
//! never block ingestion.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use granary_core::{EntityKind, ValidationState};
use granary_store::CheckResult;

use crate::auth::{Caller, Role};
use crate::state::AppState;

use super::{store_error, ApiResult};

#[derive(Deserialize)]
pub struct SetValidationRequest {
    pub entity_kind: EntityKind,
    pub entity_id: Uuid,
    pub source_code: String,
    pub status: ValidationState,
    pub checker_agent_id: Option<String>,
    #[serde(default)]
    pub check_results: Vec<CheckRequest>,
    pub discrepancies: Option<serde_json::Value>,
    pub notes: Option<String>,
}

#[derive(Deserialize)]
pub struct CheckRequest {
    pub check_name: String,
    pub passed: bool,
    pub message: Option<String>,
}

/// POST /api/validation — upsert a verdict.
pub async fn set_validation(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(req): Json<SetValidationRequest>,
) -> ApiResult {
    caller.require(Role::Checker)?;
    let checks = req
        .check_results
        .into_iter()
        .map(|c| CheckResult {
            check_name: c.check_name,
            passed: c.passed,
            message: c.message,
        })
        .collect();
    let validation_id = state
        .store
        .set_validation_status(
            req.entity_kind,
            req.entity_id,
            &req.source_code,
            req.status,
            req.checker_agent_id,
            checks,
            req.discrepancies,
            req.notes,
        )
        .map_err(store_error)?;
    Ok(Json(json!({ "validation_id": validation_id })))
}

#[derive(Deserialize)]
pub struct ListValidationParams {
    pub source: String,
}

/// GET /api/validation — verdicts for a data source.
pub async fn list_validation(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Query(params): Query<ListValidationParams>,
) -> ApiResult {
    caller.require(Role::Reader)?;
    let source_id = state
        .store
        .dimensions
        .require_source(&params.source)
        .map_err(store_error)?;
    Ok(Json(json!(state.store.validation.verdicts_for_source(source_id))))
}
