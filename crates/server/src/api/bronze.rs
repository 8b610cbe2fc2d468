//! Bronze cell handlers — raw ingestion from source-specific parsers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use granary_store::CellInput;

use crate::auth::{Caller, Role};
use crate::state::AppState;

use super::{store_error, ApiResult};

#[derive(Deserialize)]
pub struct UpsertCellRequest {
    pub release_id: String,
    pub table_id: String,
    pub row_id: String,
    pub column_id: String,
    pub value_text: String,
    pub row_label: Option<String>,
    pub row_category: Option<String>,
    pub period_label: Option<String>,
    pub run_id: Uuid,
}

/// POST /api/bronze/cells — idempotent upsert on the natural key.
pub async fn upsert_cell(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(req): Json<UpsertCellRequest>,
) -> ApiResult {
    caller.require(Role::Writer)?;
    let (cell_id, outcome) = state
        .store
        .upsert_bronze_cell(CellInput {
            release_id: req.release_id,
            table_id: req.table_id,
            row_id: req.row_id,
            column_id: req.column_id,
            value_text: req.value_text,
            row_label: req.row_label,
            row_category: req.row_category,
            period_label: req.period_label,
            run_id: req.run_id,
        })
        .map_err(store_error)?;
    Ok(Json(json!({ "cell_id": cell_id, "outcome": outcome })))
}

/// GET /api/bronze/releases/{id} — every cell of a release.
pub async fn release_cells(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(release_id): Path<String>,
) -> ApiResult {
    caller.require(Role::Reader)?;
    Ok(Json(json!(state.store.bronze.cells_for_release(&release_id))))
}
