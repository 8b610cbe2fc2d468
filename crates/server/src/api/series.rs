//! Series resolution and unit conversion handlers.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use granary_core::{Frequency, Metadata};
use granary_store::SeriesSpec;

use crate::auth::{Caller, Role};
use crate::state::AppState;

use super::{not_found, store_error, ApiResult};

#[derive(Deserialize)]
pub struct CreateSeriesRequest {
    pub source_code: String,
    pub series_key: String,
    pub name: String,
    pub commodity_code: Option<String>,
    pub location_code: Option<String>,
    pub unit_code: Option<String>,
    #[serde(default)]
    pub frequency: Frequency,
    #[serde(default)]
    pub metadata: Metadata,
}

/// POST /api/series — get-or-create a series by (source, key).
pub async fn create_series(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(req): Json<CreateSeriesRequest>,
) -> ApiResult {
    caller.require(Role::Writer)?;
    let series_id = state
        .store
        .get_or_create_series(SeriesSpec {
            source_code: req.source_code,
            series_key: req.series_key,
            name: req.name,
            commodity_code: req.commodity_code,
            location_code: req.location_code,
            unit_code: req.unit_code,
            frequency: req.frequency,
            metadata: req.metadata,
        })
        .map_err(store_error)?;
    Ok(Json(json!({ "series_id": series_id })))
}

#[derive(Deserialize)]
pub struct LookupParams {
    pub source: String,
    pub key: String,
}

/// GET /api/series/lookup — read-only id lookup, no side effects.
pub async fn lookup_series(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Query(params): Query<LookupParams>,
) -> ApiResult {
    caller.require(Role::Reader)?;
    match state.store.series_id(&params.source, &params.key) {
        Some(id) => Ok(Json(json!({ "series_id": id }))),
        None => Err(not_found(&format!(
            "no series {} for source {}",
            params.key, params.source
        ))),
    }
}

#[derive(Deserialize)]
pub struct ConvertRequest {
    pub value: f64,
    pub from: String,
    pub to: String,
}

/// POST /api/units/convert — convert between units sharing a base.
pub async fn convert_units(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(req): Json<ConvertRequest>,
) -> ApiResult {
    caller.require(Role::Reader)?;
    let value = state
        .store
        .convert_units(req.value, &req.from, &req.to)
        .map_err(store_error)?;
    Ok(Json(json!({ "value": value, "from": req.from, "to": req.to })))
}
