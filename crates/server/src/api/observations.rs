//! Observation handlers — canonical ingestion and the read-side queries.
//! Consumers only ever see `is_latest` rows through the latest queries;
//! the history endpoint exposes the full revision trail for audits.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use granary_core::{Metadata, QualityFlag};
use granary_store::ObservationInput;

use crate::auth::{Caller, Role};
use crate::state::AppState;

use super::{not_found, store_error, ApiResult};

#[derive(Deserialize)]
pub struct UpsertObservationRequest {
    pub series_id: Uuid,
    pub observation_time: DateTime<Utc>,
    pub value: f64,
    pub run_id: Uuid,
    #[serde(default)]
    pub revision: u32,
    #[serde(default)]
    pub quality: QualityFlag,
    #[serde(default)]
    pub is_estimated: bool,
    #[serde(default)]
    pub is_forecast: bool,
    #[serde(default)]
    pub is_preliminary: bool,
    pub raw_cell_id: Option<Uuid>,
    #[serde(default)]
    pub metadata: Metadata,
}

/// POST /api/observations — upsert one revision.
pub async fn upsert_observation(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(req): Json<UpsertObservationRequest>,
) -> ApiResult {
    caller.require(Role::Writer)?;
    let (observation_id, outcome) = state
        .store
        .upsert_observation(ObservationInput {
            series_id: req.series_id,
            observation_time: req.observation_time,
            value: req.value,
            run_id: req.run_id,
            revision: req.revision,
            quality: req.quality,
            is_estimated: req.is_estimated,
            is_forecast: req.is_forecast,
            is_preliminary: req.is_preliminary,
            raw_cell_id: req.raw_cell_id,
            metadata: req.metadata,
        })
        .map_err(store_error)?;
    Ok(Json(json!({ "observation_id": observation_id, "outcome": outcome })))
}

#[derive(Deserialize)]
pub struct LatestParams {
    pub series: Uuid,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// GET /api/observations/latest — is_latest rows over a time range.
pub async fn latest(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Query(params): Query<LatestParams>,
) -> ApiResult {
    caller.require(Role::Reader)?;
    let rows = state
        .store
        .observations
        .latest_range(params.series, params.from, params.to);
    Ok(Json(json!(rows)))
}

#[derive(Deserialize)]
pub struct HistoryParams {
    pub series: Uuid,
    pub time: DateTime<Utc>,
}

/// GET /api/observations/history — the revision trail of one pair.
pub async fn history(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Query(params): Query<HistoryParams>,
) -> ApiResult {
    caller.require(Role::Reader)?;
    let rows = state.store.observations.history(params.series, params.time);
    if rows.is_empty() {
        return Err(not_found("no observations for that series and time"));
    }
    Ok(Json(json!(rows)))
}
