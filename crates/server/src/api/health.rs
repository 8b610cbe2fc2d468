//! Health endpoint — server readiness and store row counts. Unauthenticated.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: i64,
    pub auth_open: bool,
    pub series: usize,
    pub runs: usize,
    pub observations: usize,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let dimensions = state.store.dimensions.export();
    let runs = state.store.runs.export();
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: (Utc::now() - state.started_at).num_seconds(),
        auth_open: state.auth.is_open(),
        series: dimensions.series.len(),
        runs: runs.runs.len(),
        observations: state.store.observations.export().len(),
    })
}
