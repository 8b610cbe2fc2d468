//! Admin handlers for seeding dimension reference rows over the API.
//! Collectors never create these; they are seed data resolved by code.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::auth::{Caller, Role};
use crate::state::AppState;

use super::{store_error, ApiResult};

#[derive(Deserialize)]
pub struct CreateSourceRequest {
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub url: Option<String>,
}

/// POST /api/dimensions/sources
pub async fn create_source(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(req): Json<CreateSourceRequest>,
) -> ApiResult {
    caller.require(Role::Admin)?;
    let id = state
        .store
        .dimensions
        .create_data_source(&req.code, &req.name, req.description, req.url);
    Ok(Json(json!({ "source_id": id })))
}

#[derive(Deserialize)]
pub struct CreateNamedRequest {
    pub code: String,
    pub name: String,
}

/// POST /api/dimensions/commodities
pub async fn create_commodity(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(req): Json<CreateNamedRequest>,
) -> ApiResult {
    caller.require(Role::Admin)?;
    let id = state.store.dimensions.create_commodity(&req.code, &req.name);
    Ok(Json(json!({ "commodity_id": id })))
}

/// POST /api/dimensions/locations
pub async fn create_location(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(req): Json<CreateNamedRequest>,
) -> ApiResult {
    caller.require(Role::Admin)?;
    let id = state.store.dimensions.create_location(&req.code, &req.name);
    Ok(Json(json!({ "location_id": id })))
}

#[derive(Deserialize)]
pub struct CreateUnitRequest {
    pub code: String,
    pub name: String,
    pub base: Option<String>,
    #[serde(default = "default_factor")]
    pub factor: f64,
}

fn default_factor() -> f64 {
    1.0
}

/// POST /api/dimensions/units
pub async fn create_unit(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(req): Json<CreateUnitRequest>,
) -> ApiResult {
    caller.require(Role::Admin)?;
    let id = state
        .store
        .dimensions
        .create_unit(&req.code, &req.name, req.base.as_deref(), req.factor)
        .map_err(store_error)?;
    Ok(Json(json!({ "unit_id": id })))
}
