use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::api;
use crate::state::AppState;

pub fn build(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(api::health::health))
        // Job lifecycle
        .route("/api/runs", post(api::runs::open_run).get(api::runs::list_runs))
        .route("/api/runs/{id}", get(api::runs::get_run))
        .route("/api/runs/{id}/counts", post(api::runs::update_counts))
        .route("/api/runs/{id}/close", post(api::runs::close_run))
        .route(
            "/api/runs/{id}/errors",
            post(api::runs::log_error).get(api::runs::run_errors),
        )
        // Dimensions & series
        .route("/api/series", post(api::series::create_series))
        .route("/api/series/lookup", get(api::series::lookup_series))
        .route("/api/units/convert", post(api::series::convert_units))
        .route("/api/dimensions/sources", post(api::dimensions::create_source))
        .route(
            "/api/dimensions/commodities",
            post(api::dimensions::create_commodity),
        )
        .route(
            "/api/dimensions/locations",
            post(api::dimensions::create_location),
        )
        .route("/api/dimensions/units", post(api::dimensions::create_unit))
        // Ingestion
        .route("/api/bronze/cells", post(api::bronze::upsert_cell))
        .route(
            "/api/bronze/releases/{id}",
            get(api::bronze::release_cells),
        )
        .route(
            "/api/observations",
            post(api::observations::upsert_observation),
        )
        .route("/api/observations/latest", get(api::observations::latest))
        .route("/api/observations/history", get(api::observations::history))
        // Validation & liveness
        .route(
            "/api/validation",
            post(api::validation::set_validation).get(api::validation::list_validation),
        )
        .route("/api/agents/heartbeat", post(api::agents::heartbeat))
        .route("/api/agents", get(api::agents::list_agents))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
