//! JSON handlers for the store API. Each submodule covers one component;
//! every handler resolves the caller's role before touching the store.

pub mod agents;
pub mod bronze;
pub mod dimensions;
pub mod health;
pub mod observations;
pub mod runs;
pub mod series;
pub mod validation;

use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use granary_core::GranaryError;

pub type ApiError = (StatusCode, Json<Value>);
pub type ApiResult = Result<Json<Value>, ApiError>;

/// Map a store error to its HTTP shape.
pub fn store_error(err: GranaryError) -> ApiError {
    let status = match &err {
        GranaryError::ReferenceNotFound { .. }
        | GranaryError::RunNotFound(_)
        | GranaryError::SeriesNotFound(_)
        | GranaryError::ObservationNotFound(_)
        | GranaryError::CellNotFound(_) => StatusCode::NOT_FOUND,
        GranaryError::RunAlreadyClosed(_) => StatusCode::CONFLICT,
        GranaryError::NonTerminalClose(_) | GranaryError::UnitConversion { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
    };
    (status, Json(json!({ "error": err.to_string() })))
}

pub fn not_found(message: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": message })),
    )
}
