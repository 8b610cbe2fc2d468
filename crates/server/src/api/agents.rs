//! Agent liveness handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::auth::{Caller, Role};
use crate::state::AppState;

use super::ApiResult;

fn default_status() -> String {
    "alive".to_string()
}

#[derive(Deserialize)]
pub struct HeartbeatRequest {
    pub agent_id: String,
    pub agent_type: String,
    #[serde(default = "default_status")]
    pub status: String,
    pub current_task: Option<String>,
}

/// POST /api/agents/heartbeat — collectors and validators both beat.
pub async fn heartbeat(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(req): Json<HeartbeatRequest>,
) -> ApiResult {
    caller.require_any(&[Role::Writer, Role::Checker])?;
    state
        .store
        .heartbeat(&req.agent_id, &req.agent_type, &req.status, req.current_task);
    Ok(Json(json!({ "agent_id": req.agent_id })))
}

/// GET /api/agents — every agent with health computed from elapsed time.
pub async fn list_agents(State(state): State<Arc<AppState>>, caller: Caller) -> ApiResult {
    caller.require(Role::Reader)?;
    Ok(Json(json!(state.store.agents.list())))
}
