use std::sync::Arc;

use chrono::{DateTime, Utc};
use granary_store::{GranaryStore, SnapshotStore};

use crate::auth::AuthTokens;

pub struct AppState {
    pub store: Arc<GranaryStore>,
    /// Absent when persistence is disabled (`--ephemeral`).
    pub snapshots: Option<SnapshotStore>,
    pub auth: AuthTokens,
    pub started_at: DateTime<Utc>,
}
