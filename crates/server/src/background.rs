//! Background maintenance tasks — periodic snapshot flush and the
//! stale-run reaper. Both are fire-and-forget tokio tasks spawned at
//! startup.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use crate::state::AppState;

/// Flush the store to disk every `interval_secs` (0 disables).
pub fn spawn_snapshot_flush(state: Arc<AppState>, interval_secs: u64) {
    if interval_secs == 0 || state.snapshots.is_none() {
        info!("snapshot flush disabled");
        return;
    }
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // First tick fires immediately; skip it so startup isn't doubled
        // with the initial load.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Some(snapshots) = &state.snapshots {
                if let Err(e) = snapshots.save(&state.store) {
                    error!(error = %e, "snapshot flush failed");
                }
            }
        }
    });
}

/// Close runs abandoned `running` longer than `max_age_mins` as failed.
/// Sweeps at a quarter of the max age, at least once a minute.
pub fn spawn_run_reaper(state: Arc<AppState>, max_age_mins: u64) {
    if max_age_mins == 0 {
        info!("stale-run reaper disabled");
        return;
    }
    let sweep_secs = (max_age_mins * 60 / 4).max(60);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(sweep_secs));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let reaped = state
                .store
                .runs
                .reap_stale(chrono::Duration::minutes(max_age_mins as i64));
            if !reaped.is_empty() {
                info!(count = reaped.len(), "reaped stale runs");
            }
        }
    });
}
