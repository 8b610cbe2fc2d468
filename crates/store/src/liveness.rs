//! Agent liveness registry — a heartbeat row per collector/validator
//! process, overwritten on every beat. No history is kept; health is
//! classified at read time from elapsed time since the last beat.

use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use granary_core::AgentHealth;

/// Heartbeats younger than this are healthy.
const HEALTHY_WINDOW_MINS: i64 = 2;
/// Heartbeats at least this old are stale; in between is a warning.
const STALE_AFTER_MINS: i64 = 10;

// ── Rows ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentHeartbeat {
    pub agent_id: String,
    pub agent_type: String,
    pub status: String,
    pub current_task: Option<String>,
    pub last_seen: DateTime<Utc>,
}

/// A heartbeat plus its computed health — the read-side shape.
#[derive(Debug, Clone, Serialize)]
pub struct AgentStatusView {
    #[serde(flatten)]
    pub heartbeat: AgentHeartbeat,
    pub health: AgentHealth,
    pub seconds_since_seen: i64,
}

/// Classify elapsed time since the last beat.
pub fn classify(elapsed: Duration) -> AgentHealth {
    if elapsed < Duration::minutes(HEALTHY_WINDOW_MINS) {
        AgentHealth::Healthy
    } else if elapsed < Duration::minutes(STALE_AFTER_MINS) {
        AgentHealth::Warning
    } else {
        AgentHealth::Stale
    }
}

// ── Registry ─────────────────────────────────────────────────────────

/// Thread-safe heartbeat registry keyed by agent id.
#[derive(Default)]
pub struct AgentRegistry {
    agents: RwLock<IndexMap<String, AgentHeartbeat>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unconditional upsert, always refreshing last-seen.
    pub fn heartbeat(
        &self,
        agent_id: &str,
        agent_type: &str,
        status: &str,
        current_task: Option<String>,
    ) {
        let mut agents = self.agents.write().unwrap();
        agents.insert(
            agent_id.to_string(),
            AgentHeartbeat {
                agent_id: agent_id.to_string(),
                agent_type: agent_type.to_string(),
                status: status.to_string(),
                current_task,
                last_seen: Utc::now(),
            },
        );
    }

    pub fn get(&self, agent_id: &str) -> Option<AgentHeartbeat> {
        self.agents.read().unwrap().get(agent_id).cloned()
    }

    /// Every agent with health computed against `now`.
    pub fn list_at(&self, now: DateTime<Utc>) -> Vec<AgentStatusView> {
        self.agents
            .read()
            .unwrap()
            .values()
            .map(|hb| {
                let elapsed = now - hb.last_seen;
                AgentStatusView {
                    heartbeat: hb.clone(),
                    health: classify(elapsed),
                    seconds_since_seen: elapsed.num_seconds(),
                }
            })
            .collect()
    }

    pub fn list(&self) -> Vec<AgentStatusView> {
        self.list_at(Utc::now())
    }

    // ── Snapshot ──────────────────────────────────────────────────

    pub fn export(&self) -> Vec<AgentHeartbeat> {
        self.agents.read().unwrap().values().cloned().collect()
    }

    pub fn restore(&self, heartbeats: Vec<AgentHeartbeat>) {
        let mut agents = self.agents.write().unwrap();
        agents.clear();
        for hb in heartbeats {
            agents.insert(hb.agent_id.clone(), hb);
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_thresholds() {
        assert_eq!(classify(Duration::seconds(0)), AgentHealth::Healthy);
        assert_eq!(classify(Duration::seconds(119)), AgentHealth::Healthy);
        assert_eq!(classify(Duration::minutes(2)), AgentHealth::Warning);
        assert_eq!(classify(Duration::minutes(9)), AgentHealth::Warning);
        assert_eq!(classify(Duration::minutes(10)), AgentHealth::Stale);
        assert_eq!(classify(Duration::hours(3)), AgentHealth::Stale);
    }

    #[test]
    fn test_heartbeat_overwrites_previous_beat() {
        let registry = AgentRegistry::new();
        registry.heartbeat("collector-01", "collector", "alive", Some("fetching".into()));
        let first = registry.get("collector-01").unwrap();

        registry.heartbeat("collector-01", "collector", "alive", Some("parsing".into()));
        let second = registry.get("collector-01").unwrap();

        assert_eq!(second.current_task.as_deref(), Some("parsing"));
        assert!(second.last_seen >= first.last_seen);
        assert_eq!(registry.list().len(), 1, "no history kept");
    }

    #[test]
    fn test_list_computes_health_against_clock() {
        let registry = AgentRegistry::new();
        registry.heartbeat("collector-01", "collector", "alive", None);
        let beat = registry.get("collector-01").unwrap().last_seen;

        let at = |mins: i64| {
            registry
                .list_at(beat + Duration::minutes(mins))
                .pop()
                .unwrap()
                .health
        };
        assert_eq!(at(1), AgentHealth::Healthy);
        assert_eq!(at(5), AgentHealth::Warning);
        assert_eq!(at(60), AgentHealth::Stale);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let registry = AgentRegistry::new();
        registry.heartbeat("validator-01", "validator", "alive", None);

        let restored = AgentRegistry::new();
        restored.restore(registry.export());
        assert_eq!(restored.get("validator-01").unwrap().agent_type, "validator");
    }
}
