//! Validation tracker — pass/fail verdicts per entity, written by checker
//! agents that read committed data. Verdicts never block ingestion; they
//! surface through read-side queries only.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use granary_core::{EntityKind, SourceId, ValidationId, ValidationState};

// ── Rows ─────────────────────────────────────────────────────────────

/// One individual check outcome within a verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub check_name: String,
    pub passed: bool,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationRecord {
    pub id: ValidationId,
    pub entity_kind: EntityKind,
    pub entity_id: Uuid,
    pub source_id: SourceId,
    pub status: ValidationState,
    pub checker_agent_id: Option<String>,
    pub checks: Vec<CheckResult>,
    pub passed_count: u32,
    pub failed_count: u32,
    pub discrepancies: Option<serde_json::Value>,
    pub notes: Option<String>,
    pub updated_at: DateTime<Utc>,
    /// Stamped only when `status` is terminal.
    pub validated_at: Option<DateTime<Utc>>,
}

/// Input for [`ValidationTracker::set_status`]. The data source is
/// already resolved by the caller.
#[derive(Debug, Clone)]
pub struct ValidationInput {
    pub entity_kind: EntityKind,
    pub entity_id: Uuid,
    pub source_id: SourceId,
    pub status: ValidationState,
    pub checker_agent_id: Option<String>,
    pub checks: Vec<CheckResult>,
    pub discrepancies: Option<serde_json::Value>,
    pub notes: Option<String>,
}

type VerdictKey = (EntityKind, Uuid, SourceId);

// ── Tracker ──────────────────────────────────────────────────────────

#[derive(Default)]
struct ValidationTable {
    rows: HashMap<ValidationId, ValidationRecord>,
    by_key: HashMap<VerdictKey, ValidationId>,
}

/// Thread-safe validation verdict store, upserting on
/// (entity kind, entity id, data source).
#[derive(Default)]
pub struct ValidationTracker {
    inner: RwLock<ValidationTable>,
}

impl ValidationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert a verdict. Pass/fail counts are derived from the submitted
    /// check list; `validated_at` is stamped only on terminal statuses.
    pub fn set_status(&self, input: ValidationInput) -> ValidationId {
        let passed_count = input.checks.iter().filter(|c| c.passed).count() as u32;
        let failed_count = input.checks.len() as u32 - passed_count;
        let now = Utc::now();
        let validated_at = input.status.is_terminal().then_some(now);

        let key = (input.entity_kind, input.entity_id, input.source_id);
        let mut inner = self.inner.write().unwrap();

        let id = match inner.by_key.get(&key) {
            Some(&id) => id,
            None => {
                let id = Uuid::new_v4();
                inner.by_key.insert(key, id);
                id
            }
        };
        inner.rows.insert(
            id,
            ValidationRecord {
                id,
                entity_kind: input.entity_kind,
                entity_id: input.entity_id,
                source_id: input.source_id,
                status: input.status,
                checker_agent_id: input.checker_agent_id,
                checks: input.checks,
                passed_count,
                failed_count,
                discrepancies: input.discrepancies,
                notes: input.notes,
                updated_at: now,
                validated_at,
            },
        );
        id
    }

    pub fn get(&self, id: ValidationId) -> Option<ValidationRecord> {
        self.inner.read().unwrap().rows.get(&id).cloned()
    }

    pub fn verdict(
        &self,
        entity_kind: EntityKind,
        entity_id: Uuid,
        source_id: SourceId,
    ) -> Option<ValidationRecord> {
        let inner = self.inner.read().unwrap();
        inner
            .by_key
            .get(&(entity_kind, entity_id, source_id))
            .and_then(|id| inner.rows.get(id))
            .cloned()
    }

    pub fn verdicts_for_source(&self, source_id: SourceId) -> Vec<ValidationRecord> {
        let inner = self.inner.read().unwrap();
        let mut out: Vec<ValidationRecord> = inner
            .rows
            .values()
            .filter(|r| r.source_id == source_id)
            .cloned()
            .collect();
        out.sort_by_key(|r| r.updated_at);
        out
    }

    // ── Snapshot ──────────────────────────────────────────────────

    pub fn export(&self) -> Vec<ValidationRecord> {
        self.inner.read().unwrap().rows.values().cloned().collect()
    }

    pub fn restore(&self, records: Vec<ValidationRecord>) {
        let mut inner = self.inner.write().unwrap();
        *inner = ValidationTable::default();
        for record in records {
            inner
                .by_key
                .insert((record.entity_kind, record.entity_id, record.source_id), record.id);
            inner.rows.insert(record.id, record);
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn checks() -> Vec<CheckResult> {
        vec![
            CheckResult {
                check_name: "value_in_range".to_string(),
                passed: true,
                message: None,
            },
            CheckResult {
                check_name: "unit_consistent".to_string(),
                passed: true,
                message: None,
            },
            CheckResult {
                check_name: "matches_prior_release".to_string(),
                passed: false,
                message: Some("off by 4.2%".to_string()),
            },
        ]
    }

    fn input(status: ValidationState, source_id: SourceId, entity_id: Uuid) -> ValidationInput {
        ValidationInput {
            entity_kind: EntityKind::Series,
            entity_id,
            source_id,
            status,
            checker_agent_id: Some("validator-01".to_string()),
            checks: checks(),
            discrepancies: None,
            notes: None,
        }
    }

    #[test]
    fn test_counts_derived_from_checks() {
        let tracker = ValidationTracker::new();
        let id = tracker.set_status(input(
            ValidationState::PassedWithWarnings,
            Uuid::new_v4(),
            Uuid::new_v4(),
        ));
        let record = tracker.get(id).unwrap();
        assert_eq!(record.passed_count, 2);
        assert_eq!(record.failed_count, 1);
        assert_eq!(record.checks.len(), 3);
    }

    #[test]
    fn test_terminal_status_stamps_validated_at() {
        let tracker = ValidationTracker::new();
        let source = Uuid::new_v4();
        let entity = Uuid::new_v4();

        let id = tracker.set_status(input(ValidationState::InProgress, source, entity));
        assert!(tracker.get(id).unwrap().validated_at.is_none());

        let id2 = tracker.set_status(input(ValidationState::Passed, source, entity));
        assert_eq!(id, id2, "same key upserts the same record");
        assert!(tracker.get(id).unwrap().validated_at.is_some());
    }

    #[test]
    fn test_key_is_kind_entity_source() {
        let tracker = ValidationTracker::new();
        let source = Uuid::new_v4();
        let entity = Uuid::new_v4();

        let a = tracker.set_status(input(ValidationState::Passed, source, entity));
        let mut other = input(ValidationState::Passed, source, entity);
        other.entity_kind = EntityKind::Observation;
        let b = tracker.set_status(other);
        assert_ne!(a, b, "different entity kinds are different verdicts");
    }

    #[test]
    fn test_verdicts_for_source() {
        let tracker = ValidationTracker::new();
        let source = Uuid::new_v4();
        tracker.set_status(input(ValidationState::Passed, source, Uuid::new_v4()));
        tracker.set_status(input(ValidationState::Failed, source, Uuid::new_v4()));
        tracker.set_status(input(ValidationState::Passed, Uuid::new_v4(), Uuid::new_v4()));

        assert_eq!(tracker.verdicts_for_source(source).len(), 2);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let tracker = ValidationTracker::new();
        let source = Uuid::new_v4();
        let entity = Uuid::new_v4();
        let id = tracker.set_status(input(ValidationState::Passed, source, entity));

        let restored = ValidationTracker::new();
        restored.restore(tracker.export());
        assert_eq!(
            restored
                .verdict(EntityKind::Series, entity, source)
                .unwrap()
                .id,
            id
        );
    }
}
