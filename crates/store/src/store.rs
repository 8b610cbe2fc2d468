//! [`GranaryStore`] — the facade aggregating every component store.
//!
//! Components are deliberately decoupled: the registry owns code
//! resolution, the trackers work by id. The facade wires them together so
//! collectors can speak codes at the boundary while referential checks
//! (does this run exist? this series?) happen before any write.

use uuid::Uuid;

use granary_core::{
    CellId, EntityKind, GranaryError, IngestErrorId, Metadata, ObservationId, RunId, RunStatus,
    SeriesId, ValidationId, ValidationState, WriteOutcome,
};

use crate::bronze::{BronzeStore, CellInput};
use crate::dimensions::{DimensionRegistry, SeriesSpec};
use crate::liveness::AgentRegistry;
use crate::observations::{ObservationInput, ObservationStore};
use crate::runs::{CountDelta, RunTracker};
use crate::validation::{CheckResult, ValidationInput, ValidationTracker};

/// The canonical commodity-statistics store.
#[derive(Default)]
pub struct GranaryStore {
    pub dimensions: DimensionRegistry,
    pub runs: RunTracker,
    pub bronze: BronzeStore,
    pub observations: ObservationStore,
    pub validation: ValidationTracker,
    pub agents: AgentRegistry,
}

impl GranaryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Job lifecycle ─────────────────────────────────────────────

    pub fn open_run(
        &self,
        source_code: &str,
        job_name: &str,
        agent_id: &str,
        agent_type: &str,
        parameters: Metadata,
    ) -> Result<RunId, GranaryError> {
        let source_id = self.dimensions.require_source(source_code)?;
        Ok(self
            .runs
            .open(source_id, job_name, agent_id, agent_type, parameters))
    }

    pub fn update_counts(&self, run_id: RunId, delta: CountDelta) -> Result<(), GranaryError> {
        self.runs.add_counts(run_id, delta)
    }

    pub fn close_run(
        &self,
        run_id: RunId,
        status: RunStatus,
        error_message: Option<String>,
        error_detail: Option<String>,
    ) -> Result<(), GranaryError> {
        self.runs.close(run_id, status, error_message, error_detail)
    }

    pub fn log_ingest_error(
        &self,
        run_id: RunId,
        error_type: &str,
        message: &str,
        record_key: Option<String>,
        record_data: Option<serde_json::Value>,
        error_code: Option<String>,
    ) -> Result<IngestErrorId, GranaryError> {
        self.runs
            .log_error(run_id, error_type, message, record_key, record_data, error_code)
    }

    // ── Dimensions ────────────────────────────────────────────────

    pub fn get_or_create_series(&self, spec: SeriesSpec) -> Result<SeriesId, GranaryError> {
        self.dimensions.get_or_create_series(spec)
    }

    pub fn series_id(&self, source_code: &str, series_key: &str) -> Option<SeriesId> {
        self.dimensions.series_id(source_code, series_key)
    }

    pub fn convert_units(&self, value: f64, from: &str, to: &str) -> Result<f64, GranaryError> {
        self.dimensions.convert_units(value, from, to)
    }

    // ── Ingestion ─────────────────────────────────────────────────

    /// Upsert a bronze cell after checking the owning run exists.
    pub fn upsert_bronze_cell(
        &self,
        input: CellInput,
    ) -> Result<(CellId, WriteOutcome), GranaryError> {
        if !self.runs.contains(input.run_id) {
            return Err(GranaryError::RunNotFound(input.run_id));
        }
        Ok(self.bronze.upsert_cell(input))
    }

    /// Upsert an observation after checking the series, run, and optional
    /// lineage cell all exist.
    pub fn upsert_observation(
        &self,
        input: ObservationInput,
    ) -> Result<(ObservationId, WriteOutcome), GranaryError> {
        if !self.dimensions.contains_series(input.series_id) {
            return Err(GranaryError::SeriesNotFound(input.series_id));
        }
        if !self.runs.contains(input.run_id) {
            return Err(GranaryError::RunNotFound(input.run_id));
        }
        if let Some(cell_id) = input.raw_cell_id {
            if !self.bronze.contains(cell_id) {
                return Err(GranaryError::CellNotFound(cell_id));
            }
        }
        Ok(self.observations.upsert(input))
    }

    // ── Validation & liveness ─────────────────────────────────────

    #[allow(clippy::too_many_arguments)]
    pub fn set_validation_status(
        &self,
        entity_kind: EntityKind,
        entity_id: Uuid,
        source_code: &str,
        status: ValidationState,
        checker_agent_id: Option<String>,
        checks: Vec<CheckResult>,
        discrepancies: Option<serde_json::Value>,
        notes: Option<String>,
    ) -> Result<ValidationId, GranaryError> {
        let source_id = self.dimensions.require_source(source_code)?;
        Ok(self.validation.set_status(ValidationInput {
            entity_kind,
            entity_id,
            source_id,
            status,
            checker_agent_id,
            checks,
            discrepancies,
            notes,
        }))
    }

    pub fn heartbeat(
        &self,
        agent_id: &str,
        agent_type: &str,
        status: &str,
        current_task: Option<String>,
    ) {
        self.agents.heartbeat(agent_id, agent_type, status, current_task);
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use granary_core::{Frequency, QualityFlag};

    use super::*;

    fn seeded_store() -> GranaryStore {
        let store = GranaryStore::new();
        store
            .dimensions
            .create_data_source("USDA", "US Department of Agriculture", None, None);
        store.dimensions.create_commodity("CORN", "Corn");
        store.dimensions.create_location("US", "United States");
        store
            .dimensions
            .create_unit("MT", "Metric ton", None, 1.0)
            .unwrap();
        store
            .dimensions
            .create_unit("KMT", "Thousand metric tons", Some("MT"), 1_000.0)
            .unwrap();
        store
    }

    fn corn_series(store: &GranaryStore) -> SeriesId {
        store
            .get_or_create_series(SeriesSpec {
                source_code: "USDA".to_string(),
                series_key: "corn/us/production".to_string(),
                name: "Corn production, United States".to_string(),
                commodity_code: Some("CORN".to_string()),
                location_code: Some("US".to_string()),
                unit_code: Some("KMT".to_string()),
                frequency: Frequency::Monthly,
                metadata: Metadata::new(),
            })
            .unwrap()
    }

    #[test]
    fn test_open_run_requires_seeded_source() {
        let store = seeded_store();
        assert!(store
            .open_run("USDA", "wasde_monthly_ingest", "c-01", "collector", Metadata::new())
            .is_ok());
        assert!(matches!(
            store.open_run("EIA", "job", "c-01", "collector", Metadata::new()),
            Err(GranaryError::ReferenceNotFound { .. })
        ));
    }

    #[test]
    fn test_full_collector_pass() {
        let store = seeded_store();
        let series = corn_series(&store);
        let run = store
            .open_run("USDA", "wasde_monthly_ingest", "c-01", "collector", Metadata::new())
            .unwrap();

        // Bronze cells straight from the report table.
        let mut cell_ids = Vec::new();
        for (row, text) in [("r01", "2,131"), ("r02", "NA"), ("r03", "14,900")] {
            let (id, outcome) = store
                .upsert_bronze_cell(CellInput {
                    release_id: "wasde-2026-07".to_string(),
                    table_id: "t01".to_string(),
                    row_id: row.to_string(),
                    column_id: "c02".to_string(),
                    value_text: text.to_string(),
                    row_label: None,
                    row_category: None,
                    period_label: Some("2025/26".to_string()),
                    run_id: run,
                })
                .unwrap();
            assert_eq!(outcome, WriteOutcome::Inserted);
            cell_ids.push(id);
        }
        store
            .update_counts(
                run,
                CountDelta {
                    fetched: 3,
                    inserted: 3,
                    ..Default::default()
                },
            )
            .unwrap();

        // Normalize the numeric cells into observations with lineage.
        let time = Utc.with_ymd_and_hms(2026, 7, 1, 0, 0, 0).unwrap();
        let mut input = ObservationInput::new(series, time, 2_131.0, run);
        input.raw_cell_id = Some(cell_ids[0]);
        let (obs_id, _) = store.upsert_observation(input).unwrap();

        store
            .close_run(run, RunStatus::Success, None, None)
            .unwrap();

        let view = store.runs.get(run).unwrap().view();
        assert_eq!(view.status, RunStatus::Success);
        assert_eq!(view.fetched, 3);

        let obs = store.observations.get(obs_id).unwrap();
        assert!(obs.is_latest);
        assert_eq!(obs.raw_cell_id, Some(cell_ids[0]));
    }

    #[test]
    fn test_revision_scenario() {
        let store = seeded_store();
        let series = corn_series(&store);
        let run = store
            .open_run("USDA", "wasde_monthly_ingest", "c-01", "collector", Metadata::new())
            .unwrap();
        let time = Utc.with_ymd_and_hms(2026, 7, 1, 0, 0, 0).unwrap();

        let (rev0, _) = store
            .upsert_observation(ObservationInput::new(series, time, 100.0, run))
            .unwrap();
        let (rev1, _) = store
            .upsert_observation(ObservationInput::new(series, time, 105.0, run).revision(1))
            .unwrap();

        let original = store.observations.get(rev0).unwrap();
        assert!(!original.is_latest);
        assert!(original.superseded_at.is_some());

        let corrected = store.observations.get(rev1).unwrap();
        assert!(corrected.is_latest);
        assert_eq!(corrected.value, 105.0);
    }

    #[test]
    fn test_observation_referential_checks() {
        let store = seeded_store();
        let series = corn_series(&store);
        let run = store
            .open_run("USDA", "job", "c-01", "collector", Metadata::new())
            .unwrap();
        let time = Utc.with_ymd_and_hms(2026, 7, 1, 0, 0, 0).unwrap();

        assert!(matches!(
            store.upsert_observation(ObservationInput::new(Uuid::new_v4(), time, 1.0, run)),
            Err(GranaryError::SeriesNotFound(_))
        ));
        assert!(matches!(
            store.upsert_observation(ObservationInput::new(series, time, 1.0, Uuid::new_v4())),
            Err(GranaryError::RunNotFound(_))
        ));
    }

    #[test]
    fn test_failed_run_leaves_committed_data_intact() {
        let store = seeded_store();
        let series = corn_series(&store);
        let run = store
            .open_run("USDA", "job", "c-01", "collector", Metadata::new())
            .unwrap();
        let time = Utc.with_ymd_and_hms(2026, 7, 1, 0, 0, 0).unwrap();

        store
            .upsert_observation(ObservationInput::new(series, time, 100.0, run))
            .unwrap();
        store
            .log_ingest_error(run, "http", "fetch timed out", None, None, None)
            .unwrap();
        store
            .close_run(
                run,
                RunStatus::Failed,
                Some("fetch timed out".to_string()),
                None,
            )
            .unwrap();

        // The committed observation survives the failed run untouched.
        let latest = store.observations.latest(series, time).unwrap();
        assert_eq!(latest.value, 100.0);
        assert!(latest.is_latest);
        assert_eq!(store.runs.get(run).unwrap().view().failed, 1);
    }

    #[test]
    fn test_validation_resolves_source_code() {
        let store = seeded_store();
        let series = corn_series(&store);

        let id = store
            .set_validation_status(
                EntityKind::Series,
                series,
                "USDA",
                ValidationState::Passed,
                Some("validator-01".to_string()),
                vec![CheckResult {
                    check_name: "value_in_range".to_string(),
                    passed: true,
                    message: None,
                }],
                None,
                None,
            )
            .unwrap();
        assert!(store.validation.get(id).unwrap().validated_at.is_some());

        assert!(matches!(
            store.set_validation_status(
                EntityKind::Series,
                series,
                "EIA",
                ValidationState::Passed,
                None,
                Vec::new(),
                None,
                None,
            ),
            Err(GranaryError::ReferenceNotFound { .. })
        ));
    }

    #[test]
    fn test_quality_flag_change_is_not_idempotent() {
        let store = seeded_store();
        let series = corn_series(&store);
        let run = store
            .open_run("USDA", "job", "c-01", "collector", Metadata::new())
            .unwrap();
        let time = Utc.with_ymd_and_hms(2026, 7, 1, 0, 0, 0).unwrap();

        let (id, _) = store
            .upsert_observation(ObservationInput::new(series, time, 100.0, run))
            .unwrap();
        let (id2, outcome) = store
            .upsert_observation(
                ObservationInput::new(series, time, 100.0, run).quality(QualityFlag::Suspect),
            )
            .unwrap();
        assert_eq!(id, id2);
        assert_eq!(outcome, WriteOutcome::Updated);
        assert_eq!(store.observations.get(id).unwrap().quality, QualityFlag::Suspect);
    }
}
