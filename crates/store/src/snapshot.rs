//! Filesystem-backed store persistence.
//!
//! Manages the `data/granary/` directory structure:
//! ```text
//! granary/
//!   manifest.json       <- saved-at timestamp + row counts
//!   dimensions.json     <- reference rows + series
//!   runs.json           <- run views + error log
//!   bronze.json         <- raw cells
//!   observations.json   <- revisioned facts
//!   validation.json     <- verdicts
//!   agents.json         <- heartbeats
//! ```
//! Each file is written to a `.tmp` sibling and renamed into place, so a
//! crash mid-flush leaves the previous snapshot intact.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::store::GranaryStore;

/// Errors produced by [`SnapshotStore`] operations.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Row counts and timestamp of the last flush.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotManifest {
    pub saved_at: DateTime<Utc>,
    pub series: usize,
    pub runs: usize,
    pub bronze_cells: usize,
    pub observations: usize,
    pub verdicts: usize,
    pub agents: usize,
}

pub struct SnapshotStore {
    base_dir: PathBuf,
}

impl SnapshotStore {
    /// Create a new SnapshotStore, ensuring the directory exists.
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self, SnapshotError> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn write_file<T: Serialize>(&self, name: &str, value: &T) -> Result<(), SnapshotError> {
        let path = self.base_dir.join(name);
        let tmp = self.base_dir.join(format!("{name}.tmp"));
        let json = serde_json::to_string_pretty(value)?;
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn read_file<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, SnapshotError> {
        let path = self.base_dir.join(name);
        if !path.exists() {
            return Ok(None);
        }
        let json = std::fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    /// Flush every table to disk.
    pub fn save(&self, store: &GranaryStore) -> Result<SnapshotManifest, SnapshotError> {
        let dimensions = store.dimensions.export();
        let runs = store.runs.export();
        let bronze = store.bronze.export();
        let observations = store.observations.export();
        let validation = store.validation.export();
        let agents = store.agents.export();

        let manifest = SnapshotManifest {
            saved_at: Utc::now(),
            series: dimensions.series.len(),
            runs: runs.runs.len(),
            bronze_cells: bronze.len(),
            observations: observations.len(),
            verdicts: validation.len(),
            agents: agents.len(),
        };

        self.write_file("dimensions.json", &dimensions)?;
        self.write_file("runs.json", &runs)?;
        self.write_file("bronze.json", &bronze)?;
        self.write_file("observations.json", &observations)?;
        self.write_file("validation.json", &validation)?;
        self.write_file("agents.json", &agents)?;
        self.write_file("manifest.json", &manifest)?;

        info!(
            series = manifest.series,
            runs = manifest.runs,
            observations = manifest.observations,
            "snapshot flushed"
        );
        Ok(manifest)
    }

    /// Load a snapshot into `store`, replacing its contents. Missing
    /// files are tolerated (fresh or partially-written data dir).
    pub fn load(&self, store: &GranaryStore) -> Result<Option<SnapshotManifest>, SnapshotError> {
        let manifest: Option<SnapshotManifest> = self.read_file("manifest.json")?;

        if let Some(dimensions) = self.read_file("dimensions.json")? {
            store.dimensions.restore(dimensions);
        }
        if let Some(runs) = self.read_file("runs.json")? {
            store.runs.restore(runs);
        }
        if let Some(bronze) = self.read_file("bronze.json")? {
            store.bronze.restore(bronze);
        }
        if let Some(observations) = self.read_file("observations.json")? {
            store.observations.restore(observations);
        }
        if let Some(validation) = self.read_file("validation.json")? {
            store.validation.restore(validation);
        }
        if let Some(agents) = self.read_file("agents.json")? {
            store.agents.restore(agents);
        }

        if let Some(ref m) = manifest {
            info!(
                saved_at = %m.saved_at,
                series = m.series,
                observations = m.observations,
                "snapshot loaded"
            );
        }
        Ok(manifest)
    }

    pub fn manifest(&self) -> Result<Option<SnapshotManifest>, SnapshotError> {
        self.read_file("manifest.json")
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use granary_core::{Frequency, Metadata};

    use crate::dimensions::SeriesSpec;
    use crate::observations::ObservationInput;

    use super::*;

    fn populated_store() -> GranaryStore {
        let store = GranaryStore::new();
        store
            .dimensions
            .create_data_source("USDA", "US Department of Agriculture", None, None);
        let series_id = store
            .dimensions
            .get_or_create_series(SeriesSpec {
                source_code: "USDA".to_string(),
                series_key: "corn/us/production".to_string(),
                name: "Corn production".to_string(),
                commodity_code: None,
                location_code: None,
                unit_code: None,
                frequency: Frequency::Monthly,
                metadata: Metadata::new(),
            })
            .unwrap();
        let run_id = store
            .open_run("USDA", "wasde_monthly_ingest", "collector-01", "collector", Metadata::new())
            .unwrap();
        store
            .observations
            .upsert(ObservationInput::new(series_id, Utc::now(), 100.0, run_id));
        store.agents.heartbeat("collector-01", "collector", "alive", None);
        store
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let snapshots = SnapshotStore::new(dir.path().join("granary")).unwrap();

        let store = populated_store();
        let manifest = snapshots.save(&store).unwrap();
        assert_eq!(manifest.series, 1);
        assert_eq!(manifest.runs, 1);
        assert_eq!(manifest.observations, 1);

        let restored = GranaryStore::new();
        let loaded = snapshots.load(&restored).unwrap().unwrap();
        assert_eq!(loaded.observations, 1);
        assert_eq!(
            restored.dimensions.series_id("USDA", "corn/us/production"),
            store.dimensions.series_id("USDA", "corn/us/production")
        );
        assert_eq!(restored.agents.get("collector-01").unwrap().status, "alive");
    }

    #[test]
    fn test_load_from_empty_dir_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let snapshots = SnapshotStore::new(dir.path().join("granary")).unwrap();
        let store = GranaryStore::new();
        assert!(snapshots.load(&store).unwrap().is_none());
    }

    #[test]
    fn test_save_overwrites_previous_flush() {
        let dir = tempfile::tempdir().unwrap();
        let snapshots = SnapshotStore::new(dir.path().join("granary")).unwrap();

        let store = populated_store();
        snapshots.save(&store).unwrap();
        store.agents.heartbeat("validator-01", "validator", "alive", None);
        let manifest = snapshots.save(&store).unwrap();
        assert_eq!(manifest.agents, 2);
        assert_eq!(snapshots.manifest().unwrap().unwrap().agents, 2);
    }
}
