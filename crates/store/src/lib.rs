//! Canonical ingestion store for time-varying commodity statistics.
//!
//! Collectors open an ingest run, write source-faithful bronze cells and
//! revisioned observations (each idempotent), and close the run with a
//! terminal status. Validators record verdicts against committed data, and
//! every long-running agent heartbeats. All tables live in process behind
//! their own locks; [`snapshot`] persists them as JSON under a data dir.

pub mod bronze;
pub mod dimensions;
pub mod liveness;
pub mod observations;
pub mod runs;
pub mod seed;
pub mod snapshot;
pub mod store;
pub mod validation;

pub use bronze::{BronzeCell, BronzeStore, CellInput};
pub use dimensions::{DimensionRegistry, Series, SeriesSpec, Unit};
pub use liveness::{AgentRegistry, AgentStatusView};
pub use observations::{Observation, ObservationInput, ObservationStore};
pub use runs::{CountDelta, IngestErrorRecord, IngestRun, RunTracker, RunView};
pub use seed::SeedFile;
pub use snapshot::SnapshotStore;
pub use store::GranaryStore;
pub use validation::{CheckResult, ValidationInput, ValidationRecord, ValidationTracker};
