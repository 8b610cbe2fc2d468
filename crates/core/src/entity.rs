use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type SourceId = Uuid;
pub type CommodityId = Uuid;
pub type LocationId = Uuid;
pub type UnitId = Uuid;
pub type SeriesId = Uuid;
pub type RunId = Uuid;
pub type CellId = Uuid;
pub type ObservationId = Uuid;
pub type IngestErrorId = Uuid;
pub type ValidationId = Uuid;

/// Free-form key/value metadata attached to series, runs, and observations.
///
/// The expected keys are documented per entity (e.g. `marketing_year`,
/// `report_code`, `page` for series) but never enforced — sources attach
/// whatever context they have.
pub type Metadata = IndexMap<String, serde_json::Value>;

/// Reference entity kinds resolvable by short code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DimensionKind {
    DataSource,
    Commodity,
    Location,
    Unit,
    Series,
}

impl std::fmt::Display for DimensionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DimensionKind::DataSource => write!(f, "data source"),
            DimensionKind::Commodity => write!(f, "commodity"),
            DimensionKind::Location => write!(f, "location"),
            DimensionKind::Unit => write!(f, "unit"),
            DimensionKind::Series => write!(f, "series"),
        }
    }
}

/// Entity kinds a validation verdict can attach to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Series,
    Observation,
    BronzeCell,
    Release,
    Run,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Series => write!(f, "series"),
            EntityKind::Observation => write!(f, "observation"),
            EntityKind::BronzeCell => write!(f, "bronze_cell"),
            EntityKind::Release => write!(f, "release"),
            EntityKind::Run => write!(f, "run"),
        }
    }
}

/// Lifecycle state of an ingest run: `Running` until the single terminal
/// close, then one of `Success`/`Failed`/`Partial` forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Success,
    Failed,
    Partial,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Running => write!(f, "running"),
            RunStatus::Success => write!(f, "success"),
            RunStatus::Failed => write!(f, "failed"),
            RunStatus::Partial => write!(f, "partial"),
        }
    }
}

/// Publication cadence of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Annual,
    Monthly,
    Weekly,
    Daily,
    Irregular,
}

impl Default for Frequency {
    fn default() -> Self {
        Self::Irregular
    }
}

/// Quality flag carried by every observation revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityFlag {
    Good,
    Suspect,
    Missing,
    Estimated,
    Interpolated,
}

impl Default for QualityFlag {
    fn default() -> Self {
        Self::Good
    }
}

/// Validation verdict state. `validated_at` is stamped only when the
/// state is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationState {
    Pending,
    InProgress,
    Passed,
    Failed,
    PassedWithWarnings,
}

impl ValidationState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ValidationState::Passed
                | ValidationState::Failed
                | ValidationState::PassedWithWarnings
        )
    }
}

/// Read-time health classification of an agent heartbeat. Never stored —
/// always derived from elapsed time since the last beat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentHealth {
    Healthy,
    Warning,
    Stale,
}

impl std::fmt::Display for AgentHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentHealth::Healthy => write!(f, "healthy"),
            AgentHealth::Warning => write!(f, "warning"),
            AgentHealth::Stale => write!(f, "stale"),
        }
    }
}

/// What a write operation actually did, so callers can keep accurate
/// inserted/updated/skipped counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteOutcome {
    Inserted,
    Updated,
    Unchanged,
}

// ── Tests ────────────────────────────────────────────────────────────
