//! Job lifecycle tracker — one [`IngestRun`] per collector job execution,
//! with atomic progress counters and a per-run error log.
//!
//! Counters use `AtomicU64` for lock-free commutative increments from
//! concurrent tasks of the same job. Completion fields use `RwLock` since
//! they change once, at the single terminal close.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use granary_core::{GranaryError, IngestErrorId, Metadata, RunId, RunStatus, SourceId};

// ── Run row ──────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct IngestRun {
    pub id: RunId,
    pub source_id: SourceId,
    pub job_name: String,
    pub agent_id: String,
    pub agent_type: String,
    pub parameters: Metadata,
    pub status: RwLock<RunStatus>,
    pub fetched: AtomicU64,
    pub inserted: AtomicU64,
    pub updated: AtomicU64,
    pub skipped: AtomicU64,
    pub failed: AtomicU64,
    pub started_at: DateTime<Utc>,
    pub completed_at: RwLock<Option<DateTime<Utc>>>,
    pub error_message: RwLock<Option<String>>,
    pub error_detail: RwLock<Option<String>>,
}

/// Commutative counter increments. Safe to apply repeatedly and
/// concurrently; the stored totals are the exact sum of all deltas.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CountDelta {
    #[serde(default)]
    pub fetched: u64,
    #[serde(default)]
    pub inserted: u64,
    #[serde(default)]
    pub updated: u64,
    #[serde(default)]
    pub skipped: u64,
    #[serde(default)]
    pub failed: u64,
}

/// Plain serializable view of a run — the persisted/API shape.
/// (`IngestRun` itself holds atomics and locks, which don't serialize.)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunView {
    pub id: RunId,
    pub source_id: SourceId,
    pub job_name: String,
    pub agent_id: String,
    pub agent_type: String,
    pub parameters: Metadata,
    pub status: RunStatus,
    pub fetched: u64,
    pub inserted: u64,
    pub updated: u64,
    pub skipped: u64,
    pub failed: u64,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub error_detail: Option<String>,
}

impl IngestRun {
    pub fn view(&self) -> RunView {
        RunView {
            id: self.id,
            source_id: self.source_id,
            job_name: self.job_name.clone(),
            agent_id: self.agent_id.clone(),
            agent_type: self.agent_type.clone(),
            parameters: self.parameters.clone(),
            status: *self.status.read().unwrap(),
            fetched: self.fetched.load(Ordering::Relaxed),
            inserted: self.inserted.load(Ordering::Relaxed),
            updated: self.updated.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            started_at: self.started_at,
            completed_at: *self.completed_at.read().unwrap(),
            error_message: self.error_message.read().unwrap().clone(),
            error_detail: self.error_detail.read().unwrap().clone(),
        }
    }

    fn from_view(view: RunView) -> Self {
        Self {
            id: view.id,
            source_id: view.source_id,
            job_name: view.job_name,
            agent_id: view.agent_id,
            agent_type: view.agent_type,
            parameters: view.parameters,
            status: RwLock::new(view.status),
            fetched: AtomicU64::new(view.fetched),
            inserted: AtomicU64::new(view.inserted),
            updated: AtomicU64::new(view.updated),
            skipped: AtomicU64::new(view.skipped),
            failed: AtomicU64::new(view.failed),
            started_at: view.started_at,
            completed_at: RwLock::new(view.completed_at),
            error_message: RwLock::new(view.error_message),
            error_detail: RwLock::new(view.error_detail),
        }
    }
}

// ── Error log ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestErrorRecord {
    pub id: IngestErrorId,
    pub run_id: RunId,
    pub error_type: String,
    pub message: String,
    pub record_key: Option<String>,
    pub record_data: Option<serde_json::Value>,
    pub error_code: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

// ── Snapshot shape ───────────────────────────────────────────────────

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RunsSnapshot {
    pub runs: Vec<RunView>,
    pub errors: Vec<IngestErrorRecord>,
}

// ── Tracker ──────────────────────────────────────────────────────────

/// In-memory store of active and historical runs, insertion-ordered
/// (newest last) with O(1) lookup by id.
#[derive(Default)]
pub struct RunTracker {
    runs: RwLock<IndexMap<RunId, Arc<IngestRun>>>,
    errors: RwLock<IndexMap<IngestErrorId, IngestErrorRecord>>,
}

impl RunTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a run in `running` state. The data source is already resolved
    /// by the caller (the registry owns code resolution).
    pub fn open(
        &self,
        source_id: SourceId,
        job_name: &str,
        agent_id: &str,
        agent_type: &str,
        parameters: Metadata,
    ) -> RunId {
        let id = Uuid::new_v4();
        let run = Arc::new(IngestRun {
            id,
            source_id,
            job_name: job_name.to_string(),
            agent_id: agent_id.to_string(),
            agent_type: agent_type.to_string(),
            parameters,
            status: RwLock::new(RunStatus::Running),
            fetched: AtomicU64::new(0),
            inserted: AtomicU64::new(0),
            updated: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            started_at: Utc::now(),
            completed_at: RwLock::new(None),
            error_message: RwLock::new(None),
            error_detail: RwLock::new(None),
        });
        self.runs.write().unwrap().insert(id, run);
        info!(run_id = %id, job = %job_name, agent = %agent_id, "opened ingest run");
        id
    }

    pub fn get(&self, run_id: RunId) -> Option<Arc<IngestRun>> {
        self.runs.read().unwrap().get(&run_id).cloned()
    }

    pub fn contains(&self, run_id: RunId) -> bool {
        self.runs.read().unwrap().contains_key(&run_id)
    }

    fn require(&self, run_id: RunId) -> Result<Arc<IngestRun>, GranaryError> {
        self.get(run_id).ok_or(GranaryError::RunNotFound(run_id))
    }

    /// Apply counter deltas as atomic adds — never a read-modify-write.
    pub fn add_counts(&self, run_id: RunId, delta: CountDelta) -> Result<(), GranaryError> {
        let run = self.require(run_id)?;
        run.fetched.fetch_add(delta.fetched, Ordering::Relaxed);
        run.inserted.fetch_add(delta.inserted, Ordering::Relaxed);
        run.updated.fetch_add(delta.updated, Ordering::Relaxed);
        run.skipped.fetch_add(delta.skipped, Ordering::Relaxed);
        run.failed.fetch_add(delta.failed, Ordering::Relaxed);
        Ok(())
    }

    /// Close a run exactly once with a terminal status. A second close is
    /// rejected with `RunAlreadyClosed`; the first terminal state wins.
    pub fn close(
        &self,
        run_id: RunId,
        status: RunStatus,
        error_message: Option<String>,
        error_detail: Option<String>,
    ) -> Result<(), GranaryError> {
        if !status.is_terminal() {
            return Err(GranaryError::NonTerminalClose(status));
        }
        let run = self.require(run_id)?;

        // The status lock is held across check-and-set so two racing
        // closers cannot both observe `running`.
        let mut current = run.status.write().unwrap();
        if current.is_terminal() {
            return Err(GranaryError::RunAlreadyClosed(run_id));
        }
        *current = status;
        *run.completed_at.write().unwrap() = Some(Utc::now());
        *run.error_message.write().unwrap() = error_message;
        *run.error_detail.write().unwrap() = error_detail;
        info!(run_id = %run_id, status = %status, "closed ingest run");
        Ok(())
    }

    /// Append an error record and bump the run's failed counter by one —
    /// the only operation that mutates counters as a side effect.
    #[allow(clippy::too_many_arguments)]
    pub fn log_error(
        &self,
        run_id: RunId,
        error_type: &str,
        message: &str,
        record_key: Option<String>,
        record_data: Option<serde_json::Value>,
        error_code: Option<String>,
    ) -> Result<IngestErrorId, GranaryError> {
        let run = self.require(run_id)?;
        let id = Uuid::new_v4();
        let record = IngestErrorRecord {
            id,
            run_id,
            error_type: error_type.to_string(),
            message: message.to_string(),
            record_key,
            record_data,
            error_code,
            occurred_at: Utc::now(),
        };
        self.errors.write().unwrap().insert(id, record);
        run.failed.fetch_add(1, Ordering::Relaxed);
        Ok(id)
    }

    pub fn errors_for(&self, run_id: RunId) -> Vec<IngestErrorRecord> {
        self.errors
            .read()
            .unwrap()
            .values()
            .filter(|e| e.run_id == run_id)
            .cloned()
            .collect()
    }

    /// Recent runs as plain views, newest last, bounded by `limit`.
    pub fn recent(&self, limit: usize) -> Vec<RunView> {
        let runs = self.runs.read().unwrap();
        let skip = runs.len().saturating_sub(limit);
        runs.values().skip(skip).map(|r| r.view()).collect()
    }

    /// Close runs abandoned in `running` longer than `max_age` as failed.
    /// Collectors have no built-in timeout; a crashed process leaves its
    /// run open until this sweep closes it. Returns the reaped ids.
    pub fn reap_stale(&self, max_age: Duration) -> Vec<RunId> {
        let cutoff = Utc::now() - max_age;
        let candidates: Vec<Arc<IngestRun>> = {
            let runs = self.runs.read().unwrap();
            runs.values()
                .filter(|r| r.started_at < cutoff)
                .cloned()
                .collect()
        };

        let mut reaped = Vec::new();
        for run in candidates {
            let mut status = run.status.write().unwrap();
            if status.is_terminal() {
                continue;
            }
            *status = RunStatus::Failed;
            *run.completed_at.write().unwrap() = Some(Utc::now());
            *run.error_message.write().unwrap() =
                Some(format!("reaped: still running after {}m", max_age.num_minutes()));
            warn!(run_id = %run.id, job = %run.job_name, "reaped stale run");
            reaped.push(run.id);
        }
        reaped
    }

    // ── Snapshot ──────────────────────────────────────────────────

    pub fn export(&self) -> RunsSnapshot {
        RunsSnapshot {
            runs: self.runs.read().unwrap().values().map(|r| r.view()).collect(),
            errors: self.errors.read().unwrap().values().cloned().collect(),
        }
    }

    pub fn restore(&self, snapshot: RunsSnapshot) {
        let mut runs = self.runs.write().unwrap();
        runs.clear();
        for view in snapshot.runs {
            runs.insert(view.id, Arc::new(IngestRun::from_view(view)));
        }
        let mut errors = self.errors.write().unwrap();
        errors.clear();
        for record in snapshot.errors {
            errors.insert(record.id, record);
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
