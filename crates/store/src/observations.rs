//! Observation store — the canonical (series, time, revision) fact table
//! with a maintained is_latest pointer per (series, time).
//!
//! The demote-then-insert sequence of an upsert must be serialized per
//! (series, time): two callers racing competing revisions for one pair
//! must never both end up latest. Serialization is a per-pair lock table,
//! acquired for the whole compare/demote/insert sequence — the data map's
//! own `RwLock` only protects the maps, it is not the serialization
//! mechanism.
//!
//! Rows are never deleted. Supersession flips `is_latest` and stamps
//! `superseded_at`, preserving the full revision history for lineage.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use granary_core::{CellId, Metadata, ObservationId, QualityFlag, RunId, SeriesId, WriteOutcome};

// ── Rows ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub id: ObservationId,
    pub series_id: SeriesId,
    pub observation_time: DateTime<Utc>,
    /// 0 is the first publication; N > 0 is a correction. Insertion order
    /// is caller-determined, not time-determined.
    pub revision: u32,
    pub value: f64,
    pub is_latest: bool,
    pub superseded_at: Option<DateTime<Utc>>,
    pub quality: QualityFlag,
    pub is_estimated: bool,
    pub is_forecast: bool,
    pub is_preliminary: bool,
    /// Lineage pointer to the bronze cell this value was normalized from.
    pub raw_cell_id: Option<CellId>,
    pub run_id: RunId,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for [`ObservationStore::upsert`].
#[derive(Debug, Clone)]
pub struct ObservationInput {
    pub series_id: SeriesId,
    pub observation_time: DateTime<Utc>,
    pub value: f64,
    pub run_id: RunId,
    pub revision: u32,
    pub quality: QualityFlag,
    pub is_estimated: bool,
    pub is_forecast: bool,
    pub is_preliminary: bool,
    pub raw_cell_id: Option<CellId>,
    pub metadata: Metadata,
}

impl ObservationInput {
    /// A first-publication (revision 0) input with default flags.
    pub fn new(
        series_id: SeriesId,
        observation_time: DateTime<Utc>,
        value: f64,
        run_id: RunId,
    ) -> Self {
        Self {
            series_id,
            observation_time,
            value,
            run_id,
            revision: 0,
            quality: QualityFlag::Good,
            is_estimated: false,
            is_forecast: false,
            is_preliminary: false,
            raw_cell_id: None,
            metadata: Metadata::new(),
        }
    }

    pub fn revision(mut self, revision: u32) -> Self {
        self.revision = revision;
        self
    }

    pub fn quality(mut self, quality: QualityFlag) -> Self {
        self.quality = quality;
        self
    }

    fn same_value_and_flags(&self, row: &Observation) -> bool {
        row.value == self.value
            && row.quality == self.quality
            && row.is_estimated == self.is_estimated
            && row.is_forecast == self.is_forecast
            && row.is_preliminary == self.is_preliminary
    }
}

type PairKey = (SeriesId, DateTime<Utc>);

// ── Store ────────────────────────────────────────────────────────────

#[derive(Default)]
struct ObsTable {
    rows: HashMap<ObservationId, Observation>,
    /// series → time → revision → row id. The inner maps are ordered so
    /// range reads and max-revision checks are direct.
    by_series: HashMap<SeriesId, BTreeMap<DateTime<Utc>, BTreeMap<u32, ObservationId>>>,
}

impl ObsTable {
    fn revisions(&self, key: &PairKey) -> Option<&BTreeMap<u32, ObservationId>> {
        self.by_series.get(&key.0).and_then(|s| s.get(&key.1))
    }
}

/// Thread-safe revisioned observation store.
#[derive(Default)]
pub struct ObservationStore {
    table: RwLock<ObsTable>,
    /// Per-(series, time) serialization points for the upsert sequence.
    pair_locks: Mutex<HashMap<PairKey, Arc<Mutex<()>>>>,
}

impl ObservationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn pair_lock(&self, key: PairKey) -> Arc<Mutex<()>> {
        let mut locks = self.pair_locks.lock().unwrap();
        locks
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Upsert one observation revision as a single serialized unit per
    /// (series, time):
    ///
    /// 1. an exact-key row with the same value and flags is returned
    ///    unchanged (idempotence — no write);
    /// 2. every existing latest row with a lower revision is demoted
    ///    (`is_latest = false`, `superseded_at` stamped) — all matches,
    ///    defensively, not just the expected single one;
    /// 3. the row is inserted latest, or updated in place when the exact
    ///    key exists with different value/flags. A row arriving below an
    ///    already-present higher revision comes in pre-superseded, so the
    ///    invariant holds for out-of-order arrivals.
    pub fn upsert(&self, input: ObservationInput) -> (ObservationId, WriteOutcome) {
        let key = (input.series_id, input.observation_time);
        let lock = self.pair_lock(key);
        let _guard = lock.lock().unwrap();

        // Fast path under the read lock: identical row already present.
        {
            let table = self.table.read().unwrap();
            if let Some(&id) = table.revisions(&key).and_then(|r| r.get(&input.revision)) {
                let row = &table.rows[&id];
                if input.same_value_and_flags(row) {
                    return (id, WriteOutcome::Unchanged);
                }
            }
        }

        let mut table = self.table.write().unwrap();
        let now = Utc::now();

        // Demote-then-insert. The source system leaned on a database
        // trigger for this; here it is an explicit step inside the same
        // serialized unit and must never be skipped.
        if input.revision > 0 {
            let demote: Vec<ObservationId> = table
                .revisions(&key)
                .map(|revs| {
                    revs.range(..input.revision)
                        .map(|(_, &id)| id)
                        .filter(|id| table.rows[id].is_latest)
                        .collect()
                })
                .unwrap_or_default();
            for id in demote {
                let row = table.rows.get_mut(&id).unwrap();
                row.is_latest = false;
                row.superseded_at = Some(now);
                debug!(observation = %id, revision = row.revision, "demoted superseded revision");
            }
        }

        let highest_existing = table
            .revisions(&key)
            .and_then(|revs| revs.keys().next_back().copied());

        if let Some(&id) = table.revisions(&key).and_then(|r| r.get(&input.revision)) {
            // Exact key exists with different value/flags: update in place.
            // Its latest-ness is untouched — revisions above it still win.
            let row = table.rows.get_mut(&id).unwrap();
            row.value = input.value;
            row.quality = input.quality;
            row.is_estimated = input.is_estimated;
            row.is_forecast = input.is_forecast;
            row.is_preliminary = input.is_preliminary;
            row.raw_cell_id = input.raw_cell_id.or(row.raw_cell_id);
            row.run_id = input.run_id;
            row.metadata = input.metadata;
            row.updated_at = now;
            return (id, WriteOutcome::Updated);
        }

        let is_latest = highest_existing.map_or(true, |high| input.revision > high);
        let id = Uuid::new_v4();
        let row = Observation {
            id,
            series_id: input.series_id,
            observation_time: input.observation_time,
            revision: input.revision,
            value: input.value,
            is_latest,
            superseded_at: if is_latest { None } else { Some(now) },
            quality: input.quality,
            is_estimated: input.is_estimated,
            is_forecast: input.is_forecast,
            is_preliminary: input.is_preliminary,
            raw_cell_id: input.raw_cell_id,
            run_id: input.run_id,
            metadata: input.metadata,
            created_at: now,
            updated_at: now,
        };
        table.rows.insert(id, row);
        table
            .by_series
            .entry(key.0)
            .or_default()
            .entry(key.1)
            .or_default()
            .insert(input.revision, id);
        (id, WriteOutcome::Inserted)
    }

    pub fn get(&self, id: ObservationId) -> Option<Observation> {
        self.table.read().unwrap().rows.get(&id).cloned()
    }

    /// The currently-authoritative revision for a (series, time) pair.
    pub fn latest(&self, series_id: SeriesId, time: DateTime<Utc>) -> Option<Observation> {
        let table = self.table.read().unwrap();
        let revs = table.revisions(&(series_id, time))?;
        revs.values()
            .map(|id| &table.rows[id])
            .find(|row| row.is_latest)
            .cloned()
    }

    /// Full revision trail of a pair, ascending by revision.
    pub fn history(&self, series_id: SeriesId, time: DateTime<Utc>) -> Vec<Observation> {
        let table = self.table.read().unwrap();
        table
            .revisions(&(series_id, time))
            .map(|revs| revs.values().map(|id| table.rows[id].clone()).collect())
            .unwrap_or_default()
    }

    /// Latest rows of a series over a time range — the read-only consumer
    /// query. Only `is_latest` rows are returned, ascending by time.
    pub fn latest_range(
        &self,
        series_id: SeriesId,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Vec<Observation> {
        let table = self.table.read().unwrap();
        let Some(times) = table.by_series.get(&series_id) else {
            return Vec::new();
        };
        let lo = from.unwrap_or(DateTime::<Utc>::MIN_UTC);
        let hi = to.unwrap_or(DateTime::<Utc>::MAX_UTC);
        times
            .range(lo..=hi)
            .filter_map(|(_, revs)| {
                revs.values()
                    .map(|id| &table.rows[id])
                    .find(|row| row.is_latest)
                    .cloned()
            })
            .collect()
    }

    // ── Snapshot ──────────────────────────────────────────────────

    pub fn export(&self) -> Vec<Observation> {
        self.table.read().unwrap().rows.values().cloned().collect()
    }

    pub fn restore(&self, rows: Vec<Observation>) {
        let mut table = self.table.write().unwrap();
        *table = ObsTable::default();
        for row in rows {
            table
                .by_series
                .entry(row.series_id)
                .or_default()
                .entry(row.observation_time)
                .or_default()
                .insert(row.revision, row.id);
            table.rows.insert(row.id, row);
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
