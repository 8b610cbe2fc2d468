//! Raw record ("bronze") store — source-faithful cell values keyed by
//! their natural key within a release, with best-effort numeric parsing.
//!
//! Non-numeric source text ("NA", "-", footnote markers) is expected, not
//! exceptional: the cell keeps the exact text with `is_numeric = false`
//! and ingestion proceeds. Re-submitting unchanged text is a strict no-op.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use granary_core::{CellId, RunId, WriteOutcome};

// ── Rows ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BronzeCell {
    pub id: CellId,
    /// Owning release/document identifier (e.g. "wasde-2026-07").
    pub release_id: String,
    pub table_id: String,
    pub row_id: String,
    pub column_id: String,
    /// Exact source text, always kept verbatim.
    pub value_text: String,
    pub value: Option<f64>,
    pub is_numeric: bool,
    pub parse_note: Option<String>,
    pub row_label: Option<String>,
    pub row_category: Option<String>,
    pub period_label: Option<String>,
    /// Run that last wrote this cell.
    pub run_id: RunId,
    pub first_seen: DateTime<Utc>,
    pub last_changed: DateTime<Utc>,
}

/// Input for [`BronzeStore::upsert_cell`].
#[derive(Debug, Clone, Default)]
pub struct CellInput {
    pub release_id: String,
    pub table_id: String,
    pub row_id: String,
    pub column_id: String,
    pub value_text: String,
    pub row_label: Option<String>,
    pub row_category: Option<String>,
    pub period_label: Option<String>,
    pub run_id: RunId,
}

type CellKey = (String, String, String, String);

fn key_of(input: &CellInput) -> CellKey {
    (
        input.release_id.clone(),
        input.table_id.clone(),
        input.row_id.clone(),
        input.column_id.clone(),
    )
}

// ── Numeric parsing ──────────────────────────────────────────────────

/// Best-effort numeric parse of source text.
///
/// Strips grouping separators (comma, space, NBSP) and trims; a
/// parenthesized value is accounting-negative. Returns `(value,
/// is_numeric, note)`; a note is attached only when the text contained
/// digits but still failed to parse (something worth a second look, as
/// opposed to an ordinary "NA" marker).
pub fn parse_numeric(text: &str) -> (Option<f64>, bool, Option<String>) {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return (None, false, None);
    }

    let (body, negative) = match trimmed.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        Some(inner) => (inner, true),
        None => (trimmed, false),
    };

    let cleaned: String = body
        .chars()
        .filter(|c| !matches!(c, ',' | ' ' | '\u{a0}'))
        .collect();

    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() => (Some(if negative { -v } else { v }), true, None),
        _ => {
            let note = if cleaned.chars().any(|c| c.is_ascii_digit()) {
                Some(format!("unparsed numeric-looking text: {trimmed:?}"))
            } else {
                None
            };
            (None, false, note)
        }
    }
}

// ── Store ────────────────────────────────────────────────────────────

#[derive(Default)]
struct BronzeTable {
    rows: HashMap<CellId, BronzeCell>,
    by_key: HashMap<CellKey, CellId>,
}

/// Thread-safe bronze cell store.
#[derive(Default)]
pub struct BronzeStore {
    inner: RwLock<BronzeTable>,
}

impl BronzeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent upsert on the natural key.
    ///
    /// Unchanged text is a no-op — no overwrite, no timestamp bump.
    /// Changed text overwrites the cell, re-parses, and bumps
    /// `last_changed`.
    pub fn upsert_cell(&self, input: CellInput) -> (CellId, WriteOutcome) {
        let key = key_of(&input);
        let mut inner = self.inner.write().unwrap();

        if let Some(&id) = inner.by_key.get(&key) {
            let cell = inner.rows.get_mut(&id).unwrap();
            if cell.value_text == input.value_text {
                return (id, WriteOutcome::Unchanged);
            }
            let (value, is_numeric, parse_note) = parse_numeric(&input.value_text);
            cell.value_text = input.value_text;
            cell.value = value;
            cell.is_numeric = is_numeric;
            cell.parse_note = parse_note;
            cell.row_label = input.row_label;
            cell.row_category = input.row_category;
            cell.period_label = input.period_label;
            cell.run_id = input.run_id;
            cell.last_changed = Utc::now();
            return (id, WriteOutcome::Updated);
        }

        let (value, is_numeric, parse_note) = parse_numeric(&input.value_text);
        let id = Uuid::new_v4();
        let now = Utc::now();
        let cell = BronzeCell {
            id,
            release_id: input.release_id,
            table_id: input.table_id,
            row_id: input.row_id,
            column_id: input.column_id,
            value_text: input.value_text,
            value,
            is_numeric,
            parse_note,
            row_label: input.row_label,
            row_category: input.row_category,
            period_label: input.period_label,
            run_id: input.run_id,
            first_seen: now,
            last_changed: now,
        };
        inner.by_key.insert(key, id);
        inner.rows.insert(id, cell);
        (id, WriteOutcome::Inserted)
    }

    pub fn get(&self, id: CellId) -> Option<BronzeCell> {
        self.inner.read().unwrap().rows.get(&id).cloned()
    }

    pub fn contains(&self, id: CellId) -> bool {
        self.inner.read().unwrap().rows.contains_key(&id)
    }

    /// Look up a cell by its natural key.
    pub fn cell_by_key(
        &self,
        release_id: &str,
        table_id: &str,
        row_id: &str,
        column_id: &str,
    ) -> Option<BronzeCell> {
        let inner = self.inner.read().unwrap();
        let key = (
            release_id.to_string(),
            table_id.to_string(),
            row_id.to_string(),
            column_id.to_string(),
        );
        inner.by_key.get(&key).and_then(|id| inner.rows.get(id)).cloned()
    }

    /// All cells of a release, ordered by (table, row, column).
    pub fn cells_for_release(&self, release_id: &str) -> Vec<BronzeCell> {
        let inner = self.inner.read().unwrap();
        let mut cells: Vec<BronzeCell> = inner
            .rows
            .values()
            .filter(|c| c.release_id == release_id)
            .cloned()
            .collect();
        cells.sort_by(|a, b| {
            (&a.table_id, &a.row_id, &a.column_id).cmp(&(&b.table_id, &b.row_id, &b.column_id))
        });
        cells
    }

    // ── Snapshot ──────────────────────────────────────────────────

    pub fn export(&self) -> Vec<BronzeCell> {
        self.inner.read().unwrap().rows.values().cloned().collect()
    }

    pub fn restore(&self, cells: Vec<BronzeCell>) {
        let mut inner = self.inner.write().unwrap();
        *inner = BronzeTable::default();
        for cell in cells {
            let key = (
                cell.release_id.clone(),
                cell.table_id.clone(),
                cell.row_id.clone(),
                cell.column_id.clone(),
            );
            inner.by_key.insert(key, cell.id);
            inner.rows.insert(cell.id, cell);
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn input(release: &str, row: &str, text: &str) -> CellInput {
        CellInput {
            release_id: release.to_string(),
            table_id: "t01".to_string(),
            row_id: row.to_string(),
            column_id: "c02".to_string(),
            value_text: text.to_string(),
            row_label: Some("Production".to_string()),
            row_category: Some("supply".to_string()),
            period_label: Some("2025/26".to_string()),
            run_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn test_parse_numeric_grouping_separators() {
        assert_eq!(parse_numeric("2,131"), (Some(2_131.0), true, None));
        assert_eq!(parse_numeric("14,900"), (Some(14_900.0), true, None));
        assert_eq!(parse_numeric(" 1 234.5 "), (Some(1_234.5), true, None));
        assert_eq!(parse_numeric("-17.25"), (Some(-17.25), true, None));
    }

    #[test]
    fn test_parse_numeric_parenthesized_negative() {
        assert_eq!(parse_numeric("(123)"), (Some(-123.0), true, None));
        assert_eq!(parse_numeric("(1,500.5)"), (Some(-1_500.5), true, None));
    }

    #[test]
    fn test_parse_numeric_markers_are_clean_non_numeric() {
        for marker in ["NA", "-", "--", "", "  ", "n/a"] {
            let (value, is_numeric, note) = parse_numeric(marker);
            assert_eq!(value, None, "marker {marker:?}");
            assert!(!is_numeric);
            assert!(note.is_none(), "marker {marker:?} should not warn");
        }
    }

    #[test]
    fn test_parse_numeric_garbled_digits_get_a_note() {
        let (value, is_numeric, note) = parse_numeric("12..3");
        assert_eq!(value, None);
        assert!(!is_numeric);
        assert!(note.is_some());
    }

    #[test]
    fn test_wasde_cells_scenario() {
        let store = BronzeStore::new();
        for (row, text) in [("r01", "2,131"), ("r02", "NA"), ("r03", "14,900")] {
            store.upsert_cell(input("wasde-2026-07", row, text));
        }

        let cells = store.cells_for_release("wasde-2026-07");
        assert_eq!(cells.len(), 3);

        let numeric: Vec<f64> = cells.iter().filter_map(|c| c.value).collect();
        assert_eq!(numeric, vec![2_131.0, 14_900.0]);

        let na = store
            .cell_by_key("wasde-2026-07", "t01", "r02", "c02")
            .unwrap();
        assert!(!na.is_numeric);
        assert_eq!(na.value, None);
        assert_eq!(na.value_text, "NA");
        assert!(na.parse_note.is_none());
    }

    #[test]
    fn test_unchanged_text_is_a_noop() {
        let store = BronzeStore::new();
        let (id, outcome) = store.upsert_cell(input("r", "r01", "2,131"));
        assert_eq!(outcome, WriteOutcome::Inserted);
        let first = store.get(id).unwrap();

        let (id2, outcome) = store.upsert_cell(input("r", "r01", "2,131"));
        assert_eq!(id2, id);
        assert_eq!(outcome, WriteOutcome::Unchanged);
        // No timestamp bump.
        assert_eq!(store.get(id).unwrap().last_changed, first.last_changed);
    }

    #[test]
    fn test_changed_text_overwrites_and_bumps() {
        let store = BronzeStore::new();
        let (id, _) = store.upsert_cell(input("r", "r01", "2,131"));
        let first = store.get(id).unwrap();

        let (id2, outcome) = store.upsert_cell(input("r", "r01", "2,205"));
        assert_eq!(id2, id);
        assert_eq!(outcome, WriteOutcome::Updated);

        let cell = store.get(id).unwrap();
        assert_eq!(cell.value, Some(2_205.0));
        assert_eq!(cell.first_seen, first.first_seen);
        assert!(cell.last_changed >= first.last_changed);
    }

    #[test]
    fn test_distinct_natural_keys_are_distinct_cells() {
        let store = BronzeStore::new();
        let (a, _) = store.upsert_cell(input("r", "r01", "1"));
        let mut other = input("r", "r01", "1");
        other.column_id = "c03".to_string();
        let (b, _) = store.upsert_cell(other);
        assert_ne!(a, b);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let store = BronzeStore::new();
        let (id, _) = store.upsert_cell(input("r", "r01", "2,131"));

        let restored = BronzeStore::new();
        restored.restore(store.export());
        assert_eq!(restored.get(id).unwrap().value, Some(2_131.0));
        // Natural-key index rebuilt: upsert still dedups.
        let (id2, outcome) = restored.upsert_cell(input("r", "r01", "2,131"));
        assert_eq!(id2, id);
        assert_eq!(outcome, WriteOutcome::Unchanged);
    }
}
