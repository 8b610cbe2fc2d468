//! Dimension registry — canonical lookup/creation of reference entities
//! (data source, commodity, location, unit) and of series, the central
//! addressable time-series.
//!
//! Data sources are seed data: series creation resolves them but never
//! creates them. Series get-or-create is atomic under the registry write
//! lock, so concurrent callers racing the same `(source, key)` always
//! converge on a single row and id.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use granary_core::{
    CommodityId, DimensionKind, Frequency, GranaryError, LocationId, Metadata, SeriesId, SourceId,
    UnitId,
};

// ── Rows ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSource {
    pub id: SourceId,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commodity {
    pub id: CommodityId,
    pub code: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub code: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A unit of measure. `base_unit`/`factor` link it to a base unit: one of
/// this unit equals `factor` base units. Units sharing a root base are
/// mutually convertible.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    pub code: String,
    pub name: String,
    pub base_unit: Option<UnitId>,
    pub factor: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Series {
    pub id: SeriesId,
    pub source_id: SourceId,
    pub series_key: String,
    pub name: String,
    pub description: Option<String>,
    pub commodity_id: Option<CommodityId>,
    pub location_id: Option<LocationId>,
    pub unit_id: Option<UnitId>,
    pub frequency: Frequency,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Everything needed to resolve-or-create a series. Optional dimension
/// codes are tolerated as absent, but a supplied unknown code is a
/// `ReferenceNotFound` — it indicates a missing seed row.
#[derive(Debug, Clone, Default)]
pub struct SeriesSpec {
    pub source_code: String,
    pub series_key: String,
    pub name: String,
    pub commodity_code: Option<String>,
    pub location_code: Option<String>,
    pub unit_code: Option<String>,
    pub frequency: Frequency,
    pub metadata: Metadata,
}

// ── Snapshot shape ───────────────────────────────────────────────────

/// Plain serializable dump of the whole registry.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct DimensionSnapshot {
    pub sources: Vec<DataSource>,
    pub commodities: Vec<Commodity>,
    pub locations: Vec<Location>,
    pub units: Vec<Unit>,
    pub series: Vec<Series>,
}

// ── Registry ─────────────────────────────────────────────────────────

#[derive(Default)]
struct RegistryInner {
    sources: HashMap<SourceId, DataSource>,
    source_codes: HashMap<String, SourceId>,
    commodities: HashMap<CommodityId, Commodity>,
    commodity_codes: HashMap<String, CommodityId>,
    locations: HashMap<LocationId, Location>,
    location_codes: HashMap<String, LocationId>,
    units: HashMap<UnitId, Unit>,
    unit_codes: HashMap<String, UnitId>,
    series: HashMap<SeriesId, Series>,
    series_keys: HashMap<(SourceId, String), SeriesId>,
}

/// Thread-safe registry of dimension rows and series.
#[derive(Default)]
pub struct DimensionRegistry {
    inner: RwLock<RegistryInner>,
}

/// Codes are matched case-insensitively and whitespace-insensitively.
fn norm_code(code: &str) -> String {
    code.trim().to_uppercase()
}

impl DimensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Seed / admin surface ──────────────────────────────────────

    /// Register a data source, or refresh the display fields of an
    /// existing one. Returns the canonical id either way.
    pub fn create_data_source(
        &self,
        code: &str,
        name: &str,
        description: Option<String>,
        url: Option<String>,
    ) -> SourceId {
        let code = norm_code(code);
        let mut inner = self.inner.write().unwrap();
        if let Some(&id) = inner.source_codes.get(&code) {
            let source = inner.sources.get_mut(&id).unwrap();
            source.name = name.to_string();
            if description.is_some() {
                source.description = description;
            }
            if url.is_some() {
                source.url = url;
            }
            return id;
        }
        let id = Uuid::new_v4();
        inner.sources.insert(
            id,
            DataSource {
                id,
                code: code.clone(),
                name: name.to_string(),
                description,
                url,
                created_at: Utc::now(),
            },
        );
        inner.source_codes.insert(code.clone(), id);
        debug!(code = %code, "registered data source");
        id
    }

    pub fn create_commodity(&self, code: &str, name: &str) -> CommodityId {
        let code = norm_code(code);
        let mut inner = self.inner.write().unwrap();
        if let Some(&id) = inner.commodity_codes.get(&code) {
            inner.commodities.get_mut(&id).unwrap().name = name.to_string();
            return id;
        }
        let id = Uuid::new_v4();
        inner.commodities.insert(
            id,
            Commodity {
                id,
                code: code.clone(),
                name: name.to_string(),
                created_at: Utc::now(),
            },
        );
        inner.commodity_codes.insert(code, id);
        id
    }

    pub fn create_location(&self, code: &str, name: &str) -> LocationId {
        let code = norm_code(code);
        let mut inner = self.inner.write().unwrap();
        if let Some(&id) = inner.location_codes.get(&code) {
            inner.locations.get_mut(&id).unwrap().name = name.to_string();
            return id;
        }
        let id = Uuid::new_v4();
        inner.locations.insert(
            id,
            Location {
                id,
                code: code.clone(),
                name: name.to_string(),
                created_at: Utc::now(),
            },
        );
        inner.location_codes.insert(code, id);
        id
    }

    /// Register a unit. `base_code` must already be registered when given.
    pub fn create_unit(
        &self,
        code: &str,
        name: &str,
        base_code: Option<&str>,
        factor: f64,
    ) -> Result<UnitId, GranaryError> {
        let code = norm_code(code);
        let mut inner = self.inner.write().unwrap();
        let base_unit = match base_code {
            Some(base) => {
                let base = norm_code(base);
                Some(*inner.unit_codes.get(&base).ok_or_else(|| {
                    GranaryError::reference_not_found(DimensionKind::Unit, base.clone())
                })?)
            }
            None => None,
        };
        if let Some(&id) = inner.unit_codes.get(&code) {
            let unit = inner.units.get_mut(&id).unwrap();
            unit.name = name.to_string();
            unit.base_unit = base_unit;
            unit.factor = factor;
            return Ok(id);
        }
        let id = Uuid::new_v4();
        inner.units.insert(
            id,
            Unit {
                id,
                code: code.clone(),
                name: name.to_string(),
                base_unit,
                factor,
                created_at: Utc::now(),
            },
        );
        inner.unit_codes.insert(code, id);
        Ok(id)
    }

    // ── Code → id lookups ─────────────────────────────────────────

    pub fn source_id(&self, code: &str) -> Option<SourceId> {
        self.inner
            .read()
            .unwrap()
            .source_codes
            .get(&norm_code(code))
            .copied()
    }

    /// Resolve a data source code, failing fast on unknown codes.
    pub fn require_source(&self, code: &str) -> Result<SourceId, GranaryError> {
        self.source_id(code)
            .ok_or_else(|| GranaryError::reference_not_found(DimensionKind::DataSource, code))
    }

    pub fn commodity_id(&self, code: &str) -> Option<CommodityId> {
        self.inner
            .read()
            .unwrap()
            .commodity_codes
            .get(&norm_code(code))
            .copied()
    }

    pub fn location_id(&self, code: &str) -> Option<LocationId> {
        self.inner
            .read()
            .unwrap()
            .location_codes
            .get(&norm_code(code))
            .copied()
    }

    pub fn unit_id(&self, code: &str) -> Option<UnitId> {
        self.inner
            .read()
            .unwrap()
            .unit_codes
            .get(&norm_code(code))
            .copied()
    }

    pub fn data_source(&self, id: SourceId) -> Option<DataSource> {
        self.inner.read().unwrap().sources.get(&id).cloned()
    }

    // ── Series ────────────────────────────────────────────────────

    /// Resolve an existing series by `(source, key)` or insert a new one.
    ///
    /// The check-and-insert runs under the registry write lock, so a
    /// losing concurrent caller observes the winner's row instead of
    /// creating a duplicate.
    pub fn get_or_create_series(&self, spec: SeriesSpec) -> Result<SeriesId, GranaryError> {
        let mut inner = self.inner.write().unwrap();

        let source_id = *inner
            .source_codes
            .get(&norm_code(&spec.source_code))
            .ok_or_else(|| {
                GranaryError::reference_not_found(DimensionKind::DataSource, &spec.source_code)
            })?;

        let commodity_id = match &spec.commodity_code {
            Some(code) => Some(*inner.commodity_codes.get(&norm_code(code)).ok_or_else(
                || GranaryError::reference_not_found(DimensionKind::Commodity, code),
            )?),
            None => None,
        };
        let location_id = match &spec.location_code {
            Some(code) => Some(*inner.location_codes.get(&norm_code(code)).ok_or_else(
                || GranaryError::reference_not_found(DimensionKind::Location, code),
            )?),
            None => None,
        };
        let unit_id = match &spec.unit_code {
            Some(code) => Some(
                *inner
                    .unit_codes
                    .get(&norm_code(code))
                    .ok_or_else(|| GranaryError::reference_not_found(DimensionKind::Unit, code))?,
            ),
            None => None,
        };

        let lookup = (source_id, spec.series_key.clone());
        if let Some(&existing) = inner.series_keys.get(&lookup) {
            return Ok(existing);
        }

        let id = Uuid::new_v4();
        let now = Utc::now();
        inner.series.insert(
            id,
            Series {
                id,
                source_id,
                series_key: spec.series_key.clone(),
                name: spec.name,
                description: None,
                commodity_id,
                location_id,
                unit_id,
                frequency: spec.frequency,
                metadata: spec.metadata,
                created_at: now,
                updated_at: now,
            },
        );
        inner.series_keys.insert(lookup, id);
        debug!(series_key = %spec.series_key, %id, "created series");
        Ok(id)
    }

    /// Read-only lookup, no side effects.
    pub fn series_id(&self, source_code: &str, series_key: &str) -> Option<SeriesId> {
        let inner = self.inner.read().unwrap();
        let source_id = *inner.source_codes.get(&norm_code(source_code))?;
        inner
            .series_keys
            .get(&(source_id, series_key.to_string()))
            .copied()
    }

    pub fn series(&self, id: SeriesId) -> Option<Series> {
        self.inner.read().unwrap().series.get(&id).cloned()
    }

    pub fn contains_series(&self, id: SeriesId) -> bool {
        self.inner.read().unwrap().series.contains_key(&id)
    }

    /// Refresh the mutable display fields of a series. Name, description,
    /// and metadata are the only post-creation mutations.
    pub fn update_series_metadata(
        &self,
        id: SeriesId,
        name: Option<String>,
        description: Option<String>,
        metadata: Option<Metadata>,
    ) -> Result<(), GranaryError> {
        let mut inner = self.inner.write().unwrap();
        let series = inner
            .series
            .get_mut(&id)
            .ok_or(GranaryError::SeriesNotFound(id))?;
        if let Some(name) = name {
            series.name = name;
        }
        if description.is_some() {
            series.description = description;
        }
        if let Some(metadata) = metadata {
            series.metadata.extend(metadata);
        }
        series.updated_at = Utc::now();
        Ok(())
    }

    pub fn series_for_source(&self, source_id: SourceId) -> Vec<Series> {
        let inner = self.inner.read().unwrap();
        let mut out: Vec<Series> = inner
            .series
            .values()
            .filter(|s| s.source_id == source_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.series_key.cmp(&b.series_key));
        out
    }

    // ── Unit conversion ───────────────────────────────────────────

    /// Convert `value` between two units sharing a base unit (directly or
    /// transitively to the same root).
    pub fn convert_units(&self, value: f64, from: &str, to: &str) -> Result<f64, GranaryError> {
        let inner = self.inner.read().unwrap();
        let err = |reason: &str| GranaryError::UnitConversion {
            from: from.to_string(),
            to: to.to_string(),
            reason: reason.to_string(),
        };

        let from_id = *inner
            .unit_codes
            .get(&norm_code(from))
            .ok_or_else(|| GranaryError::reference_not_found(DimensionKind::Unit, from))?;
        let to_id = *inner
            .unit_codes
            .get(&norm_code(to))
            .ok_or_else(|| GranaryError::reference_not_found(DimensionKind::Unit, to))?;

        let (from_root, from_factor) =
            resolve_root(&inner, from_id).ok_or_else(|| err("base unit chain is cyclic"))?;
        let (to_root, to_factor) =
            resolve_root(&inner, to_id).ok_or_else(|| err("base unit chain is cyclic"))?;

        if from_root != to_root {
            return Err(err("units do not share a base unit"));
        }
        Ok(value * from_factor / to_factor)
    }

    // ── Snapshot ──────────────────────────────────────────────────

    pub fn export(&self) -> DimensionSnapshot {
        let inner = self.inner.read().unwrap();
        DimensionSnapshot {
            sources: inner.sources.values().cloned().collect(),
            commodities: inner.commodities.values().cloned().collect(),
            locations: inner.locations.values().cloned().collect(),
            units: inner.units.values().cloned().collect(),
            series: inner.series.values().cloned().collect(),
        }
    }

    /// Rebuild the registry (including code indexes) from a snapshot.
    pub fn restore(&self, snapshot: DimensionSnapshot) {
        let mut inner = self.inner.write().unwrap();
        *inner = RegistryInner::default();
        for row in snapshot.sources {
            inner.source_codes.insert(row.code.clone(), row.id);
            inner.sources.insert(row.id, row);
        }
        for row in snapshot.commodities {
            inner.commodity_codes.insert(row.code.clone(), row.id);
            inner.commodities.insert(row.id, row);
        }
        for row in snapshot.locations {
            inner.location_codes.insert(row.code.clone(), row.id);
            inner.locations.insert(row.id, row);
        }
        for row in snapshot.units {
            inner.unit_codes.insert(row.code.clone(), row.id);
            inner.units.insert(row.id, row);
        }
        for row in snapshot.series {
            inner
                .series_keys
                .insert((row.source_id, row.series_key.clone()), row.id);
            inner.series.insert(row.id, row);
        }
    }
}

/// Walk the base-unit chain to its root, accumulating the multiplier.
/// Returns `None` on a cycle (malformed seed data).
fn resolve_root(inner: &RegistryInner, unit_id: UnitId) -> Option<(UnitId, f64)> {
    let mut current = unit_id;
    let mut factor = 1.0;
    let mut hops = 0;
    loop {
        let unit = inner.units.get(&current)?;
        match unit.base_unit {
            Some(base) if base != current => {
                factor *= unit.factor;
                current = base;
                hops += 1;
                if hops > inner.units.len() {
                    return None;
                }
            }
            _ => return Some((current, factor)),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn registry_with_usda() -> DimensionRegistry {
        let registry = DimensionRegistry::new();
        registry.create_data_source("USDA", "US Department of Agriculture", None, None);
        registry.create_commodity("CORN", "Corn");
        registry.create_location("US", "United States");
        registry.create_unit("MT", "Metric ton", None, 1.0).unwrap();
        registry
            .create_unit("KMT", "Thousand metric tons", Some("MT"), 1_000.0)
            .unwrap();
        registry
            .create_unit("MMT", "Million metric tons", Some("KMT"), 1_000.0)
            .unwrap();
        registry
    }

    fn corn_spec() -> SeriesSpec {
        SeriesSpec {
            source_code: "usda".to_string(),
            series_key: "corn/us/production".to_string(),
            name: "Corn production, United States".to_string(),
            commodity_code: Some("CORN".to_string()),
            location_code: Some("US".to_string()),
            unit_code: Some("KMT".to_string()),
            frequency: Frequency::Monthly,
            metadata: Metadata::new(),
        }
    }

    #[test]
    fn test_get_or_create_series_is_idempotent() {
        let registry = registry_with_usda();
        let a = registry.get_or_create_series(corn_spec()).unwrap();
        let b = registry.get_or_create_series(corn_spec()).unwrap();
        assert_eq!(a, b);
        assert_eq!(registry.series_id("USDA", "corn/us/production"), Some(a));

        let series = registry.series(a).unwrap();
        assert_eq!(series.frequency, Frequency::Monthly);
        assert!(series.commodity_id.is_some());
    }

    #[test]
    fn test_unknown_source_is_reference_not_found() {
        let registry = registry_with_usda();
        let spec = SeriesSpec {
            source_code: "NOPE".to_string(),
            ..corn_spec()
        };
        let err = registry.get_or_create_series(spec).unwrap_err();
        assert!(matches!(
            err,
            GranaryError::ReferenceNotFound {
                kind: DimensionKind::DataSource,
                ..
            }
        ));
    }

    #[test]
    fn test_supplied_unknown_dimension_code_fails() {
        let registry = registry_with_usda();
        let spec = SeriesSpec {
            commodity_code: Some("UNOBTAINIUM".to_string()),
            ..corn_spec()
        };
        assert!(registry.get_or_create_series(spec).is_err());

        // Absent codes are tolerated.
        let spec = SeriesSpec {
            commodity_code: None,
            location_code: None,
            unit_code: None,
            ..corn_spec()
        };
        assert!(registry.get_or_create_series(spec).is_ok());
    }

    #[test]
    fn test_series_lookup_has_no_side_effects() {
        let registry = registry_with_usda();
        assert_eq!(registry.series_id("USDA", "corn/us/production"), None);
        assert_eq!(registry.series_id("USDA", "corn/us/production"), None);
    }

    #[test]
    fn test_concurrent_get_or_create_yields_one_series() {
        let registry = Arc::new(registry_with_usda());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = registry.clone();
            handles.push(std::thread::spawn(move || {
                registry.get_or_create_series(corn_spec()).unwrap()
            }));
        }
        let ids: Vec<SeriesId> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(ids.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(registry.export().series.len(), 1);
    }

    #[test]
    fn test_convert_units_direct_and_transitive() {
        let registry = registry_with_usda();
        // KMT -> MT: one hop down.
        let mt = registry.convert_units(2.0, "KMT", "MT").unwrap();
        assert!((mt - 2_000.0).abs() < 1e-9);
        // MMT -> KMT: transitive through the shared MT root.
        let kmt = registry.convert_units(1.5, "MMT", "KMT").unwrap();
        assert!((kmt - 1_500.0).abs() < 1e-9);
    }

    #[test]
    fn test_convert_units_round_trip() {
        let registry = registry_with_usda();
        let x = 2_131.0;
        let there = registry.convert_units(x, "KMT", "MMT").unwrap();
        let back = registry.convert_units(there, "MMT", "KMT").unwrap();
        assert!((back - x).abs() < 1e-9);
    }

    #[test]
    fn test_convert_units_disjoint_bases_fail() {
        let registry = registry_with_usda();
        registry.create_unit("BU", "Bushel", None, 1.0).unwrap();
        registry
            .create_unit("KBU", "Thousand bushels", Some("BU"), 1_000.0)
            .unwrap();
        let err = registry.convert_units(1.0, "KMT", "KBU").unwrap_err();
        assert!(matches!(err, GranaryError::UnitConversion { .. }));
    }

    #[test]
    fn test_convert_units_unknown_code_is_reference_not_found() {
        let registry = registry_with_usda();
        assert!(matches!(
            registry.convert_units(1.0, "KMT", "FURLONG"),
            Err(GranaryError::ReferenceNotFound {
                kind: DimensionKind::Unit,
                ..
            })
        ));
    }

    #[test]
    fn test_code_normalization() {
        let registry = registry_with_usda();
        assert_eq!(registry.source_id(" usda "), registry.source_id("USDA"));
        assert!(registry.unit_id("kmt").is_some());
    }

    #[test]
    fn test_update_series_metadata() {
        let registry = registry_with_usda();
        let id = registry.get_or_create_series(corn_spec()).unwrap();
        let mut extra = Metadata::new();
        extra.insert("report_code".to_string(), serde_json::json!("WASDE"));
        registry
            .update_series_metadata(id, None, Some("desc".to_string()), Some(extra))
            .unwrap();
        let series = registry.series(id).unwrap();
        assert_eq!(series.description.as_deref(), Some("desc"));
        assert_eq!(series.metadata["report_code"], serde_json::json!("WASDE"));
        assert_eq!(series.name, "Corn production, United States");
    }

    #[test]
    fn test_snapshot_round_trip() {
        let registry = registry_with_usda();
        let id = registry.get_or_create_series(corn_spec()).unwrap();

        let restored = DimensionRegistry::new();
        restored.restore(registry.export());
        assert_eq!(restored.series_id("USDA", "corn/us/production"), Some(id));
        let mt = restored.convert_units(1.0, "MMT", "MT").unwrap();
        assert!((mt - 1_000_000.0).abs() < 1e-6);
    }
}
