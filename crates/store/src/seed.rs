//! Seed file loading — dimension reference rows (data sources,
//! commodities, locations, units) from a TOML file applied at startup.
//! Re-applying an existing seed is idempotent.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use granary_core::GranaryError;

use crate::dimensions::DimensionRegistry;

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error(transparent)]
    Registry(#[from] GranaryError),
}

// ── File shape ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedSource {
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedNamed {
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedUnit {
    pub code: String,
    pub name: String,
    /// Code of the base unit; must appear earlier in the file (or already
    /// be registered).
    pub base: Option<String>,
    #[serde(default = "default_factor")]
    pub factor: f64,
}

fn default_factor() -> f64 {
    1.0
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub data_sources: Vec<SeedSource>,
    #[serde(default)]
    pub commodities: Vec<SeedNamed>,
    #[serde(default)]
    pub locations: Vec<SeedNamed>,
    #[serde(default)]
    pub units: Vec<SeedUnit>,
}

impl SeedFile {
    pub fn from_path(path: &Path) -> Result<Self, SeedError> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    /// Apply every seed row through the registry's create operations.
    /// Units are applied in file order so bases can be declared first.
    pub fn apply(&self, registry: &DimensionRegistry) -> Result<(), SeedError> {
        for source in &self.data_sources {
            registry.create_data_source(
                &source.code,
                &source.name,
                source.description.clone(),
                source.url.clone(),
            );
        }
        for commodity in &self.commodities {
            registry.create_commodity(&commodity.code, &commodity.name);
        }
        for location in &self.locations {
            registry.create_location(&location.code, &location.name);
        }
        for unit in &self.units {
            registry.create_unit(&unit.code, &unit.name, unit.base.as_deref(), unit.factor)?;
        }
        info!(
            sources = self.data_sources.len(),
            commodities = self.commodities.len(),
            locations = self.locations.len(),
            units = self.units.len(),
            "applied seed file"
        );
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────────
