//! JSON snapshot of the repository and static sources

use batimap_core::error::{BatimapError, Result};
use batimap_core::models::{BuildingRecord, CadastreCount, City};
use batimap_core::ports::{CadastreFreshness, CadastreListing};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::memory::Boundary;

/// Everything the CLI persists between runs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepositorySnapshot {
    #[serde(default)]
    pub cities: Vec<City>,

    #[serde(default)]
    pub cadastre_counts: Vec<CadastreCount>,

    #[serde(default)]
    pub boundaries: Vec<Boundary>,

    /// Building elements per INSEE code
    #[serde(default)]
    pub buildings: HashMap<String, Vec<BuildingRecord>>,

    /// Cadastre listing per department
    #[serde(default)]
    pub cadastre_listings: HashMap<String, Vec<CadastreListing>>,

    /// Generated data dates per department
    #[serde(default)]
    pub cadastre_freshness: HashMap<String, Vec<CadastreFreshness>>,

    /// Open data building count per INSEE code
    #[serde(default)]
    pub open_data: HashMap<String, u64>,
}

impl RepositorySnapshot {
    /// Load a snapshot, an absent file yields an empty one
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No snapshot found, starting empty");
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            BatimapError::Serialization(format!("Failed to parse snapshot {}: {}", path.display(), e))
        })
    }

    /// Write the snapshot, creating parent directories as needed
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Keep the static source sections of `other`
    pub fn with_sources_from(mut self, other: &RepositorySnapshot) -> Self {
        self.cadastre_listings = other.cadastre_listings.clone();
        self.cadastre_freshness = other.cadastre_freshness.clone();
        self.open_data = other.open_data.clone();
        self
    }
}
