use anyhow::{Context, Result};
use batimap_core::config::Settings;
use batimap_core::ports::BuildingQuery;
use batimap_engine::Collaborators;
use batimap_overpass::{GeoQueryClient, HttpCadastreGenerator};
use batimap_store::{FileTileInvalidator, MemoryCityRepository, RepositorySnapshot, StaticCadastreSource, StaticOpenData};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Snapshot-backed adapters for one CLI run
pub struct Storage {
    path: PathBuf,
    loaded: RepositorySnapshot,
    pub repo: MemoryCityRepository,
    pub cadastre: StaticCadastreSource,
    pub open_data: StaticOpenData,
}

impl Storage {
    pub fn load(path: &Path) -> Result<Self> {
        let loaded = RepositorySnapshot::load(path)
            .with_context(|| format!("Failed to load snapshot {}", path.display()))?;
        tracing::debug!(
            path = %path.display(),
            cities = loaded.cities.len(),
            boundaries = loaded.boundaries.len(),
            "Snapshot loaded"
        );
        Ok(Self {
            path: path.to_path_buf(),
            cadastre: StaticCadastreSource::from_snapshot(&loaded),
            open_data: StaticOpenData::from_snapshot(&loaded),
            repo: MemoryCityRepository::from_snapshot(loaded.clone()),
            loaded,
        })
    }

    /// Write the repository back, keeping the static source sections as loaded
    pub fn save(&self) -> Result<()> {
        self.repo
            .snapshot()
            .with_sources_from(&self.loaded)
            .save(&self.path)
            .with_context(|| format!("Failed to write snapshot {}", self.path.display()))
    }

    /// Wire the engine: Overpass and the cadastre generator unless offline
    pub fn collaborators(&self, settings: &Settings, offline: bool) -> Result<Collaborators> {
        let repo = Arc::new(self.repo.clone());
        let query: Arc<dyn BuildingQuery> = if offline {
            repo.clone()
        } else {
            Arc::new(GeoQueryClient::from_settings(settings).context("Failed to set up the Overpass client")?)
        };

        Ok(Collaborators {
            repo,
            query,
            cadastre: Arc::new(self.cadastre.clone()),
            open_data: Arc::new(self.open_data.clone()),
            tiles: Arc::new(FileTileInvalidator::new(&settings.tiles_dir)),
            generator: Arc::new(HttpCadastreGenerator::new(&settings.cadastre_url)),
        })
    }
}
