//! Work done on a single city: status update and editing data preparation

use batimap_core::config::Settings;
use batimap_core::error::{BatimapError, Result};
use batimap_core::models::{City, CityDto, EditableData};
use batimap_core::ports::{CadastreGenerator, CadastreSource, TileInvalidator};
use batimap_store::CityRepository;
use chrono::Utc;
use futures::StreamExt;
use std::sync::Arc;

use crate::generation::GenerationLog;
use crate::pipeline::refresh_freshness;
use crate::progress::{ProgressReporter, ScaledProgress};
use crate::refresher::StatusRefresher;

#[derive(Clone)]
pub struct CityJobs {
    repo: Arc<dyn CityRepository>,
    cadastre: Arc<dyn CadastreSource>,
    tiles: Arc<dyn TileInvalidator>,
    generator: Arc<dyn CadastreGenerator>,
    refresher: StatusRefresher,
    cadastre_url: String,
    freshness_days: i64,
}

impl CityJobs {
    pub fn new(
        repo: Arc<dyn CityRepository>,
        cadastre: Arc<dyn CadastreSource>,
        tiles: Arc<dyn TileInvalidator>,
        generator: Arc<dyn CadastreGenerator>,
        refresher: StatusRefresher,
        settings: &Settings,
    ) -> Self {
        Self {
            repo,
            cadastre,
            tiles,
            generator,
            refresher,
            cadastre_url: settings.cadastre_url.clone(),
            freshness_days: settings.freshness_days,
        }
    }

    async fn load(&self, insee: &str) -> Result<City> {
        self.repo
            .get_city(insee)
            .await?
            .ok_or_else(|| BatimapError::CityNotFound { insee: insee.to_string() })
    }

    async fn invalidate(&self, city: &City) -> Result<()> {
        match self.repo.city_bbox(&city.insee).await? {
            Some(bbox) => self.tiles.invalidate_bbox(&bbox).await,
            None => {
                tracing::warn!(city = %city, "No bounding box, tiles left untouched");
                Ok(())
            }
        }
    }

    pub async fn city_dto(&self, city: &City) -> Result<CityDto> {
        let count = self.repo.get_cadastre_count(&city.insee).await?;
        let ready = city.is_josm_ready(Utc::now(), self.freshness_days);
        Ok(CityDto::new(city, count.as_ref(), ready))
    }

    /// Force a live reclassification of one city
    pub async fn update_city(&self, insee: &str, progress: &dyn ProgressReporter) -> Result<CityDto> {
        let before = self.load(insee).await?;
        progress.report(50.0);

        let city = self.refresher.refresh(insee).await?;
        progress.report(99.0);

        if city.import_date != before.import_date {
            self.invalidate(&city).await?;
        }
        progress.report(100.0);
        self.city_dto(&city).await
    }

    /// Make sure the editing data of a city is fresh, generating it if needed
    pub async fn prepare_editable_data(&self, insee: &str, progress: &dyn ProgressReporter) -> Result<EditableData> {
        let mut city = self.load(insee).await?;
        if city.is_raster {
            return Err(BatimapError::RasterCity { insee: city.insee });
        }
        progress.report(1.0);

        refresh_freshness(self.repo.as_ref(), self.cadastre.as_ref(), &city.department).await?;
        city = self.load(insee).await?;

        let generated = !city.is_josm_ready(Utc::now(), self.freshness_days);
        if generated {
            // stale data on the cadastre side has to be regenerated explicitly
            let force = city.date_cadastre.is_some();
            self.generate(&city, force, &ScaledProgress::new(progress, 1.0, 79.0)).await?;
            progress.report(80.0);

            refresh_freshness(self.repo.as_ref(), self.cadastre.as_ref(), &city.department).await?;
            city = self.load(insee).await?;
            if !city.is_josm_ready(Utc::now(), self.freshness_days) {
                tracing::warn!(city = %city, "Generation finished but no fresh data was published");
            }
        }
        progress.report(90.0);

        let before = city.import_date;
        let city = self.refresher.refresh(insee).await?;
        progress.report(95.0);

        let data = self.editable_data(&city).await?;
        if generated || city.import_date != before {
            self.invalidate(&city).await?;
        }
        progress.report(99.0);
        Ok(data)
    }

    /// Editing data of a city that is already fresh, without generating anything
    pub async fn prepare_editable_data_fast(&self, insee: &str, progress: &dyn ProgressReporter) -> Result<EditableData> {
        let city = self.load(insee).await?;
        if city.is_raster {
            return Err(BatimapError::RasterCity { insee: city.insee });
        }
        if !city.is_josm_ready(Utc::now(), self.freshness_days) {
            return Err(BatimapError::NotReady { insee: city.insee });
        }
        progress.report(50.0);
        self.editable_data(&city).await
    }

    async fn generate(&self, city: &City, force: bool, progress: &dyn ProgressReporter) -> Result<()> {
        tracing::info!(city = %city, force, "Generating cadastre data");
        let mut log = GenerationLog::new();
        let mut lines = self.generator.generate(city, force).await?;
        while let Some(line) = lines.next().await {
            if let Some(percent) = log.parse_line(&line?)? {
                progress.report(percent);
            }
        }
        Ok(())
    }

    async fn editable_data(&self, city: &City) -> Result<EditableData> {
        let name_cadastre = city
            .name_cadastre
            .as_deref()
            .ok_or_else(|| BatimapError::MissingCadastreName { insee: city.insee.clone() })?;
        let bbox = self
            .repo
            .city_bbox(&city.insee)
            .await?
            .ok_or_else(|| BatimapError::CityNotFound { insee: city.insee.clone() })?;
        Ok(EditableData::new(&self.cadastre_url, city, name_cadastre, &bbox))
    }
}
