//! Entry points shared by the CLI and background jobs

use batimap_core::config::Settings;
use batimap_core::error::{BatimapError, Result};
use batimap_core::models::{
    is_city_code, CadastreCount, City, CityDto, JobId, JobKey, JobKind, JobStatus, LabelCount,
};
use batimap_core::ports::{BuildingQuery, CadastreGenerator, CadastreSource, OpenDataSource, TileInvalidator};
use batimap_store::CityRepository;
use chrono::Utc;
use std::sync::Arc;

use crate::city_jobs::CityJobs;
use crate::jobs::JobRunner;
use crate::pipeline::{InitdbPipeline, InitdbReport};
use crate::progress::{LogProgress, ProgressReporter};
use crate::refresher::StatusRefresher;
use crate::selector::{ObsoleteQuery, WorkSelector};

/// Adapters the engine works with
#[derive(Clone)]
pub struct Collaborators {
    pub repo: Arc<dyn CityRepository>,
    pub query: Arc<dyn BuildingQuery>,
    pub cadastre: Arc<dyn CadastreSource>,
    pub open_data: Arc<dyn OpenDataSource>,
    pub tiles: Arc<dyn TileInvalidator>,
    pub generator: Arc<dyn CadastreGenerator>,
}

#[derive(Clone)]
pub struct Batimap {
    repo: Arc<dyn CityRepository>,
    refresher: StatusRefresher,
    pipeline: Arc<InitdbPipeline>,
    city_jobs: CityJobs,
    selector: Arc<WorkSelector>,
    runner: JobRunner,
    freshness_days: i64,
}

impl Batimap {
    pub fn new(collaborators: Collaborators, settings: &Settings) -> Self {
        let Collaborators {
            repo,
            query,
            cadastre,
            open_data,
            tiles,
            generator,
        } = collaborators;

        let refresher = StatusRefresher::new(repo.clone(), query, settings);
        let pipeline = InitdbPipeline::new(
            repo.clone(),
            cadastre.clone(),
            open_data,
            tiles.clone(),
            refresher.clone(),
            settings,
        );
        let city_jobs = CityJobs::new(repo.clone(), cadastre, tiles, generator, refresher.clone(), settings);

        Self {
            selector: Arc::new(WorkSelector::new(repo.clone(), settings.freshness_days)),
            repo,
            refresher,
            pipeline: Arc::new(pipeline),
            city_jobs,
            runner: JobRunner::new(settings.workers),
            freshness_days: settings.freshness_days,
        }
    }

    pub fn runner(&self) -> &JobRunner {
        &self.runner
    }

    pub fn pipeline(&self) -> &InitdbPipeline {
        &self.pipeline
    }

    pub fn city_jobs(&self) -> &CityJobs {
        &self.city_jobs
    }

    async fn load(&self, insee: &str) -> Result<City> {
        self.repo
            .get_city(insee)
            .await?
            .ok_or_else(|| BatimapError::CityNotFound { insee: insee.to_string() })
    }

    /// Queue a full refresh of the given cities and departments
    ///
    /// An empty list means every known department.
    pub async fn request_initdb(&self, items: Vec<String>) -> Result<JobId> {
        let items = if items.is_empty() { self.repo.list_departments().await? } else { items };
        let pipeline = self.pipeline.clone();
        let key = JobKey::new(JobKind::Initdb, items.clone());
        Ok(self.runner.submit_once(key, move |progress| async move {
            let report = pipeline.run(&items, progress.as_ref()).await?;
            Ok(serde_json::to_value(report)?)
        }))
    }

    /// Run a full refresh in the current task, logging progress
    pub async fn run_initdb_sync(&self, items: Vec<String>) -> Result<InitdbReport> {
        let items = if items.is_empty() { self.repo.list_departments().await? } else { items };
        self.pipeline.run(&items, &LogProgress).await
    }

    /// Queue a live reclassification of one city
    pub async fn request_city_update(&self, insee: &str) -> Result<JobId> {
        self.load(insee).await?;
        let jobs = self.city_jobs.clone();
        let insee = insee.to_string();
        let key = JobKey::single(JobKind::UpdateCity, insee.clone());
        Ok(self.runner.submit_once(key, move |progress| async move {
            let city = jobs.update_city(&insee, progress.as_ref()).await?;
            Ok(serde_json::to_value(city)?)
        }))
    }

    /// Queue the preparation of a city's editing data
    ///
    /// Cities whose data is already fresh take the fast path.
    pub async fn request_josm_data(&self, insee: &str) -> Result<JobId> {
        let city = self.load(insee).await?;
        if city.is_raster {
            return Err(BatimapError::RasterCity { insee: city.insee });
        }

        let jobs = self.city_jobs.clone();
        let insee = city.insee.clone();
        if city.is_josm_ready(Utc::now(), self.freshness_days) {
            let key = JobKey::single(JobKind::JosmDataFast, insee.clone());
            return Ok(self.runner.submit(key, move |progress| async move {
                let data = jobs.prepare_editable_data_fast(&insee, progress.as_ref()).await?;
                Ok(serde_json::to_value(data)?)
            }));
        }

        let key = JobKey::single(JobKind::JosmData, insee.clone());
        Ok(self.runner.submit_once(key, move |progress| async move {
            let data = jobs.prepare_editable_data(&insee, progress.as_ref()).await?;
            Ok(serde_json::to_value(data)?)
        }))
    }

    pub fn job_status(&self, id: JobId) -> Result<JobStatus> {
        self.runner.status(id)
    }

    pub fn list_jobs(&self) -> Vec<JobStatus> {
        self.runner.list_jobs()
    }

    pub async fn pick_obsolete_city(&self, query: &ObsoleteQuery) -> Result<Option<CityDto>> {
        match self.selector.pick_obsolete_city(query).await? {
            Some(city) => Ok(Some(self.city_jobs.city_dto(&city).await?)),
            None => Ok(None),
        }
    }

    /// Status of cities, departments or everything
    ///
    /// Unless `fast`, the raster state of the concerned departments is
    /// refreshed and every city is reclassified live.
    pub async fn stats(&self, items: &[String], fast: bool, all: bool) -> Result<Vec<CityDto>> {
        let departments: Vec<String> = if all {
            self.repo.list_departments().await?
        } else if items.iter().any(|item| !is_city_code(item)) {
            items.to_vec()
        } else {
            Vec::new()
        };

        let mut cities = Vec::new();
        if departments.is_empty() {
            for item in items {
                let city = match self.repo.get_city(item).await? {
                    Some(city) => Some(city),
                    None => self.repo.get_city_by_name(item).await?,
                };
                match city {
                    Some(city) => cities.push(city),
                    None => tracing::warn!(item = %item, "Unknown city"),
                }
            }
        } else {
            for department in &departments {
                cities.extend(self.repo.list_cities_in_department(department).await?);
            }
        }

        if !fast {
            let mut touched: Vec<String> = cities.iter().map(|c| c.department.clone()).collect();
            touched.extend(departments);
            touched.sort();
            touched.dedup();
            for department in &touched {
                self.pipeline.update_raster_state(department).await?;
            }
        }

        let mut dtos = Vec::with_capacity(cities.len());
        for city in cities {
            let city = if fast {
                city
            } else {
                self.refresher.refresh(&city.insee).await?
            };
            dtos.push(self.city_jobs.city_dto(&city).await?);
        }
        Ok(dtos)
    }

    pub async fn compute_count(&self, item: &str) -> Result<Vec<CadastreCount>> {
        self.pipeline.compute_count(item).await
    }

    /// Number of cities per label
    pub async fn status_summary(&self) -> Result<Vec<LabelCount>> {
        self.repo.imports_count_per_label().await
    }

    /// Wait for a job, forwarding its progress every quarter second
    pub async fn wait(&self, id: JobId, progress: &dyn ProgressReporter) -> Result<JobStatus> {
        let waiting = self.runner.wait(id);
        tokio::pin!(waiting);
        loop {
            tokio::select! {
                status = &mut waiting => return status,
                _ = tokio::time::sleep(std::time::Duration::from_millis(250)) => {
                    progress.report(self.runner.status(id)?.progress);
                }
            }
        }
    }
}
