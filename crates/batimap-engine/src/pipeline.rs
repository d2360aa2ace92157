//! Full status refresh ("initdb")
//!
//! Five stages run one after the other, each owning a fifth of the progress:
//!
//! 1. open data building counts, per department
//! 2. raster or vector cadastre, per department
//! 3. freshness of the generated editing data, per department
//! 4. bulk status recompute, per requested item
//! 5. live recompute of the cities still `unknown`
//!
//! Every write is an overwrite keyed by city or department, so a failed run
//! is simply submitted again.

use batimap_core::classify::{classify, Classification, ClassifierInput};
use batimap_core::config::Settings;
use batimap_core::error::{BatimapError, Result};
use batimap_core::models::{department_of, is_city_code, CadastreCount, City, ImportDetails, StatusLabel};
use batimap_core::ports::{CadastreSource, OpenDataSource, TileInvalidator};
use batimap_store::CityRepository;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::maintenance::Maintenance;
use crate::progress::{ProgressReporter, StageProgress};
use crate::refresher::StatusRefresher;

const STAGES: usize = 5;

/// Departments from which a refresh counts as a large batch
const LARGE_BATCH_DEPARTMENTS: usize = 5;
/// Items from which a refresh counts as a large batch
const LARGE_BATCH_ITEMS: usize = 100;

/// Tile invalidation performed at the end of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Invalidation {
    /// Every tile flagged as stale
    Full,
    /// Only the boxes of the requested cities
    Targeted { boxes: usize },
}

/// Outcome of an initdb run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitdbReport {
    pub departments: Vec<String>,
    pub items: Vec<String>,
    /// Cities whose label changed during the bulk recompute
    pub updated: Vec<String>,
    pub invalidation: Invalidation,
}

/// Distinct departments touched by the requested items, sorted
pub fn resolve_departments(items: &[String]) -> Vec<String> {
    let mut departments: Vec<String> = items
        .iter()
        .map(|item| if is_city_code(item) { department_of(item) } else { item.clone() })
        .collect();
    departments.sort();
    departments.dedup();
    departments
}

/// Refresh the generation dates of a department's editing data
///
/// Cities no longer listed lose their date. Returns the cities whose data
/// was regenerated since the last check.
pub async fn refresh_freshness(
    repo: &dyn CityRepository,
    cadastre: &dyn CadastreSource,
    department: &str,
) -> Result<Vec<String>> {
    let freshness: HashMap<String, _> = cadastre
        .department_freshness(department)
        .await?
        .into_iter()
        .map(|f| (f.name_cadastre, f.generated_at))
        .collect();

    let cities = repo.list_cities_in_department(department).await?;
    for name in freshness.keys() {
        if !cities.iter().any(|c| c.name_cadastre.as_ref() == Some(name)) {
            tracing::warn!(department, name_cadastre = %name, "Cadastre data for an unknown city");
        }
    }

    let mut changed = Vec::new();
    for mut city in cities {
        let date = city.name_cadastre.as_ref().and_then(|name| freshness.get(name)).copied();
        if date == city.date_cadastre {
            continue;
        }
        tracing::debug!(city = %city, from = ?city.date_cadastre, to = ?date, "Cadastre date changed");
        city.date_cadastre = date;
        repo.save_city(&city).await?;
        if date.is_some() {
            changed.push(city.insee);
        }
    }
    Ok(changed)
}

/// Sources of one city gathered from the bulk extract
struct CitySources {
    insee: String,
    is_raster: bool,
    sources: Vec<(Option<String>, u64)>,
}

pub struct InitdbPipeline {
    repo: Arc<dyn CityRepository>,
    cadastre: Arc<dyn CadastreSource>,
    open_data: Arc<dyn OpenDataSource>,
    tiles: Arc<dyn TileInvalidator>,
    refresher: StatusRefresher,
    maintenance: Maintenance,
    min_buildings: u64,
    ignored_buildings: Vec<String>,
}

impl InitdbPipeline {
    pub fn new(
        repo: Arc<dyn CityRepository>,
        cadastre: Arc<dyn CadastreSource>,
        open_data: Arc<dyn OpenDataSource>,
        tiles: Arc<dyn TileInvalidator>,
        refresher: StatusRefresher,
        settings: &Settings,
    ) -> Self {
        Self {
            repo,
            cadastre,
            open_data,
            tiles,
            refresher,
            maintenance: Maintenance::new(&settings.html_dir, &settings.tiles_dir),
            min_buildings: settings.min_buildings,
            ignored_buildings: settings.ignored_buildings.clone(),
        }
    }

    pub fn maintenance(&self) -> &Maintenance {
        &self.maintenance
    }

    pub async fn run(&self, items: &[String], progress: &dyn ProgressReporter) -> Result<InitdbReport> {
        let departments = resolve_departments(items);
        let large = departments.len() >= LARGE_BATCH_DEPARTMENTS || items.len() >= LARGE_BATCH_ITEMS;
        tracing::info!(departments = departments.len(), items = items.len(), large, "Starting initdb");

        self.maintenance.begin().await?;

        tracing::info!("Fetching open data building counts");
        let stage = StageProgress::new(progress, 0, STAGES);
        for (i, department) in departments.iter().enumerate() {
            self.compute_count(department).await?;
            stage.advance(i + 1, departments.len());
        }

        tracing::info!("Updating raster state");
        let stage = StageProgress::new(progress, 1, STAGES);
        for (i, department) in departments.iter().enumerate() {
            self.update_raster_state(department).await?;
            stage.advance(i + 1, departments.len());
        }

        tracing::info!("Updating cadastre generation dates");
        let stage = StageProgress::new(progress, 2, STAGES);
        for (i, department) in departments.iter().enumerate() {
            let changed = refresh_freshness(self.repo.as_ref(), self.cadastre.as_ref(), department).await?;
            for insee in changed {
                self.invalidate_city(&insee).await?;
            }
            stage.advance(i + 1, departments.len());
        }

        tracing::info!("Computing city statuses");
        let stage = StageProgress::new(progress, 3, STAGES);
        let mut updated = Vec::new();
        for (i, item) in items.iter().enumerate() {
            updated.extend(self.import_city_stats(item).await?);
            stage.advance(i + 1, items.len());
        }

        tracing::info!("Refreshing unknown cities");
        let stage = StageProgress::new(progress, 4, STAGES);
        let unknowns = self.unknown_cities(items).await?;
        for (i, city) in unknowns.iter().enumerate() {
            if let Err(e) = self.refresher.refresh(&city.insee).await {
                tracing::error!(city = %city, error = %e, "Could not refresh unknown city");
            }
            stage.advance(i + 1, unknowns.len());
        }
        if unknowns.is_empty() {
            stage.advance(0, 0);
        }

        self.maintenance.finish().await?;

        let invalidation = if large {
            self.tiles.invalidate_all().await?;
            Invalidation::Full
        } else {
            let mut boxes = 0;
            for item in items {
                boxes += self.invalidate_item(item).await?;
            }
            Invalidation::Targeted { boxes }
        };

        tracing::info!(updated = updated.len(), ?invalidation, "Initdb done");
        Ok(InitdbReport {
            departments,
            items: items.to_vec(),
            updated,
            invalidation,
        })
    }

    /// Refresh open data counts for a department (short codes) or a city
    ///
    /// Unknown codes yield nothing.
    pub async fn compute_count(&self, item: &str) -> Result<Vec<CadastreCount>> {
        let counts = if is_city_code(item) {
            match self.open_data.city_count(item).await {
                Ok(count) => vec![CadastreCount::new(item, count)],
                Err(BatimapError::CityNotFound { .. }) => {
                    tracing::warn!(insee = item, "No open data count");
                    Vec::new()
                }
                Err(e) => return Err(e),
            }
        } else {
            let mut counts: Vec<CadastreCount> = self
                .open_data
                .department_counts(item)
                .await?
                .into_iter()
                .map(|(insee, count)| CadastreCount::new(insee, count))
                .collect();
            counts.sort_by(|a, b| a.insee.cmp(&b.insee));
            counts
        };

        tracing::debug!(item, counts = counts.len(), "Open data counts fetched");
        self.repo.save_cadastre_counts(&counts).await?;
        Ok(counts)
    }

    /// Reconcile cities with the cadastre listing of their department
    pub async fn update_raster_state(&self, department: &str) -> Result<()> {
        let known = self.repo.list_cities_in_department(department).await?;
        if !known.is_empty() && self.repo.raster_cities_count(department).await? == 0 {
            tracing::debug!(department, "No raster city, skipping");
            return Ok(());
        }

        for entry in self.cadastre.department_listing(department).await? {
            let mut city = match self.repo.get_city(&entry.insee).await? {
                Some(city) => city,
                None => match self.repo.osm_city_name(&entry.insee).await? {
                    Some(name) => City::new(&entry.insee, name),
                    None => {
                        tracing::error!(insee = %entry.insee, "City is missing from the map database, skipping");
                        continue;
                    }
                },
            };

            city.name_cadastre = Some(entry.name_cadastre);
            city.is_raster = entry.is_raster;
            if entry.is_raster {
                city.import_date = StatusLabel::Raster;
            } else if city.import_date == StatusLabel::Raster {
                city.import_date = StatusLabel::Never;
            }
            self.repo.save_city(&city).await?;
        }
        Ok(())
    }

    /// Bulk recompute of the cities of an item, returning the updated ones
    ///
    /// A real year is never replaced by a bad label here; the live refresh is
    /// the only way down.
    pub async fn import_city_stats(&self, item: &str) -> Result<Vec<String>> {
        let rows = self.repo.building_sources(item, &self.ignored_buildings).await?;
        let mut simplified: HashMap<String, Vec<i64>> = HashMap::new();
        for point in self.repo.point_buildings(item).await? {
            simplified.entry(point.insee).or_default().push(point.osm_id);
        }

        let mut per_city: Vec<CitySources> = Vec::new();
        for row in rows {
            match per_city.iter_mut().find(|c| c.insee == row.insee) {
                Some(city) => city.sources.push((row.dated_source, row.count)),
                None => per_city.push(CitySources {
                    insee: row.insee,
                    is_raster: row.is_raster,
                    sources: vec![(row.dated_source, row.count)],
                }),
            }
        }

        let mut updated = Vec::new();
        for entry in per_city {
            let Some(mut city) = self.repo.get_city(&entry.insee).await? else {
                tracing::warn!(insee = %entry.insee, "Buildings found for an unknown city");
                continue;
            };
            let points = simplified.remove(&entry.insee).unwrap_or_default();
            let outlined: u64 = entry.sources.iter().map(|(_, count)| count).sum();

            let result = if entry.is_raster {
                Classification::raster()
            } else {
                let auxiliary_count = self.repo.get_cadastre_count(&entry.insee).await?.map(|c| c.od_buildings);
                classify(&ClassifierInput {
                    sources: entry.sources,
                    has_simplified: !points.is_empty(),
                    total_buildings: outlined,
                    auxiliary_count,
                    min_buildings: self.min_buildings,
                })
            };

            let old = city.import_date;
            let changed = result.label != old && (old.is_bad() || !result.label.is_bad());
            if changed {
                tracing::info!(city = %city, from = %old, to = %result.label, "Import date changed");
                city.import_date = result.label;
            }
            city.import_details = ImportDetails {
                dates: result.dates,
                simplified: points,
            };
            city.osm_buildings = outlined;
            self.repo.save_city(&city).await?;
            if changed {
                updated.push(city.insee);
            }
        }
        Ok(updated)
    }

    /// Cities still `unknown` after the bulk pass
    ///
    /// A department item brings all of its unknown cities, a city item only
    /// itself.
    async fn unknown_cities(&self, items: &[String]) -> Result<Vec<City>> {
        let departments: Vec<String> = items.iter().filter(|i| !is_city_code(i)).cloned().collect();
        let mut unknowns = if departments.is_empty() {
            Vec::new()
        } else {
            self.repo.list_unknown_cities(&departments).await?
        };

        for insee in items.iter().filter(|i| is_city_code(i)) {
            if unknowns.iter().any(|c| &c.insee == insee) {
                continue;
            }
            if let Some(city) = self.repo.get_city(insee).await? {
                if city.import_date == StatusLabel::Unknown {
                    unknowns.push(city);
                }
            }
        }
        Ok(unknowns)
    }

    async fn invalidate_city(&self, insee: &str) -> Result<bool> {
        match self.repo.city_bbox(insee).await? {
            Some(bbox) => {
                self.tiles.invalidate_bbox(&bbox).await?;
                Ok(true)
            }
            None => {
                tracing::warn!(insee, "No bounding box, tiles left untouched");
                Ok(false)
            }
        }
    }

    async fn invalidate_item(&self, item: &str) -> Result<usize> {
        let insees = if is_city_code(item) {
            vec![item.to_string()]
        } else {
            self.repo
                .list_cities_in_department(item)
                .await?
                .into_iter()
                .map(|c| c.insee)
                .collect()
        };

        let mut boxes = 0;
        for insee in insees {
            if self.invalidate_city(&insee).await? {
                boxes += 1;
            }
        }
        Ok(boxes)
    }
}
