//! Live city status, computed from the spatial query service

use batimap_core::classify::{classify, ClassifierInput, Classification};
use batimap_core::config::Settings;
use batimap_core::error::{BatimapError, Result};
use batimap_core::models::{City, ElementKind, ImportDetails};
use batimap_core::ports::BuildingQuery;
use batimap_store::CityRepository;
use std::sync::Arc;

/// Reclassifies single cities from their current buildings
#[derive(Clone)]
pub struct StatusRefresher {
    repo: Arc<dyn CityRepository>,
    query: Arc<dyn BuildingQuery>,
    min_buildings: u64,
    ignored_buildings: Vec<String>,
}

impl StatusRefresher {
    pub fn new(repo: Arc<dyn CityRepository>, query: Arc<dyn BuildingQuery>, settings: &Settings) -> Self {
        Self {
            repo,
            query,
            min_buildings: settings.min_buildings,
            ignored_buildings: settings.ignored_buildings.clone(),
        }
    }

    /// Compute the status of `city` without saving it
    ///
    /// Raster cities are returned unchanged.
    pub async fn compute(&self, city: &City) -> Result<City> {
        let mut city = city.clone();
        if city.is_raster {
            city.import_date = Classification::raster().label;
            return Ok(city);
        }

        let records = self.query.city_buildings(&city.insee, &self.ignored_buildings).await?;

        let mut sources = Vec::with_capacity(records.len());
        let mut simplified = Vec::new();
        let mut outlined = 0u64;
        for record in &records {
            if record.kind == ElementKind::Node {
                if record.is_point_like() {
                    continue;
                }
                tracing::info!(city = %city, osm_id = record.id, "City has buildings with a simplified geometry");
                simplified.push(record.id);
            } else {
                outlined += 1;
            }
            sources.push(record.edit_year().or_else(|| record.dated_source()));
        }

        let auxiliary_count = self.repo.get_cadastre_count(&city.insee).await?.map(|c| c.od_buildings);
        let input = ClassifierInput::from_sources(sources, self.min_buildings)
            .with_simplified(!simplified.is_empty())
            .with_auxiliary_count(auxiliary_count);
        let result = classify(&input);

        tracing::debug!(city = %city, date = %result.label, details = ?result.dates, "City stats");
        city.import_date = result.label;
        city.import_details = ImportDetails {
            dates: result.dates,
            simplified,
        };
        city.osm_buildings = outlined;
        Ok(city)
    }

    /// Recompute and store the status of a city
    pub async fn refresh(&self, insee: &str) -> Result<City> {
        let city = self
            .repo
            .get_city(insee)
            .await?
            .ok_or_else(|| BatimapError::CityNotFound { insee: insee.to_string() })?;
        let updated = self.compute(&city).await?;
        if updated.import_date != city.import_date {
            tracing::info!(city = %updated, from = %city.import_date, to = %updated.import_date, "Import date changed");
        }
        self.repo.save_city(&updated).await?;
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use batimap_core::models::{BuildingRecord, CadastreCount, StatusLabel};
    use batimap_store::MemoryCityRepository;

    struct FixedBuildings(Vec<BuildingRecord>);

    #[async_trait]
    impl BuildingQuery for FixedBuildings {
        async fn city_buildings(&self, _insee: &str, _ignored: &[String]) -> Result<Vec<BuildingRecord>> {
            Ok(self.0.clone())
        }
    }

    fn record(id: i64, kind: ElementKind, year: &str, tags: &[(&str, &str)]) -> BuildingRecord {
        BuildingRecord {
            id,
            kind,
            tags: tags.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            timestamp: Some(format!("{}-06-01T12:00:00Z", year)),
        }
    }

    fn refresher(repo: &MemoryCityRepository, records: Vec<BuildingRecord>) -> StatusRefresher {
        let settings = Settings {
            min_buildings: 3,
            ..Settings::default()
        };
        StatusRefresher::new(Arc::new(repo.clone()), Arc::new(FixedBuildings(records)), &settings)
    }

    #[tokio::test]
    async fn test_refresh_dates_city_from_edit_years() {
        let repo = MemoryCityRepository::new();
        let mut city = City::new("01004", "Ambérieu");
        city.import_date = StatusLabel::Unknown;
        repo.save_city(&city).await.unwrap();

        let records = (0..4)
            .map(|i| record(i, ElementKind::Way, "2016", &[("building", "yes")]))
            .chain([record(9, ElementKind::Node, "2020", &[("building", "hut")])])
            .collect();
        let updated = refresher(&repo, records).refresh("01004").await.unwrap();

        assert_eq!(updated.import_date, StatusLabel::Year(2016));
        assert_eq!(updated.osm_buildings, 4);
        assert!(updated.import_details.simplified.is_empty());
        assert_eq!(repo.get_city("01004").await.unwrap().unwrap().import_date, StatusLabel::Year(2016));
    }

    #[tokio::test]
    async fn test_point_buildings_mark_city_unfinished() {
        let repo = MemoryCityRepository::new();
        repo.save_city(&City::new("01004", "Ambérieu")).await.unwrap();

        let records = vec![
            record(1, ElementKind::Way, "2018", &[("building", "yes")]),
            record(2, ElementKind::Way, "2018", &[("building", "yes")]),
            record(3, ElementKind::Way, "2018", &[("building", "yes")]),
            record(4, ElementKind::Node, "2018", &[("building", "yes")]),
        ];
        let updated = refresher(&repo, records).refresh("01004").await.unwrap();

        assert_eq!(updated.import_date, StatusLabel::Unfinished);
        assert_eq!(updated.import_details.simplified, vec![4]);
    }

    #[tokio::test]
    async fn test_open_data_evidence_forces_never() {
        let repo = MemoryCityRepository::new();
        repo.save_city(&City::new("01004", "Ambérieu")).await.unwrap();
        repo.save_cadastre_counts(&[CadastreCount::new("01004", 400)]).await.unwrap();

        let records = vec![record(1, ElementKind::Way, "2018", &[("building", "yes")])];
        let updated = refresher(&repo, records).refresh("01004").await.unwrap();
        assert_eq!(updated.import_date, StatusLabel::Never);
    }

    #[tokio::test]
    async fn test_raster_city_is_not_queried() {
        let repo = MemoryCityRepository::new();
        let mut city = City::new("26400", "Cobonne");
        city.is_raster = true;
        repo.save_city(&city).await.unwrap();

        let updated = refresher(&repo, Vec::new()).refresh("26400").await.unwrap();
        assert_eq!(updated.import_date, StatusLabel::Raster);
    }

    #[tokio::test]
    async fn test_unknown_city() {
        let repo = MemoryCityRepository::new();
        let err = refresher(&repo, Vec::new()).refresh("99999").await.unwrap_err();
        assert!(matches!(err, BatimapError::CityNotFound { .. }));
    }
}
