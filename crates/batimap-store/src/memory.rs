//! In-memory storage implementations for development, tests and CLI snapshots.
//!
//! These implementations use `RwLock::unwrap()` intentionally. Lock poisoning
//! only occurs when another thread panicked while holding the lock, which is
//! an unrecoverable state.

use async_trait::async_trait;
use batimap_core::error::{BatimapError, Result};
use batimap_core::models::{
    department_of, is_city_code, Bbox, BuildingRecord, CadastreCount, City, ElementKind, LabelCount,
};
use batimap_core::ports::{
    BuildingQuery, CadastreFreshness, CadastreListing, CadastreSource, OpenDataSource,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use crate::ports::{BuildingSourceRow, CityRepository, PointBuilding};
use crate::snapshot::RepositorySnapshot;

/// Administrative boundary of a city as imported in the map database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Boundary {
    pub insee: String,
    pub name: String,
    pub bbox: Bbox,
}

/// Whether `insee` belongs to `item`, a city or department code
fn matches_item(insee: &str, item: &str) -> bool {
    if is_city_code(item) {
        insee == item
    } else {
        department_of(insee) == item
    }
}

/// In-memory implementation of CityRepository
///
/// Also holds the boundaries and building elements standing in for the map
/// database, which makes it usable as an offline [`BuildingQuery`].
#[derive(Debug, Clone, Default)]
pub struct MemoryCityRepository {
    cities: Arc<RwLock<BTreeMap<String, City>>>,
    counts: Arc<RwLock<HashMap<String, CadastreCount>>>,
    boundaries: Arc<RwLock<HashMap<String, Boundary>>>,
    buildings: Arc<RwLock<HashMap<String, Vec<BuildingRecord>>>>,
}

impl MemoryCityRepository {
    /// Create a new empty repository
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a repository from a snapshot
    pub fn from_snapshot(snapshot: RepositorySnapshot) -> Self {
        let repo = Self::new();
        {
            let mut cities = repo.cities.write().unwrap();
            for city in snapshot.cities {
                cities.insert(city.insee.clone(), city);
            }
            let mut counts = repo.counts.write().unwrap();
            for count in snapshot.cadastre_counts {
                counts.insert(count.insee.clone(), count);
            }
            let mut boundaries = repo.boundaries.write().unwrap();
            for boundary in snapshot.boundaries {
                boundaries.insert(boundary.insee.clone(), boundary);
            }
            *repo.buildings.write().unwrap() = snapshot.buildings;
        }
        repo
    }

    /// Capture the current state into a snapshot
    ///
    /// Cadastre listings and open data sections are left empty, they belong to
    /// the static sources.
    pub fn snapshot(&self) -> RepositorySnapshot {
        let mut boundaries: Vec<_> = self.boundaries.read().unwrap().values().cloned().collect();
        boundaries.sort_by(|a, b| a.insee.cmp(&b.insee));
        let mut cadastre_counts: Vec<_> = self.counts.read().unwrap().values().cloned().collect();
        cadastre_counts.sort_by(|a, b| a.insee.cmp(&b.insee));

        RepositorySnapshot {
            cities: self.cities.read().unwrap().values().cloned().collect(),
            cadastre_counts,
            boundaries,
            buildings: self.buildings.read().unwrap().clone(),
            ..Default::default()
        }
    }

    /// Register the administrative boundary of a city
    pub fn insert_boundary(&self, boundary: Boundary) {
        self.boundaries.write().unwrap().insert(boundary.insee.clone(), boundary);
    }

    /// Add building elements located inside a city
    pub fn insert_buildings(&self, insee: &str, records: Vec<BuildingRecord>) {
        self.buildings
            .write()
            .unwrap()
            .entry(insee.to_string())
            .or_default()
            .extend(records);
    }
}

#[async_trait]
impl CityRepository for MemoryCityRepository {
    async fn get_city(&self, insee: &str) -> Result<Option<City>> {
        Ok(self.cities.read().unwrap().get(insee).cloned())
    }

    async fn get_city_by_name(&self, name: &str) -> Result<Option<City>> {
        let cities = self.cities.read().unwrap();
        Ok(cities.values().find(|c| c.name == name).cloned())
    }

    async fn list_cities(&self) -> Result<Vec<City>> {
        Ok(self.cities.read().unwrap().values().cloned().collect())
    }

    async fn list_cities_in_department(&self, department: &str) -> Result<Vec<City>> {
        let cities = self.cities.read().unwrap();
        Ok(cities.values().filter(|c| c.department == department).cloned().collect())
    }

    async fn list_unknown_cities(&self, departments: &[String]) -> Result<Vec<City>> {
        let cities = self.cities.read().unwrap();
        Ok(cities
            .values()
            .filter(|c| departments.contains(&c.department))
            .filter(|c| c.import_date == batimap_core::models::StatusLabel::Unknown)
            .cloned()
            .collect())
    }

    async fn raster_cities_count(&self, department: &str) -> Result<usize> {
        let cities = self.cities.read().unwrap();
        Ok(cities.values().filter(|c| c.department == department && c.is_raster).count())
    }

    async fn save_city(&self, city: &City) -> Result<()> {
        self.cities.write().unwrap().insert(city.insee.clone(), city.clone());
        Ok(())
    }

    async fn get_cadastre_count(&self, insee: &str) -> Result<Option<CadastreCount>> {
        Ok(self.counts.read().unwrap().get(insee).cloned())
    }

    async fn save_cadastre_counts(&self, counts: &[CadastreCount]) -> Result<()> {
        let mut stored = self.counts.write().unwrap();
        for count in counts {
            stored.insert(count.insee.clone(), count.clone());
        }
        Ok(())
    }

    async fn osm_city_name(&self, insee: &str) -> Result<Option<String>> {
        Ok(self.boundaries.read().unwrap().get(insee).map(|b| b.name.clone()))
    }

    async fn city_bbox(&self, insee: &str) -> Result<Option<Bbox>> {
        Ok(self.boundaries.read().unwrap().get(insee).map(|b| b.bbox))
    }

    async fn list_departments(&self) -> Result<Vec<String>> {
        let cities = self.cities.read().unwrap();
        let mut departments: Vec<String> = cities.values().map(|c| c.department.clone()).collect();
        departments.sort();
        departments.dedup();
        Ok(departments)
    }

    async fn building_sources(&self, item: &str, ignored_buildings: &[String]) -> Result<Vec<BuildingSourceRow>> {
        let cities = self.cities.read().unwrap();
        let buildings = self.buildings.read().unwrap();
        let mut rows = Vec::new();

        for city in cities.values().filter(|c| matches_item(&c.insee, item)) {
            let Some(records) = buildings.get(&city.insee) else {
                continue;
            };
            let mut grouped: Vec<(Option<String>, u64)> = Vec::new();
            for record in records {
                if record.kind == ElementKind::Node {
                    continue;
                }
                match record.tag("building") {
                    None => continue,
                    Some(b) if ignored_buildings.iter().any(|i| i == b) => continue,
                    Some(_) => {}
                }
                let source = record.dated_source();
                match grouped.iter_mut().find(|(s, _)| *s == source) {
                    Some((_, count)) => *count += 1,
                    None => grouped.push((source, 1)),
                }
            }
            rows.extend(grouped.into_iter().map(|(dated_source, count)| BuildingSourceRow {
                insee: city.insee.clone(),
                name: city.name.clone(),
                dated_source,
                count,
                is_raster: city.is_raster,
            }));
        }
        Ok(rows)
    }

    async fn point_buildings(&self, item: &str) -> Result<Vec<PointBuilding>> {
        let cities = self.cities.read().unwrap();
        let buildings = self.buildings.read().unwrap();
        let mut points = Vec::new();

        for city in cities.values().filter(|c| !c.is_raster && matches_item(&c.insee, item)) {
            let Some(records) = buildings.get(&city.insee) else {
                continue;
            };
            points.extend(
                records
                    .iter()
                    .filter(|r| r.tag("building").is_some() && r.is_simplified())
                    .map(|r| PointBuilding {
                        insee: city.insee.clone(),
                        osm_id: r.id,
                    }),
            );
        }
        Ok(points)
    }

    async fn imports_count_per_label(&self) -> Result<Vec<LabelCount>> {
        let cities = self.cities.read().unwrap();
        let mut per_label: BTreeMap<String, LabelCount> = BTreeMap::new();
        for city in cities.values() {
            per_label
                .entry(city.import_date.to_string())
                .or_insert(LabelCount {
                    date: city.import_date,
                    count: 0,
                })
                .count += 1;
        }
        Ok(per_label.into_values().collect())
    }
}

#[async_trait]
impl BuildingQuery for MemoryCityRepository {
    async fn city_buildings(&self, insee: &str, ignored_buildings: &[String]) -> Result<Vec<BuildingRecord>> {
        if !self.boundaries.read().unwrap().contains_key(insee) {
            return Err(BatimapError::Query {
                reason: format!("no administrative boundary for {}", insee),
                transient: false,
            });
        }
        let buildings = self.buildings.read().unwrap();
        Ok(buildings
            .get(insee)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| !matches!(r.tag("building"), Some(b) if ignored_buildings.iter().any(|i| i == b)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Cadastre listing served from memory
#[derive(Debug, Clone, Default)]
pub struct StaticCadastreSource {
    listings: Arc<RwLock<HashMap<String, Vec<CadastreListing>>>>,
    freshness: Arc<RwLock<HashMap<String, Vec<CadastreFreshness>>>>,
}

impl StaticCadastreSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: &RepositorySnapshot) -> Self {
        Self {
            listings: Arc::new(RwLock::new(snapshot.cadastre_listings.clone())),
            freshness: Arc::new(RwLock::new(snapshot.cadastre_freshness.clone())),
        }
    }

    pub fn set_listing(&self, department: &str, listing: Vec<CadastreListing>) {
        self.listings.write().unwrap().insert(department.to_string(), listing);
    }

    pub fn set_freshness(&self, department: &str, freshness: Vec<CadastreFreshness>) {
        self.freshness.write().unwrap().insert(department.to_string(), freshness);
    }
}

#[async_trait]
impl CadastreSource for StaticCadastreSource {
    async fn department_listing(&self, department: &str) -> Result<Vec<CadastreListing>> {
        Ok(self.listings.read().unwrap().get(department).cloned().unwrap_or_default())
    }

    async fn department_freshness(&self, department: &str) -> Result<Vec<CadastreFreshness>> {
        Ok(self.freshness.read().unwrap().get(department).cloned().unwrap_or_default())
    }
}

/// Open data building counts served from memory
#[derive(Debug, Clone, Default)]
pub struct StaticOpenData {
    counts: Arc<RwLock<HashMap<String, u64>>>,
}

impl StaticOpenData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: &RepositorySnapshot) -> Self {
        Self {
            counts: Arc::new(RwLock::new(snapshot.open_data.clone())),
        }
    }

    pub fn set_count(&self, insee: &str, count: u64) {
        self.counts.write().unwrap().insert(insee.to_string(), count);
    }
}

#[async_trait]
impl OpenDataSource for StaticOpenData {
    async fn department_counts(&self, department: &str) -> Result<HashMap<String, u64>> {
        let counts = self.counts.read().unwrap();
        Ok(counts
            .iter()
            .filter(|(insee, _)| is_city_code(insee) && department_of(insee) == department)
            .map(|(insee, count)| (insee.clone(), *count))
            .collect())
    }

    async fn city_count(&self, insee: &str) -> Result<u64> {
        self.counts
            .read()
            .unwrap()
            .get(insee)
            .copied()
            .ok_or_else(|| BatimapError::CityNotFound {
                insee: insee.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use batimap_core::models::StatusLabel;

    fn building(id: i64, kind: ElementKind, tags: &[(&str, &str)]) -> BuildingRecord {
        BuildingRecord {
            id,
            kind,
            tags: tags.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            timestamp: None,
        }
    }

    #[tokio::test]
    async fn test_save_and_get_city() {
        let repo = MemoryCityRepository::new();
        let mut city = City::new("01004", "Ambérieu-en-Bugey");
        city.import_date = StatusLabel::Year(2013);
        repo.save_city(&city).await.unwrap();

        let stored = repo.get_city("01004").await.unwrap().unwrap();
        assert_eq!(stored.import_date, StatusLabel::Year(2013));
        assert_eq!(stored.department, "01");
        assert!(repo.get_city("01005").await.unwrap().is_none());
        assert_eq!(
            repo.get_city_by_name("Ambérieu-en-Bugey").await.unwrap().map(|c| c.insee),
            Some("01004".to_string())
        );
    }

    #[tokio::test]
    async fn test_department_queries() {
        let repo = MemoryCityRepository::new();
        let mut raster = City::new("01001", "A");
        raster.is_raster = true;
        let mut unknown = City::new("01002", "B");
        unknown.import_date = StatusLabel::Unknown;
        repo.save_city(&raster).await.unwrap();
        repo.save_city(&unknown).await.unwrap();
        repo.save_city(&City::new("02001", "C")).await.unwrap();

        assert_eq!(repo.list_cities_in_department("01").await.unwrap().len(), 2);
        assert_eq!(repo.raster_cities_count("01").await.unwrap(), 1);
        assert_eq!(repo.raster_cities_count("02").await.unwrap(), 0);
        assert_eq!(repo.list_departments().await.unwrap(), vec!["01", "02"]);

        let unknowns = repo.list_unknown_cities(&["01".to_string()]).await.unwrap();
        assert_eq!(unknowns.len(), 1);
        assert_eq!(unknowns[0].insee, "01002");
    }

    #[tokio::test]
    async fn test_building_sources_groups_outlined_buildings() {
        let repo = MemoryCityRepository::new();
        repo.save_city(&City::new("01004", "Ambérieu")).await.unwrap();
        repo.insert_buildings(
            "01004",
            vec![
                building(1, ElementKind::Way, &[("building", "yes"), ("source", "cadastre 2012")]),
                building(2, ElementKind::Way, &[("building", "house"), ("source", "cadastre 2012")]),
                building(3, ElementKind::Way, &[("building", "yes")]),
                building(4, ElementKind::Way, &[("building", "church"), ("source", "cadastre 2012")]),
                building(5, ElementKind::Node, &[("building", "yes")]),
                building(6, ElementKind::Node, &[("building", "hut")]),
                building(7, ElementKind::Node, &[("building", "yes"), ("power", "substation")]),
            ],
        );

        let rows = repo.building_sources("01", &["church".to_string()]).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].dated_source.as_deref(), Some("cadastre 2012"));
        assert_eq!(rows[0].count, 2);
        assert_eq!(rows[1].dated_source, None);

        let points = repo.point_buildings("01004").await.unwrap();
        assert_eq!(points, vec![PointBuilding { insee: "01004".into(), osm_id: 5 }]);
    }

    #[tokio::test]
    async fn test_imports_count_per_label() {
        let repo = MemoryCityRepository::new();
        for (insee, label) in [("01001", "2012"), ("01002", "never"), ("01003", "2012")] {
            let mut city = City::new(insee, insee);
            city.import_date = label.parse().unwrap();
            repo.save_city(&city).await.unwrap();
        }

        let counts = repo.imports_count_per_label().await.unwrap();
        assert_eq!(counts.len(), 2);
        assert_eq!(counts[0].date, StatusLabel::Year(2012));
        assert_eq!(counts[0].count, 2);
        assert_eq!(counts[1].date, StatusLabel::Never);
    }

    #[tokio::test]
    async fn test_offline_query_needs_boundary() {
        let repo = MemoryCityRepository::new();
        assert!(repo.city_buildings("01004", &[]).await.is_err());

        repo.insert_boundary(Boundary {
            insee: "01004".into(),
            name: "Ambérieu-en-Bugey".into(),
            bbox: Bbox::new(5.3, 45.9, 5.4, 46.0),
        });
        repo.insert_buildings("01004", vec![building(1, ElementKind::Way, &[("building", "church")])]);
        assert!(repo.city_buildings("01004", &["church".into()]).await.unwrap().is_empty());
        assert_eq!(repo.osm_city_name("01004").await.unwrap().as_deref(), Some("Ambérieu-en-Bugey"));
    }

    #[tokio::test]
    async fn test_static_open_data() {
        let od = StaticOpenData::new();
        od.set_count("01004", 1200);
        od.set_count("01005", 80);
        od.set_count("02001", 10);

        let counts = od.department_counts("01").await.unwrap();
        assert_eq!(counts.len(), 2);
        assert_eq!(od.city_count("01004").await.unwrap(), 1200);
        assert!(od.city_count("99999").await.is_err());
    }
}
