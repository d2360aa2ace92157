use async_trait::async_trait;
use batimap_core::error::Result;
use batimap_core::models::{Bbox, CadastreCount, City, LabelCount};
use serde::{Deserialize, Serialize};

/// One line of the bulk building extract: all outlined buildings of a city
/// sharing the same dated source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingSourceRow {
    pub insee: String,
    pub name: String,
    /// `source` and `source:date` concatenated, absent when both are missing
    pub dated_source: Option<String>,
    pub count: u64,
    pub is_raster: bool,
}

/// A building mapped as a single point inside a vector city
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointBuilding {
    pub insee: String,
    pub osm_id: i64,
}

/// Port for city status persistence and the map database extracts
///
/// `item` arguments accept either a city INSEE code or a department code.
#[async_trait]
pub trait CityRepository: Send + Sync {
    /// Retrieve a city by INSEE code
    async fn get_city(&self, insee: &str) -> Result<Option<City>>;

    /// Retrieve a city by display name
    async fn get_city_by_name(&self, name: &str) -> Result<Option<City>>;

    /// All known cities, ordered by INSEE code
    async fn list_cities(&self) -> Result<Vec<City>>;

    async fn list_cities_in_department(&self, department: &str) -> Result<Vec<City>>;

    /// Cities currently labeled `unknown` in the given departments
    async fn list_unknown_cities(&self, departments: &[String]) -> Result<Vec<City>>;

    async fn raster_cities_count(&self, department: &str) -> Result<usize>;

    /// Insert or overwrite a city
    async fn save_city(&self, city: &City) -> Result<()>;

    async fn get_cadastre_count(&self, insee: &str) -> Result<Option<CadastreCount>>;

    /// Insert or overwrite open data counts
    async fn save_cadastre_counts(&self, counts: &[CadastreCount]) -> Result<()>;

    /// Name of the administrative boundary in the map database
    async fn osm_city_name(&self, insee: &str) -> Result<Option<String>>;

    async fn city_bbox(&self, insee: &str) -> Result<Option<Bbox>>;

    /// Department codes, sorted
    async fn list_departments(&self) -> Result<Vec<String>>;

    /// Bulk extract of outlined buildings grouped by city and dated source
    async fn building_sources(&self, item: &str, ignored_buildings: &[String]) -> Result<Vec<BuildingSourceRow>>;

    /// Buildings mapped as points in the non-raster cities of `item`
    async fn point_buildings(&self, item: &str) -> Result<Vec<PointBuilding>>;

    /// Number of cities per label, ordered by label
    async fn imports_count_per_label(&self) -> Result<Vec<LabelCount>>;
}
