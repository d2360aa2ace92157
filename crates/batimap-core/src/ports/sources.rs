use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::Result;
use crate::models::{Bbox, BuildingRecord, City};

/// One city as listed by the cadastre website
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CadastreListing {
    pub insee: String,
    /// e.g. "CL098-COBONNE"
    pub name_cadastre: String,
    pub is_raster: bool,
}

/// Generation date of a city's vector editing data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CadastreFreshness {
    pub name_cadastre: String,
    pub generated_at: DateTime<Utc>,
}

/// Port for the spatial query service returning building elements
#[async_trait]
pub trait BuildingQuery: Send + Sync {
    /// All buildings inside the city's administrative boundary, excluding the
    /// given `building=*` values
    async fn city_buildings(&self, insee: &str, ignored_buildings: &[String]) -> Result<Vec<BuildingRecord>>;
}

/// Port for the cadastre listing and generated data index
#[async_trait]
pub trait CadastreSource: Send + Sync {
    /// Cities of a department with their raster/vector classification
    async fn department_listing(&self, department: &str) -> Result<Vec<CadastreListing>>;

    /// Generation dates of the vector data available for a department
    async fn department_freshness(&self, department: &str) -> Result<Vec<CadastreFreshness>>;
}

/// Port for the open data building counts
#[async_trait]
pub trait OpenDataSource: Send + Sync {
    /// Building count per INSEE code for a whole department
    async fn department_counts(&self, department: &str) -> Result<HashMap<String, u64>>;

    /// Building count of a single city
    async fn city_count(&self, insee: &str) -> Result<u64>;
}

/// Port for the map tile cache
#[async_trait]
pub trait TileInvalidator: Send + Sync {
    /// Flag every cached tile as stale
    async fn invalidate_all(&self) -> Result<()>;

    /// Flag tiles intersecting the box as stale
    async fn invalidate_bbox(&self, bbox: &Bbox) -> Result<()>;
}

/// Lines of text emitted by a running generation
pub type LineStream<'a> = BoxStream<'a, Result<String>>;

/// Port for the external vector data generator
#[async_trait]
pub trait CadastreGenerator: Send + Sync {
    /// Start generating editable data for the city, streaming its output
    async fn generate<'a>(&'a self, city: &'a City, force: bool) -> Result<LineStream<'a>>;
}
