//! Overpass QL requests and responses

use batimap_core::models::BuildingRecord;
use serde::Deserialize;

/// Every building of a city, identified by its INSEE code
///
/// Buildings whose `building=*` value is listed in `ignored_buildings` are left
/// out by the server.
pub fn city_buildings_query(insee: &str, ignored_buildings: &[String]) -> String {
    let filter: String = ignored_buildings
        .iter()
        .map(|b| format!("['building'!='{}']", b))
        .collect();
    format!(
        "[out:json];\
area[boundary='administrative'][admin_level~'8|9']['ref:INSEE'='{insee}']->.a;\
(node['building']{filter}(area.a);way['building']{filter}(area.a);relation['building']{filter}(area.a););\
out tags qt meta;"
    )
}

/// Response body of an `[out:json]` query
#[derive(Debug, Deserialize)]
pub struct OverpassResponse {
    #[serde(default)]
    pub elements: Vec<BuildingRecord>,

    /// Set when the server aborted the query (timeout, memory)
    #[serde(default)]
    pub remark: Option<String>,
}
