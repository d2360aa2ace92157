use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::bbox::Bbox;
use super::status::StatusLabel;

/// Derive the department code from an INSEE code
///
/// Overseas departments use three characters (971..976), all others two
/// (including Corsica's 2A/2B).
pub fn department_of(insee: &str) -> String {
    let len = if insee.starts_with("97") { 3 } else { 2 };
    insee.chars().take(len).collect()
}

/// Whether a requested item is a city INSEE code rather than a department code
pub fn is_city_code(item: &str) -> bool {
    item.len() > 3
}

/// Ordered frequency table of normalized source tokens
///
/// Entries keep their first-seen order so that ties resolve deterministically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrequencyTable(pub Vec<(String, usize)>);

impl FrequencyTable {
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut table = Self::default();
        for token in tokens {
            table.add(token.as_ref(), 1);
        }
        table
    }

    pub fn add(&mut self, token: &str, count: usize) {
        match self.0.iter_mut().find(|(t, _)| t == token) {
            Some((_, c)) => *c += count,
            None => self.0.push((token.to_string(), count)),
        }
    }

    /// Most frequent token, first seen wins on ties
    pub fn most_common(&self) -> Option<&str> {
        let mut best: Option<&(String, usize)> = None;
        for entry in &self.0 {
            if best.map_or(true, |b| entry.1 > b.1) {
                best = Some(entry);
            }
        }
        best.map(|(t, _)| t.as_str())
    }

    pub fn get(&self, token: &str) -> usize {
        self.0.iter().find(|(t, _)| t == token).map_or(0, |(_, c)| *c)
    }

    pub fn total(&self) -> usize {
        self.0.iter().map(|(_, c)| c).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Diagnostic details stored with a city's status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportDetails {
    /// Frequency of each normalized source token
    pub dates: FrequencyTable,

    /// OSM ids of buildings mapped as a single point
    pub simplified: Vec<i64>,
}

/// A French municipality and its import status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
    /// INSEE code (primary key)
    pub insee: String,

    /// Department code, prefix of the INSEE code
    pub department: String,

    /// Display name
    pub name: String,

    /// Name used by the cadastre generator (e.g. "CL098-COBONNE")
    pub name_cadastre: Option<String>,

    /// Cadastre only available as scanned images
    pub is_raster: bool,

    /// Current import status
    pub import_date: StatusLabel,

    /// Last generation of vector editing data
    pub date_cadastre: Option<DateTime<Utc>>,

    /// Frequency breakdown and simplified building references
    pub import_details: ImportDetails,

    /// Outlined buildings observed during the last classification
    pub osm_buildings: u64,
}

impl City {
    /// Create a city that was never classified
    pub fn new(insee: impl Into<String>, name: impl Into<String>) -> Self {
        let insee = insee.into();
        Self {
            department: department_of(&insee),
            insee,
            name: name.into(),
            name_cadastre: None,
            is_raster: false,
            import_date: StatusLabel::Never,
            date_cadastre: None,
            import_details: ImportDetails::default(),
            osm_buildings: 0,
        }
    }

    /// Vector data was generated less than `freshness_days` ago
    pub fn is_josm_ready(&self, now: DateTime<Utc>, freshness_days: i64) -> bool {
        self.date_cadastre
            .map(|generated| now - generated < Duration::days(freshness_days))
            .unwrap_or(false)
    }
}

impl std::fmt::Display for City {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name, self.insee)
    }
}

/// Building count reported by the open data cadastre
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CadastreCount {
    /// City or department code
    pub insee: String,

    /// Parent department
    pub department: String,

    /// Buildings in the open data export
    pub od_buildings: u64,

    /// When the count was fetched
    pub last_fetch: DateTime<Utc>,
}

impl CadastreCount {
    pub fn new(insee: impl Into<String>, od_buildings: u64) -> Self {
        let insee = insee.into();
        Self {
            department: department_of(&insee),
            insee,
            od_buildings,
            last_fetch: Utc::now(),
        }
    }
}

/// Read model of a city handed to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityDto {
    pub insee: String,
    pub name: String,
    pub date: StatusLabel,
    pub details: ImportDetails,
    pub josm_ready: bool,
    pub osm_buildings: u64,
    pub od_buildings: Option<u64>,
}

impl CityDto {
    pub fn new(city: &City, cadastre: Option<&CadastreCount>, josm_ready: bool) -> Self {
        Self {
            insee: city.insee.clone(),
            name: city.name.clone(),
            date: city.import_date,
            details: city.import_details.clone(),
            josm_ready,
            osm_buildings: city.osm_buildings,
            od_buildings: cadastre.map(|c| c.od_buildings),
        }
    }
}

/// Everything an editor needs to start working on a city
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditableData {
    pub buildings_url: String,
    pub segmentation_predictions_url: String,
    /// xmin, xmax, ymin, ymax
    pub bbox: [f64; 4],
    pub date: StatusLabel,
}

impl EditableData {
    pub fn new(cadastre_url: &str, city: &City, name_cadastre: &str, bbox: &Bbox) -> Self {
        let base = format!(
            "{}/data/{:0>3}/{}-houses-",
            cadastre_url.trim_end_matches('/'),
            city.department,
            name_cadastre
        );
        Self {
            buildings_url: format!("{}simplifie.osm", base),
            segmentation_predictions_url: format!("{}prediction_segmente.osm", base),
            bbox: bbox.to_editor_order(),
            date: city.import_date,
        }
    }
}

/// Number of cities sharing a label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelCount {
    pub date: StatusLabel,
    pub count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_department_of() {
        assert_eq!(department_of("01004"), "01");
        assert_eq!(department_of("2B221"), "2B");
        assert_eq!(department_of("97411"), "974");
    }

    #[test]
    fn test_is_city_code() {
        assert!(is_city_code("01004"));
        assert!(!is_city_code("01"));
        assert!(!is_city_code("974"));
    }

    #[test]
    fn test_frequency_table_first_seen_wins() {
        let table = FrequencyTable::from_tokens(["2012", "unknown", "unknown", "2012"]);
        assert_eq!(table.most_common(), Some("2012"));
        assert_eq!(table.get("unknown"), 2);
        assert_eq!(table.total(), 4);
        assert_eq!(FrequencyTable::default().most_common(), None);
    }

    #[test]
    fn test_josm_ready_window() {
        let now = Utc::now();
        let mut city = City::new("01004", "Ambérieu-en-Bugey");
        assert!(!city.is_josm_ready(now, 30));

        city.date_cadastre = Some(now - Duration::days(29));
        assert!(city.is_josm_ready(now, 30));

        city.date_cadastre = Some(now - Duration::days(31));
        assert!(!city.is_josm_ready(now, 30));
    }

    #[test]
    fn test_editable_data_urls() {
        let mut city = City::new("26400", "Cobonne");
        city.import_date = StatusLabel::Year(2014);
        let data = EditableData::new(
            "https://cadastre.openstreetmap.fr/",
            &city,
            "CL098-COBONNE",
            &Bbox::new(5.0, 44.0, 5.1, 44.1),
        );
        assert_eq!(
            data.buildings_url,
            "https://cadastre.openstreetmap.fr/data/026/CL098-COBONNE-houses-simplifie.osm"
        );
        assert!(data.segmentation_predictions_url.ends_with("-houses-prediction_segmente.osm"));
        assert_eq!(data.bbox, [5.0, 5.1, 44.0, 44.1]);
        assert_eq!(data.date, StatusLabel::Year(2014));
    }
}
