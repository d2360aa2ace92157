use batimap_core::config::ConfigSource;
use batimap_core::models::{CadastreCount, CityDto, JobStatus, LabelCount};
use serde::Serialize;
use tabled::Tabled;

fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

/// One city in `stats` and `update` output
#[derive(Debug, Serialize, Tabled)]
pub struct CityRow {
    #[tabled(rename = "INSEE")]
    pub insee: String,
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Status")]
    pub date: String,
    #[tabled(rename = "JOSM ready")]
    pub josm_ready: bool,
    #[tabled(rename = "OSM buildings")]
    pub osm_buildings: u64,
    #[tabled(rename = "Open data")]
    pub od_buildings: String,
}

impl From<&CityDto> for CityRow {
    fn from(city: &CityDto) -> Self {
        Self {
            insee: city.insee.clone(),
            name: city.name.clone(),
            date: city.date.to_string(),
            josm_ready: city.josm_ready,
            osm_buildings: city.osm_buildings,
            od_buildings: or_dash(city.od_buildings),
        }
    }
}

#[derive(Debug, Serialize, Tabled)]
pub struct LabelRow {
    #[tabled(rename = "Status")]
    pub date: String,
    #[tabled(rename = "Cities")]
    pub count: usize,
}

impl From<&LabelCount> for LabelRow {
    fn from(label: &LabelCount) -> Self {
        Self {
            date: label.date.to_string(),
            count: label.count,
        }
    }
}

#[derive(Debug, Serialize, Tabled)]
pub struct CountRow {
    #[tabled(rename = "INSEE")]
    pub insee: String,
    #[tabled(rename = "Open data buildings")]
    pub od_buildings: u64,
}

impl From<&CadastreCount> for CountRow {
    fn from(count: &CadastreCount) -> Self {
        Self {
            insee: count.insee.clone(),
            od_buildings: count.od_buildings,
        }
    }
}

/// One job in the queue listing
#[derive(Debug, Serialize, Tabled)]
pub struct JobRow {
    #[tabled(rename = "Job")]
    pub id: String,
    #[tabled(rename = "Task")]
    pub name: String,
    #[tabled(rename = "Args")]
    pub args: String,
    #[tabled(rename = "Running")]
    pub running: bool,
    #[tabled(rename = "Progress")]
    pub progress: f64,
}

impl From<&JobStatus> for JobRow {
    fn from(job: &JobStatus) -> Self {
        Self {
            id: job.id.to_string(),
            name: job.key.kind.name().to_string(),
            args: job.key.args.join(" "),
            running: job.is_running(),
            progress: job.progress,
        }
    }
}

#[derive(Debug, Serialize, Tabled)]
pub struct ConfigRow {
    #[tabled(rename = "Key")]
    pub key: String,
    #[tabled(rename = "Value")]
    pub value: String,
    #[tabled(rename = "Source")]
    pub source: String,
}

impl ConfigRow {
    pub fn new(key: String, value: String, source: ConfigSource) -> Self {
        Self {
            key,
            value,
            source: format!("{:?}", source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use batimap_core::models::{City, JobId, JobKey, JobKind, StatusLabel};

    #[test]
    fn test_city_row() {
        let mut city = City::new("01004", "Ambérieu-en-Bugey");
        city.import_date = StatusLabel::Year(2013);
        city.osm_buildings = 120;

        let row = CityRow::from(&CityDto::new(&city, None, false));
        assert_eq!(row.date, "2013");
        assert_eq!(row.od_buildings, "-");

        let count = CadastreCount::new("01004", 150);
        let row = CityRow::from(&CityDto::new(&city, Some(&count), true));
        assert_eq!(row.od_buildings, "150");
        assert!(row.josm_ready);
    }

    #[test]
    fn test_job_row() {
        let status = JobStatus::pending(JobId::new(), JobKey::new(JobKind::Initdb, vec!["01".into(), "02".into()]));
        let row = JobRow::from(&status);
        assert_eq!(row.name, "task_initdb");
        assert_eq!(row.args, "01 02");
        assert!(!row.running);
    }
}
