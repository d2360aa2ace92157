//! Picks the city a volunteer should work on next

use batimap_core::error::Result;
use batimap_core::models::{City, StatusLabel};
use batimap_store::CityRepository;
use chrono::{DateTime, Utc};
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Filters of an obsolete city request
#[derive(Debug, Clone, Default)]
pub struct ObsoleteQuery {
    /// Labels pushed to the bottom of the ranking
    pub excluded_labels: HashSet<StatusLabel>,
    /// Cities removed before ranking
    pub excluded_cities: HashSet<String>,
    /// When positive, keep cities whose open data count exceeds
    /// `min_ratio * osm_buildings`
    pub min_ratio: f64,
}

pub struct WorkSelector {
    repo: Arc<dyn CityRepository>,
    freshness_days: i64,
}

impl WorkSelector {
    pub fn new(repo: Arc<dyn CityRepository>, freshness_days: i64) -> Self {
        Self { repo, freshness_days }
    }

    /// Most urgent city matching the query, ties broken at random
    pub async fn pick_obsolete_city(&self, query: &ObsoleteQuery) -> Result<Option<City>> {
        let cities = self.repo.list_cities().await?;

        let mut od_counts = HashMap::new();
        if query.min_ratio > 0.0 {
            for city in &cities {
                if let Some(count) = self.repo.get_cadastre_count(&city.insee).await? {
                    od_counts.insert(city.insee.clone(), count.od_buildings);
                }
            }
        }

        let picked = rank(cities, &od_counts, query, Utc::now(), self.freshness_days, &mut rand::thread_rng());
        if let Some(city) = &picked {
            tracing::info!(city = %city, date = %city.import_date, "Picked obsolete city");
        }
        Ok(picked)
    }
}

/// Sort key, smallest is most urgent
fn urgency(city: &City, query: &ObsoleteQuery, now: DateTime<Utc>, freshness_days: i64) -> (bool, bool, bool, bool, bool, u16, bool) {
    let label = city.import_date;
    (
        query.excluded_labels.contains(&label),
        label != StatusLabel::Never,
        label != StatusLabel::Unfinished,
        label != StatusLabel::Unknown,
        label != StatusLabel::Raster,
        label.year().unwrap_or(u16::MAX),
        !city.is_josm_ready(now, freshness_days),
    )
}

/// Pure ranking step of [`WorkSelector::pick_obsolete_city`]
pub fn rank<R: Rng + ?Sized>(
    cities: Vec<City>,
    od_counts: &HashMap<String, u64>,
    query: &ObsoleteQuery,
    now: DateTime<Utc>,
    freshness_days: i64,
    rng: &mut R,
) -> Option<City> {
    cities
        .into_iter()
        .filter(|c| !query.excluded_cities.contains(&c.insee))
        .filter(|c| {
            query.min_ratio <= 0.0
                || od_counts
                    .get(&c.insee)
                    .is_some_and(|od| *od as f64 > query.min_ratio * c.osm_buildings as f64)
        })
        .map(|c| {
            let key = (urgency(&c, query, now, freshness_days), rng.gen::<u64>());
            (key, c)
        })
        .min_by(|(a, _), (b, _)| a.cmp(b))
        .map(|(_, c)| c)
}
