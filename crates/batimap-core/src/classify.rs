//! Import status inference
//!
//! Turns the source metadata of a city's buildings into a single
//! [`StatusLabel`] plus the frequency table it was derived from.

use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

use crate::models::{FrequencyTable, StatusLabel};

static YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"20\d{2}").expect("valid year pattern"));

/// Everything the classifier looks at for one city
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierInput {
    /// Raw source strings with the number of buildings carrying each one
    pub sources: Vec<(Option<String>, u64)>,

    /// At least one building is mapped as a point
    pub has_simplified: bool,

    /// Buildings observed in the map database
    pub total_buildings: u64,

    /// Independent building count from the open data export, when known
    pub auxiliary_count: Option<u64>,

    pub min_buildings: u64,
}

impl ClassifierInput {
    /// One entry per building, weight 1 each
    pub fn from_sources<I>(sources: I, min_buildings: u64) -> Self
    where
        I: IntoIterator<Item = Option<String>>,
    {
        let sources: Vec<_> = sources.into_iter().map(|s| (s, 1)).collect();
        let total_buildings = sources.len() as u64;
        Self {
            sources,
            has_simplified: false,
            total_buildings,
            auxiliary_count: None,
            min_buildings,
        }
    }

    pub fn with_simplified(mut self, has_simplified: bool) -> Self {
        self.has_simplified = has_simplified;
        self
    }

    pub fn with_auxiliary_count(mut self, count: Option<u64>) -> Self {
        self.auxiliary_count = count;
        self
    }
}

/// Result of a classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub label: StatusLabel,
    pub dates: FrequencyTable,
}

impl Classification {
    /// Raster cities are never run through the heuristic
    pub fn raster() -> Self {
        Self {
            label: StatusLabel::Raster,
            dates: FrequencyTable::from_tokens([StatusLabel::RASTER]),
        }
    }
}

/// Reduce a raw source string to a date token
///
/// Absent or empty values become `unknown`. A `20xx` year is extracted when the
/// string mentions the cadastre, or when it carries a year and no mention of
/// the cadastre at all. Anything else is returned lower-cased.
pub fn normalize_source(raw: Option<&str>) -> String {
    let source = match raw {
        Some(s) if !s.is_empty() => s.to_lowercase(),
        _ => return StatusLabel::UNKNOWN.to_string(),
    };

    match YEAR.find_iter(&source).last() {
        Some(year) => year.as_str().to_string(),
        None => source,
    }
}

/// Compute the status label of a city
pub fn classify(input: &ClassifierInput) -> Classification {
    let mut dates = FrequencyTable::default();
    for (raw, count) in &input.sources {
        let token = normalize_source(raw.as_deref());
        dates.add(&token, *count as usize);
    }

    let candidate = match dates.most_common() {
        None => StatusLabel::Never,
        Some(StatusLabel::NEVER) => StatusLabel::Never,
        Some(StatusLabel::RASTER) => StatusLabel::Raster,
        Some(token) => StatusLabel::parse_year(token).unwrap_or(StatusLabel::Unknown),
    };

    let label = match candidate {
        StatusLabel::Never | StatusLabel::Raster => candidate,
        _ if missing_many_buildings(input) => {
            debug!(
                total = input.total_buildings,
                auxiliary = ?input.auxiliary_count,
                "too few buildings compared to open data, assuming never imported"
            );
            StatusLabel::Never
        }
        _ if input.has_simplified => StatusLabel::Unfinished,
        _ => candidate,
    };

    Classification { label, dates }
}

fn missing_many_buildings(input: &ClassifierInput) -> bool {
    if input.total_buildings >= input.min_buildings {
        return false;
    }
    let Some(auxiliary) = input.auxiliary_count else {
        return false;
    };
    let floor = (input.min_buildings as f64).max(1.5 * input.total_buildings as f64);
    auxiliary as f64 >= floor
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sources(values: &[&str]) -> Vec<Option<String>> {
        values.iter().map(|v| Some(v.to_string())).collect()
    }

    #[test]
    fn test_normalize_source() {
        assert_eq!(normalize_source(None), "unknown");
        assert_eq!(normalize_source(Some("")), "unknown");
        assert_eq!(
            normalize_source(Some(
                "cadastre-dgi-fr source : Direction Générale des Impôts - Cadastre. Mise à jour : 2013"
            )),
            "2013"
        );
        assert_eq!(normalize_source(Some("2015")), "2015");
        assert_eq!(normalize_source(Some("Bing")), "bing");
        assert_eq!(normalize_source(Some("cadastre 2011 ; cadastre 2016")), "2016");
    }

    #[test]
    fn test_majority_year_without_auxiliary_count() {
        let input = ClassifierInput::from_sources(
            sources(&["cadastre 2017", "cadastre 2017", "unknown"]),
            50,
        );
        let result = classify(&input);
        assert_eq!(result.label, StatusLabel::Year(2017));
        assert_eq!(result.dates.get("2017"), 2);
        assert_eq!(result.dates.get("unknown"), 1);
    }

    #[test]
    fn test_empty_city_is_never() {
        let input = ClassifierInput::from_sources(Vec::new(), 50);
        assert_eq!(classify(&input).label, StatusLabel::Never);
    }

    #[test]
    fn test_unmatched_majority_is_unknown() {
        let input = ClassifierInput::from_sources(sources(&["bing", "bing", "cadastre 2012"]), 1);
        assert_eq!(classify(&input).label, StatusLabel::Unknown);
    }

    #[test]
    fn test_tie_keeps_first_seen_token() {
        let input = ClassifierInput::from_sources(sources(&["cadastre 2012", "cadastre 2016"]), 1);
        assert_eq!(classify(&input).label, StatusLabel::Year(2012));
    }

    #[test]
    fn test_raster_token_passes_through() {
        let input = ClassifierInput::from_sources(sources(&["raster"]), 50)
            .with_simplified(true)
            .with_auxiliary_count(Some(10_000));
        assert_eq!(classify(&input).label, StatusLabel::Raster);
    }

    #[test]
    fn test_never_override_needs_auxiliary_evidence() {
        let base = ClassifierInput::from_sources(sources(&["cadastre 2019"; 10]), 50);

        assert_eq!(classify(&base).label, StatusLabel::Year(2019));

        let weak = base.clone().with_auxiliary_count(Some(49));
        assert_eq!(classify(&weak).label, StatusLabel::Year(2019));

        let strong = base.with_auxiliary_count(Some(50));
        assert_eq!(classify(&strong).label, StatusLabel::Never);
    }

    #[test]
    fn test_simplified_forces_unfinished() {
        let input = ClassifierInput::from_sources(sources(&["cadastre 2024"; 60]), 50).with_simplified(true);
        assert_eq!(classify(&input).label, StatusLabel::Unfinished);
    }

    #[test]
    fn test_weighted_sources() {
        let input = ClassifierInput {
            sources: vec![(None, 40), (Some("cadastre 2014".into()), 60)],
            has_simplified: false,
            total_buildings: 100,
            auxiliary_count: Some(120),
            min_buildings: 50,
        };
        let result = classify(&input);
        assert_eq!(result.label, StatusLabel::Year(2014));
        assert_eq!(result.dates.total(), 100);
    }

    fn source_strategy() -> impl Strategy<Value = Option<String>> {
        prop_oneof![
            Just(None),
            Just(Some(String::new())),
            (2000u16..2100).prop_map(|y| Some(format!("cadastre {}", y))),
            (2000u16..2100).prop_map(|y| Some(y.to_string())),
            "[a-zA-Z ]{0,12}".prop_map(Some),
        ]
    }

    proptest! {
        #[test]
        fn prop_classify_is_pure(
            raw in prop::collection::vec(source_strategy(), 0..40),
            simplified in any::<bool>(),
            aux in prop::option::of(0u64..500),
        ) {
            let input = ClassifierInput::from_sources(raw, 50)
                .with_simplified(simplified)
                .with_auxiliary_count(aux);
            prop_assert_eq!(classify(&input), classify(&input.clone()));
        }

        #[test]
        fn prop_label_round_trips(
            raw in prop::collection::vec(source_strategy(), 0..40),
            simplified in any::<bool>(),
            aux in prop::option::of(0u64..500),
        ) {
            let input = ClassifierInput::from_sources(raw, 50)
                .with_simplified(simplified)
                .with_auxiliary_count(aux);
            let label = classify(&input).label;
            prop_assert_eq!(label.to_string().parse::<StatusLabel>().ok(), Some(label));
        }

        #[test]
        fn prop_never_override_wins(
            year in 2000u16..2100,
            count in 1usize..50,
            simplified in any::<bool>(),
        ) {
            let raw = vec![Some(format!("cadastre {}", year)); count];
            let input = ClassifierInput::from_sources(raw, 50)
                .with_simplified(simplified)
                .with_auxiliary_count(Some(1_000));
            prop_assert_eq!(classify(&input).label, StatusLabel::Never);
        }
    }
}
