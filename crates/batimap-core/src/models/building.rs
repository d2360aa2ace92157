use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Tag keys marking features that are legitimately mapped as points
pub const POINT_LIKE_TAGS: &[&str] = &["power", "ruins", "historic", "ref:mhs"];

/// `building=*` values that are legitimately mapped as points
pub const POINT_LIKE_BUILDINGS: &[&str] =
    &["hut", "shed", "no", "ruins", "bunker", "wayside_shrine"];

/// OSM element kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Node,
    Way,
    Relation,
}

/// A building element returned by the query service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingRecord {
    /// OSM id
    pub id: i64,

    #[serde(rename = "type")]
    pub kind: ElementKind,

    #[serde(default)]
    pub tags: HashMap<String, String>,

    /// Last edit timestamp (ISO 8601)
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl BuildingRecord {
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }

    /// `source` followed by `source:date`, the raw string fed to the classifier
    pub fn dated_source(&self) -> Option<String> {
        match (self.tag("source"), self.tag("source:date")) {
            (None, None) => None,
            (source, date) => Some(format!("{}{}", source.unwrap_or(""), date.unwrap_or(""))),
        }
    }

    /// Year of the last edit, taken from the element timestamp
    pub fn edit_year(&self) -> Option<String> {
        self.timestamp
            .as_deref()
            .and_then(|ts| ts.get(..4))
            .map(str::to_string)
    }

    /// A point standing in for a real footprint
    ///
    /// Points tagged as power infrastructure, ruins, historic markers or small
    /// structures are expected to be points and do not count.
    pub fn is_simplified(&self) -> bool {
        if self.kind != ElementKind::Node {
            return false;
        }
        if POINT_LIKE_TAGS.iter().any(|key| self.tag(key).is_some()) {
            return false;
        }
        !matches!(self.tag("building"), Some(b) if POINT_LIKE_BUILDINGS.contains(&b))
    }

    /// Points that are legitimately point-like, skipped altogether
    pub fn is_point_like(&self) -> bool {
        self.kind == ElementKind::Node && !self.is_simplified()
    }
}
