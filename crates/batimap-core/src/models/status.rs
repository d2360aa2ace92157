use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::BatimapError;

/// Import status of a city
///
/// Stored as its string form: `never`, `unknown`, `unfinished`, `raster` or a
/// four digit year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusLabel {
    /// No cadastre import was ever made
    Never,
    /// Buildings exist but their source could not be dated
    Unknown,
    /// Some buildings are still simplified points
    Unfinished,
    /// Cadastre is only available as scanned images
    Raster,
    /// Year of the last cadastre import
    Year(u16),
}

impl StatusLabel {
    pub const NEVER: &'static str = "never";
    pub const UNKNOWN: &'static str = "unknown";
    pub const UNFINISHED: &'static str = "unfinished";
    pub const RASTER: &'static str = "raster";

    /// Labels that do not reflect a real import
    pub fn is_bad(&self) -> bool {
        matches!(self, StatusLabel::Never | StatusLabel::Unknown | StatusLabel::Unfinished)
    }

    pub fn is_raster(&self) -> bool {
        matches!(self, StatusLabel::Raster)
    }

    pub fn year(&self) -> Option<u16> {
        match self {
            StatusLabel::Year(y) => Some(*y),
            _ => None,
        }
    }

    /// Parse a strict four digit year token
    pub fn parse_year(token: &str) -> Option<StatusLabel> {
        if token.len() == 4 && token.bytes().all(|b| b.is_ascii_digit()) {
            token.parse().ok().map(StatusLabel::Year)
        } else {
            None
        }
    }
}

impl fmt::Display for StatusLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusLabel::Never => f.write_str(Self::NEVER),
            StatusLabel::Unknown => f.write_str(Self::UNKNOWN),
            StatusLabel::Unfinished => f.write_str(Self::UNFINISHED),
            StatusLabel::Raster => f.write_str(Self::RASTER),
            StatusLabel::Year(y) => write!(f, "{:04}", y),
        }
    }
}

impl FromStr for StatusLabel {
    type Err = BatimapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            Self::NEVER => Ok(StatusLabel::Never),
            Self::UNKNOWN => Ok(StatusLabel::Unknown),
            Self::UNFINISHED => Ok(StatusLabel::Unfinished),
            Self::RASTER => Ok(StatusLabel::Raster),
            other => {
                StatusLabel::parse_year(other).ok_or_else(|| BatimapError::InvalidLabel(other.to_string()))
            }
        }
    }
}

impl Serialize for StatusLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for StatusLabel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
