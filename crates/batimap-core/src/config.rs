use crate::error::{BatimapError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Public Overpass instances queried in turn
pub const DEFAULT_OVERPASS_ENDPOINTS: &[&str] = &[
    "https://overpass-api.de/api/interpreter",
    "https://overpass.openstreetmap.fr/api/interpreter",
    "https://overpass.nchc.org.tw/api/interpreter",
    "https://overpass.kumi.systems/api/interpreter",
];

/// Configuration source for tracking where values come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Default value
    Default,
    /// Loaded from config file
    File,
    /// Loaded from environment variable
    Environment,
    /// Provided via CLI argument
    Cli,
}

impl ConfigSource {
    /// Returns the precedence level (higher = higher priority)
    pub fn precedence(&self) -> u8 {
        match self {
            ConfigSource::Default => 0,
            ConfigSource::File => 1,
            ConfigSource::Environment => 2,
            ConfigSource::Cli => 3,
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }

    /// Update the value if the new source has higher precedence
    pub fn update(&mut self, value: T, source: ConfigSource) {
        if source.precedence() > self.source.precedence() {
            self.value = value;
            self.source = source;
        }
    }
}

/// Layered configuration for Batimap
#[derive(Debug, Clone)]
pub struct LayeredConfig {
    pub overpass_endpoints: ConfigValue<Vec<String>>,
    pub overpass_timeout_secs: ConfigValue<u64>,
    pub max_retries: ConfigValue<u32>,
    pub backoff_step_secs: ConfigValue<u64>,
    pub min_buildings: ConfigValue<u64>,
    pub ignored_buildings: ConfigValue<Vec<String>>,
    pub freshness_days: ConfigValue<i64>,
    pub cadastre_url: ConfigValue<String>,
    pub workers: ConfigValue<usize>,
    pub tiles_dir: ConfigValue<PathBuf>,
    pub html_dir: ConfigValue<PathBuf>,
}

impl LayeredConfig {
    /// Create a new configuration with default values
    pub fn with_defaults() -> Self {
        let default = ConfigSource::Default;
        Self {
            overpass_endpoints: ConfigValue::new(
                DEFAULT_OVERPASS_ENDPOINTS.iter().map(|s| s.to_string()).collect(),
                default,
            ),
            overpass_timeout_secs: ConfigValue::new(300, default),
            max_retries: ConfigValue::new(9, default),
            backoff_step_secs: ConfigValue::new(5, default),
            min_buildings: ConfigValue::new(50, default),
            ignored_buildings: ConfigValue::new(vec!["church".to_string()], default),
            freshness_days: ConfigValue::new(30, default),
            cadastre_url: ConfigValue::new("https://cadastre.openstreetmap.fr".to_string(), default),
            workers: ConfigValue::new(2, default),
            tiles_dir: ConfigValue::new(PathBuf::from("tiles"), default),
            html_dir: ConfigValue::new(PathBuf::from("html"), default),
        }
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| BatimapError::ConfigInvalid {
                key: "file".to_string(),
                reason: format!("Failed to read config file: {}", e),
            })?;

        let file_config: FileConfig =
            toml::from_str(&content).map_err(|e| BatimapError::ConfigInvalid {
                key: "file".to_string(),
                reason: format!("Failed to parse TOML: {}", e),
            })?;

        let file = ConfigSource::File;
        if let Some(endpoints) = file_config.overpass_endpoints {
            if endpoints.is_empty() {
                return Err(BatimapError::ConfigInvalid {
                    key: "overpass_endpoints".to_string(),
                    reason: "at least one endpoint is required".to_string(),
                });
            }
            self.overpass_endpoints.update(endpoints, file);
        }
        if let Some(v) = file_config.overpass_timeout_secs {
            self.overpass_timeout_secs.update(v, file);
        }
        if let Some(v) = file_config.max_retries {
            self.max_retries.update(v, file);
        }
        if let Some(v) = file_config.backoff_step_secs {
            self.backoff_step_secs.update(v, file);
        }
        if let Some(v) = file_config.min_buildings {
            self.min_buildings.update(v, file);
        }
        if let Some(v) = file_config.ignored_buildings {
            self.ignored_buildings.update(v, file);
        }
        if let Some(v) = file_config.freshness_days {
            self.freshness_days.update(v, file);
        }
        if let Some(v) = file_config.cadastre_url {
            self.cadastre_url.update(v, file);
        }
        if let Some(v) = file_config.workers {
            self.workers.update(v.max(1), file);
        }
        if let Some(v) = file_config.tiles_dir {
            self.tiles_dir.update(v, file);
        }
        if let Some(v) = file_config.html_dir {
            self.html_dir.update(v, file);
        }

        Ok(self)
    }

    /// Load configuration from environment variables
    pub fn load_from_env(mut self) -> Self {
        let envsrc = ConfigSource::Environment;

        if let Some(endpoints) = env_list("BATIMAP_OVERPASS_ENDPOINTS") {
            if endpoints.is_empty() {
                tracing::warn!("Ignoring empty BATIMAP_OVERPASS_ENDPOINTS");
            } else {
                self.overpass_endpoints.update(endpoints, envsrc);
            }
        }
        if let Some(v) = env_parse("BATIMAP_OVERPASS_TIMEOUT", "number of seconds") {
            self.overpass_timeout_secs.update(v, envsrc);
        }
        if let Some(v) = env_parse("BATIMAP_MAX_RETRIES", "positive integer") {
            self.max_retries.update(v, envsrc);
        }
        if let Some(v) = env_parse("BATIMAP_BACKOFF_STEP", "number of seconds") {
            self.backoff_step_secs.update(v, envsrc);
        }
        if let Some(v) = env_parse("BATIMAP_MIN_BUILDINGS", "positive integer") {
            self.min_buildings.update(v, envsrc);
        }
        if let Some(v) = env_list("BATIMAP_IGNORED_BUILDINGS") {
            self.ignored_buildings.update(v, envsrc);
        }
        if let Some(v) = env_parse("BATIMAP_FRESHNESS_DAYS", "number of days") {
            self.freshness_days.update(v, envsrc);
        }
        if let Ok(url) = env::var("BATIMAP_CADASTRE_URL") {
            self.cadastre_url.update(url, envsrc);
        }
        if let Some(v) = env_parse::<usize>("BATIMAP_WORKERS", "positive integer") {
            self.workers.update(v.max(1), envsrc);
        }
        if let Ok(dir) = env::var("BATIMAP_TILES_DIR") {
            self.tiles_dir.update(PathBuf::from(dir), envsrc);
        }
        if let Ok(dir) = env::var("BATIMAP_HTML_DIR") {
            self.html_dir.update(PathBuf::from(dir), envsrc);
        }

        self
    }

    /// Update configuration from CLI arguments
    pub fn update_from_cli(&mut self, overrides: CliConfigOverrides) {
        let cli = ConfigSource::Cli;
        if let Some(endpoints) = overrides.overpass_endpoints.filter(|e| !e.is_empty()) {
            self.overpass_endpoints.update(endpoints, cli);
        }
        if let Some(v) = overrides.min_buildings {
            self.min_buildings.update(v, cli);
        }
        if let Some(v) = overrides.workers {
            self.workers.update(v.max(1), cli);
        }
        if let Some(v) = overrides.tiles_dir {
            self.tiles_dir.update(v, cli);
        }
        if let Some(v) = overrides.html_dir {
            self.html_dir.update(v, cli);
        }
    }

    /// Get all configuration values as a map for inspection
    pub fn to_inspection_map(&self) -> HashMap<String, (String, ConfigSource)> {
        let mut map = HashMap::new();

        map.insert(
            "overpass_endpoints".to_string(),
            (self.overpass_endpoints.value.join(","), self.overpass_endpoints.source),
        );
        map.insert(
            "overpass_timeout_secs".to_string(),
            (format!("{}s", self.overpass_timeout_secs.value), self.overpass_timeout_secs.source),
        );
        map.insert(
            "max_retries".to_string(),
            (self.max_retries.value.to_string(), self.max_retries.source),
        );
        map.insert(
            "backoff_step_secs".to_string(),
            (format!("{}s", self.backoff_step_secs.value), self.backoff_step_secs.source),
        );
        map.insert(
            "min_buildings".to_string(),
            (self.min_buildings.value.to_string(), self.min_buildings.source),
        );
        map.insert(
            "ignored_buildings".to_string(),
            (self.ignored_buildings.value.join(","), self.ignored_buildings.source),
        );
        map.insert(
            "freshness_days".to_string(),
            (self.freshness_days.value.to_string(), self.freshness_days.source),
        );
        map.insert("cadastre_url".to_string(), (self.cadastre_url.value.clone(), self.cadastre_url.source));
        map.insert("workers".to_string(), (self.workers.value.to_string(), self.workers.source));
        map.insert(
            "tiles_dir".to_string(),
            (self.tiles_dir.value.display().to_string(), self.tiles_dir.source),
        );
        map.insert(
            "html_dir".to_string(),
            (self.html_dir.value.display().to_string(), self.html_dir.source),
        );

        map
    }

    /// Plain values for the engine and adapters
    pub fn settings(&self) -> Settings {
        Settings {
            overpass_endpoints: self.overpass_endpoints.value.clone(),
            overpass_timeout_secs: self.overpass_timeout_secs.value,
            max_retries: self.max_retries.value,
            backoff_step_secs: self.backoff_step_secs.value,
            min_buildings: self.min_buildings.value,
            ignored_buildings: self.ignored_buildings.value.clone(),
            freshness_days: self.freshness_days.value,
            cadastre_url: self.cadastre_url.value.clone(),
            workers: self.workers.value,
            tiles_dir: self.tiles_dir.value.clone(),
            html_dir: self.html_dir.value.clone(),
        }
    }
}

/// Effective configuration without provenance
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub overpass_endpoints: Vec<String>,
    pub overpass_timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_step_secs: u64,
    pub min_buildings: u64,
    pub ignored_buildings: Vec<String>,
    pub freshness_days: i64,
    pub cadastre_url: String,
    pub workers: usize,
    pub tiles_dir: PathBuf,
    pub html_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        LayeredConfig::with_defaults().settings()
    }
}

/// Configuration loaded from TOML file
#[derive(Debug, Deserialize, Serialize)]
struct FileConfig {
    overpass_endpoints: Option<Vec<String>>,
    overpass_timeout_secs: Option<u64>,
    max_retries: Option<u32>,
    backoff_step_secs: Option<u64>,
    min_buildings: Option<u64>,
    ignored_buildings: Option<Vec<String>>,
    freshness_days: Option<i64>,
    cadastre_url: Option<String>,
    workers: Option<usize>,
    tiles_dir: Option<PathBuf>,
    html_dir: Option<PathBuf>,
}

/// CLI configuration overrides
#[derive(Debug, Default)]
pub struct CliConfigOverrides {
    pub overpass_endpoints: Option<Vec<String>>,
    pub min_buildings: Option<u64>,
    pub workers: Option<usize>,
    pub tiles_dir: Option<PathBuf>,
    pub html_dir: Option<PathBuf>,
}

/// Split a comma separated list, dropping blank entries
pub fn parse_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn env_list(key: &str) -> Option<Vec<String>> {
    env::var(key).ok().map(|raw| parse_list(&raw))
}

fn env_parse<T: FromStr>(key: &str, expected: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Invalid {} value '{}': expected {}", key, raw, expected);
            None
        }
    }
}
