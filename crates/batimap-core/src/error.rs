//! Error types for Batimap

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BatimapError {
    // Lookup errors
    #[error("City not found: {insee}")]
    CityNotFound { insee: String },

    #[error("Department not found: {code}")]
    DepartmentNotFound { code: String },

    // Editable data errors
    #[error("City {insee} only has raster cadastre, no editable data available")]
    RasterCity { insee: String },

    #[error("Editable data for {insee} is not ready yet")]
    NotReady { insee: String },

    #[error("City {insee} has no cadastre name, cannot generate editable data")]
    MissingCadastreName { insee: String },

    // Upstream errors
    #[error("Query service failed: {reason}")]
    Query { reason: String, transient: bool },

    #[error("Cadastre generation failed: {line}")]
    Generation { line: String },

    #[error("Upstream source {source_name} failed: {reason}")]
    Upstream { source_name: String, reason: String },

    // Job errors
    #[error("Job not found: {id}")]
    JobNotFound { id: String },

    // Configuration errors
    #[error("Missing required configuration: {key}")]
    ConfigMissing { key: String },

    #[error("Invalid configuration value for {key}: {reason}")]
    ConfigInvalid { key: String, reason: String },

    #[error("Invalid status label: {0}")]
    InvalidLabel(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl BatimapError {
    /// Whether retrying the same operation later may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, BatimapError::Query { transient: true, .. })
    }
}

impl From<serde_json::Error> for BatimapError {
    fn from(e: serde_json::Error) -> Self {
        BatimapError::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BatimapError>;
