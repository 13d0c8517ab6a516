//! Error types for the admix-models library.

use thiserror::Error;

/// Main error type for the library.
#[derive(Error, Debug)]
pub enum AdmixError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid model '{label}': {reason}")]
    InvalidModelSpec { label: String, reason: String },

    #[error("Target population '{0}' not found in dataset")]
    TargetNotFound(String),

    #[error("Solver error: {0}")]
    Solver(String),

    #[error("Invalid result for model '{label}': {reason}")]
    InvalidResult { label: String, reason: String },

    #[error("Empty data: {0}")]
    EmptyData(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, AdmixError>;
