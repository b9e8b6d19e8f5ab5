use thiserror::Error;

#[derive(Error, Debug)]
pub enum RessyncError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Scenario error: {0}")]
    ScenarioError(String),

    #[error("Sequence exhausted after cycle {0}")]
    SequenceExhausted(u64),

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Unknown column {column} in table {table}")]
    UnknownColumn { table: String, column: String },

    #[error("Metrics error: {0}")]
    MetricsError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl From<prometheus::Error> for RessyncError {
    fn from(e: prometheus::Error) -> Self {
        RessyncError::MetricsError(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RessyncError>;
