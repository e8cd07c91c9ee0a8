use std::path::PathBuf;
use thiserror::Error;

/// Failures of the phishing-probability capability. The analyzer treats any
/// of these as "probability unavailable".
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("no probability model configured")]
    Unavailable,
    #[error("model produced an invalid probability: {0}")]
    InvalidOutput(f64),
    #[error("failed to load model from {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
