//! Error types shared by the catalog crates

use thiserror::Error;

/// Result type alias for shared catalog operations
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Errors raised while bootstrapping a catalog process
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Logging error: {0}")]
    Logging(String),
}

impl CatalogError {
    /// Error for an environment variable that is set but cannot be parsed
    pub fn invalid_env(name: &str, value: &str, expected: &str) -> Self {
        Self::Config(format!("{name}={value:?} is invalid, expected {expected}"))
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
