//! Error types for cfgsync-core

use thiserror::Error;

/// Result type alias using cfgsync-core's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for cfgsync
#[derive(Error, Debug)]
pub enum Error {
    /// A catalog entry references a store that is not registered, or the
    /// user picked a store that cannot handle the file
    #[error("store not found: {name}")]
    StoreNotFound { name: String },

    /// Catalog file is malformed or inconsistent
    #[error("Invalid catalog: {message}")]
    InvalidCatalog { message: String },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Invalid configuration value
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// A value was required but could not be resolved without prompting
    #[error("No value provided for {name}")]
    MissingValue { name: String },

    /// Interactive prompt failed
    #[error("Prompt failed: {0}")]
    Prompt(String),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    YamlParse(#[from] serde_yaml_ng::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure reported by a remote store adapter
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl Error {
    /// Create a store not found error
    pub fn store_not_found(name: impl Into<String>) -> Self {
        Self::StoreNotFound { name: name.into() }
    }

    /// Create an invalid catalog error
    pub fn invalid_catalog(message: impl Into<String>) -> Self {
        Self::InvalidCatalog {
            message: message.into(),
        }
    }

    /// Create a config not found error
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a missing value error
    pub fn missing_value(name: impl Into<String>) -> Self {
        Self::MissingValue { name: name.into() }
    }

    /// True when this error means the requested store could not be resolved
    pub fn is_store_not_found(&self) -> bool {
        matches!(self, Self::StoreNotFound { .. })
    }
}
