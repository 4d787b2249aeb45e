//! Error types for configuration loading and validation.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the config file.
    #[error("failed to read config file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid YAML or unknown field values (including unknown gesture
    /// or hand names, which fail enum deserialization).
    #[error("failed to parse config file '{}': {message}", path.display())]
    Parse { path: PathBuf, message: String },

    /// A mapping entry failed validation.
    #[error("mapping {index} ('{name}'): {message}")]
    InvalidMapping {
        index: usize,
        name: String,
        message: String,
    },

    /// A pipeline knob is out of range.
    #[error("invalid setting: {message}")]
    InvalidSetting { message: String },
}
