//! Sync configuration.
//!
//! - `types`: the `SyncConfig` settings and auth method selection
//! - `source`: the `ConfigSource` trait with in-memory and YAML file sources

mod source;
mod types;


use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

pub use source::{ConfigSource, MemoryConfig, YamlConfigFile};
pub use types::{AuthMethod, MAX_BACKUP_INTERVAL, SyncConfig};

/// Errors that can occur when reading configuration.
#[derive(Error, Diagnostic, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    #[diagnostic(code(draftsync::config::read))]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    #[diagnostic(code(draftsync::config::parse))]
    Parse { path: PathBuf, message: String },

    #[error("Invalid configuration for '{field}': {message}")]
    #[diagnostic(code(draftsync::config::invalid))]
    Invalid { field: String, message: String },
}
