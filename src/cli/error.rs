use miette::Diagnostic;
use thiserror::Error;

use crate::config::ConfigError;
use crate::db::DbError;
use crate::sync::SyncError;

#[derive(Error, Diagnostic, Debug)]
pub enum CliError {
    #[error("Unknown output format '{format}'")]
    #[diagnostic(
        code(draftsync::cli::invalid_format),
        help("Use --format table or --format json")
    )]
    InvalidFormat { format: String },

    #[error("Failed to encode output: {message}")]
    #[diagnostic(code(draftsync::cli::encode))]
    Encode { message: String },

    #[error("Failed to prepare data directory {path}: {source}")]
    #[diagnostic(code(draftsync::cli::data_dir))]
    DataDir {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Database(#[from] DbError),
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Encode {
            message: e.to_string(),
        }
    }
}

pub type CliResult<T> = Result<T, CliError>;
