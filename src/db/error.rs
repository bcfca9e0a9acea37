//! Errors raised by the record store.
//!
//! Variants carry table names and uuids rather than sqlx types so callers in
//! the sync engine never depend on the backend.

use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum DbError {
    #[error("Record not found: {table} with uuid '{uuid}'")]
    #[diagnostic(code(draftsync::db::not_found))]
    NotFound { table: String, uuid: String },

    #[error("Record already exists: {table} with uuid '{uuid}'")]
    #[diagnostic(code(draftsync::db::already_exists))]
    AlreadyExists { table: String, uuid: String },

    #[error("Invalid data in {table}.{column}: {message}")]
    #[diagnostic(code(draftsync::db::invalid_data))]
    InvalidData {
        table: String,
        column: String,
        message: String,
    },

    #[error("Query failed: {message}")]
    #[diagnostic(code(draftsync::db::query))]
    Database { message: String },

    #[error("Schema migration failed: {message}")]
    #[diagnostic(code(draftsync::db::migration))]
    Migration { message: String },

    #[error("Cannot open store: {message}")]
    #[diagnostic(code(draftsync::db::connection))]
    Connection { message: String },
}

impl From<sqlx::Error> for DbError {
    fn from(e: sqlx::Error) -> Self {
        DbError::Database {
            message: e.to_string(),
        }
    }
}

pub type DbResult<T> = Result<T, DbError>;
