//! Shared helper functions for SQLite repositories.

use crate::db::{DbError, JsonObject, Table};

/// Serialize a JSON object column. `None` is stored as SQL NULL.
pub fn encode_json(
    table: Table,
    column: &str,
    value: Option<&JsonObject>,
) -> Result<Option<String>, DbError> {
    value
        .map(|object| {
            serde_json::to_string(object).map_err(|e| DbError::InvalidData {
                table: table.to_string(),
                column: column.to_string(),
                message: e.to_string(),
            })
        })
        .transpose()
}

/// Parse a JSON object column stored as TEXT.
pub fn decode_json(
    table: Table,
    column: &str,
    raw: Option<String>,
) -> Result<Option<JsonObject>, DbError> {
    raw.map(|text| {
        serde_json::from_str(&text).map_err(|e| DbError::InvalidData {
            table: table.to_string(),
            column: column.to_string(),
            message: e.to_string(),
        })
    })
    .transpose()
}

/// Map an INSERT failure, turning primary key collisions into `AlreadyExists`.
pub fn insert_error(table: Table, uuid: &str, error: sqlx::Error) -> DbError {
    match &error {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => DbError::AlreadyExists {
            table: table.to_string(),
            uuid: uuid.to_string(),
        },
        _ => error.into(),
    }
}

pub fn not_found(table: Table, uuid: &str) -> DbError {
    DbError::NotFound {
        table: table.to_string(),
        uuid: uuid.to_string(),
    }
}
