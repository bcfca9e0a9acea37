//! Tests for database error types.

use crate::db::{DbError, DbResult};

#[test]
fn not_found_error_displays_correctly() {
    let err = DbError::NotFound {
        table: "documents".to_string(),
        uuid: "0190a8c4-doc".to_string(),
    };
    assert_eq!(
        err.to_string(),
        "Record not found: documents with uuid '0190a8c4-doc'"
    );
}

#[test]
fn already_exists_error_displays_correctly() {
    let err = DbError::AlreadyExists {
        table: "themes".to_string(),
        uuid: "t-1".to_string(),
    };
    assert_eq!(
        err.to_string(),
        "Record already exists: themes with uuid 't-1'"
    );
}

#[test]
fn invalid_data_error_names_the_column() {
    let err = DbError::InvalidData {
        table: "extensions".to_string(),
        column: "config".to_string(),
        message: "expected value at line 1 column 1".to_string(),
    };
    assert_eq!(
        err.to_string(),
        "Invalid data in extensions.config: expected value at line 1 column 1"
    );
}

#[test]
fn sqlx_errors_convert_to_database_errors() {
    let err: DbError = sqlx::Error::RowNotFound.into();
    assert!(matches!(err, DbError::Database { .. }));
}

#[test]
fn db_result_carries_errors() {
    let result: DbResult<()> = Err(DbError::Migration {
        message: "failed to apply migration 0001".to_string(),
    });
    assert_eq!(
        result.unwrap_err().to_string(),
        "Schema migration failed: failed to apply migration 0001"
    );
}
