//! Pool setup and schema migrations for the SQLite store.

use std::path::Path;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use super::{
    SqliteDocumentRepository, SqliteExtensionRepository, SqliteKeyBindingRepository,
    SqliteThemeRepository,
};
use crate::db::{Database, DbError, DbResult};

/// SQLite database implementation backed by an SQLx connection pool.
pub struct SqliteDatabase {
    pool: SqlitePool,
}

impl SqliteDatabase {
    /// Open a store file, creating it and its parent directory if missing.
    pub async fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        if let Some(parent) = path.as_ref().parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| DbError::Connection {
                message: format!("{}: {}", parent.display(), e),
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| DbError::Connection {
                message: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    /// Create an in-memory database (useful for testing).
    ///
    /// A single connection that is never recycled, otherwise every new
    /// connection would see its own empty database.
    pub async fn in_memory() -> DbResult<Self> {
        let options = SqliteConnectOptions::new()
            .in_memory(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| DbError::Connection {
                message: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl Database for SqliteDatabase {
    type Documents<'a> = SqliteDocumentRepository<'a>;
    type Extensions<'a> = SqliteExtensionRepository<'a>;
    type KeyBindings<'a> = SqliteKeyBindingRepository<'a>;
    type Themes<'a> = SqliteThemeRepository<'a>;

    async fn migrate(&self) -> DbResult<()> {
        sqlx::migrate!("./data/sql/sqlite")
            .run(&self.pool)
            .await
            .map_err(|e| DbError::Migration {
                message: e.to_string(),
            })
    }

    fn documents(&self) -> Self::Documents<'_> {
        SqliteDocumentRepository { pool: &self.pool }
    }

    fn extensions(&self) -> Self::Extensions<'_> {
        SqliteExtensionRepository { pool: &self.pool }
    }

    fn key_bindings(&self) -> Self::KeyBindings<'_> {
        SqliteKeyBindingRepository { pool: &self.pool }
    }

    fn themes(&self) -> Self::Themes<'_> {
        SqliteThemeRepository { pool: &self.pool }
    }
}
