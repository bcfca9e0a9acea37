//! SQLite extension repository.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::helpers::{decode_json, encode_json, insert_error, not_found};
use crate::db::{DbResult, Extension, RecordMeta, RecordRepository, Table};

/// SQLx-backed extension repository.
pub struct SqliteExtensionRepository<'a> {
    pub(crate) pool: &'a SqlitePool,
}

fn extension_from_row(row: &SqliteRow) -> DbResult<Extension> {
    Ok(Extension {
        meta: RecordMeta {
            uuid: row.get("uuid"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
            deleted_at: row.get("deleted_at"),
        },
        key: row.get("key"),
        enabled: row.get("enabled"),
        config: decode_json(Table::Extensions, "config", row.get("config"))?,
    })
}

impl<'a> RecordRepository<Extension> for SqliteExtensionRepository<'a> {
    async fn query_all(&self) -> DbResult<Vec<Extension>> {
        let rows = sqlx::query(
            "SELECT uuid, created_at, updated_at, deleted_at, key, enabled, config
             FROM extensions ORDER BY uuid",
        )
        .fetch_all(self.pool)
        .await?;

        rows.iter().map(extension_from_row).collect()
    }

    async fn find_by_uuid(&self, uuid: &str) -> DbResult<Option<Extension>> {
        let row = sqlx::query(
            "SELECT uuid, created_at, updated_at, deleted_at, key, enabled, config
             FROM extensions WHERE uuid = ?",
        )
        .bind(uuid)
        .fetch_optional(self.pool)
        .await?;

        row.as_ref().map(extension_from_row).transpose()
    }

    async fn create(&self, extension: &Extension) -> DbResult<()> {
        let config = encode_json(Table::Extensions, "config", extension.config.as_ref())?;

        sqlx::query(
            r#"
            INSERT INTO extensions (uuid, created_at, updated_at, deleted_at, key, enabled, config)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&extension.meta.uuid)
        .bind(&extension.meta.created_at)
        .bind(&extension.meta.updated_at)
        .bind(&extension.meta.deleted_at)
        .bind(&extension.key)
        .bind(extension.enabled)
        .bind(config)
        .execute(self.pool)
        .await
        .map_err(|e| insert_error(Table::Extensions, &extension.meta.uuid, e))?;

        Ok(())
    }

    async fn update_by_uuid(&self, extension: &Extension) -> DbResult<()> {
        let config = encode_json(Table::Extensions, "config", extension.config.as_ref())?;

        let result = sqlx::query(
            r#"
            UPDATE extensions
            SET updated_at = ?, deleted_at = ?, key = ?, enabled = ?, config = ?
            WHERE uuid = ?
            "#,
        )
        .bind(&extension.meta.updated_at)
        .bind(&extension.meta.deleted_at)
        .bind(&extension.key)
        .bind(extension.enabled)
        .bind(config)
        .bind(&extension.meta.uuid)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(not_found(Table::Extensions, &extension.meta.uuid));
        }

        Ok(())
    }
}
