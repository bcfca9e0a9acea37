//! SQLite key binding repository.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::helpers::{insert_error, not_found};
use crate::db::{DbResult, KeyBinding, RecordMeta, RecordRepository, Table};

/// SQLx-backed key binding repository.
pub struct SqliteKeyBindingRepository<'a> {
    pub(crate) pool: &'a SqlitePool,
}

fn key_binding_from_row(row: &SqliteRow) -> KeyBinding {
    KeyBinding {
        meta: RecordMeta {
            uuid: row.get("uuid"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
            deleted_at: row.get("deleted_at"),
        },
        key: row.get("key"),
        command: row.get("command"),
        extension: row.get("extension"),
        enabled: row.get("enabled"),
    }
}

impl<'a> RecordRepository<KeyBinding> for SqliteKeyBindingRepository<'a> {
    async fn query_all(&self) -> DbResult<Vec<KeyBinding>> {
        let rows = sqlx::query(
            "SELECT uuid, created_at, updated_at, deleted_at, key, command, extension, enabled
             FROM key_bindings ORDER BY uuid",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.iter().map(key_binding_from_row).collect())
    }

    async fn find_by_uuid(&self, uuid: &str) -> DbResult<Option<KeyBinding>> {
        let row = sqlx::query(
            "SELECT uuid, created_at, updated_at, deleted_at, key, command, extension, enabled
             FROM key_bindings WHERE uuid = ?",
        )
        .bind(uuid)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.as_ref().map(key_binding_from_row))
    }

    async fn create(&self, binding: &KeyBinding) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO key_bindings
                (uuid, created_at, updated_at, deleted_at, key, command, extension, enabled)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&binding.meta.uuid)
        .bind(&binding.meta.created_at)
        .bind(&binding.meta.updated_at)
        .bind(&binding.meta.deleted_at)
        .bind(&binding.key)
        .bind(&binding.command)
        .bind(&binding.extension)
        .bind(binding.enabled)
        .execute(self.pool)
        .await
        .map_err(|e| insert_error(Table::KeyBindings, &binding.meta.uuid, e))?;

        Ok(())
    }

    async fn update_by_uuid(&self, binding: &KeyBinding) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE key_bindings
            SET updated_at = ?, deleted_at = ?, key = ?, command = ?, extension = ?, enabled = ?
            WHERE uuid = ?
            "#,
        )
        .bind(&binding.meta.updated_at)
        .bind(&binding.meta.deleted_at)
        .bind(&binding.key)
        .bind(&binding.command)
        .bind(&binding.extension)
        .bind(binding.enabled)
        .bind(&binding.meta.uuid)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(not_found(Table::KeyBindings, &binding.meta.uuid));
        }

        Ok(())
    }
}
