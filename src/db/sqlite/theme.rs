//! SQLite theme repository.

use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::helpers::{decode_json, encode_json, insert_error, not_found};
use crate::db::{DbError, DbResult, RecordMeta, RecordRepository, Table, Theme, ThemeType};

/// SQLx-backed theme repository.
pub struct SqliteThemeRepository<'a> {
    pub(crate) pool: &'a SqlitePool,
}

fn theme_from_row(row: &SqliteRow) -> DbResult<Theme> {
    let type_str: String = row.get("type");
    let theme_type = ThemeType::from_str(&type_str).map_err(|message| DbError::InvalidData {
        table: Table::Themes.to_string(),
        column: "type".to_string(),
        message,
    })?;

    Ok(Theme {
        meta: RecordMeta {
            uuid: row.get("uuid"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
            deleted_at: row.get("deleted_at"),
        },
        key: row.get("key"),
        theme_type,
        colors: decode_json(Table::Themes, "colors", row.get("colors"))?,
    })
}

impl<'a> RecordRepository<Theme> for SqliteThemeRepository<'a> {
    async fn query_all(&self) -> DbResult<Vec<Theme>> {
        let rows = sqlx::query(
            "SELECT uuid, created_at, updated_at, deleted_at, key, type, colors
             FROM themes ORDER BY uuid",
        )
        .fetch_all(self.pool)
        .await?;

        rows.iter().map(theme_from_row).collect()
    }

    async fn find_by_uuid(&self, uuid: &str) -> DbResult<Option<Theme>> {
        let row = sqlx::query(
            "SELECT uuid, created_at, updated_at, deleted_at, key, type, colors
             FROM themes WHERE uuid = ?",
        )
        .bind(uuid)
        .fetch_optional(self.pool)
        .await?;

        row.as_ref().map(theme_from_row).transpose()
    }

    async fn create(&self, theme: &Theme) -> DbResult<()> {
        let colors = encode_json(Table::Themes, "colors", theme.colors.as_ref())?;

        sqlx::query(
            r#"
            INSERT INTO themes (uuid, created_at, updated_at, deleted_at, key, type, colors)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&theme.meta.uuid)
        .bind(&theme.meta.created_at)
        .bind(&theme.meta.updated_at)
        .bind(&theme.meta.deleted_at)
        .bind(&theme.key)
        .bind(theme.theme_type.as_str())
        .bind(colors)
        .execute(self.pool)
        .await
        .map_err(|e| insert_error(Table::Themes, &theme.meta.uuid, e))?;

        Ok(())
    }

    async fn update_by_uuid(&self, theme: &Theme) -> DbResult<()> {
        let colors = encode_json(Table::Themes, "colors", theme.colors.as_ref())?;

        let result = sqlx::query(
            r#"
            UPDATE themes
            SET updated_at = ?, deleted_at = ?, key = ?, type = ?, colors = ?
            WHERE uuid = ?
            "#,
        )
        .bind(&theme.meta.updated_at)
        .bind(&theme.meta.deleted_at)
        .bind(&theme.key)
        .bind(theme.theme_type.as_str())
        .bind(colors)
        .bind(&theme.meta.uuid)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(not_found(Table::Themes, &theme.meta.uuid));
        }

        Ok(())
    }
}
