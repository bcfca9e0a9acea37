//! SQLite document repository.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::helpers::{insert_error, not_found};
use crate::db::{DbResult, Document, RecordMeta, RecordRepository, Table};

/// SQLx-backed document repository.
pub struct SqliteDocumentRepository<'a> {
    pub(crate) pool: &'a SqlitePool,
}

fn document_from_row(row: &SqliteRow) -> Document {
    Document {
        meta: RecordMeta {
            uuid: row.get("uuid"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
            deleted_at: row.get("deleted_at"),
        },
        title: row.get("title"),
        content: row.get("content"),
        locked: row.get("locked"),
    }
}

impl<'a> RecordRepository<Document> for SqliteDocumentRepository<'a> {
    async fn query_all(&self) -> DbResult<Vec<Document>> {
        let rows = sqlx::query(
            "SELECT uuid, created_at, updated_at, deleted_at, title, content, locked
             FROM documents ORDER BY uuid",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.iter().map(document_from_row).collect())
    }

    async fn find_by_uuid(&self, uuid: &str) -> DbResult<Option<Document>> {
        let row = sqlx::query(
            "SELECT uuid, created_at, updated_at, deleted_at, title, content, locked
             FROM documents WHERE uuid = ?",
        )
        .bind(uuid)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.as_ref().map(document_from_row))
    }

    async fn create(&self, document: &Document) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO documents (uuid, created_at, updated_at, deleted_at, title, content, locked)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&document.meta.uuid)
        .bind(&document.meta.created_at)
        .bind(&document.meta.updated_at)
        .bind(&document.meta.deleted_at)
        .bind(&document.title)
        .bind(&document.content)
        .bind(document.locked)
        .execute(self.pool)
        .await
        .map_err(|e| insert_error(Table::Documents, &document.meta.uuid, e))?;

        Ok(())
    }

    async fn update_by_uuid(&self, document: &Document) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE documents
            SET updated_at = ?, deleted_at = ?, title = ?, content = ?, locked = ?
            WHERE uuid = ?
            "#,
        )
        .bind(&document.meta.updated_at)
        .bind(&document.meta.deleted_at)
        .bind(&document.title)
        .bind(&document.content)
        .bind(document.locked)
        .bind(&document.meta.uuid)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(not_found(Table::Documents, &document.meta.uuid));
        }

        Ok(())
    }
}
