//! Export database records to JSONL snapshot files.

use std::path::Path;

use miette::Diagnostic;
use thiserror::Error;
use tracing::debug;

use crate::db::{
    Database, DbError, Document, Extension, KeyBinding, RecordRepository, SyncRecord, Table,
    TableCounts, Theme,
};

use super::jsonl::{JsonlError, write_jsonl};

/// Errors that can occur during export.
#[derive(Error, Diagnostic, Debug)]
pub enum ExportError {
    #[error("Failed to read {table} for export: {source}")]
    #[diagnostic(code(draftsync::sync::export::database))]
    Database { table: Table, source: DbError },

    #[error("Failed to write {table} snapshot: {source}")]
    #[diagnostic(code(draftsync::sync::export::jsonl))]
    Jsonl { table: Table, source: JsonlError },
}

/// Records written per table.
pub type ExportSummary = TableCounts;

/// Export every table to `<output_dir>/<table>.jsonl`.
///
/// Soft-deleted records are exported too, ordered by uuid. Each file is
/// replaced atomically. The first failing table aborts the export.
pub async fn export_all<D: Database>(
    db: &D,
    output_dir: &Path,
) -> Result<ExportSummary, ExportError> {
    let mut summary = ExportSummary::default();

    let count = export_table::<Document, _>(&db.documents(), output_dir).await?;
    summary.set(Table::Documents, count);

    let count = export_table::<Extension, _>(&db.extensions(), output_dir).await?;
    summary.set(Table::Extensions, count);

    let count = export_table::<KeyBinding, _>(&db.key_bindings(), output_dir).await?;
    summary.set(Table::KeyBindings, count);

    let count = export_table::<Theme, _>(&db.themes(), output_dir).await?;
    summary.set(Table::Themes, count);

    Ok(summary)
}

async fn export_table<R, Repo>(repo: &Repo, output_dir: &Path) -> Result<usize, ExportError>
where
    R: SyncRecord,
    Repo: RecordRepository<R>,
{
    let table = R::TABLE;
    let records = repo
        .query_all()
        .await
        .map_err(|source| ExportError::Database { table, source })?;

    write_jsonl(&output_dir.join(table.file_name()), &records)
        .map_err(|source| ExportError::Jsonl { table, source })?;

    debug!(table = %table, records = records.len(), "Exported table");
    Ok(records.len())
}
