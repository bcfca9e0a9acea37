//! Import JSONL snapshot files into the database.
//!
//! Every record is merged by uuid with last-write-wins: unknown uuids are
//! created, known ones are overwritten only when the snapshot's
//! `updated_at` is strictly later. Imported timestamps are stored verbatim.

use std::path::Path;

use miette::Diagnostic;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::db::{
    Database, DbError, Document, Extension, KeyBinding, RecordPatch, RecordRepository, SyncRecord,
    Table, Theme,
};

use super::jsonl::{JsonlError, read_jsonl};
use super::lww::remote_wins;

/// Errors that abort the import of one table.
#[derive(Error, Diagnostic, Debug)]
pub enum ImportError {
    #[error("Database error while importing {table}: {source}")]
    #[diagnostic(code(draftsync::sync::import::database))]
    Database { table: Table, source: DbError },

    #[error("Failed to read {table} snapshot: {source}")]
    #[diagnostic(code(draftsync::sync::import::jsonl))]
    Jsonl { table: Table, source: JsonlError },
}

/// Outcome counts for one table.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TableImport {
    /// New records inserted.
    pub created: usize,
    /// Local records overwritten by a later snapshot version.
    pub updated: usize,
    /// Local records that were as new or newer.
    pub unchanged: usize,
    /// Lines without a uuid.
    pub skipped: usize,
    /// Lines whose fields could not be decoded.
    pub failed: usize,
}

/// Summary of an import run across all tables.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub documents: TableImport,
    pub extensions: TableImport,
    pub keybindings: TableImport,
    pub themes: TableImport,
    /// Tables whose import was aborted, with the reason.
    pub failures: Vec<(Table, String)>,
}

impl ImportSummary {
    pub fn table(&self, table: Table) -> &TableImport {
        match table {
            Table::Documents => &self.documents,
            Table::Extensions => &self.extensions,
            Table::KeyBindings => &self.keybindings,
            Table::Themes => &self.themes,
        }
    }

    fn table_mut(&mut self, table: Table) -> &mut TableImport {
        match table {
            Table::Documents => &mut self.documents,
            Table::Extensions => &mut self.extensions,
            Table::KeyBindings => &mut self.keybindings,
            Table::Themes => &mut self.themes,
        }
    }

    /// Records created or updated across all tables.
    pub fn changed(&self) -> usize {
        Table::ALL
            .iter()
            .map(|t| self.table(*t))
            .map(|t| t.created + t.updated)
            .sum()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn record(&mut self, table: Table, result: Result<TableImport, ImportError>) {
        match result {
            Ok(counts) => *self.table_mut(table) = counts,
            Err(e) => {
                error!(table = %table, error = %e, "Import of table failed");
                self.failures.push((table, e.to_string()));
            }
        }
    }
}

/// Import every table's snapshot from `input_dir`.
///
/// A missing file means there is no remote data for that table yet. A table
/// that fails (malformed line, database error) is logged and recorded in
/// the summary; the remaining tables are still imported.
pub async fn import_all<D: Database>(db: &D, input_dir: &Path) -> ImportSummary {
    let mut summary = ImportSummary::default();

    let result = import_table::<Document, _>(&db.documents(), input_dir).await;
    summary.record(Table::Documents, result);

    let result = import_table::<Extension, _>(&db.extensions(), input_dir).await;
    summary.record(Table::Extensions, result);

    let result = import_table::<KeyBinding, _>(&db.key_bindings(), input_dir).await;
    summary.record(Table::KeyBindings, result);

    let result = import_table::<Theme, _>(&db.themes(), input_dir).await;
    summary.record(Table::Themes, result);

    summary
}

/// Merge one table's snapshot into the store.
pub async fn import_table<R, Repo>(repo: &Repo, input_dir: &Path) -> Result<TableImport, ImportError>
where
    R: SyncRecord,
    Repo: RecordRepository<R>,
{
    let table = R::TABLE;
    let path = input_dir.join(table.file_name());
    let mut counts = TableImport::default();

    if !path.exists() {
        debug!(table = %table, "No snapshot file, nothing to import");
        return Ok(counts);
    }

    let objects: Vec<Map<String, Value>> =
        read_jsonl(&path).map_err(|source| ImportError::Jsonl { table, source })?;
    let db_err = |source| ImportError::Database { table, source };

    for object in objects {
        let uuid = match object.get("uuid").and_then(Value::as_str) {
            Some(uuid) if !uuid.is_empty() => uuid.to_string(),
            _ => {
                counts.skipped += 1;
                continue;
            }
        };

        let patch: RecordPatch<R::Fields> = match serde_json::from_value(Value::Object(object)) {
            Ok(patch) => patch,
            Err(e) => {
                warn!(table = %table, uuid = %uuid, error = %e, "Skipping undecodable record");
                counts.failed += 1;
                continue;
            }
        };

        match repo.find_by_uuid(&uuid).await.map_err(db_err)? {
            None => {
                let record = R::from_patch(patch);
                repo.create(&record).await.map_err(db_err)?;
                counts.created += 1;
            }
            Some(mut local) => {
                if remote_wins(
                    Some(local.meta().updated_at.as_str()),
                    patch.updated_at.as_deref(),
                ) {
                    local.apply_patch(patch);
                    repo.update_by_uuid(&local).await.map_err(db_err)?;
                    counts.updated += 1;
                } else {
                    counts.unchanged += 1;
                }
            }
        }
    }

    debug!(
        table = %table,
        created = counts.created,
        updated = counts.updated,
        unchanged = counts.unchanged,
        "Imported table"
    );
    Ok(counts)
}
