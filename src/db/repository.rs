//! Repository traits for data access abstraction.
//!
//! Synchronization only ever needs four operations per table, so every
//! table shares the same [`RecordRepository`] contract. Backends expose one
//! repository per table through [`Database`].

use std::future::Future;

use crate::db::{
    DbError, DbResult,
    models::{Document, Extension, KeyBinding, SyncRecord, Theme, now_timestamp},
};

/// Data access for one synchronized table.
///
/// `create` and `update_by_uuid` store the record exactly as given,
/// `updated_at` included. Application-style writes that stamp the clock go
/// through [`save`](RecordRepository::save) and
/// [`soft_delete`](RecordRepository::soft_delete).
pub trait RecordRepository<R: SyncRecord>: Send + Sync {
    /// All records of the table, soft-deleted ones included, ordered by uuid.
    fn query_all(&self) -> impl Future<Output = DbResult<Vec<R>>> + Send;

    /// Look a record up by uuid, including soft-deleted records.
    fn find_by_uuid(&self, uuid: &str) -> impl Future<Output = DbResult<Option<R>>> + Send;

    /// Insert a new record.
    fn create(&self, record: &R) -> impl Future<Output = DbResult<()>> + Send;

    /// Overwrite every mutable column of the record with the same uuid.
    ///
    /// Returns `DbError::NotFound` when no such record exists.
    fn update_by_uuid(&self, record: &R) -> impl Future<Output = DbResult<()>> + Send;

    /// Insert or update a record, stamping `updated_at` with the current time.
    fn save(&self, mut record: R) -> impl Future<Output = DbResult<R>> + Send {
        async move {
            record.meta_mut().updated_at = now_timestamp();
            if self.find_by_uuid(&record.meta().uuid).await?.is_some() {
                self.update_by_uuid(&record).await?;
            } else {
                self.create(&record).await?;
            }
            Ok(record)
        }
    }

    /// Tombstone a record. The row stays in the table.
    fn soft_delete(&self, uuid: &str) -> impl Future<Output = DbResult<R>> + Send {
        async move {
            let mut record = self
                .find_by_uuid(uuid)
                .await?
                .ok_or_else(|| DbError::NotFound {
                    table: R::TABLE.to_string(),
                    uuid: uuid.to_string(),
                })?;
            let now = now_timestamp();
            record.meta_mut().deleted_at = Some(now.clone());
            record.meta_mut().updated_at = now;
            self.update_by_uuid(&record).await?;
            Ok(record)
        }
    }
}

/// Database abstraction providing a repository per synchronized table.
pub trait Database: Send + Sync + 'static {
    type Documents<'a>: RecordRepository<Document>
    where
        Self: 'a;
    type Extensions<'a>: RecordRepository<Extension>
    where
        Self: 'a;
    type KeyBindings<'a>: RecordRepository<KeyBinding>
    where
        Self: 'a;
    type Themes<'a>: RecordRepository<Theme>
    where
        Self: 'a;

    /// Run pending schema migrations.
    fn migrate(&self) -> impl Future<Output = DbResult<()>> + Send;

    fn documents(&self) -> Self::Documents<'_>;

    fn extensions(&self) -> Self::Extensions<'_>;

    fn key_bindings(&self) -> Self::KeyBindings<'_>;

    fn themes(&self) -> Self::Themes<'_>;
}
