//! Storage layer for the synchronized tables.
//!
//! # Architecture
//!
//! - `error`: Storage-agnostic error types
//! - `models`: Synchronized records (Document, Extension, KeyBinding, Theme)
//! - `repository`: Trait definitions for data access
//! - `sqlite`: SQLx-backed implementation

mod error;
mod models;
mod repository;
pub mod sqlite;

#[cfg(test)]
mod error_test;

pub use error::{DbError, DbResult};
pub use models::*;
pub use repository::*;
pub use sqlite::SqliteDatabase;
