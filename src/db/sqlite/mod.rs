//! SQLite implementation of the database traits.
//!
//! One repository per synchronized table, all borrowing the pool owned by
//! [`SqliteDatabase`].

mod connection;
mod document;
mod extension;
mod helpers;
mod key_binding;
mod theme;

#[cfg(test)]
mod connection_test;

pub use connection::SqliteDatabase;
pub use document::SqliteDocumentRepository;
pub use extension::SqliteExtensionRepository;
pub use key_binding::SqliteKeyBindingRepository;
pub use theme::SqliteThemeRepository;
