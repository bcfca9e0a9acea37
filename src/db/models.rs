//! Domain models for the synchronized tables.
//!
//! These models are storage-agnostic. Every record carries the same
//! [`RecordMeta`] header (identity, logical clock and tombstone) flattened
//! next to its table-specific fields, so the JSON form of a record is a
//! single flat object.

use std::fmt;

use chrono::{SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A free-form JSON object column (extension config, theme colors).
pub type JsonObject = serde_json::Map<String, serde_json::Value>;

/// Content given to a document created without one.
pub const DEFAULT_DOCUMENT_CONTENT: &str = "\n∞∞∞text-a\n";

/// Current time in the RFC3339 form used for `created_at`/`updated_at`.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

// =============================================================================
// Tables
// =============================================================================

/// The tables that take part in synchronization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Documents,
    Extensions,
    KeyBindings,
    Themes,
}

impl Table {
    /// All tables, in export/import order.
    pub const ALL: [Table; 4] = [
        Table::Documents,
        Table::Extensions,
        Table::KeyBindings,
        Table::Themes,
    ];

    /// Logical table name, also the snapshot file stem.
    pub fn name(self) -> &'static str {
        match self {
            Table::Documents => "documents",
            Table::Extensions => "extensions",
            Table::KeyBindings => "keybindings",
            Table::Themes => "themes",
        }
    }

    /// Snapshot file name inside the repository (`<name>.jsonl`).
    pub fn file_name(self) -> &'static str {
        match self {
            Table::Documents => "documents.jsonl",
            Table::Extensions => "extensions.jsonl",
            Table::KeyBindings => "keybindings.jsonl",
            Table::Themes => "themes.jsonl",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A per-table count, used for export summaries and status reporting.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TableCounts {
    pub documents: usize,
    pub extensions: usize,
    pub keybindings: usize,
    pub themes: usize,
}

impl TableCounts {
    pub fn get(&self, table: Table) -> usize {
        match table {
            Table::Documents => self.documents,
            Table::Extensions => self.extensions,
            Table::KeyBindings => self.keybindings,
            Table::Themes => self.themes,
        }
    }

    pub fn set(&mut self, table: Table, count: usize) {
        match table {
            Table::Documents => self.documents = count,
            Table::Extensions => self.extensions = count,
            Table::KeyBindings => self.keybindings = count,
            Table::Themes => self.themes = count,
        }
    }

    pub fn total(&self) -> usize {
        self.documents + self.extensions + self.keybindings + self.themes
    }
}

// =============================================================================
// Record header and the generic patch envelope
// =============================================================================

/// Fields shared by every synchronized record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMeta {
    /// Immutable cross-replica identity.
    pub uuid: String,
    pub created_at: String,
    /// Logical clock compared by last-write-wins.
    pub updated_at: String,
    /// Tombstone. Absent means the record is live.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<String>,
}

impl RecordMeta {
    /// Header for a freshly created live record, stamped with the current time.
    pub fn new(uuid: impl Into<String>) -> Self {
        let now = now_timestamp();
        Self {
            uuid: uuid.into(),
            created_at: now.clone(),
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Header with explicit timestamps.
    pub fn at(uuid: impl Into<String>, updated_at: impl Into<String>) -> Self {
        let updated_at = updated_at.into();
        Self {
            uuid: uuid.into(),
            created_at: updated_at.clone(),
            updated_at,
            deleted_at: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// A record as read from a snapshot line.
///
/// Every field except `uuid` may be missing; `F` holds the table-specific
/// fields, each optional.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordPatch<F> {
    pub uuid: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub deleted_at: Option<String>,
    #[serde(flatten)]
    pub fields: F,
}

impl<F> RecordPatch<F> {
    /// Split into a complete header (missing timestamps take the current
    /// time) and the table fields.
    pub fn into_new_parts(self) -> (RecordMeta, F) {
        let now = now_timestamp();
        let meta = RecordMeta {
            uuid: self.uuid,
            created_at: self.created_at.unwrap_or_else(|| now.clone()),
            updated_at: self.updated_at.unwrap_or(now),
            deleted_at: self.deleted_at,
        };
        (meta, self.fields)
    }

    /// Apply the header part onto an existing header and hand back the
    /// table fields. `created_at` never changes after creation; the
    /// tombstone mirrors the patch.
    pub fn apply_meta(self, meta: &mut RecordMeta) -> F {
        if let Some(updated_at) = self.updated_at {
            meta.updated_at = updated_at;
        }
        meta.deleted_at = self.deleted_at;
        self.fields
    }
}

/// A record type that can be exported, imported and merged.
pub trait SyncRecord:
    Serialize + DeserializeOwned + Clone + fmt::Debug + Send + Sync + Unpin + 'static
{
    /// All-optional view of the table-specific fields.
    type Fields: DeserializeOwned + Default + Send;

    const TABLE: Table;

    fn meta(&self) -> &RecordMeta;

    fn meta_mut(&mut self) -> &mut RecordMeta;

    /// Build a new record; fields missing from the patch take store defaults.
    fn from_patch(patch: RecordPatch<Self::Fields>) -> Self;

    /// Overwrite this record with a newer patch. Present fields replace the
    /// local value; nullable fields that are absent are cleared.
    fn apply_patch(&mut self, patch: RecordPatch<Self::Fields>);
}

// =============================================================================
// Documents
// =============================================================================

/// A text document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub title: String,
    #[serde(default = "default_document_content")]
    pub content: String,
    #[serde(default)]
    pub locked: bool,
}

fn default_document_content() -> String {
    DEFAULT_DOCUMENT_CONTENT.to_string()
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct DocumentFields {
    pub title: Option<String>,
    pub content: Option<String>,
    pub locked: Option<bool>,
}

impl Document {
    pub fn new(meta: RecordMeta, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            meta,
            title: title.into(),
            content: content.into(),
            locked: false,
        }
    }
}

impl SyncRecord for Document {
    type Fields = DocumentFields;
    const TABLE: Table = Table::Documents;

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn from_patch(patch: RecordPatch<DocumentFields>) -> Self {
        let (meta, fields) = patch.into_new_parts();
        Self {
            meta,
            title: fields.title.unwrap_or_default(),
            content: fields.content.unwrap_or_else(default_document_content),
            locked: fields.locked.unwrap_or(false),
        }
    }

    fn apply_patch(&mut self, patch: RecordPatch<DocumentFields>) {
        let fields = patch.apply_meta(&mut self.meta);
        if let Some(title) = fields.title {
            self.title = title;
        }
        if let Some(content) = fields.content {
            self.content = content;
        }
        if let Some(locked) = fields.locked {
            self.locked = locked;
        }
    }
}

// =============================================================================
// Extensions
// =============================================================================

/// An editor extension and its settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extension {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub key: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub config: Option<JsonObject>,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct ExtensionFields {
    pub key: Option<String>,
    pub enabled: Option<bool>,
    pub config: Option<JsonObject>,
}

impl SyncRecord for Extension {
    type Fields = ExtensionFields;
    const TABLE: Table = Table::Extensions;

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn from_patch(patch: RecordPatch<ExtensionFields>) -> Self {
        let (meta, fields) = patch.into_new_parts();
        Self {
            meta,
            key: fields.key.unwrap_or_default(),
            enabled: fields.enabled.unwrap_or(true),
            config: fields.config,
        }
    }

    fn apply_patch(&mut self, patch: RecordPatch<ExtensionFields>) {
        let fields = patch.apply_meta(&mut self.meta);
        if let Some(key) = fields.key {
            self.key = key;
        }
        if let Some(enabled) = fields.enabled {
            self.enabled = enabled;
        }
        self.config = fields.config;
    }
}

// =============================================================================
// Key bindings
// =============================================================================

/// A keyboard shortcut bound to a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyBinding {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub key: String,
    pub command: String,
    /// Owning extension key; empty when the binding is built in.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub extension: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct KeyBindingFields {
    pub key: Option<String>,
    pub command: Option<String>,
    pub extension: Option<String>,
    pub enabled: Option<bool>,
}

impl SyncRecord for KeyBinding {
    type Fields = KeyBindingFields;
    const TABLE: Table = Table::KeyBindings;

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn from_patch(patch: RecordPatch<KeyBindingFields>) -> Self {
        let (meta, fields) = patch.into_new_parts();
        Self {
            meta,
            key: fields.key.unwrap_or_default(),
            command: fields.command.unwrap_or_default(),
            extension: fields.extension.unwrap_or_default(),
            enabled: fields.enabled.unwrap_or(true),
        }
    }

    fn apply_patch(&mut self, patch: RecordPatch<KeyBindingFields>) {
        let fields = patch.apply_meta(&mut self.meta);
        if let Some(key) = fields.key {
            self.key = key;
        }
        if let Some(command) = fields.command {
            self.command = command;
        }
        // Exported without the field when empty, so absence means cleared.
        self.extension = fields.extension.unwrap_or_default();
        if let Some(enabled) = fields.enabled {
            self.enabled = enabled;
        }
    }
}

// =============================================================================
// Themes
// =============================================================================

/// Theme flavour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeType {
    #[default]
    Dark,
    Light,
}

impl ThemeType {
    pub fn as_str(self) -> &'static str {
        match self {
            ThemeType::Dark => "dark",
            ThemeType::Light => "light",
        }
    }
}

impl std::str::FromStr for ThemeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dark" => Ok(ThemeType::Dark),
            "light" => Ok(ThemeType::Light),
            other => Err(format!("unknown theme type '{}'", other)),
        }
    }
}

/// A color theme.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Theme {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub key: String,
    #[serde(rename = "type", default)]
    pub theme_type: ThemeType,
    #[serde(default)]
    pub colors: Option<JsonObject>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct ThemeFields {
    pub key: Option<String>,
    #[serde(rename = "type")]
    pub theme_type: Option<ThemeType>,
    pub colors: Option<JsonObject>,
}

impl SyncRecord for Theme {
    type Fields = ThemeFields;
    const TABLE: Table = Table::Themes;

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn from_patch(patch: RecordPatch<ThemeFields>) -> Self {
        let (meta, fields) = patch.into_new_parts();
        Self {
            meta,
            key: fields.key.unwrap_or_default(),
            theme_type: fields.theme_type.unwrap_or_default(),
            colors: fields.colors,
        }
    }

    fn apply_patch(&mut self, patch: RecordPatch<ThemeFields>) {
        let fields = patch.apply_meta(&mut self.meta);
        if let Some(key) = fields.key {
            self.key = key;
        }
        if let Some(theme_type) = fields.theme_type {
            self.theme_type = theme_type;
        }
        self.colors = fields.colors;
    }
}
