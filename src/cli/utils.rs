//! Shared utilities for CLI commands

use chrono::{DateTime, Local, Utc};
use tabled::{Table, settings::Style};

use crate::cli::error::{CliError, CliResult};

/// Output formats accepted by `--format`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
}

/// Parse the `--format` argument.
pub fn parse_format(format: &str) -> CliResult<OutputFormat> {
    match format {
        "table" => Ok(OutputFormat::Table),
        "json" => Ok(OutputFormat::Json),
        other => Err(CliError::InvalidFormat {
            format: other.to_string(),
        }),
    }
}

/// Format an optional value, `-` when absent.
pub fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

/// Format a timestamp in local time.
pub fn format_time(time: Option<DateTime<Utc>>) -> String {
    or_dash(time.map(|t| {
        t.with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
    }))
}

/// Format a yes/no flag.
pub fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

/// Apply consistent table styling
pub fn apply_table_style(table: &mut Table) {
    table.with(Style::rounded());
}
