//! Last-write-wins comparison shared by import and conflict resolution.

use chrono::{DateTime, FixedOffset};

fn parse_timestamp(value: Option<&str>) -> Option<DateTime<FixedOffset>> {
    value.and_then(|v| DateTime::parse_from_rfc3339(v.trim()).ok())
}

/// Whether a remote record with `remote_updated_at` supersedes a local one.
///
/// Both values are RFC3339 instants. A missing or unparsable value sorts
/// before every valid one, and the remote wins only when strictly later,
/// so ties keep the local record.
pub fn remote_wins(local_updated_at: Option<&str>, remote_updated_at: Option<&str>) -> bool {
    parse_timestamp(remote_updated_at) > parse_timestamp(local_updated_at)
}
