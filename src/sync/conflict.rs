//! Repair of snapshot files left with git conflict markers.
//!
//! Every conflict block is replaced by the union of both sides keyed by
//! uuid: "ours" records first in their original order, then records only
//! "theirs" has. A uuid present on both sides keeps the later
//! `updated_at` (see [`remote_wins`]). Lines outside conflict blocks pass
//! through untouched.

use std::collections::HashMap;
use std::path::Path;

use miette::Diagnostic;
use thiserror::Error;

use super::lww::remote_wins;

const OURS_MARKER: &str = "<<<<<<<";
const BASE_MARKER: &str = "|||||||";
const SEPARATOR: &str = "=======";
const THEIRS_MARKER: &str = ">>>>>>>";

/// Errors that can occur while resolving conflict blocks.
#[derive(Error, Diagnostic, Debug)]
pub enum ConflictError {
    #[error("IO error: {0}")]
    #[diagnostic(code(draftsync::sync::conflict::io))]
    Io(#[from] std::io::Error),

    #[error("Conflict block starting at line {line} is not terminated")]
    #[diagnostic(code(draftsync::sync::conflict::unterminated))]
    Unterminated { line: usize },

    #[error("Unexpected conflict marker '{marker}' at line {line}")]
    #[diagnostic(code(draftsync::sync::conflict::unexpected_marker))]
    UnexpectedMarker { line: usize, marker: String },

    #[error("Invalid record in conflict block at line {line}: {error}")]
    #[diagnostic(code(draftsync::sync::conflict::invalid_record))]
    InvalidRecord { line: usize, error: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker {
    Ours,
    Base,
    Separator,
    Theirs,
}

fn marker(line: &str) -> Option<Marker> {
    if line.starts_with(OURS_MARKER) {
        Some(Marker::Ours)
    } else if line.starts_with(BASE_MARKER) {
        Some(Marker::Base)
    } else if line.trim_end() == SEPARATOR {
        Some(Marker::Separator)
    } else if line.starts_with(THEIRS_MARKER) {
        Some(Marker::Theirs)
    } else {
        None
    }
}

/// Whether `content` contains at least one conflict block.
pub fn has_conflict_markers(content: &str) -> bool {
    content.split('\n').any(|line| marker(line) == Some(Marker::Ours))
}

enum State {
    Outside,
    Ours { start: usize },
    Base { start: usize },
    Theirs { start: usize },
}

/// A record line inside a conflict block.
struct Entry<'a> {
    uuid: String,
    updated_at: Option<String>,
    line: &'a str,
}

fn parse_side<'a>(lines: &[(usize, &'a str)]) -> Result<Vec<Entry<'a>>, ConflictError> {
    let mut entries = Vec::with_capacity(lines.len());
    for &(line_no, line) in lines {
        let value: serde_json::Value =
            serde_json::from_str(line).map_err(|e| ConflictError::InvalidRecord {
                line: line_no,
                error: e.to_string(),
            })?;
        let Some(object) = value.as_object() else {
            return Err(ConflictError::InvalidRecord {
                line: line_no,
                error: "expected a JSON object".to_string(),
            });
        };
        // Records without an identity cannot be merged.
        let Some(uuid) = object.get("uuid").and_then(|v| v.as_str()) else {
            continue;
        };
        entries.push(Entry {
            uuid: uuid.to_string(),
            updated_at: object
                .get("updated_at")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            line,
        });
    }
    Ok(entries)
}

fn merge_block<'a>(
    ours: &[(usize, &'a str)],
    theirs: &[(usize, &'a str)],
) -> Result<Vec<&'a str>, ConflictError> {
    let mut merged: Vec<Entry<'a>> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for entry in parse_side(ours)? {
        match index.get(&entry.uuid) {
            // Duplicate uuid on one side keeps the later version too.
            Some(&i) => {
                if remote_wins(merged[i].updated_at.as_deref(), entry.updated_at.as_deref()) {
                    merged[i] = entry;
                }
            }
            None => {
                index.insert(entry.uuid.clone(), merged.len());
                merged.push(entry);
            }
        }
    }

    for entry in parse_side(theirs)? {
        match index.get(&entry.uuid) {
            Some(&i) => {
                if remote_wins(merged[i].updated_at.as_deref(), entry.updated_at.as_deref()) {
                    merged[i] = entry;
                }
            }
            None => {
                index.insert(entry.uuid.clone(), merged.len());
                merged.push(entry);
            }
        }
    }

    Ok(merged.into_iter().map(|e| e.line).collect())
}

/// Resolve every conflict block in `content`.
///
/// Blank lines inside blocks are dropped, a diff3 base section is
/// discarded, and the output keeps the input's line separators.
pub fn resolve_content(content: &str) -> Result<String, ConflictError> {
    let mut output: Vec<&str> = Vec::new();
    let mut ours: Vec<(usize, &str)> = Vec::new();
    let mut theirs: Vec<(usize, &str)> = Vec::new();
    let mut state = State::Outside;

    for (i, line) in content.split('\n').enumerate() {
        let line_no = i + 1;
        let unexpected = |m: &str| ConflictError::UnexpectedMarker {
            line: line_no,
            marker: m.to_string(),
        };

        state = match (state, marker(line)) {
            (State::Outside, None) => {
                output.push(line);
                State::Outside
            }
            (State::Outside, Some(Marker::Ours)) => {
                ours.clear();
                theirs.clear();
                State::Ours { start: line_no }
            }
            (State::Outside, Some(_)) => return Err(unexpected(line)),

            (State::Ours { start }, None) => {
                if !line.trim().is_empty() {
                    ours.push((line_no, line));
                }
                State::Ours { start }
            }
            (State::Ours { start }, Some(Marker::Base)) => State::Base { start },
            (State::Ours { start } | State::Base { start }, Some(Marker::Separator)) => {
                State::Theirs { start }
            }
            (State::Base { start }, None) => State::Base { start },

            (State::Theirs { start }, None) => {
                if !line.trim().is_empty() {
                    theirs.push((line_no, line));
                }
                State::Theirs { start }
            }
            (State::Theirs { .. }, Some(Marker::Theirs)) => {
                output.extend(merge_block(&ours, &theirs)?);
                State::Outside
            }

            (_, Some(_)) => return Err(unexpected(line)),
        };
    }

    match state {
        State::Outside => Ok(output.join("\n")),
        State::Ours { start } | State::Base { start } | State::Theirs { start } => {
            Err(ConflictError::Unterminated { line: start })
        }
    }
}

/// Resolve the conflict blocks of a snapshot file in place.
///
/// Returns `false` when the file had no conflict markers.
pub fn resolve_file(path: &Path) -> Result<bool, ConflictError> {
    let content = std::fs::read_to_string(path)?;
    if !has_conflict_markers(&content) {
        return Ok(false);
    }
    let resolved = resolve_content(&content)?;
    std::fs::write(path, resolved)?;
    Ok(true)
}
