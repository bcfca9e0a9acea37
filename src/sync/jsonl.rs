//! JSONL (JSON Lines) snapshot files.
//!
//! One JSON object per line, newline-delimited. Writes go to `<file>.tmp`
//! first and are renamed into place so a crash never leaves a half-written
//! snapshot in the working tree.

use miette::Diagnostic;
use serde::{Serialize, de::DeserializeOwned};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during JSONL operations.
#[derive(Error, Diagnostic, Debug)]
pub enum JsonlError {
    #[error("IO error: {0}")]
    #[diagnostic(code(draftsync::sync::jsonl::io))]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    #[diagnostic(code(draftsync::sync::jsonl::serialize))]
    Serialize(#[from] serde_json::Error),

    #[error("Invalid JSONL line {line}: {error}")]
    #[diagnostic(code(draftsync::sync::jsonl::invalid_line))]
    InvalidLine { line: usize, error: String },
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write records to a JSONL file, replacing it atomically.
///
/// # Errors
/// Returns error if the file cannot be written or serialization fails. The
/// previous file content is left untouched in that case.
pub fn write_jsonl<T: Serialize>(path: &Path, records: &[T]) -> Result<(), JsonlError> {
    let tmp = tmp_path(path);

    let result = (|| {
        let mut writer = BufWriter::new(File::create(&tmp)?);
        for record in records {
            let json = serde_json::to_string(record)?;
            writeln!(writer, "{}", json)?;
        }
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok::<(), JsonlError>(())
    })();

    if let Err(e) = result {
        let _ = std::fs::remove_file(&tmp);
        return Err(e);
    }

    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Read records from a JSONL file.
///
/// Blank lines are skipped; any other line must deserialize into `T`.
///
/// # Errors
/// Returns error if the file cannot be read or any line fails to deserialize.
pub fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, JsonlError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut records = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;

        if line.trim().is_empty() {
            continue;
        }

        let record: T = serde_json::from_str(&line).map_err(|e| JsonlError::InvalidLine {
            line: line_num + 1,
            error: e.to_string(),
        })?;

        records.push(record);
    }

    Ok(records)
}

/// Count the non-blank lines of a snapshot file. A missing file counts zero.
pub fn count_records(path: &Path) -> Result<usize, JsonlError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };
    let mut count = 0;
    for line in BufReader::new(file).lines() {
        if !line?.trim().is_empty() {
            count += 1;
        }
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    struct Row {
        uuid: String,
        title: String,
        revision: i32,
    }

    fn row(uuid: &str, title: &str, revision: i32) -> Row {
        Row {
            uuid: uuid.to_string(),
            title: title.to_string(),
            revision,
        }
    }

    #[test]
    fn test_snapshot_preserves_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("documents.jsonl");
        let rows = vec![row("b", "Journal", 7), row("a", "Groceries", 3)];

        write_jsonl(&path, &rows).unwrap();

        assert_eq!(read_jsonl::<Row>(&path).unwrap(), rows);
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn test_empty_snapshot_is_empty_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("themes.jsonl");

        write_jsonl::<Row>(&path, &[]).unwrap();

        assert_eq!(std::fs::read(&path).unwrap().len(), 0);
        assert!(read_jsonl::<Row>(&path).unwrap().is_empty());
    }

    #[test]
    fn test_blank_lines_ignored() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sparse.jsonl");
        std::fs::write(
            &path,
            "\n{\"uuid\":\"x\",\"title\":\"Inbox\",\"revision\":1}\n   \n\n",
        )
        .unwrap();

        let rows: Vec<Row> = read_jsonl(&path).unwrap();

        assert_eq!(rows, vec![row("x", "Inbox", 1)]);
    }

    #[test]
    fn test_bad_line_reports_line_number() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.jsonl");
        std::fs::write(
            &path,
            "{\"uuid\":\"x\",\"title\":\"Inbox\",\"revision\":1}\n<<<<<<< HEAD\n",
        )
        .unwrap();

        match read_jsonl::<Row>(&path) {
            Err(JsonlError::InvalidLine { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected result: {:?}", other.map(|r| r.len())),
        }
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = read_jsonl::<Row>(Path::new("/nonexistent/documents.jsonl"));

        assert!(matches!(result, Err(JsonlError::Io(_))));
    }

    #[test]
    fn test_write_replaces_file_and_leaves_no_tmp() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("documents.jsonl");
        std::fs::write(&path, "stale\n").unwrap();

        write_jsonl(&path, &[row("1", "Groceries", 1)]).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(!content.contains("stale"));
        assert!(!dir.path().join("documents.jsonl.tmp").exists());
    }

    #[test]
    fn test_count_records_skips_blank_lines_and_missing_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("themes.jsonl");
        std::fs::write(&path, "{}\n\n{}\n").unwrap();

        assert_eq!(count_records(&path).unwrap(), 2);
        assert_eq!(count_records(&dir.path().join("missing.jsonl")).unwrap(), 0);
    }
}
