//! Output
//!
//! JSONL table writing and pretty JSON dumps for collected data.

use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::warn;

use crate::datacollection::Table;

/// Errors raised while writing output files.
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Append-only JSONL writer, one JSON object per table row.
pub struct TableWriter {
    writer: BufWriter<File>,
    rows: u64,
}

impl TableWriter {
    /// Creates (or truncates) the file, creating parent directories.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, OutputError> {
        let path = path.as_ref();
        ensure_parent(path)?;
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        Ok(Self {
            writer: BufWriter::new(file),
            rows: 0,
        })
    }

    /// Rows written so far.
    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn write_record<T: Serialize>(&mut self, record: &T) -> Result<(), OutputError> {
        let json = serde_json::to_string(record)?;
        writeln!(self.writer, "{}", json)?;
        self.rows += 1;
        Ok(())
    }

    /// Writes every row of the table as an object keyed by column.
    pub fn write_table(&mut self, table: &Table) -> Result<(), OutputError> {
        for record in table.records() {
            self.write_record(&record)?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), OutputError> {
        self.writer.flush()?;
        Ok(())
    }
}

impl Drop for TableWriter {
    fn drop(&mut self) {
        if let Err(e) = self.writer.flush() {
            warn!(error = %e, "failed to flush table writer");
        }
    }
}

/// Writes `value` as pretty JSON, creating parent directories.
pub fn write_json<T: Serialize>(path: impl AsRef<Path>, value: &T) -> Result<(), OutputError> {
    let path = path.as_ref();
    ensure_parent(path)?;
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)?;
    Ok(())
}

fn ensure_parent(path: &Path) -> Result<(), OutputError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::io::BufRead;

    #[test]
    fn test_table_writer_writes_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("agents.jsonl");

        let mut table = Table::new(["step", "wealth"]);
        table.push_row(vec![json!(0), json!(1)]);
        table.push_row(vec![json!(1), json!(3)]);

        {
            let mut writer = TableWriter::create(&path).unwrap();
            writer.write_table(&table).unwrap();
            assert_eq!(writer.rows(), 2);
        }

        let file = File::open(&path).unwrap();
        let lines: Vec<Value> = std::io::BufReader::new(file)
            .lines()
            .map(|line| serde_json::from_str(&line.unwrap()).unwrap())
            .collect();
        assert_eq!(lines, vec![json!({"step": 0, "wealth": 1}), json!({"step": 1, "wealth": 3})]);
    }

    #[test]
    fn test_write_json_creates_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("model.json");
        write_json(&path, &json!({"gini": 0.25})).unwrap();

        let parsed: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed["gini"], json!(0.25));
    }
}
