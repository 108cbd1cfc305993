//! JSONL boundary: one JSON object per line.

use anyhow::Context;
use recon_core::{ReconError, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use std::io::{BufWriter, Write};
use std::path::Path;

pub type Row = Map<String, Value>;

/// Parse JSONL content. Blank lines are skipped; every other line must be an object.
pub fn parse_jsonl(content: &str) -> Result<Vec<Row>> {
    let mut rows = Vec::new();
    for (i, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(line).with_context(|| format!("line {}", i + 1))?;
        match value {
            Value::Object(map) => rows.push(map),
            other => {
                return Err(anyhow::anyhow!("line {}: expected a JSON object, got {}", i + 1, other).into());
            }
        }
    }
    Ok(rows)
}

pub fn read_jsonl(path: impl AsRef<Path>) -> Result<Vec<Row>> {
    let content = std::fs::read_to_string(path)?;
    parse_jsonl(&content)
}

/// Reference rows are configuration: an unreadable file is `ConfigurationMissing`.
pub fn read_reference(path: impl AsRef<Path>) -> Result<Vec<Row>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| {
        ReconError::configuration_missing(format!("reference list {}", path.display()), e.to_string())
    })?;
    parse_jsonl(&content)
}

pub fn to_jsonl<T: Serialize>(rows: &[T]) -> Result<String> {
    let mut out = String::new();
    for row in rows {
        out.push_str(&serde_json::to_string(row)?);
        out.push('\n');
    }
    Ok(out)
}

pub fn write_jsonl<T: Serialize>(path: impl AsRef<Path>, rows: &[T]) -> Result<()> {
    let mut writer = BufWriter::new(std::fs::File::create(path)?);
    for row in rows {
        serde_json::to_writer(&mut writer, row)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}
