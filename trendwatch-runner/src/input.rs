//! Payload ingestion from CSV or JSON Lines.
//!
//! Both formats carry the same fields: `project_id`, `group`, `timestamp`
//! (RFC 3339), `value` and an optional `count`. The format is picked from the
//! file extension.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use thiserror::Error;
use trendwatch_core::DetectorPayload;

/// Errors from reading payloads.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("failed to read payloads: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid CSV payload: {0}")]
    Csv(#[from] csv::Error),
    #[error("invalid JSON payload on line {line}: {source}")]
    Json {
        line: usize,
        source: serde_json::Error,
    },
    #[error("unsupported payload file extension '{0}' (expected csv, jsonl or ndjson)")]
    UnsupportedFormat(String),
}

/// On-disk payload encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadFormat {
    Csv,
    JsonLines,
}

impl PayloadFormat {
    pub fn from_path(path: &Path) -> Result<Self, InputError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Ok(PayloadFormat::Csv),
            "jsonl" | "ndjson" => Ok(PayloadFormat::JsonLines),
            other => Err(InputError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Load every payload in `path`, in file order.
pub fn load_payloads(path: &Path) -> Result<Vec<DetectorPayload>, InputError> {
    let format = PayloadFormat::from_path(path)?;
    let file = File::open(path)?;
    match format {
        PayloadFormat::Csv => read_csv(file),
        PayloadFormat::JsonLines => read_json_lines(BufReader::new(file)),
    }
}

pub fn read_csv<R: Read>(reader: R) -> Result<Vec<DetectorPayload>, InputError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut payloads = Vec::new();
    for record in rdr.deserialize::<DetectorPayload>() {
        payloads.push(record?);
    }
    Ok(payloads)
}

/// Blank lines are skipped; line numbers in errors are 1-based.
pub fn read_json_lines<R: BufRead>(reader: R) -> Result<Vec<DetectorPayload>, InputError> {
    let mut payloads = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let payload = serde_json::from_str(&line).map_err(|source| InputError::Json {
            line: idx + 1,
            source,
        })?;
        payloads.push(payload);
    }
    Ok(payloads)
}
