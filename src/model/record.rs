//! Request record and its one-line text format.
//!
//! A record is stored as `"{YYYY-MM-DD HH:MM} | {text}"`. Lines written before
//! timestamps were introduced have no separator; they decode with an empty
//! timestamp and are kept as-is rather than rejected.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// `chrono` format string for record timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Separator between timestamp and text on the wire.
pub const SEPARATOR: &str = " | ";

/// One timestamped request entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// `YYYY-MM-DD HH:MM`, or empty for legacy lines.
    pub timestamp: String,
    pub text: String,
}

impl Record {
    /// Create a record stamped with the current local time.
    #[must_use]
    pub fn now(text: &str) -> Self {
        Self {
            timestamp: chrono::Local::now().format(TIMESTAMP_FORMAT).to_string(),
            text: text.to_string(),
        }
    }

    /// Whether this record came from a line without a timestamp.
    #[must_use]
    pub fn is_legacy(&self) -> bool {
        self.timestamp.is_empty()
    }
}

/// Serialize a record to a single line.
///
/// Legacy records (empty timestamp) encode to their bare text so rewriting
/// them never invents a separator.
///
/// # Errors
///
/// Returns `Error::Encoding` if the text contains a line break.
pub fn encode(record: &Record) -> Result<String> {
    if record.text.contains('\n') || record.text.contains('\r') {
        return Err(Error::Encoding("text contains a line break".to_string()));
    }
    if record.is_legacy() {
        return Ok(record.text.clone());
    }
    Ok(format!("{}{SEPARATOR}{}", record.timestamp, record.text))
}

/// Parse one line. Returns `None` for blank lines.
#[must_use]
pub fn decode(line: &str) -> Option<Record> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let record = match line.split_once(SEPARATOR) {
        Some((timestamp, text)) => Record {
            timestamp: timestamp.to_string(),
            text: text.to_string(),
        },
        None => Record {
            timestamp: String::new(),
            text: line.to_string(),
        },
    };
    Some(record)
}

/// Trimmed, non-blank lines of a blob, in stored order.
#[must_use]
pub fn blob_lines(blob: &str) -> Vec<String> {
    blob.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Decode a whole blob, silently dropping blank lines.
#[must_use]
pub fn decode_blob(blob: &str) -> Vec<Record> {
    blob.lines().filter_map(decode).collect()
}
