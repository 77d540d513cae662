//! Local overflow queue.
//!
//! Records that have not been published live in a single file holding a JSON
//! array of encoded lines, newest first. The file is read and written
//! wholesale; writes go through a temp file and rename so a crash never leaves
//! half a queue behind.
//!
//! The queue is owned by one client, so index-based removal needs no
//! concurrency control.

mod file;

pub use file::atomic_write;

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::model::{Record, decode, encode};

/// Ordered private queue of unpublished records.
#[derive(Debug, Clone)]
pub struct LocalQueue {
    path: PathBuf,
}

impl LocalQueue {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persistence_error(&self, message: impl Into<String>) -> Error {
        Error::Persistence {
            path: self.path.clone(),
            message: message.into(),
        }
    }

    /// Load the queue. A missing, unreadable or corrupt file yields an empty queue.
    #[must_use]
    pub fn load(&self) -> Vec<Record> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Local queue unreadable, treating as empty");
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<String>>(&raw) {
            Ok(lines) => lines.iter().map(String::as_str).filter_map(decode).collect(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Local queue corrupt, treating as empty");
                Vec::new()
            }
        }
    }

    /// Persist `records`, replacing prior content.
    ///
    /// # Errors
    ///
    /// Returns `Error::Encoding` for a record that cannot be encoded and
    /// `Error::Persistence` if the file cannot be written.
    pub fn save(&self, records: &[Record]) -> Result<()> {
        let lines = records.iter().map(encode).collect::<Result<Vec<_>>>()?;
        let payload =
            serde_json::to_string(&lines).map_err(|e| self.persistence_error(e.to_string()))?;

        atomic_write(&self.path, &payload).map_err(|e| self.persistence_error(e.to_string()))?;
        debug!(path = %self.path.display(), count = records.len(), "Saved local queue");
        Ok(())
    }

    /// Insert `record` at the front (newest first).
    ///
    /// # Errors
    ///
    /// Returns `Error::Persistence` if the queue cannot be saved.
    pub fn insert_front(&self, record: Record) -> Result<()> {
        let mut records = self.load();
        records.insert(0, record);
        self.save(&records)
    }

    /// Remove and return the record at `index`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Index` if `index` is out of bounds, `Error::Persistence`
    /// if the queue cannot be saved.
    pub fn remove_at(&self, index: usize) -> Result<Record> {
        let mut records = self.load();
        if index >= records.len() {
            return Err(Error::Index {
                index,
                len: records.len(),
            });
        }
        let removed = records.remove(index);
        self.save(&records)?;
        Ok(removed)
    }

    /// Remove several records in one save. Indices are validated up front, so
    /// an out-of-range index removes nothing.
    ///
    /// # Errors
    ///
    /// Returns `Error::Index` for the first out-of-range index, `Error::Persistence`
    /// if the queue cannot be saved.
    pub fn remove_many(&self, indices: &[usize]) -> Result<Vec<Record>> {
        let records = self.load();
        if let Some(&bad) = indices.iter().find(|&&i| i >= records.len()) {
            return Err(Error::Index {
                index: bad,
                len: records.len(),
            });
        }

        let (removed, kept): (Vec<_>, Vec<_>) = records
            .into_iter()
            .enumerate()
            .partition(|(i, _)| indices.contains(i));

        let kept: Vec<Record> = kept.into_iter().map(|(_, r)| r).collect();
        self.save(&kept)?;
        Ok(removed.into_iter().map(|(_, r)| r).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(ts: &str, text: &str) -> Record {
        Record {
            timestamp: ts.to_string(),
            text: text.to_string(),
        }
    }

    fn queue_in(dir: &TempDir) -> LocalQueue {
        LocalQueue::new(dir.path().join("queue.json"))
    }

    #[test]
    fn test_load_missing_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(queue_in(&dir).load().is_empty());
    }

    #[test]
    fn test_load_corrupt_is_empty() {
        let dir = TempDir::new().unwrap();
        let queue = queue_in(&dir);
        fs::write(queue.path(), "{not json").unwrap();
        assert!(queue.load().is_empty());
    }

    #[test]
    fn test_save_writes_json_array_of_lines() {
        let dir = TempDir::new().unwrap();
        let queue = queue_in(&dir);
        queue
            .save(&[record("2025-01-01 10:00", "a"), record("", "legacy")])
            .unwrap();

        let raw = fs::read_to_string(queue.path()).unwrap();
        assert_eq!(raw, r#"["2025-01-01 10:00 | a","legacy"]"#);
    }

    #[test]
    fn test_insert_front_is_newest_first_and_durable() {
        let dir = TempDir::new().unwrap();
        let queue = queue_in(&dir);
        queue.insert_front(record("2025-01-01 10:00", "older")).unwrap();
        queue.insert_front(record("2025-01-01 11:00", "newer")).unwrap();

        // A fresh handle sees the same content.
        let reopened = queue_in(&dir);
        let texts: Vec<_> = reopened.load().into_iter().map(|r| r.text).collect();
        assert_eq!(texts, vec!["newer", "older"]);
    }

    #[test]
    fn test_remove_at() {
        let dir = TempDir::new().unwrap();
        let queue = queue_in(&dir);
        queue
            .save(&[record("", "a"), record("", "b"), record("", "c")])
            .unwrap();

        let removed = queue.remove_at(1).unwrap();
        assert_eq!(removed.text, "b");
        let texts: Vec<_> = queue.load().into_iter().map(|r| r.text).collect();
        assert_eq!(texts, vec!["a", "c"]);
    }

    #[test]
    fn test_remove_at_out_of_range() {
        let dir = TempDir::new().unwrap();
        let queue = queue_in(&dir);
        queue.save(&[record("", "a")]).unwrap();

        assert!(matches!(
            queue.remove_at(1),
            Err(Error::Index { index: 1, len: 1 })
        ));
        assert_eq!(queue.load().len(), 1);
    }

    #[test]
    fn test_remove_many_is_all_or_nothing() {
        let dir = TempDir::new().unwrap();
        let queue = queue_in(&dir);
        queue
            .save(&[record("", "a"), record("", "b"), record("", "c")])
            .unwrap();

        assert!(matches!(
            queue.remove_many(&[0, 5]),
            Err(Error::Index { index: 5, .. })
        ));
        assert_eq!(queue.load().len(), 3);

        let removed = queue.remove_many(&[2, 0]).unwrap();
        assert_eq!(removed.len(), 2);
        let texts: Vec<_> = queue.load().into_iter().map(|r| r.text).collect();
        assert_eq!(texts, vec!["b"]);
    }
}
