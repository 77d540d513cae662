//! Record of the last list shown to the user.
//!
//! Flat indices only mean something relative to the list they were read
//! from. Every command that prints the list stores its shared revision, the
//! shared/local boundary and a fingerprint of the local queue next to the
//! queue file. `delete` resolves indices against this record and refuses when
//! either side has moved.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::queue::atomic_write;
use crate::remote::Fingerprint;
use crate::view::MergedView;

/// Boundary and revisions of a displayed list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    /// `None` when the shared list was unavailable or no gist is configured.
    pub revision: Option<Fingerprint>,
    pub remote_count: usize,
    pub local_revision: Fingerprint,
}

impl Listing {
    #[must_use]
    pub fn of(view: &MergedView) -> Self {
        Self {
            revision: view.fingerprint.clone(),
            remote_count: view.remote_count,
            local_revision: view.local_revision(),
        }
    }
}

/// Listing file kept beside the queue: `queue.json` -> `queue.listing.json`.
#[must_use]
pub fn listing_path(queue_path: &Path) -> PathBuf {
    queue_path.with_extension("listing.json")
}

/// Read the last listing. A missing or corrupt file reads as `None`.
#[must_use]
pub fn read_listing(path: &Path) -> Option<Listing> {
    let content = fs::read_to_string(path).ok()?;
    match serde_json::from_str(&content) {
        Ok(listing) => Some(listing),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Ignoring unreadable listing");
            None
        }
    }
}

/// Replace the stored listing.
///
/// # Errors
///
/// Returns `Error::Persistence` if the file cannot be written.
pub fn write_listing(path: &Path, listing: &Listing) -> Result<()> {
    let persistence = |message: String| Error::Persistence {
        path: path.to_path_buf(),
        message,
    };
    let json = serde_json::to_string_pretty(listing).map_err(|e| persistence(e.to_string()))?;
    atomic_write(path, &json).map_err(|e| persistence(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Record;
    use tempfile::TempDir;

    fn record(text: &str) -> Record {
        Record {
            timestamp: "2025-01-01 09:00".to_string(),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_listing_path_beside_queue() {
        assert_eq!(
            listing_path(Path::new("/home/u/.reqlist/queue.json")),
            PathBuf::from("/home/u/.reqlist/queue.listing.json")
        );
    }

    #[test]
    fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("queue.listing.json");
        let mut view = MergedView::merge(vec![record("R0"), record("R1")], vec![record("L0")]);
        view.fingerprint = Some(Fingerprint::of("R0\nR1"));

        let listing = Listing::of(&view);
        write_listing(&path, &listing).unwrap();

        let read = read_listing(&path).unwrap();
        assert_eq!(read, listing);
        assert_eq!(read.remote_count, 2);
        assert_eq!(read.local_revision, view.local_revision());
    }

    #[test]
    fn test_missing_or_corrupt_reads_none() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("queue.listing.json");
        assert!(read_listing(&path).is_none());

        fs::write(&path, "{ not json").unwrap();
        assert!(read_listing(&path).is_none());
    }
}
