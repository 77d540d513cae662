//! Merge view over the shared list and the local queue.
//!
//! The view is recomputed from a fresh fetch every time it is asked for and
//! is never cached across a mutation. Flat display positions map back to
//! their origin through the `remote_count` boundary alone.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::model::Record;
use crate::queue::LocalQueue;
use crate::remote::{Fingerprint, RemoteStore};

/// Where a displayed entry lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "index", rename_all = "snake_case")]
pub enum Origin {
    Remote(usize),
    Local(usize),
}

/// One displayed row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewEntry {
    pub origin: Origin,
    #[serde(flatten)]
    pub record: Record,
}

/// Remote records followed by local records, each tagged with its origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergedView {
    pub entries: Vec<ViewEntry>,
    pub remote_count: usize,
    /// `false` when the remote could not be read; `entries` then holds local records only.
    pub remote_available: bool,
    /// Revision of the remote content this view was built from.
    pub fingerprint: Option<Fingerprint>,
}

impl MergedView {
    /// Stateless merge: `remote ⧺ local`, order preserved.
    #[must_use]
    pub fn merge(remote: Vec<Record>, local: Vec<Record>) -> Self {
        let remote_count = remote.len();
        let entries = remote
            .into_iter()
            .enumerate()
            .map(|(i, record)| ViewEntry {
                origin: Origin::Remote(i),
                record,
            })
            .chain(local.into_iter().enumerate().map(|(i, record)| ViewEntry {
                origin: Origin::Local(i),
                record,
            }))
            .collect();

        Self {
            entries,
            remote_count,
            remote_available: true,
            fingerprint: None,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn local_count(&self) -> usize {
        self.entries.len() - self.remote_count
    }

    /// Fingerprint of the local entries, in display order.
    #[must_use]
    pub fn local_revision(&self) -> Fingerprint {
        let lines: Vec<String> = self.entries[self.remote_count..]
            .iter()
            .map(|e| format!("{} | {}", e.record.timestamp, e.record.text))
            .collect();
        Fingerprint::of(&lines.join("\n"))
    }

    /// Origin of the entry at flat position `flat`, if it exists.
    #[must_use]
    pub fn locate(&self, flat: usize) -> Option<Origin> {
        (flat < self.len()).then(|| locate(flat, self.remote_count))
    }
}

/// Map a flat display index to its origin using the remote boundary.
#[must_use]
pub fn locate(flat: usize, remote_count: usize) -> Origin {
    if flat < remote_count {
        Origin::Remote(flat)
    } else {
        Origin::Local(flat - remote_count)
    }
}

/// Flat selection split by origin.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub remote: BTreeSet<usize>,
    pub local: BTreeSet<usize>,
}

impl Selection {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.remote.is_empty() && self.local.is_empty()
    }
}

/// Partition flat display indices into remote and local indices.
#[must_use]
pub fn partition(selected: &[usize], remote_count: usize) -> Selection {
    let mut selection = Selection::default();
    for &flat in selected {
        match locate(flat, remote_count) {
            Origin::Remote(i) => selection.remote.insert(i),
            Origin::Local(i) => selection.local.insert(i),
        };
    }
    selection
}

/// Fetch the remote fresh, load the queue, and merge.
pub async fn render<S: RemoteStore>(store: &S, queue: &LocalQueue) -> MergedView {
    let snapshot = store.fetch_content().await;
    let local = queue.load();

    let mut view = MergedView::merge(snapshot.records(), local);
    view.remote_available = snapshot.is_available();
    view.fingerprint = snapshot.fingerprint();
    view
}
