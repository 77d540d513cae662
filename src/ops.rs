//! State-changing operations on the request list.
//!
//! Every remote mutation follows the same shape: fetch the whole blob,
//! compute the whole next blob locally, write it back with a guarded replace,
//! then re-render. The guard is the content fingerprint taken at fetch time;
//! if another editor wrote in between, the write is refused with
//! `Error::Conflict` instead of silently discarding their change.
//!
//! Adds are position-independent (the new line is prepended), so a conflicting
//! add is retried against fresh content a bounded number of times. Deletes are
//! positional, so a conflicting delete is surfaced immediately and the caller
//! must re-render before choosing indices again.
//!
//! The blob transforms (`prepend_line`, `remove_lines`) are pure and never
//! touch the network.

use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::model::{Record, blob_lines, encode};
use crate::queue::LocalQueue;
use crate::remote::{Credential, Fingerprint, RemoteStore, has_changed};
use crate::validate::validate_text;
use crate::view::{MergedView, partition, render};

/// Automatic retries after a conflicting add.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Prepend `line` to the stored lines of `existing` (newest first).
#[must_use]
pub fn prepend_line(existing: &str, line: &str) -> String {
    let lines = blob_lines(existing);
    if lines.is_empty() {
        line.to_string()
    } else {
        format!("{line}\n{}", lines.join("\n"))
    }
}

/// Drop the lines at `indices` from `existing`, keeping every other line verbatim.
///
/// # Errors
///
/// Returns `Error::Index` if any index is not a line of `existing`. An empty
/// blob therefore never yields a write.
pub fn remove_lines(existing: &str, indices: &BTreeSet<usize>) -> Result<String> {
    let lines = blob_lines(existing);
    if let Some(&index) = indices.iter().find(|&&i| i >= lines.len()) {
        return Err(Error::Index {
            index,
            len: lines.len(),
        });
    }

    Ok(lines
        .into_iter()
        .enumerate()
        .filter(|(i, _)| !indices.contains(i))
        .map(|(_, line)| line)
        .collect::<Vec<_>>()
        .join("\n"))
}

/// The shared remote list plus this client's local queue.
pub struct Synchronizer<S> {
    store: S,
    queue: LocalQueue,
    max_retries: u32,
}

impl<S: RemoteStore> Synchronizer<S> {
    #[must_use]
    pub fn new(store: S, queue: LocalQueue) -> Self {
        Self {
            store,
            queue,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub fn queue(&self) -> &LocalQueue {
        &self.queue
    }

    /// Fresh merged view of remote and local records.
    pub async fn render(&self) -> MergedView {
        render(&self.store, &self.queue).await
    }

    /// Publish a new request to the shared list.
    ///
    /// # Errors
    ///
    /// - `Error::Validation` for bad text, before any I/O
    /// - `Error::Publish` carrying the text and the cause (transport, auth, or
    ///   a conflict that outlived the retry budget); the remote is unchanged
    pub async fn add_shared(&self, text: &str, credential: &Credential) -> Result<MergedView> {
        let text = validate_text(text)?;
        let record = Record::now(&text);
        let line = encode(&record)?;

        self.publish_line(&line, credential)
            .await
            .map_err(|e| Error::publish(&text, e))?;

        Ok(self.render().await)
    }

    /// Queue a new request locally without touching the remote.
    ///
    /// # Errors
    ///
    /// `Error::Validation` for bad text, `Error::Persistence` if the queue
    /// cannot be saved.
    pub fn add_local(&self, text: &str) -> Result<Record> {
        let text = validate_text(text)?;
        let record = Record::now(&text);
        self.queue.insert_front(record.clone())?;
        info!(text = %record.text, "Queued request locally");
        Ok(record)
    }

    /// Delete one shared record by its index in the freshly fetched list.
    ///
    /// `expected` is the revision of the view the index was read from; when
    /// given, a remote that moved on since then is a conflict.
    ///
    /// # Errors
    ///
    /// - `Error::Index` if `remote_index` is out of range of the fresh list
    /// - `Error::Conflict` if the remote changed since `expected` or between
    ///   fetch and write
    /// - `Error::DeletionFailed` for transport and auth failures
    pub async fn delete_shared(
        &self,
        remote_index: usize,
        expected: Option<&Fingerprint>,
        credential: &Credential,
    ) -> Result<MergedView> {
        self.delete_remote(&BTreeSet::from([remote_index]), expected, credential)
            .await?;
        Ok(self.render().await)
    }

    /// Delete one queued record.
    ///
    /// # Errors
    ///
    /// `Error::Index` for an out-of-range index, `Error::Persistence` if the
    /// queue cannot be saved.
    pub fn delete_local(&self, local_index: usize) -> Result<Record> {
        let removed = self.queue.remove_at(local_index)?;
        info!(index = local_index, "Deleted queued request");
        Ok(removed)
    }

    /// Delete a checkbox-style selection of flat display indices.
    ///
    /// `remote_count` is the boundary of the view the selection was made on.
    /// Remote entries go in a single guarded overwrite; local entries are
    /// removed in one queue save, only after the remote part succeeded.
    ///
    /// # Errors
    ///
    /// Same as [`Self::delete_shared`], plus `Error::Validation` for an empty
    /// selection and `Error::Index` for out-of-range local entries. Nothing is
    /// changed when an error is returned.
    pub async fn delete_selection(
        &self,
        selected: &[usize],
        remote_count: usize,
        expected: Option<&Fingerprint>,
        credential: &Credential,
    ) -> Result<MergedView> {
        let selection = partition(selected, remote_count);
        if selection.is_empty() {
            return Err(Error::Validation("nothing selected".to_string()));
        }

        let local_len = self.queue.load().len();
        if let Some(&bad) = selection.local.iter().find(|&&i| i >= local_len) {
            return Err(Error::Index {
                index: remote_count + bad,
                len: remote_count + local_len,
            });
        }

        if !selection.remote.is_empty() {
            self.delete_remote(&selection.remote, expected, credential)
                .await?;
        }

        if !selection.local.is_empty() {
            let indices: Vec<usize> = selection.local.iter().copied().collect();
            self.queue.remove_many(&indices)?;
            info!(count = indices.len(), "Deleted queued requests");
        }

        Ok(self.render().await)
    }

    /// Publish a queued record as-is, then drop it from the queue.
    ///
    /// # Errors
    ///
    /// `Error::Index` for an out-of-range index, `Error::Publish` if the
    /// record could not be published (the queue is then unchanged).
    pub async fn promote(&self, local_index: usize, credential: &Credential) -> Result<MergedView> {
        let records = self.queue.load();
        let record = records.get(local_index).ok_or(Error::Index {
            index: local_index,
            len: records.len(),
        })?;
        let line = encode(record)?;

        self.publish_line(&line, credential)
            .await
            .map_err(|e| Error::publish(&record.text, e))?;
        self.queue.remove_at(local_index)?;
        info!(index = local_index, "Promoted queued request");

        Ok(self.render().await)
    }

    /// Prepend `line` to the remote with a guarded write, retrying on conflict.
    async fn publish_line(&self, line: &str, credential: &Credential) -> Result<()> {
        let mut attempt = 0;
        loop {
            attempt += 1;

            let (existing, fingerprint) = self.store.read_for_write(credential).await?;
            let updated = prepend_line(&existing, line);
            debug!(attempt, revision = fingerprint.short(), "Publishing request");

            match self
                .store
                .overwrite_if_unchanged(&fingerprint, &updated, credential)
                .await
            {
                Ok(()) => {
                    info!(attempt, "Published request");
                    return Ok(());
                }
                Err(e @ Error::Conflict { .. }) if attempt <= self.max_retries => {
                    warn!(attempt, error = %e, "Remote changed during publish, retrying");
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Remove remote lines by index from a fresh fetch with one guarded write.
    async fn delete_remote(
        &self,
        indices: &BTreeSet<usize>,
        expected: Option<&Fingerprint>,
        credential: &Credential,
    ) -> Result<()> {
        let (existing, fingerprint) = self
            .store
            .read_for_write(credential)
            .await
            .map_err(Error::deletion_failed)?;

        if let Some(seen) = expected {
            if has_changed(&fingerprint, Some(seen)) {
                return Err(Error::Conflict {
                    expected: seen.short().to_string(),
                    actual: fingerprint.short().to_string(),
                });
            }
        }

        let updated = remove_lines(&existing, indices)?;
        debug!(
            count = indices.len(),
            revision = fingerprint.short(),
            "Deleting shared requests"
        );

        self.store
            .overwrite_if_unchanged(&fingerprint, &updated, credential)
            .await
            .map_err(|e| match e {
                conflict @ Error::Conflict { .. } => conflict,
                other => Error::deletion_failed(other),
            })?;

        info!(count = indices.len(), "Deleted shared requests");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::remote::MemoryStore;
    use tempfile::TempDir;

    fn token() -> Credential {
        Credential::new("ghp_test")
    }

    fn setup(store: MemoryStore) -> (TempDir, Synchronizer<MemoryStore>) {
        let dir = TempDir::new().unwrap();
        let queue = LocalQueue::new(dir.path().join("queue.json"));
        (dir, Synchronizer::new(store, queue))
    }

    fn local(text: &str) -> Record {
        Record {
            timestamp: "2025-01-01 08:00".to_string(),
            text: text.to_string(),
        }
    }

    // ── Pure transforms ──────────────────────────────────────

    #[test]
    fn test_prepend_line() {
        assert_eq!(prepend_line("", "new"), "new");
        assert_eq!(prepend_line("  \n", "new"), "new");
        assert_eq!(prepend_line("a\n\nb\n", "new"), "new\na\nb");
    }

    #[test]
    fn test_remove_lines() {
        assert_eq!(remove_lines("A\nB\nC", &BTreeSet::from([1])).unwrap(), "A\nC");
        assert_eq!(remove_lines("A\nB\nC", &BTreeSet::from([0, 2])).unwrap(), "B");
        assert_eq!(remove_lines("A", &BTreeSet::from([0])).unwrap(), "");
    }

    #[test]
    fn test_remove_lines_out_of_range() {
        assert!(matches!(
            remove_lines("A\nB", &BTreeSet::from([2])),
            Err(Error::Index { index: 2, len: 2 })
        ));
        assert!(matches!(
            remove_lines("", &BTreeSet::from([0])),
            Err(Error::Index { index: 0, len: 0 })
        ));
    }

    #[test]
    fn test_remove_lines_keeps_legacy_verbatim() {
        let blob = "2025-01-01 08:00 | dated\nfree form | with pipe\nplain";
        assert_eq!(
            remove_lines(blob, &BTreeSet::from([0])).unwrap(),
            "free form | with pipe\nplain"
        );
    }

    // ── add-shared ───────────────────────────────────────────

    #[tokio::test]
    async fn test_add_shared_prepends() {
        let (_dir, sync) = setup(MemoryStore::with_lines(&["old"]));

        let view = sync.add_shared("  new request ", &token()).await.unwrap();

        let content = sync.store().content().unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(" | new request"));
        assert_eq!(lines[1], "old");
        assert_eq!(view.remote_count, 2);
        assert_eq!(view.entries[0].record.text, "new request");
    }

    #[tokio::test]
    async fn test_add_shared_into_empty_remote() {
        let (_dir, sync) = setup(MemoryStore::new(""));
        sync.add_shared("first", &token()).await.unwrap();

        let content = sync.store().content().unwrap();
        assert!(!content.contains('\n'));
        assert!(content.ends_with(" | first"));
    }

    #[tokio::test]
    async fn test_invalid_text_performs_no_io() {
        let (_dir, sync) = setup(MemoryStore::with_lines(&["a"]));

        let long = "x".repeat(201);
        for bad in ["", "   ", long.as_str()] {
            let shared = sync.add_shared(bad, &token()).await;
            assert!(matches!(shared, Err(Error::Validation(_))));
            assert!(matches!(sync.add_local(bad), Err(Error::Validation(_))));
        }

        assert_eq!(sync.store().call_count(), 0);
        assert!(!sync.queue().path().exists());
    }

    #[tokio::test]
    async fn test_add_shared_retries_after_conflict() {
        let store = MemoryStore::with_lines(&["a"]);
        store.schedule_external_write(1, "other editor\na");
        let (_dir, sync) = setup(store);

        sync.add_shared("mine", &token()).await.unwrap();

        let content = sync.store().content().unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].ends_with(" | mine"));
        assert_eq!(&lines[1..], ["other editor", "a"]);
        assert_eq!(sync.store().overwrite_count(), 2);
    }

    #[tokio::test]
    async fn test_add_shared_ignores_stale_cached_copy() {
        let store = MemoryStore::with_lines(&["b", "a"]);
        store.serve_stale("a");
        let (_dir, sync) = setup(store);

        sync.add_shared("mine", &token()).await.unwrap();

        let content = sync.store().content().unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert!(lines[0].ends_with(" | mine"));
        assert_eq!(&lines[1..], ["b", "a"]);
        assert_eq!(sync.store().overwrite_count(), 1);
    }

    #[tokio::test]
    async fn test_add_shared_gives_up_after_retry_budget() {
        let store = MemoryStore::with_lines(&["a"]);
        for fetch in 1..=3 {
            store.schedule_external_write(fetch, format!("edit {fetch}\na"));
        }
        let (_dir, sync) = setup(store);
        let sync = sync.with_max_retries(2);

        let err = sync.add_shared("mine", &token()).await.unwrap_err();

        assert!(matches!(&err, Error::Publish { text, .. } if text == "mine"));
        assert_eq!(err.root_cause().error_code(), ErrorCode::Conflict);
        assert_eq!(sync.store().content().as_deref(), Some("edit 3\na"));
        assert_eq!(sync.store().overwrite_count(), 3);
    }

    #[tokio::test]
    async fn test_add_shared_unavailable_never_writes() {
        let (_dir, sync) = setup(MemoryStore::unavailable());

        let err = sync.add_shared("mine", &token()).await.unwrap_err();

        assert_eq!(err.root_cause().error_code(), ErrorCode::TransportError);
        assert_eq!(sync.store().overwrite_count(), 0);
    }

    #[tokio::test]
    async fn test_add_shared_auth_failure() {
        let store = MemoryStore::with_lines(&["a"]);
        store.fail_writes(401);
        let (_dir, sync) = setup(store);

        let err = sync.add_shared("mine", &token()).await.unwrap_err();

        assert!(matches!(err.root_cause(), Error::Auth { status: 401 }));
        assert_eq!(sync.store().content().as_deref(), Some("a"));
        assert!(sync.queue().load().is_empty());
    }

    // ── add-local ────────────────────────────────────────────

    #[tokio::test]
    async fn test_add_local_never_touches_remote() {
        let (_dir, sync) = setup(MemoryStore::with_lines(&["a"]));

        sync.add_local("first").unwrap();
        sync.add_local("second").unwrap();

        assert_eq!(sync.store().call_count(), 0);
        let texts: Vec<_> = sync.queue().load().into_iter().map(|r| r.text).collect();
        assert_eq!(texts, vec!["second", "first"]);
    }

    // ── delete-shared ────────────────────────────────────────

    #[tokio::test]
    async fn test_delete_shared_removes_line() {
        let (_dir, sync) = setup(MemoryStore::with_lines(&["A", "B", "C"]));

        let view = sync.delete_shared(1, None, &token()).await.unwrap();

        assert_eq!(sync.store().content().as_deref(), Some("A\nC"));
        assert_eq!(view.remote_count, 2);
    }

    #[tokio::test]
    async fn test_delete_shared_validates_against_fresh_fetch() {
        let store = MemoryStore::with_lines(&["A", "B", "C"]);
        let (_dir, sync) = setup(store);
        let stale = sync.render().await;
        assert_eq!(stale.remote_count, 3);

        sync.store().set_content("A");
        let err = sync.delete_shared(2, None, &token()).await.unwrap_err();

        assert!(matches!(err, Error::Index { index: 2, len: 1 }));
        assert_eq!(sync.store().overwrite_count(), 0);
    }

    #[tokio::test]
    async fn test_delete_shared_detects_concurrent_change() {
        let store = MemoryStore::with_lines(&["A", "B", "C"]);
        // Another editor prepends right after our fetch.
        store.schedule_external_write(1, "Z\nA\nB\nC");
        let (_dir, sync) = setup(store);

        let err = sync.delete_shared(1, None, &token()).await.unwrap_err();

        assert!(matches!(err, Error::Conflict { .. }));
        assert_eq!(sync.store().content().as_deref(), Some("Z\nA\nB\nC"));
        assert!(sync.store().writes().is_empty());
    }

    #[tokio::test]
    async fn test_delete_shared_rejects_stale_revision() {
        let (_dir, sync) = setup(MemoryStore::with_lines(&["A", "B"]));
        let seen = sync.render().await.fingerprint.unwrap();

        sync.store().set_content("X\nA\nB");
        let err = sync.delete_shared(0, Some(&seen), &token()).await.unwrap_err();

        assert!(matches!(err, Error::Conflict { .. }));
        assert_eq!(sync.store().overwrite_count(), 0);
        assert_eq!(sync.store().content().as_deref(), Some("X\nA\nB"));
    }

    #[tokio::test]
    async fn test_delete_shared_stale_cached_listing_is_conflict() {
        let store = MemoryStore::with_lines(&["Z", "A", "B"]);
        store.serve_stale("A\nB");
        let (_dir, sync) = setup(store);
        let seen = sync.render().await.fingerprint.unwrap();

        let err = sync.delete_shared(0, Some(&seen), &token()).await.unwrap_err();

        assert!(matches!(err, Error::Conflict { .. }));
        assert_eq!(sync.store().overwrite_count(), 0);
        assert_eq!(sync.store().content().as_deref(), Some("Z\nA\nB"));
    }

    #[tokio::test]
    async fn test_delete_shared_matching_revision() {
        let (_dir, sync) = setup(MemoryStore::with_lines(&["A", "B"]));
        let seen = sync.render().await.fingerprint.unwrap();

        sync.delete_shared(0, Some(&seen), &token()).await.unwrap();
        assert_eq!(sync.store().content().as_deref(), Some("B"));
    }

    #[tokio::test]
    async fn test_delete_shared_unavailable_short_circuits() {
        let (_dir, sync) = setup(MemoryStore::unavailable());

        let err = sync.delete_shared(0, None, &token()).await.unwrap_err();

        assert!(matches!(err, Error::DeletionFailed { .. }));
        assert_eq!(err.root_cause().error_code(), ErrorCode::TransportError);
        assert_eq!(sync.store().overwrite_count(), 0);
    }

    #[tokio::test]
    async fn test_delete_shared_empty_remote_never_writes() {
        let (_dir, sync) = setup(MemoryStore::new(""));

        let err = sync.delete_shared(0, None, &token()).await.unwrap_err();

        assert!(matches!(err, Error::Index { index: 0, len: 0 }));
        assert_eq!(sync.store().overwrite_count(), 0);
    }

    #[tokio::test]
    async fn test_delete_shared_write_failure_leaves_local_state() {
        let store = MemoryStore::with_lines(&["A", "B"]);
        store.fail_writes(502);
        let (_dir, sync) = setup(store);
        sync.queue().save(&[local("L0")]).unwrap();

        let err = sync.delete_shared(0, None, &token()).await.unwrap_err();

        assert!(matches!(err, Error::DeletionFailed { .. }));
        assert_eq!(sync.store().content().as_deref(), Some("A\nB"));
        assert_eq!(sync.queue().load().len(), 1);
    }

    // ── delete-local ─────────────────────────────────────────

    #[tokio::test]
    async fn test_delete_local_no_network() {
        let (_dir, sync) = setup(MemoryStore::with_lines(&["A"]));
        sync.queue().save(&[local("L0"), local("L1")]).unwrap();

        let removed = sync.delete_local(0).unwrap();

        assert_eq!(removed.text, "L0");
        assert_eq!(sync.store().call_count(), 0);
        assert!(matches!(sync.delete_local(5), Err(Error::Index { index: 5, len: 1 })));
    }

    // ── batch delete ─────────────────────────────────────────

    #[tokio::test]
    async fn test_delete_selection_single_overwrite() {
        let (_dir, sync) = setup(MemoryStore::with_lines(&["A", "B", "C"]));

        sync.delete_selection(&[0, 2], 3, None, &token()).await.unwrap();

        assert_eq!(sync.store().overwrite_count(), 1);
        assert_eq!(sync.store().writes(), vec!["B"]);
    }

    #[tokio::test]
    async fn test_delete_selection_mixed_origins() {
        let (_dir, sync) = setup(MemoryStore::with_lines(&["A", "B"]));
        sync.queue().save(&[local("L0"), local("L1"), local("L2")]).unwrap();

        let view = sync
            .delete_selection(&[1, 2, 4], 2, None, &token())
            .await
            .unwrap();

        assert_eq!(sync.store().content().as_deref(), Some("A"));
        let texts: Vec<_> = sync.queue().load().into_iter().map(|r| r.text).collect();
        assert_eq!(texts, vec!["L1"]);
        assert_eq!(view.len(), 2);
    }

    #[tokio::test]
    async fn test_delete_selection_local_only_no_network() {
        let (_dir, sync) = setup(MemoryStore::with_lines(&["A"]));
        sync.queue().save(&[local("L0")]).unwrap();

        sync.delete_selection(&[1], 1, None, &token()).await.unwrap();

        assert!(sync.queue().load().is_empty());
        // Only the refresh render reads the remote.
        assert_eq!(sync.store().overwrite_count(), 0);
        assert_eq!(sync.store().fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_delete_selection_conflict_keeps_queue() {
        let store = MemoryStore::with_lines(&["A", "B"]);
        store.schedule_external_write(1, "Z\nA\nB");
        let (_dir, sync) = setup(store);
        sync.queue().save(&[local("L0")]).unwrap();

        let err = sync
            .delete_selection(&[0, 2], 2, None, &token())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Conflict { .. }));
        assert_eq!(sync.queue().load().len(), 1);
        assert_eq!(sync.store().content().as_deref(), Some("Z\nA\nB"));
    }

    #[tokio::test]
    async fn test_delete_selection_rejects_bad_local_index_first() {
        let (_dir, sync) = setup(MemoryStore::with_lines(&["A", "B"]));

        let err = sync
            .delete_selection(&[0, 7], 2, None, &token())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Index { index: 7, len: 2 }));
        assert_eq!(sync.store().call_count(), 0);
    }

    #[tokio::test]
    async fn test_delete_selection_empty() {
        let (_dir, sync) = setup(MemoryStore::with_lines(&["A"]));
        let err = sync.delete_selection(&[], 1, None, &token()).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    // ── promote ──────────────────────────────────────────────

    #[tokio::test]
    async fn test_promote_moves_record_with_timestamp() {
        let (_dir, sync) = setup(MemoryStore::with_lines(&["A"]));
        sync.queue().save(&[local("L0"), local("L1")]).unwrap();

        let view = sync.promote(1, &token()).await.unwrap();

        assert_eq!(
            sync.store().content().as_deref(),
            Some("2025-01-01 08:00 | L1\nA")
        );
        let texts: Vec<_> = sync.queue().load().into_iter().map(|r| r.text).collect();
        assert_eq!(texts, vec!["L0"]);
        assert_eq!(view.remote_count, 2);
    }

    #[tokio::test]
    async fn test_promote_failure_keeps_queue() {
        let store = MemoryStore::with_lines(&["A"]);
        store.fail_writes(403);
        let (_dir, sync) = setup(store);
        sync.queue().save(&[local("L0")]).unwrap();

        let err = sync.promote(0, &token()).await.unwrap_err();

        assert!(matches!(err, Error::Publish { .. }));
        assert_eq!(sync.queue().load().len(), 1);
    }
}
