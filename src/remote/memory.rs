//! In-process remote store.
//!
//! Behaves like the real store (whole-blob read/replace) but keeps the blob in
//! memory, counts calls, and can inject writes from a simulated second editor
//! right after a given fetch. It can also serve a stale copy to plain fetches
//! while writers read the current content. Its guarded write is atomic.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use super::{Credential, Fingerprint, RemoteSnapshot, RemoteStore};
use crate::error::{Error, Result};

#[derive(Debug, Default)]
struct State {
    /// `None` models an unreachable store.
    content: Option<String>,
    fetch_count: usize,
    overwrite_count: usize,
    writes: Vec<String>,
    /// (fetch number, content) pairs applied right after that fetch returns.
    external: VecDeque<(usize, String)>,
    fail_writes_with: Option<u16>,
    /// Served by `fetch_content` instead of `content`, as a lagging cache would.
    stale: Option<String>,
}

/// Remote store held in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    /// Store holding `content`.
    #[must_use]
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(State {
                content: Some(content.into()),
                ..State::default()
            }),
        }
    }

    /// Store seeded from lines, joined with `\n`.
    #[must_use]
    pub fn with_lines(lines: &[&str]) -> Self {
        Self::new(lines.join("\n"))
    }

    /// Store that cannot be reached.
    #[must_use]
    pub fn unavailable() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current content, `None` if unreachable.
    #[must_use]
    pub fn content(&self) -> Option<String> {
        self.lock().content.clone()
    }

    /// Replace the content as another editor would.
    pub fn set_content(&self, content: impl Into<String>) {
        self.lock().content = Some(content.into());
    }

    /// Have another editor write `content` right after fetch number `after_fetch` (1-based).
    pub fn schedule_external_write(&self, after_fetch: usize, content: impl Into<String>) {
        let mut state = self.lock();
        state.external.push_back((after_fetch, content.into()));
        state.external.make_contiguous().sort_by_key(|(n, _)| *n);
    }

    /// Serve `content` to plain fetches until the next successful write.
    pub fn serve_stale(&self, content: impl Into<String>) {
        self.lock().stale = Some(content.into());
    }

    /// Make every subsequent write fail with the given HTTP status.
    pub fn fail_writes(&self, status: u16) {
        self.lock().fail_writes_with = Some(status);
    }

    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.lock().fetch_count
    }

    /// Write attempts, guarded or not, successful or not.
    #[must_use]
    pub fn overwrite_count(&self) -> usize {
        self.lock().overwrite_count
    }

    /// Fetches plus write attempts.
    #[must_use]
    pub fn call_count(&self) -> usize {
        let state = self.lock();
        state.fetch_count + state.overwrite_count
    }

    /// Contents of every successful write, in order.
    #[must_use]
    pub fn writes(&self) -> Vec<String> {
        self.lock().writes.clone()
    }

    fn check_write(state: &mut State, credential: &Credential) -> Result<()> {
        state.overwrite_count += 1;
        if let Some(status) = state.fail_writes_with {
            return Err(match status {
                401 | 403 => Error::Auth { status },
                409 | 412 => Error::Conflict {
                    expected: "unknown".to_string(),
                    actual: "unknown".to_string(),
                },
                _ => Error::Transport(format!("HTTP {status}")),
            });
        }
        if credential.expose().is_empty() {
            return Err(Error::Auth { status: 401 });
        }
        if state.content.is_none() {
            return Err(Error::Transport("store unreachable".to_string()));
        }
        Ok(())
    }

    fn commit(state: &mut State, content: &str) {
        state.content = Some(content.to_string());
        state.stale = None;
        state.writes.push(content.to_string());
    }

    fn read(&self, cached: bool) -> RemoteSnapshot {
        let mut state = self.lock();
        state.fetch_count += 1;

        let snapshot = match (&state.content, &state.stale) {
            (None, _) => RemoteSnapshot::Unavailable {
                reason: "store unreachable".to_string(),
            },
            (Some(_), Some(stale)) if cached => RemoteSnapshot::Available(stale.clone()),
            (Some(content), _) => RemoteSnapshot::Available(content.clone()),
        };

        let fetch_no = state.fetch_count;
        while state.external.front().is_some_and(|(n, _)| *n == fetch_no) {
            if let Some((_, content)) = state.external.pop_front() {
                debug!(fetch = fetch_no, "Applying external write");
                state.content = Some(content);
            }
        }

        snapshot
    }
}

impl RemoteStore for MemoryStore {
    async fn fetch_content(&self) -> RemoteSnapshot {
        self.read(true)
    }

    async fn read_for_write(&self, _credential: &Credential) -> Result<(String, Fingerprint)> {
        self.read(false).require()
    }

    async fn overwrite_content(&self, content: &str, credential: &Credential) -> Result<()> {
        let mut state = self.lock();
        Self::check_write(&mut state, credential)?;
        Self::commit(&mut state, content);
        Ok(())
    }

    async fn overwrite_if_unchanged(
        &self,
        expected: &Fingerprint,
        content: &str,
        credential: &Credential,
    ) -> Result<()> {
        let mut state = self.lock();
        Self::check_write(&mut state, credential)?;

        let actual = Fingerprint::of(state.content.as_deref().unwrap_or_default());
        if actual != *expected {
            return Err(Error::Conflict {
                expected: expected.short().to_string(),
                actual: actual.short().to_string(),
            });
        }

        Self::commit(&mut state, content);
        Ok(())
    }
}
