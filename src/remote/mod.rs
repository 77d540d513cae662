//! Remote store client.
//!
//! The shared list lives in one remote text blob that supports exactly two
//! operations: read the whole thing, and replace the whole thing. There is no
//! patch, no version id and no compare-and-swap, so every mutation is a
//! read-transform-overwrite round trip.
//!
//! - [`RemoteStore`] - the read / replace contract, an authoritative read for
//!   writers, and a guarded replace that refuses to write when the blob
//!   changed since it was read
//! - [`GistStore`] - GitHub gist implementation (raw URL read, API PATCH write)
//! - [`MemoryStore`] - in-process store with scripted concurrent edits
//! - [`Fingerprint`] - content hash standing in for the missing revision id

mod fingerprint;
pub mod gist;
pub mod memory;

pub use fingerprint::{Fingerprint, MIN_PREFIX_LEN, has_changed};
pub use gist::{GistEndpoint, GistStore};
pub use memory::MemoryStore;

use std::fmt;
use std::future::Future;

use crate::error::{Error, Result};
use crate::model::{Record, blob_lines, decode_blob};

/// Result of reading the remote blob.
///
/// `Unavailable` means "unknown", never "empty": callers must not derive a
/// write from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteSnapshot {
    Available(String),
    Unavailable { reason: String },
}

impl RemoteSnapshot {
    #[must_use]
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }

    /// Raw content; empty when unavailable.
    #[must_use]
    pub fn content(&self) -> &str {
        match self {
            Self::Available(content) => content,
            Self::Unavailable { .. } => "",
        }
    }

    /// Trimmed non-blank lines as stored.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        blob_lines(self.content())
    }

    #[must_use]
    pub fn records(&self) -> Vec<Record> {
        decode_blob(self.content())
    }

    #[must_use]
    pub fn fingerprint(&self) -> Option<Fingerprint> {
        match self {
            Self::Available(content) => Some(Fingerprint::of(content)),
            Self::Unavailable { .. } => None,
        }
    }

    /// Content and fingerprint, or `Error::Transport` when unavailable.
    ///
    /// # Errors
    ///
    /// Returns `Error::Transport` carrying the fetch failure reason.
    pub fn require(self) -> Result<(String, Fingerprint)> {
        match self {
            Self::Available(content) => {
                let fingerprint = Fingerprint::of(&content);
                Ok((content, fingerprint))
            }
            Self::Unavailable { reason } => Err(Error::Transport(reason)),
        }
    }
}

/// Bearer credential for remote writes.
///
/// Supplied per call and never persisted. `Debug` output is redacted.
#[derive(Clone)]
pub struct Credential(String);

impl Credential {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for building the `Authorization` header.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Whole-blob remote store.
pub trait RemoteStore: Send + Sync {
    /// Read the full current content. Never fails; failures come back as
    /// [`RemoteSnapshot::Unavailable`].
    fn fetch_content(&self) -> impl Future<Output = RemoteSnapshot> + Send;

    /// Replace the full content unconditionally.
    fn overwrite_content(
        &self,
        content: &str,
        credential: &Credential,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Read the content a write will be derived from.
    ///
    /// Writers hold a credential, so stores whose anonymous read path may be
    /// cached can read from an authoritative source here. The default is
    /// [`Self::fetch_content`].
    ///
    /// # Errors
    ///
    /// `Error::Transport` when the content is unavailable, `Error::Auth` when
    /// the store rejects the credential.
    fn read_for_write(
        &self,
        credential: &Credential,
    ) -> impl Future<Output = Result<(String, Fingerprint)>> + Send {
        let _ = credential;
        async move { self.fetch_content().await.require() }
    }

    /// Replace the full content only if it still matches `expected`.
    ///
    /// Default implementation re-reads through [`Self::read_for_write`]
    /// immediately before writing and compares fingerprints. That narrows the
    /// lost-update window to one round trip; stores with a native conditional
    /// write should override it.
    fn overwrite_if_unchanged(
        &self,
        expected: &Fingerprint,
        content: &str,
        credential: &Credential,
    ) -> impl Future<Output = Result<()>> + Send {
        async move {
            let (_, actual) = self.read_for_write(credential).await?;
            if actual != *expected {
                return Err(Error::Conflict {
                    expected: expected.short().to_string(),
                    actual: actual.short().to_string(),
                });
            }
            self.overwrite_content(content, credential).await
        }
    }
}
