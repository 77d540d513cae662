//! Content fingerprints for optimistic concurrency.
//!
//! The remote store has no revision id, so one is derived by hashing the
//! fetched content. Hashing the canonical form (trimmed non-blank lines joined
//! by `\n`) means whitespace-only normalisation by the store never looks like
//! a concurrent edit.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::model::blob_lines;

/// Shortest revision prefix accepted from a user.
pub const MIN_PREFIX_LEN: usize = 7;

/// SHA256 fingerprint of a remote blob, hex encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint a raw blob.
    #[must_use]
    pub fn of(content: &str) -> Self {
        let canonical = blob_lines(content).join("\n");
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for display and `--rev`.
    #[must_use]
    pub fn short(&self) -> &str {
        &self.0[..12]
    }

    /// Whether `rev` (full or abbreviated) names this fingerprint.
    #[must_use]
    pub fn matches(&self, rev: &str) -> bool {
        let rev = rev.trim().to_ascii_lowercase();
        rev.len() >= MIN_PREFIX_LEN && self.0.starts_with(&rev)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Check whether the remote changed relative to a previously seen fingerprint.
#[must_use]
pub fn has_changed(current: &Fingerprint, seen: Option<&Fingerprint>) -> bool {
    seen.is_none_or(|s| s != current)
}
