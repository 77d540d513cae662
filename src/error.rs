//! Error types for the request list CLI.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (3=index, 4=validation, 6=remote, etc.)
//! - Retryability flags so callers know when a fresh attempt can succeed
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for request list operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Index (exit 3)
    IndexOutOfRange,
    StaleListing,

    // Validation (exit 4)
    InvalidText,
    EncodingError,

    // Remote (exit 6)
    TransportError,
    AuthError,
    Conflict,
    PublishFailed,
    DeletionFailed,

    // Config (exit 7)
    ConfigError,

    // Local persistence (exit 8)
    PersistenceError,
    IoError,
    JsonError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::IndexOutOfRange => "INDEX_OUT_OF_RANGE",
            Self::StaleListing => "STALE_LISTING",
            Self::InvalidText => "INVALID_TEXT",
            Self::EncodingError => "ENCODING_ERROR",
            Self::TransportError => "TRANSPORT_ERROR",
            Self::AuthError => "AUTH_ERROR",
            Self::Conflict => "CONFLICT",
            Self::PublishFailed => "PUBLISH_FAILED",
            Self::DeletionFailed => "DELETION_FAILED",
            Self::ConfigError => "CONFIG_ERROR",
            Self::PersistenceError => "PERSISTENCE_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::IndexOutOfRange | Self::StaleListing => 3,
            Self::InvalidText | Self::EncodingError => 4,
            Self::TransportError
            | Self::AuthError
            | Self::Conflict
            | Self::PublishFailed
            | Self::DeletionFailed => 6,
            Self::ConfigError => 7,
            Self::PersistenceError | Self::IoError | Self::JsonError => 8,
        }
    }

    /// Whether re-rendering and repeating the operation can succeed.
    ///
    /// True for conflicts, stale indices and transport hiccups. False for
    /// rejected credentials, bad input and local storage failures.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::IndexOutOfRange
                | Self::StaleListing
                | Self::TransportError
                | Self::Conflict
                | Self::PublishFailed
                | Self::DeletionFailed
        )
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in request list operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid request text: {0}")]
    Validation(String),

    #[error("Cannot encode record: {0}")]
    Encoding(String),

    #[error("Remote store unreachable: {0}")]
    Transport(String),

    #[error("Credential rejected by remote store (HTTP {status})")]
    Auth { status: u16 },

    #[error("Remote content changed since it was read (expected revision {expected}, found {actual})")]
    Conflict { expected: String, actual: String },

    #[error("Index {index} is out of range (list has {len} entries)")]
    Index { index: usize, len: usize },

    #[error("Indices cannot be resolved: {0}")]
    StaleListing(String),

    #[error("Local queue error at {path}: {message}")]
    Persistence { path: PathBuf, message: String },

    #[error("Failed to publish \"{text}\": {source}")]
    Publish {
        text: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Deletion failed: {source}")]
    DeletionFailed {
        #[source]
        source: Box<Error>,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Wrap a terminal add failure, keeping the original text for retry or fallback.
    #[must_use]
    pub fn publish(text: &str, source: Self) -> Self {
        Self::Publish {
            text: text.to_string(),
            source: Box::new(source),
        }
    }

    /// Wrap a terminal remote delete failure.
    #[must_use]
    pub fn deletion_failed(source: Self) -> Self {
        Self::DeletionFailed {
            source: Box::new(source),
        }
    }

    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Validation(_) => ErrorCode::InvalidText,
            Self::Encoding(_) => ErrorCode::EncodingError,
            Self::Transport(_) => ErrorCode::TransportError,
            Self::Auth { .. } => ErrorCode::AuthError,
            Self::Conflict { .. } => ErrorCode::Conflict,
            Self::Index { .. } => ErrorCode::IndexOutOfRange,
            Self::StaleListing(_) => ErrorCode::StaleListing,
            Self::Persistence { .. } => ErrorCode::PersistenceError,
            Self::Publish { .. } => ErrorCode::PublishFailed,
            Self::DeletionFailed { .. } => ErrorCode::DeletionFailed,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// The innermost error behind `Publish` / `DeletionFailed` wrappers.
    #[must_use]
    pub fn root_cause(&self) -> &Self {
        match self {
            Self::Publish { source, .. } | Self::DeletionFailed { source } => source.root_cause(),
            other => other,
        }
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::Validation(_) => {
                Some("Requests must be 1-200 characters after trimming.".to_string())
            }
            Self::Encoding(_) => Some("Requests must fit on a single line.".to_string()),
            Self::Auth { .. } => Some(
                "Pass a token with gist scope via --token or RQL_TOKEN.".to_string(),
            ),
            Self::Conflict { .. } => Some(
                "Someone else changed the list. Run `rql list` and retry against the fresh indices."
                    .to_string(),
            ),
            Self::Index { .. } => {
                Some("Run `rql list` to see the current indices.".to_string())
            }
            Self::StaleListing(_) => Some(
                "Run `rql list` and delete by the indices it shows, or pass --rev.".to_string(),
            ),
            Self::Publish { text, source } => {
                let mut hint = format!(
                    "Retry later, or queue it locally: rql add --local \"{text}\""
                );
                if let Some(inner) = source.hint() {
                    hint.push_str("\n  ");
                    hint.push_str(&inner);
                }
                Some(hint)
            }
            Self::DeletionFailed { source } => source.hint().or_else(|| {
                Some("Nothing was changed. Run `rql list` and retry.".to_string())
            }),
            Self::Config(msg) => {
                if msg.contains("token") {
                    Some("Pass --token or set RQL_TOKEN / GITHUB_TOKEN.".to_string())
                } else if msg.contains("gist") {
                    Some(
                        "Configure the gist: rql config set --gist-id <id> --owner <user>"
                            .to_string(),
                    )
                } else {
                    None
                }
            }
            Self::Transport(_)
            | Self::Persistence { .. }
            | Self::Io(_)
            | Self::Json(_)
            | Self::Other(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "cause": self.root_cause().error_code().as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}
