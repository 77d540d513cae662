//! Input validation for request text.
//!
//! Runs before any I/O so a rejected request never touches the remote store
//! or the local queue.

use crate::error::{Error, Result};

/// Maximum request length, in characters (not bytes).
pub const MAX_TEXT_CHARS: usize = 200;

/// Trim and validate request text, returning the text to store.
///
/// # Errors
///
/// Returns `Error::Validation` if the trimmed text is empty, longer than
/// [`MAX_TEXT_CHARS`], or spans more than one line.
pub fn validate_text(input: &str) -> Result<String> {
    let text = input.trim();

    if text.is_empty() {
        return Err(Error::Validation("text is empty".to_string()));
    }

    let chars = text.chars().count();
    if chars > MAX_TEXT_CHARS {
        return Err(Error::Validation(format!(
            "text is {chars} characters, limit is {MAX_TEXT_CHARS}"
        )));
    }

    if text.contains('\n') || text.contains('\r') {
        return Err(Error::Validation("text must be a single line".to_string()));
    }

    Ok(text.to_string())
}
