//! Promote command: publish a queued request and drop it from the queue.

use serde::Serialize;

use crate::cli::Cli;
use crate::cli::commands::{list, open, remember_listing, runtime};
use crate::config::require_credential;
use crate::error::{Error, Result};
use crate::remote::Fingerprint;

#[derive(Serialize)]
struct PromoteOutput<'a> {
    text: &'a str,
    revision: Option<&'a str>,
}

/// Execute the promote command.
///
/// # Errors
///
/// Returns `Error::Index` for an unknown queue position and `Error::Publish`
/// if the shared list could not be updated; the queue is left as it was.
pub fn execute(local_index: usize, cli: &Cli, json: bool) -> Result<()> {
    let sync = open(cli)?;
    let records = sync.queue().load();
    let text = records
        .get(local_index)
        .map(|r| r.text.clone())
        .ok_or(Error::Index {
            index: local_index,
            len: records.len(),
        })?;

    let credential = require_credential(cli.token.as_deref())?;
    let view = runtime()?.block_on(sync.promote(local_index, &credential))?;

    if json {
        let output = PromoteOutput {
            text: &text,
            revision: view.fingerprint.as_ref().map(Fingerprint::short),
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    println!("Published: {text}");
    println!();
    remember_listing(&sync, &view);
    list::print_view(&view, false)
}
