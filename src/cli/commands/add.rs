//! Add command: publish a request, or queue it locally.

use serde::Serialize;
use tracing::warn;

use crate::cli::commands::{open, runtime};
use crate::cli::{AddArgs, Cli};
use crate::config::require_credential;
use crate::error::{Error, Result};
use crate::validate::validate_text;

#[derive(Serialize)]
struct AddOutput<'a> {
    text: &'a str,
    destination: &'a str,
    /// Why a shared add ended up in the local queue.
    #[serde(skip_serializing_if = "Option::is_none")]
    fallback_reason: Option<String>,
}

/// Execute the add command.
///
/// # Errors
///
/// Returns validation, configuration, publish or persistence errors.
pub fn execute(args: &AddArgs, cli: &Cli, json: bool) -> Result<()> {
    // Reject bad input before resolving config or credentials.
    let text = validate_text(&args.text)?;
    let sync = open(cli)?;

    if args.local {
        let record = sync.add_local(&text)?;
        return report(&record.text, "local", None, json);
    }

    let credential = require_credential(cli.token.as_deref())?;
    match runtime()?.block_on(sync.add_shared(&text, &credential)) {
        Ok(_) => report(&text, "shared", None, json),
        Err(e @ Error::Publish { .. }) if args.fallback_local => {
            warn!(error = %e, "Publish failed, queueing locally");
            let record = sync.add_local(&text)?;
            report(&record.text, "local", Some(e.root_cause().to_string()), json)
        }
        Err(e) => Err(e),
    }
}

fn report(text: &str, destination: &str, fallback_reason: Option<String>, json: bool) -> Result<()> {
    if json {
        let output = AddOutput {
            text,
            destination,
            fallback_reason,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        match (destination, fallback_reason) {
            ("shared", _) => println!("Published: {text}"),
            (_, Some(reason)) => {
                println!("Publish failed ({reason}); queued locally: {text}");
            }
            _ => println!("Queued locally: {text}"),
        }
    }
    Ok(())
}
