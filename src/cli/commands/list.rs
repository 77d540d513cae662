//! List command: render the merged view and remember it for `delete`.

use colored::Colorize;
use serde::Serialize;

use crate::cli::Cli;
use crate::cli::commands::{open, remember_listing, runtime};
use crate::error::Result;
use crate::remote::Fingerprint;
use crate::view::{MergedView, Origin, ViewEntry};

#[derive(Serialize)]
struct ListOutput<'a> {
    revision: Option<&'a str>,
    remote_available: bool,
    remote_count: usize,
    local_count: usize,
    entries: &'a [ViewEntry],
}

/// Execute the list command.
///
/// # Errors
///
/// Returns an error if configuration cannot be resolved or JSON output fails.
pub fn execute(cli: &Cli, json: bool) -> Result<()> {
    let sync = open(cli)?;
    let view = runtime()?.block_on(sync.render());
    remember_listing(&sync, &view);
    print_view(&view, json)
}

/// Print a view as JSON or a human-readable list.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn print_view(view: &MergedView, json: bool) -> Result<()> {
    if json {
        let output = ListOutput {
            revision: view.fingerprint.as_ref().map(Fingerprint::short),
            remote_available: view.remote_available,
            remote_count: view.remote_count,
            local_count: view.local_count(),
            entries: &view.entries,
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    match &view.fingerprint {
        Some(fp) => println!(
            "{} {}",
            "Shared requests".bold(),
            format!("(rev {})", fp.short()).dimmed()
        ),
        None => println!(
            "{} {}",
            "Shared requests".bold(),
            "(unavailable, showing local queue only)".yellow()
        ),
    }
    if view.remote_available && view.remote_count == 0 {
        println!("  {}", "No shared requests.".dimmed());
    }

    for (flat, entry) in view.entries.iter().enumerate() {
        if let Origin::Local(0) = entry.origin {
            println!();
            println!("{}", "Local queue (not published)".bold());
        }
        print_entry(flat, entry);
    }

    Ok(())
}

fn print_entry(flat: usize, entry: &ViewEntry) {
    let tag = match entry.origin {
        Origin::Remote(_) => "   ".normal(),
        Origin::Local(i) => format!("L{i:<2}").cyan(),
    };
    let timestamp = if entry.record.is_legacy() {
        format!("{:16}", "")
    } else {
        entry.record.timestamp.clone()
    };
    println!(
        "  {flat:>3} {tag} {}  {}",
        timestamp.dimmed(),
        entry.record.text
    );
}
