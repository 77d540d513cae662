//! Command implementations.

pub mod add;
pub mod completions;
pub mod config;
pub mod delete;
pub mod list;
pub mod promote;
pub mod version;

use tracing::warn;

use crate::cli::Cli;
use crate::config::{Listing, Overrides, listing_path, load_config, resolve, write_listing};
use crate::error::{Error, Result};
use crate::ops::Synchronizer;
use crate::queue::LocalQueue;
use crate::remote::GistStore;
use crate::view::MergedView;

/// Build the synchronizer from config, environment and global flags.
///
/// # Errors
///
/// Returns `Error::Config` for unreadable or incomplete configuration.
pub fn open(cli: &Cli) -> Result<Synchronizer<GistStore>> {
    let settings = load_config()?;
    let overrides = Overrides {
        gist_id: cli.gist_id.clone(),
        queue_path: cli.queue.clone(),
    };
    let resolved = resolve(&settings, &overrides)?;

    let store = match resolved.endpoint {
        Some(endpoint) => GistStore::new(endpoint, resolved.timeout)?,
        None => GistStore::detached(resolved.timeout)?,
    };

    Ok(Synchronizer::new(store, LocalQueue::new(resolved.queue_path))
        .with_max_retries(resolved.max_retries))
}

/// Runtime for the async remote calls of a single command.
///
/// # Errors
///
/// Returns `Error::Other` if the runtime cannot be created.
pub fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| Error::Other(format!("Failed to create async runtime: {e}")))
}

/// Record `view` as the list the user is now looking at.
pub fn remember_listing(sync: &Synchronizer<GistStore>, view: &MergedView) {
    let path = listing_path(sync.queue().path());
    if let Err(e) = write_listing(&path, &Listing::of(view)) {
        warn!(error = %e, "Failed to record listing; the next delete will ask for a fresh list");
    }
}
