//! Delete command: remove shared and queued requests by flat index.

use serde::Serialize;

use crate::cli::commands::{list, open, remember_listing, runtime};
use crate::cli::{Cli, DeleteArgs};
use crate::config::{Listing, listing_path, read_listing, require_credential};
use crate::error::{Error, Result};
use crate::remote::{Credential, Fingerprint};
use crate::view::{MergedView, partition};

#[derive(Serialize)]
struct DeleteOutput<'a> {
    deleted_remote: usize,
    deleted_local: usize,
    revision: Option<&'a str>,
}

/// What the user's indices refer to.
#[derive(Debug, PartialEq, Eq)]
struct Basis {
    expected: Option<Fingerprint>,
    remote_count: usize,
}

/// Execute the delete command.
///
/// Indices refer to the last list shown (`rql list`), or to the shared
/// revision named by `--rev`. The shared list must still be at that revision
/// when the write happens.
///
/// # Errors
///
/// Returns `Error::DeletionFailed` when the shared list cannot be read,
/// `Error::Conflict` when it changed since the listing, `Error::StaleListing`
/// when there is no usable listing, and otherwise whatever
/// [`crate::ops::Synchronizer::delete_selection`] returns.
pub fn execute(args: &DeleteArgs, cli: &Cli, json: bool) -> Result<()> {
    let sync = open(cli)?;
    let rt = runtime()?;

    let view = rt.block_on(sync.render());
    if sync.store().endpoint().is_some() && !view.remote_available {
        return Err(unavailable());
    }

    let listing = read_listing(&listing_path(sync.queue().path()));
    let basis = resolve_basis(&view, args.rev.as_deref(), listing.as_ref())?;
    let selection = partition(&args.indices, basis.remote_count);

    // Local-only selections never reach the remote, so no token is needed.
    let credential = if selection.remote.is_empty() {
        Credential::new("")
    } else {
        require_credential(cli.token.as_deref())?
    };

    let updated = rt.block_on(sync.delete_selection(
        &args.indices,
        basis.remote_count,
        basis.expected.as_ref(),
        &credential,
    ))?;

    if json {
        let output = DeleteOutput {
            deleted_remote: selection.remote.len(),
            deleted_local: selection.local.len(),
            revision: updated.fingerprint.as_ref().map(Fingerprint::short),
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    println!(
        "Deleted {} shared and {} queued request(s).",
        selection.remote.len(),
        selection.local.len()
    );
    println!();
    remember_listing(&sync, &updated);
    list::print_view(&updated, false)
}

fn unavailable() -> Error {
    Error::deletion_failed(Error::Transport("shared list is unavailable".to_string()))
}

fn short_or_none(fingerprint: Option<&Fingerprint>) -> String {
    fingerprint.map_or_else(|| "none".to_string(), |fp| fp.short().to_string())
}

/// Resolve the boundary and guard revision for a delete.
///
/// `--rev` pins the shared revision directly. Otherwise the stored listing
/// must match the fresh view on both sides of the boundary.
fn resolve_basis(view: &MergedView, rev: Option<&str>, listing: Option<&Listing>) -> Result<Basis> {
    if let Some(rev) = rev {
        return match &view.fingerprint {
            Some(current) if current.matches(rev) => Ok(Basis {
                expected: Some(current.clone()),
                remote_count: view.remote_count,
            }),
            Some(current) => Err(Error::Conflict {
                expected: rev.to_string(),
                actual: current.short().to_string(),
            }),
            None => Err(unavailable()),
        };
    }

    let listing = listing
        .ok_or_else(|| Error::StaleListing("no list has been shown yet".to_string()))?;

    if listing.revision != view.fingerprint {
        return Err(Error::Conflict {
            expected: short_or_none(listing.revision.as_ref()),
            actual: short_or_none(view.fingerprint.as_ref()),
        });
    }
    if listing.local_revision != view.local_revision() {
        return Err(Error::StaleListing(
            "the local queue changed since the last list".to_string(),
        ));
    }

    Ok(Basis {
        expected: listing.revision.clone(),
        remote_count: listing.remote_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Record;

    fn record(text: &str) -> Record {
        Record {
            timestamp: "2025-01-01 09:00".to_string(),
            text: text.to_string(),
        }
    }

    fn view_of(remote: &[&str], local: &[&str]) -> MergedView {
        let mut view = MergedView::merge(
            remote.iter().copied().map(record).collect(),
            local.iter().copied().map(record).collect(),
        );
        view.fingerprint = Some(Fingerprint::of(&remote.join("\n")));
        view
    }

    #[test]
    fn test_listing_basis() {
        let view = view_of(&["a", "b"], &["q"]);
        let basis = resolve_basis(&view, None, Some(&Listing::of(&view))).unwrap();
        assert_eq!(basis.expected, view.fingerprint);
        assert_eq!(basis.remote_count, 2);
    }

    #[test]
    fn test_missing_listing_is_stale() {
        let view = view_of(&["a"], &[]);
        let err = resolve_basis(&view, None, None).unwrap_err();
        assert!(matches!(err, Error::StaleListing(_)));
    }

    #[test]
    fn test_boundary_shift_since_listing_is_conflict() {
        let listed = view_of(&["A"], &["draft"]);
        let fresh = view_of(&["Z", "A"], &["draft"]);

        let err = resolve_basis(&fresh, None, Some(&Listing::of(&listed))).unwrap_err();
        assert!(matches!(err, Error::Conflict { .. }));
    }

    #[test]
    fn test_local_change_since_listing_is_stale() {
        let listed = view_of(&["A"], &["one"]);
        let fresh = view_of(&["A"], &["two", "one"]);

        let err = resolve_basis(&fresh, None, Some(&Listing::of(&listed))).unwrap_err();
        assert!(matches!(err, Error::StaleListing(_)));
    }

    #[test]
    fn test_detached_listing_basis() {
        let view = MergedView::merge(Vec::new(), vec![record("queued")]);
        let basis = resolve_basis(&view, None, Some(&Listing::of(&view))).unwrap();
        assert_eq!(basis.expected, None);
        assert_eq!(basis.remote_count, 0);
    }

    #[test]
    fn test_matching_rev_needs_no_listing() {
        let view = view_of(&["a", "b"], &[]);
        let short = view.fingerprint.as_ref().unwrap().short().to_string();
        let basis = resolve_basis(&view, Some(&short), None).unwrap();
        assert_eq!(basis.expected, view.fingerprint);
    }

    #[test]
    fn test_stale_rev_is_conflict() {
        let view = view_of(&["a", "b"], &[]);
        let stale = Fingerprint::of("a").short().to_string();
        let err = resolve_basis(&view, Some(&stale), None).unwrap_err();
        assert!(matches!(err, Error::Conflict { .. }));
    }

    #[test]
    fn test_rev_without_remote_fails() {
        let view = MergedView::merge(Vec::new(), vec![record("queued")]);
        let err = resolve_basis(&view, Some("abcdef0"), None).unwrap_err();
        assert!(matches!(err, Error::DeletionFailed { .. }));
    }
}
