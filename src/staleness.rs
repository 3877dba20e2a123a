//! Decides whether a mirrored file has to be (re)downloaded.
//!
//! A missing local file is always stale. For an existing file the remote
//! `Last-Modified` is the only evidence considered, and anything short of a
//! successful probe carrying a strictly newer timestamp keeps the local copy.

use crate::remote::RemoteClient;
use crate::utils::file_modified;
use chrono::{DateTime, Utc};
use std::path::Path;
use tracing::{instrument, warn};

/// `true` iff the remote copy was modified strictly after the local one.
/// Unknown remote time is never newer.
pub fn is_newer(remote_modified: Option<DateTime<Utc>>, local_modified: DateTime<Utc>) -> bool {
    remote_modified.is_some_and(|remote| remote > local_modified)
}

/// Should `remote_url` be fetched into `local_path`?
///
/// Issues no request when the local file is missing. Otherwise a `HEAD`
/// probe is sent and its `Last-Modified` compared with the local mtime.
///
/// # Arguments
///
/// * `remote` - Client the probe is sent through
/// * `remote_url` - The image URL, before indirection
/// * `local_path` - Where the mirrored copy lives
///
/// # Returns
///
/// - `true` if the local file is missing
/// - `true` if the probe succeeds with a `Last-Modified` strictly after the local mtime
/// - `false` otherwise, including probe errors, non-success statuses and a
///   missing or unparseable `Last-Modified`
///
/// # Examples
///
/// ```ignore
/// if should_download(&remote, &cover_url, &path).await {
///     // fetch and write the body
/// }
/// ```
#[instrument(level = "debug", skip(remote, local_path), fields(path = %local_path.display()))]
pub async fn should_download(remote: &RemoteClient, remote_url: &str, local_path: &Path) -> bool {
    let Some(local_modified) = file_modified(local_path).await else {
        return true;
    };

    match remote.probe(remote_url).await {
        Ok(probe) if probe.status.is_success() => is_newer(probe.last_modified, local_modified),
        Ok(probe) => {
            warn!(url = %remote_url, status = %probe.status, "Cannot check remote file; keeping local copy");
            false
        }
        Err(e) => {
            warn!(url = %remote_url, error = %e, "Error checking remote file; keeping local copy");
            false
        }
    }
}
