//! Utility functions for filename sanitizing, logging and file system operations.
//!
//! This module provides helper functions used throughout the application:
//! - Whitespace replacement for canonical cover filenames
//! - String truncation for logging scraped HTML
//! - Directory creation and modification-time lookup for the mirror

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::path::Path;
use tokio::fs;
use tracing::{debug, instrument};

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s").unwrap());

/// Replace every whitespace character with `_`.
///
/// Used to build the canonical cover filename from a publication name and
/// date label. Runs of whitespace are not collapsed and nothing else is
/// touched.
///
/// # Arguments
///
/// * `s` - The name or date label to sanitize
///
/// # Returns
///
/// `s` with each whitespace character replaced by a single `_`.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(sanitize_component("Jornal X"), "Jornal_X");
/// assert_eq!(sanitize_component("A  B"), "A__B");
/// ```
pub fn sanitize_component(s: &str) -> String {
    WHITESPACE.replace_all(s, "_").into_owned()
}

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to `max` bytes (backing off to a char
/// boundary) with an ellipsis and byte count indicator appended.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…(+{} bytes)", &s[..end], s.len() - end)
}

/// Ensure a directory (and its parents) exists.
///
/// Succeeds when the directory is already present.
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub async fn ensure_dir(path: &Path) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(path).await?;
    debug!("Directory ready");
    Ok(())
}

/// Modification time of a local file, or `None` if it does not exist or the
/// platform cannot report one.
pub async fn file_modified(path: &Path) -> Option<DateTime<Utc>> {
    let meta = fs::metadata(path).await.ok()?;
    meta.modified().ok().map(DateTime::<Utc>::from)
}
