//! Data models for scraped covers and the local mirror.
//!
//! This module defines the core data structures used throughout the application:
//! - [`Category`]: One entry of the category table (identifier + listing page)
//! - [`CoverRecord`]: A single front page observed on a listing page
//! - [`ImageKind`]: Which of the two mirrored resolutions a file belongs to

use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// A category of covers and the listing page that enumerates them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Category {
    /// Identifier used as the per-category directory name.
    pub id: String,
    /// Absolute URL of the listing page.
    pub url: String,
}

/// A front page observed in a category at scrape time.
///
/// Records are built fresh on every run by the listing collector and are
/// never mutated afterwards. Only `(name, date)` participates in identity:
/// see [`CoverRecord::filename`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverRecord {
    /// The category this cover was listed under.
    pub category: String,
    /// Display title of the publication.
    pub name: String,
    /// Publication date label as shown by the source.
    pub date: String,
    /// Absolute URL of the thumbnail image.
    pub thumb_url: Option<String>,
    /// Absolute URL of the high-resolution image, if the detail page had one.
    pub image_url: Option<String>,
}

impl CoverRecord {
    /// Canonical local filename for this cover, shared by both image kinds.
    pub fn filename(&self) -> String {
        cover_filename(&self.name, &self.date)
    }

    /// The remote URL for the given image kind, if resolved.
    pub fn url_for(&self, kind: ImageKind) -> Option<&str> {
        match kind {
            ImageKind::Full => self.image_url.as_deref(),
            ImageKind::Thumbnail => self.thumb_url.as_deref(),
        }
    }
}

/// Extension of every mirrored file.
pub const IMAGE_EXTENSION: &str = "jpg";

/// Build `<name>_<date>.jpg`, with whitespace in both halves replaced by `_`.
///
/// No other normalization happens, so two covers that only differ in the
/// kind of whitespace map to the same file. The later one wins.
pub fn cover_filename(name: &str, date: &str) -> String {
    format!(
        "{}_{}.{}",
        crate::utils::sanitize_component(name),
        crate::utils::sanitize_component(date),
        IMAGE_EXTENSION
    )
}

/// The two resolutions kept in the mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageKind {
    /// High-resolution cover from the detail page.
    Full,
    /// Thumbnail from the listing page.
    Thumbnail,
}

impl ImageKind {
    pub const ALL: [ImageKind; 2] = [ImageKind::Full, ImageKind::Thumbnail];

    /// Top-level directory under the mirror root.
    pub fn dir_name(self) -> &'static str {
        match self {
            ImageKind::Full => "covers",
            ImageKind::Thumbnail => "thumbnails",
        }
    }

    /// Directory holding this kind of image for one category.
    pub fn category_dir(self, mirror_root: &Path, category: &str) -> PathBuf {
        mirror_root.join(self.dir_name()).join(category)
    }
}

impl fmt::Display for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageKind::Full => f.write_str("FULL"),
            ImageKind::Thumbnail => f.write_str("THUMB"),
        }
    }
}
