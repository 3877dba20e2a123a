//! capasjornais.pt cover scraper.
//!
//! Category pages list covers as `div.col-xs-6` blocks:
//!
//! ```html
//! <div class="col-xs-6">
//!   <a href="/capa/Publico/17-10-2026"><img class="img-thumbnail" src="/thumbs/publico.jpg"></a>
//!   <h2>Público</h2>
//!   <div class="tinydate">17 Out 2026</div>
//! </div>
//! ```
//!
//! The linked detail page carries the high-resolution image as the first
//! `img.img-fluid`. References may be relative and are resolved against the
//! site base URL.

use crate::models::CoverRecord;
use crate::remote::RemoteClient;
use crate::utils::truncate_for_log;
use futures::stream::{self, StreamExt, TryStreamExt};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use std::error::Error;
use tracing::{debug, info, instrument};
use url::Url;

/// Default base URL relative references are resolved against.
pub const BASE_URL: &str = "https://capasjornais.pt/";

static BLOCK: Lazy<Selector> = Lazy::new(|| Selector::parse("div.col-xs-6").unwrap());
static THUMBNAIL: Lazy<Selector> = Lazy::new(|| Selector::parse("img.img-thumbnail[src]").unwrap());
static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("h2").unwrap());
static DATE: Lazy<Selector> = Lazy::new(|| Selector::parse("div.tinydate").unwrap());
static LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());
static FULL_IMAGE: Lazy<Selector> = Lazy::new(|| Selector::parse("img.img-fluid[src]").unwrap());

/// One complete cover block from a listing page, before the detail fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub name: String,
    pub date: String,
    pub thumb_url: String,
    pub detail_url: String,
}

/// Make `reference` absolute.
///
/// An `http`/`https` URL is returned unchanged; anything else, including
/// other schemes such as `data:`, is appended to `base` with exactly one `/`
/// between them.
pub fn resolve_url(base: &str, reference: &str) -> String {
    if Url::parse(reference).is_ok_and(|u| matches!(u.scheme(), "http" | "https")) {
        return reference.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        reference.trim_start_matches('/')
    )
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Extract every complete cover block from a listing page.
///
/// Blocks missing the thumbnail, title, date or link are skipped.
pub fn parse_listing(html: &str, base: &str) -> Vec<ListingEntry> {
    let document = Html::parse_document(html);
    let mut entries = Vec::new();

    for block in document.select(&BLOCK) {
        let thumb = block
            .select(&THUMBNAIL)
            .next()
            .and_then(|img| img.value().attr("src"));
        let title = block.select(&TITLE).next();
        let date = block.select(&DATE).next();
        let link = block
            .select(&LINK)
            .next()
            .and_then(|a| a.value().attr("href"));

        let (Some(thumb), Some(title), Some(date), Some(link)) = (thumb, title, date, link) else {
            debug!(html = %truncate_for_log(&block.html(), 200), "Skipping incomplete cover block");
            continue;
        };

        entries.push(ListingEntry {
            name: element_text(title),
            date: element_text(date),
            thumb_url: resolve_url(base, thumb),
            detail_url: resolve_url(base, link),
        });
    }

    entries
}

/// Extract the high-resolution image from a detail page, if it has one.
pub fn parse_full_image(html: &str, base: &str) -> Option<String> {
    let document = Html::parse_document(html);
    document
        .select(&FULL_IMAGE)
        .next()
        .and_then(|img| img.value().attr("src"))
        .filter(|src| !src.is_empty())
        .map(|src| resolve_url(base, src))
}

/// Fetch a detail page and return its high-resolution image URL.
///
/// A page without an image yields `Ok(None)`; a failed fetch is an error.
#[instrument(level = "debug", skip(remote, base_url))]
pub async fn get_full_image(
    remote: &RemoteClient,
    detail_url: &str,
    base_url: &str,
) -> Result<Option<String>, Box<dyn Error>> {
    let html = remote.get_text(detail_url).await?;
    let image = parse_full_image(&html, base_url);
    if image.is_none() {
        debug!("Detail page has no full image");
    }
    Ok(image)
}

/// Scrape one category's listing page into cover records.
///
/// Detail pages are fetched one after another. Any failed page fetch fails
/// the whole category.
#[instrument(level = "info", skip(remote, base_url))]
pub async fn fetch_covers(
    remote: &RemoteClient,
    category: &str,
    listing_url: &str,
    base_url: &str,
) -> Result<Vec<CoverRecord>, Box<dyn Error>> {
    let html = remote.get_text(listing_url).await?;
    let entries = parse_listing(&html, base_url);
    debug!(blocks = entries.len(), "Parsed listing page");

    let covers: Vec<CoverRecord> = stream::iter(entries)
        .then(|entry| async move {
            let image_url = get_full_image(remote, &entry.detail_url, base_url).await?;
            Ok::<_, Box<dyn Error>>(CoverRecord {
                category: category.to_string(),
                name: entry.name,
                date: entry.date,
                thumb_url: Some(entry.thumb_url),
                image_url,
            })
        })
        .try_collect()
        .await?;

    info!(count = covers.len(), "Collected covers");
    Ok(covers)
}
