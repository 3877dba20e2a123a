//! # Cover Mirror
//!
//! Keeps a local mirror of newspaper and magazine front covers published on
//! [capasjornais.pt](https://capasjornais.pt/), with one directory of
//! full-resolution images and one of thumbnails per category.
//!
//! ## Usage
//!
//! ```sh
//! cover_mirror -o ./images
//! ```
//!
//! ## Architecture
//!
//! Each category is processed in turn:
//! 1. **Collecting**: scrape the listing page and each cover's detail page
//! 2. **Planning**: derive the desired filenames and diff them against disk
//! 3. **Syncing**: download stale or missing images, delete outdated ones
//!
//! Everything runs sequentially. A failing category is logged and skipped;
//! a failing file is logged and the category carries on.

use clap::Parser;
use std::error::Error;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod models;
mod relay;
mod remote;
mod scrapers;
mod staleness;
mod sync;
mod utils;

use cli::Cli;
use config::Settings;
use relay::{Direct, Indirection, Relay};
use remote::RemoteClient;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("cover_mirror starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let settings = match Settings::load(args.config.as_deref()).await {
        Ok(settings) => settings,
        Err(e) => {
            error!(path = ?args.config, error = %e, "Failed to load configuration");
            return Err(e);
        }
    };

    let indirection: Box<dyn Indirection> = if args.no_relay {
        info!("Relay disabled; requesting the site directly");
        Box::new(Direct)
    } else {
        let endpoint = args
            .relay_endpoint
            .clone()
            .unwrap_or_else(|| settings.relay.endpoint.clone());
        info!(%endpoint, param = %settings.relay.param, "Routing requests through relay");
        Box::new(Relay::new(endpoint, settings.relay.param.clone()))
    };
    let remote = RemoteClient::new(indirection, Duration::from_secs(args.probe_timeout_secs));

    let categories = settings.select_categories(&args.categories);
    if categories.is_empty() {
        warn!(requested = ?args.categories, "No matching categories to sync");
    }

    info!(
        categories = categories.len(),
        mirror_root = %args.mirror_root.display(),
        "Collecting covers and thumbnails"
    );

    let mut failed_categories = 0usize;
    for category in &categories {
        info!(category = %category.id, "Category");

        let covers = match scrapers::capasjornais::fetch_covers(
            &remote,
            &category.id,
            &category.url,
            &settings.base_url,
        )
        .await
        {
            Ok(covers) => covers,
            Err(e) => {
                error!(category = %category.id, error = %e, "Failed to collect covers; skipping category");
                failed_categories += 1;
                continue;
            }
        };

        if covers.is_empty() {
            info!(category = %category.id, "No covers found");
            continue;
        }
        info!(category = %category.id, count = covers.len(), "Covers found");

        if let Err(e) = sync::sync(&remote, &covers, &category.id, &args.mirror_root).await {
            error!(category = %category.id, error = %e, "Failed to prepare mirror directories; skipping category");
            failed_categories += 1;
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        categories = categories.len(),
        failed_categories,
        "Execution complete"
    );

    Ok(())
}
