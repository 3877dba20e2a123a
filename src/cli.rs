//! Command-line interface definitions for the cover mirror.
//!
//! All arguments can be provided via command-line flags or environment variables.

use crate::remote::DEFAULT_PROBE_TIMEOUT;
use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for the cover mirror.
///
/// # Examples
///
/// ```sh
/// # Mirror every category into ./images
/// cover_mirror
///
/// # Mirror two categories into /srv/covers without the relay
/// cover_mirror -o /srv/covers --category Revistas --category RevistasModa --no-relay
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Root directory of the mirror (`covers/` and `thumbnails/` live below it)
    #[arg(short = 'o', long, env = "COVER_MIRROR_ROOT", default_value = "images")]
    pub mirror_root: PathBuf,

    /// Optional path to a YAML settings file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Only sync these categories (repeatable); all categories when omitted
    #[arg(long = "category")]
    pub categories: Vec<String>,

    /// Override the relay endpoint from the settings
    #[arg(long, env = "COVER_RELAY_ENDPOINT")]
    pub relay_endpoint: Option<String>,

    /// Talk to the site directly instead of through the relay
    #[arg(long, conflicts_with = "relay_endpoint")]
    pub no_relay: bool,

    /// Seconds to wait for a staleness probe before assuming the file is current
    #[arg(long, default_value_t = DEFAULT_PROBE_TIMEOUT.as_secs())]
    pub probe_timeout_secs: u64,
}
