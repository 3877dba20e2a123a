//! HTTP access to the listing site.
//!
//! [`RemoteClient`] is the only place that talks to the network. Every call
//! passes its target through the configured [`Indirection`] first, and the
//! three request shapes the application needs are kept separate:
//!
//! - [`RemoteClient::get_text`]: page fetch for the scraper (no timeout)
//! - [`RemoteClient::probe`]: metadata-only `HEAD` with a bounded wait
//! - [`RemoteClient::get_bytes`]: image body fetch (no timeout)

use crate::relay::Indirection;
use chrono::{DateTime, Utc};
use reqwest::header::LAST_MODIFIED;
use reqwest::{Client, StatusCode};
use std::error::Error;
use std::time::Duration;
use tracing::{debug, instrument};

/// Default bound on how long a staleness probe may take.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of a metadata-only probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Probe {
    pub status: StatusCode,
    /// Parsed `Last-Modified`, if present and well-formed.
    pub last_modified: Option<DateTime<Utc>>,
}

/// Sequential HTTP client routed through an [`Indirection`].
#[derive(Debug)]
pub struct RemoteClient {
    http: Client,
    indirection: Box<dyn Indirection>,
    probe_timeout: Duration,
}

impl RemoteClient {
    pub fn new(indirection: Box<dyn Indirection>, probe_timeout: Duration) -> Self {
        Self {
            http: Client::new(),
            indirection,
            probe_timeout,
        }
    }

    /// The URL actually requested for `target`.
    pub fn wrap(&self, target: &str) -> String {
        self.indirection.wrap(target)
    }

    /// Fetch a page body as text. Non-success statuses are errors.
    #[instrument(level = "debug", skip(self))]
    pub async fn get_text(&self, url: &str) -> Result<String, Box<dyn Error>> {
        let resp = self.http.get(self.wrap(url)).send().await?.error_for_status()?;
        let text = resp.text().await?;
        debug!(bytes = text.len(), "Fetched page");
        Ok(text)
    }

    /// Fetch a resource body. Non-success statuses are errors.
    #[instrument(level = "debug", skip(self))]
    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, Box<dyn Error>> {
        let resp = self.http.get(self.wrap(url)).send().await?.error_for_status()?;
        let bytes = resp.bytes().await?;
        debug!(bytes = bytes.len(), "Fetched body");
        Ok(bytes.to_vec())
    }

    /// Issue a `HEAD` request for `url` with the probe timeout applied.
    ///
    /// Transport errors (including the timeout) are returned as `Err`; any
    /// HTTP status, successful or not, is returned as `Ok`.
    #[instrument(level = "debug", skip(self))]
    pub async fn probe(&self, url: &str) -> Result<Probe, Box<dyn Error>> {
        let resp = self
            .http
            .head(self.wrap(url))
            .timeout(self.probe_timeout)
            .send()
            .await?;
        let last_modified = resp
            .headers()
            .get(LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_http_date);
        debug!(status = %resp.status(), ?last_modified, "Probed resource");
        Ok(Probe {
            status: resp.status(),
            last_modified,
        })
    }
}

/// Parse an HTTP date (`Sun, 06 Nov 1994 08:49:37 GMT`).
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
