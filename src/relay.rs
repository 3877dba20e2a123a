//! Outbound URL indirection.
//!
//! The listing site refuses cross-origin requests, so every request the
//! application makes (listing page, detail page, metadata probe, image body)
//! is rewritten to go through a CORS relay that takes the real target as a
//! query parameter. The rewrite lives behind [`Indirection`] so the relay can
//! be swapped or dropped without touching the scraper or the sync engine.

use std::fmt;

/// Reference relay endpoint.
pub const DEFAULT_RELAY_ENDPOINT: &str = "https://corsproxy.ruben-araujo.workers.dev/corsproxy/";

/// Query parameter the reference relay reads the target URL from.
pub const DEFAULT_RELAY_PARAM: &str = "apiurl";

/// Rewrites a target URL into the URL that is actually requested.
pub trait Indirection: fmt::Debug + Send + Sync {
    fn wrap(&self, target: &str) -> String;
}

/// Wraps the target as `<endpoint>?<param>=<percent-encoded target>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relay {
    endpoint: String,
    param: String,
}

impl Relay {
    pub fn new(endpoint: impl Into<String>, param: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            param: param.into(),
        }
    }
}

impl Default for Relay {
    fn default() -> Self {
        Self::new(DEFAULT_RELAY_ENDPOINT, DEFAULT_RELAY_PARAM)
    }
}

impl Indirection for Relay {
    fn wrap(&self, target: &str) -> String {
        let separator = if self.endpoint.contains('?') { '&' } else { '?' };
        format!(
            "{}{}{}={}",
            self.endpoint,
            separator,
            self.param,
            urlencoding::encode(target)
        )
    }
}

/// Requests the target as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct Direct;

impl Indirection for Direct {
    fn wrap(&self, target: &str) -> String {
        target.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_relay_wraps_target() {
        let relay = Relay::default();
        assert_eq!(
            relay.wrap("https://capasjornais.pt/capas/Revistas.html"),
            "https://corsproxy.ruben-araujo.workers.dev/corsproxy/?apiurl=https%3A%2F%2Fcapasjornais.pt%2Fcapas%2FRevistas.html"
        );
    }

    #[test]
    fn test_relay_encodes_query_of_target() {
        let relay = Relay::new("http://relay.local/", "u");
        assert_eq!(
            relay.wrap("http://a/b?x=1&y=2"),
            "http://relay.local/?u=http%3A%2F%2Fa%2Fb%3Fx%3D1%26y%3D2"
        );
    }

    #[test]
    fn test_relay_appends_to_existing_query() {
        let relay = Relay::new("http://relay.local/?key=abc", "url");
        assert_eq!(
            relay.wrap("http://a/"),
            "http://relay.local/?key=abc&url=http%3A%2F%2Fa%2F"
        );
    }

    #[test]
    fn test_direct_is_identity() {
        assert_eq!(Direct.wrap("http://a/b c"), "http://a/b c");
    }
}
