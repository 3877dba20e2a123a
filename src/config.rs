//! Static configuration: site base URL, relay, and the category table.
//!
//! The built-in defaults describe the reference deployment. An optional
//! YAML file can override any of them:
//!
//! ```yaml
//! base_url: https://capasjornais.pt/
//! relay:
//!   endpoint: https://corsproxy.ruben-araujo.workers.dev/corsproxy/
//!   param: apiurl
//! categories:
//!   - id: JornaisNacionais
//!     url: https://capasjornais.pt/capas/JornaisNacionais.html
//! ```

use crate::models::Category;
use crate::relay::{DEFAULT_RELAY_ENDPOINT, DEFAULT_RELAY_PARAM};
use crate::scrapers::capasjornais::BASE_URL;
use serde::Deserialize;
use std::error::Error;
use std::path::Path;
use tracing::{info, instrument};

const DEFAULT_CATEGORIES: [&str; 6] = [
    "JornaisNacionais",
    "Revistas",
    "JornaisDesportivos",
    "RevistasTecnologia",
    "RevistasCarros",
    "RevistasModa",
];

/// Relay endpoint and the query parameter carrying the target URL.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RelaySettings {
    pub endpoint: String,
    pub param: String,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_RELAY_ENDPOINT.to_string(),
            param: DEFAULT_RELAY_PARAM.to_string(),
        }
    }
}

/// Everything that is fixed for a deployment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub base_url: String,
    pub relay: RelaySettings,
    pub categories: Vec<Category>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: BASE_URL.to_string(),
            relay: RelaySettings::default(),
            categories: default_categories(),
        }
    }
}

/// The six categories of the reference deployment, in processing order.
pub fn default_categories() -> Vec<Category> {
    DEFAULT_CATEGORIES
        .iter()
        .map(|id| Category {
            id: id.to_string(),
            url: format!("{BASE_URL}capas/{id}.html"),
        })
        .collect()
}

impl Settings {
    pub fn from_yaml(yaml: &str) -> Result<Self, Box<dyn Error>> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load settings from `path`, or the built-in defaults when `None`.
    #[instrument(level = "info")]
    pub async fn load(path: Option<&Path>) -> Result<Self, Box<dyn Error>> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let yaml = tokio::fs::read_to_string(path).await?;
        let settings = Self::from_yaml(&yaml)?;
        info!(
            categories = settings.categories.len(),
            "Loaded configuration"
        );
        Ok(settings)
    }

    /// Keep only the categories named in `only`; an empty filter keeps all.
    pub fn select_categories(&self, only: &[String]) -> Vec<Category> {
        self.categories
            .iter()
            .filter(|c| only.is_empty() || only.contains(&c.id))
            .cloned()
            .collect()
    }
}
