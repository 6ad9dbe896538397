use anyhow::{Context, Result};
use config::{Config, Environment};
use serde::Deserialize;

pub const DEFAULT_BASE_URL: &str = "https://pib.gov.in/PressReleasePage.aspx";
pub const DEFAULT_DB_PATH: &str = "data/pib.sqlite";

/// Runtime settings. Defaults are overridden by `PIB_*` environment variables,
/// which are in turn overridden by command-line flags.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub base_url: String,
    pub db_path: String,
    pub timeout_secs: u64,
    pub commit_interval: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            base_url: DEFAULT_BASE_URL.to_string(),
            db_path: DEFAULT_DB_PATH.to_string(),
            timeout_secs: 30,
            commit_interval: 1000,
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        Config::builder()
            .add_source(Environment::with_prefix("PIB").try_parsing(true))
            .build()
            .context("Failed to read PIB_* settings")?
            .try_deserialize()
            .context("Invalid PIB_* settings")
    }
}
