use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

pub const DEFAULT_PRIMARY_URL: &str = "https://api.exchangerate.host";
pub const DEFAULT_SECONDARY_URL: &str = "https://api.frankfurter.app";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PrimaryProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SecondaryProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub primary: Option<PrimaryProviderConfig>,
    pub secondary: Option<SecondaryProviderConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            primary: Some(PrimaryProviderConfig {
                base_url: DEFAULT_PRIMARY_URL.to_string(),
            }),
            secondary: Some(SecondaryProviderConfig {
                base_url: DEFAULT_SECONDARY_URL.to_string(),
            }),
        }
    }
}

fn default_base_currency() -> String {
    "MDL".to_string()
}

fn default_symbols() -> Vec<String> {
    vec!["USD".to_string(), "EUR".to_string(), "RUB".to_string()]
}

fn default_latest_ttl_secs() -> u64 {
    60 * 60
}

fn default_history_ttl_secs() -> u64 {
    6 * 60 * 60
}

fn default_fallback_rates() -> HashMap<String, f64> {
    HashMap::from([
        ("USD".to_string(), 0.057),
        ("EUR".to_string(), 0.053),
        ("RUB".to_string(), 5.2),
    ])
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EngineConfig {
    /// Currency all cached rates are expressed against.
    #[serde(default = "default_base_currency")]
    pub base_currency: String,
    /// Symbols requested on every latest-rates refresh.
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default = "default_latest_ttl_secs")]
    pub latest_ttl_secs: u64,
    #[serde(default = "default_history_ttl_secs")]
    pub history_ttl_secs: u64,
    /// Last-resort rates installed when every provider is unreachable.
    #[serde(default = "default_fallback_rates")]
    pub fallback_rates: HashMap<String, f64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            base_currency: default_base_currency(),
            symbols: default_symbols(),
            providers: ProvidersConfig::default(),
            latest_ttl_secs: default_latest_ttl_secs(),
            history_ttl_secs: default_history_ttl_secs(),
            fallback_rates: default_fallback_rates(),
        }
    }
}

impl EngineConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("md", "acs", "cursval")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    pub fn primary_base_url(&self) -> &str {
        self.providers
            .primary
            .as_ref()
            .map_or(DEFAULT_PRIMARY_URL, |p| &p.base_url)
    }

    pub fn secondary_base_url(&self) -> &str {
        self.providers
            .secondary
            .as_ref()
            .map_or(DEFAULT_SECONDARY_URL, |p| &p.base_url)
    }

    pub fn latest_ttl(&self) -> Duration {
        Duration::from_secs(self.latest_ttl_secs)
    }

    pub fn history_ttl(&self) -> Duration {
        Duration::from_secs(self.history_ttl_secs)
    }
}
