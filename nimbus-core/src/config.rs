use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    aggregator::DEFAULT_TIMEOUT, locations::LocationBook, model::Location, provider::ProviderId,
    provider::gemini::DEFAULT_MODEL,
};

/// Configuration for a single provider (e.g., API key).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub api_key: String,
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Seed locations as "City,Country"; the first is the primary one.
    pub locations: Vec<String>,

    /// Per-provider request timeout.
    pub timeout_secs: u64,

    pub gemini_model: String,

    /// Example TOML:
    /// [providers.openweather]
    /// api_key = "..."
    pub providers: HashMap<String, ProviderConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            locations: vec!["Victoria,CA".to_string()],
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            gemini_model: DEFAULT_MODEL.to_string(),
            providers: HashMap::new(),
        }
    }
}

impl Config {
    /// Load config from disk, or return defaults if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "nimbus", "nimbus")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Set or replace a provider API key.
    pub fn upsert_provider_api_key(&mut self, provider_id: ProviderId, api_key: String) {
        self.providers
            .insert(provider_id.as_str().to_string(), ProviderConfig { api_key });
    }

    /// API key for a provider: environment variable first, then the file.
    pub fn api_key(&self, provider_id: ProviderId) -> Option<String> {
        Self::env_api_key(provider_id).or_else(|| self.file_api_key(provider_id).map(str::to_owned))
    }

    /// Like [`Config::api_key`], but a missing key is an error with a hint.
    pub fn require_api_key(&self, provider_id: ProviderId) -> Result<String> {
        self.api_key(provider_id).ok_or_else(|| {
            anyhow!(
                "No API key configured for provider '{provider_id}'.\n\
                 Hint: run `nimbus configure {provider_id}` or set {}.",
                provider_id.key_env_var()
            )
        })
    }

    pub fn is_provider_configured(&self, provider_id: ProviderId) -> bool {
        self.api_key(provider_id).is_some()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    /// Seed locations as a de-duplicated book. Unparsable entries are an error.
    pub fn location_book(&self) -> Result<LocationBook> {
        let locations = self
            .locations
            .iter()
            .map(|raw| Location::parse(raw).with_context(|| "Invalid entry in `locations`"))
            .collect::<Result<Vec<_>>>()?;

        Ok(LocationBook::from_locations(locations))
    }

    fn file_api_key(&self, provider_id: ProviderId) -> Option<&str> {
        self.providers
            .get(provider_id.as_str())
            .map(|cfg| cfg.api_key.as_str())
            .filter(|key| !key.is_empty())
    }

    fn env_api_key(provider_id: ProviderId) -> Option<String> {
        std::env::var(provider_id.key_env_var())
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}
