use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the replay vocabulary tracker
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Replay detection and word tracking settings
    pub tracking: TrackingConfig,

    /// Transcript acquisition settings
    pub acquisition: AcquisitionConfig,

    /// Ledger storage settings
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Language code for normalization and stop-word filtering
    pub language: String,

    /// Drop function words before logging
    pub filter_stop_words: bool,

    /// Minimum backward jump (seconds) that counts as a rewind
    pub min_rewind_secs: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// How long to wait on the caption bridge before falling through
    pub bridge_timeout_secs: u64,

    /// HTTP timeout for subtitle and page fetches
    pub request_timeout_secs: u64,

    /// Watch-page URL template; `{id}` is replaced by the video id
    pub page_url_template: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path of the ledger JSON file
    pub ledger_path: PathBuf,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            language: "es".to_string(),
            filter_stop_words: true,
            min_rewind_secs: 1.0,
        }
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            bridge_timeout_secs: 2,
            request_timeout_secs: 10,
            page_url_template: "https://www.youtube.com/watch?v={id}".to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            ledger_path: PathBuf::from("replay-vocab-ledger.json"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tracking: TrackingConfig::default(),
            acquisition: AcquisitionConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        // Try to load from various locations
        let config_paths = [
            "replay-vocab.toml",
            "config/replay-vocab.toml",
            "~/.config/replay-vocab/config.toml",
        ];

        for path in &config_paths {
            if let Ok(config_str) = std::fs::read_to_string(path) {
                match toml::from_str(&config_str) {
                    Ok(config) => {
                        tracing::info!("loaded configuration from {}", path);
                        return Ok(config);
                    }
                    Err(e) => {
                        tracing::warn!("failed to parse config file {}: {}", path, e);
                    }
                }
            }
        }

        Err(anyhow!("no configuration file found"))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.tracking.language.is_empty() {
            return Err(anyhow!("tracking.language must not be empty"));
        }
        if self.tracking.min_rewind_secs < 0.0 {
            return Err(anyhow!("tracking.min_rewind_secs must not be negative"));
        }
        if self.acquisition.request_timeout_secs == 0 {
            return Err(anyhow!("acquisition.request_timeout_secs must be greater than 0"));
        }
        if !self.acquisition.page_url_template.contains("{id}") {
            return Err(anyhow!("acquisition.page_url_template must contain {{id}}"));
        }
        Ok(())
    }
}
