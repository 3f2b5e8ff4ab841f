use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::app::PollOptions;
use crate::error::ApiError;
use crate::settings::DEFAULT_MODEL;

/// Placeholder tunnel; users point this at their own backend.
pub const DEFAULT_API_BASE_URL: &str = "https://example.ngrok-free.app";

/// Session-only override for the API base URL. Never persisted.
pub const ENV_API_URL: &str = "COVERGEN_API_URL";

/// Top-level application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    /// Seconds between status polls.
    pub poll_interval_secs: u64,
    /// Give up polling after this many seconds. `None` polls forever.
    pub poll_timeout_secs: Option<u64>,
    pub default_model: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.into(),
            poll_interval_secs: 5,
            poll_timeout_secs: Some(600),
            default_model: DEFAULT_MODEL.into(),
        }
    }
}

impl Config {
    /// Directory: ~/.config/covergen/
    fn dir() -> PathBuf {
        let mut p = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        p.push("covergen");
        p
    }

    pub fn path() -> PathBuf {
        Self::dir().join("config.json")
    }

    /// Load from disk, returning defaults if file doesn't exist or is invalid.
    pub fn load() -> Self {
        Self::load_from(&Self::path())
    }

    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(data) => serde_json::from_str(&data).unwrap_or_else(|e| {
                log::warn!("Ignoring invalid config at {}: {e}", path.display());
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Persist to disk.
    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        self.save_to(&Self::path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let data = serde_json::to_string_pretty(self)?;
        fs::write(path, data)?;
        Ok(())
    }

    /// Apply `COVERGEN_API_URL` if set. Blank values are ignored.
    pub fn apply_env(&mut self) {
        if let Ok(value) = std::env::var(ENV_API_URL) {
            if !value.trim().is_empty() {
                log::info!("Using API base URL from {ENV_API_URL}");
                self.api_base_url = value.trim().to_string();
            }
        }
    }

    /// Change the base URL after checking it parses as an http(s) URL.
    /// Callers decide whether to `save()` afterwards.
    pub fn set_api_base_url(&mut self, url: &str) -> Result<(), ApiError> {
        let trimmed = url.trim().trim_end_matches('/');
        let parsed = reqwest::Url::parse(trimmed).map_err(|e| ApiError::InvalidUrl(format!("{trimmed}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ApiError::InvalidUrl(format!("{trimmed}: unsupported scheme")));
        }
        self.api_base_url = trimmed.to_string();
        log::info!("API base URL updated to: {}", self.api_base_url);
        Ok(())
    }

    pub fn poll_options(&self) -> PollOptions {
        PollOptions {
            interval: Duration::from_secs(self.poll_interval_secs.max(1)),
            timeout: self.poll_timeout_secs.map(Duration::from_secs),
        }
    }
}
