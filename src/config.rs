use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Result, anyhow};

pub const APP_DIR: &str = "jmeter-chat";
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

const CONFIG_FILE: &str = "config.json";

/// Client settings. Credentials live separately in `CredentialStore`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub server_url: Option<String>,
    pub poll_interval_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
}

impl Config {
    pub fn new() -> Self {
        Self {
            server_url: Some(DEFAULT_SERVER_URL.to_string()),
            poll_interval_secs: Some(DEFAULT_POLL_INTERVAL_SECS),
            request_timeout_secs: Some(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    pub fn load(dir: &Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE);

        if !config_path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(&config_path)?;
        let config: Config = serde_json::from_str(&config_content)
            .map_err(|e| anyhow!("Invalid config file {}: {}", config_path.display(), e))?;
        Ok(config)
    }

    /// Load the config, writing the defaults out on first run so there is a
    /// file to edit.
    pub fn load_or_init(dir: &Path) -> Result<Self> {
        if dir.join(CONFIG_FILE).exists() {
            return Self::load(dir);
        }

        let config = Self::new();
        if let Err(e) = config.save(dir) {
            tracing::warn!(error = %e, "Could not write default config");
        }
        Ok(config)
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(dir.join(CONFIG_FILE), config_content)?;
        Ok(())
    }

    /// Command-line and environment values win over the file.
    pub fn apply_overrides(&mut self, server_url: Option<String>, poll_interval_secs: Option<u64>) {
        if let Some(url) = server_url {
            self.server_url = Some(url);
        }
        if let Some(secs) = poll_interval_secs {
            self.poll_interval_secs = Some(secs);
        }
    }

    pub fn server_url(&self) -> &str {
        self.server_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .unwrap_or(DEFAULT_SERVER_URL)
    }

    pub fn poll_interval(&self) -> Duration {
        let secs = self.poll_interval_secs.unwrap_or(DEFAULT_POLL_INTERVAL_SECS);
        Duration::from_secs(secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        let secs = self.request_timeout_secs.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
        Duration::from_secs(secs.max(1))
    }

    pub fn default_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join(APP_DIR))
    }
}
