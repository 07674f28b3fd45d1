//! CLI configuration file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use drivepicker_storage::{AuthOptions, ClientIds, OAuthConfig};

/// Environment variable that overrides `api_key`.
pub const API_KEY_ENV: &str = "DRIVEPICKER_API_KEY";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    #[serde(default)]
    pub api_key: String,
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub scopes: Option<Vec<String>>,
    #[serde(default)]
    pub token_path: Option<PathBuf>,
    #[serde(default)]
    pub download_dir: Option<PathBuf>,
}

impl CliConfig {
    /// `<config dir>/drivepicker/config.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("drivepicker").join("config.json"))
    }

    /// Read the file at `path` and apply the environment override.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config.with_api_key_override(std::env::var(API_KEY_ENV).ok()))
    }

    fn with_api_key_override(mut self, api_key: Option<String>) -> Self {
        if let Some(key) = api_key.filter(|k| !k.is_empty()) {
            self.api_key = key;
        }
        self
    }

    pub fn auth_options(&self) -> Result<AuthOptions> {
        if self.api_key.is_empty() {
            anyhow::bail!("No API key: set api_key in the config file or {}", API_KEY_ENV);
        }
        let mut options = AuthOptions::new(self.api_key.clone(), ClientIds::all(&self.client_id));
        options.client_secret = self.client_secret.clone();
        options.scopes = self.scopes.clone();
        Ok(options)
    }

    pub fn oauth_config(&self) -> OAuthConfig {
        let mut config = OAuthConfig::default();
        if let Some(path) = &self.token_path {
            config.token_path = Some(path.clone());
        }
        config
    }

    /// Download directory: `--out`, then the config file, then the user's
    /// download folder, then the working directory.
    pub fn download_dir(&self, out: Option<PathBuf>) -> PathBuf {
        out.or_else(|| self.download_dir.clone())
            .or_else(dirs::download_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}
