//! Application configuration management.
//!
//! This module handles loading and saving the client configuration: the
//! content API location, where credentials are kept, and the last email
//! used to sign in.
//!
//! Configuration is stored at `~/.config/newsdesk/config.json`; credential
//! files live under the platform data directory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::auth::{CredentialStore, FileCredentialStore, KeyringCredentialStore};

/// Application name used for config/data directory paths
const APP_NAME: &str = "newsdesk";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Content API used when neither the environment nor the config names one
const DEFAULT_API_URL: &str = "http://localhost:3000/api";

/// Environment variable overriding the configured API location
pub const API_URL_ENV: &str = "NEWSDESK_API_URL";

/// Where the credential record is persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CredentialBackend {
    #[default]
    File,
    Keyring,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub credential_backend: CredentialBackend,
    #[serde(default)]
    pub last_email: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path).context("Failed to read config file")?;
            serde_json::from_str(&contents).context("Failed to parse config file")
        } else {
            debug!(?path, "No config file, using defaults");
            Ok(Self::default())
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents).context("Failed to write config file")?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        let data_dir = dirs::data_local_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    /// API location: environment first, then config, then the built-in default
    pub fn api_base_url(&self) -> String {
        resolve_api_url(std::env::var(API_URL_ENV).ok(), self.api_base_url.as_deref())
    }

    /// Open the credential store selected by `credential_backend`
    pub fn credential_store(&self) -> Result<Box<dyn CredentialStore>> {
        let store: Box<dyn CredentialStore> = match self.credential_backend {
            CredentialBackend::File => Box::new(FileCredentialStore::new(self.data_dir()?)),
            CredentialBackend::Keyring => Box::new(KeyringCredentialStore::default()),
        };
        Ok(store)
    }
}

fn resolve_api_url(from_env: Option<String>, configured: Option<&str>) -> String {
    from_env
        .filter(|url| !url.trim().is_empty())
        .or_else(|| configured.filter(|url| !url.trim().is_empty()).map(str::to_string))
        .unwrap_or_else(|| DEFAULT_API_URL.to_string())
}
