//! Application configuration management.
//!
//! This module handles loading and saving the client configuration: which
//! backend to talk to, which web origin the offline cache serves, the
//! questionnaire language and the cache region version.
//!
//! Configuration is stored at `~/.config/levelup/config.json`; the
//! `LEVELUP_API_BASE`, `LEVELUP_APP_ORIGIN` and `LEVELUP_LANG` environment
//! variables override the file.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::DEFAULT_API_BASE;
use crate::cache::controller::DEFAULT_CACHE_NAME;

/// Application name used for config/cache directory paths
pub const APP_NAME: &str = "levelup";

/// Config file name
const CONFIG_FILE: &str = "config.json";

pub const DEFAULT_APP_ORIGIN: &str = "https://levelup-app.onrender.com";

pub const DEFAULT_LANGUAGE: &str = "fr";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base: String,
    pub app_origin: String,
    pub language: String,
    pub cache_version: String,
    pub last_email: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            app_origin: DEFAULT_APP_ORIGIN.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            cache_version: DEFAULT_CACHE_NAME.to_string(),
            last_email: None,
        }
    }
}

impl Config {
    /// Load from disk, then apply environment overrides
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            serde_json::from_str(&contents)?
        } else {
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        debug!(api_base = %config.api_base, origin = %config.app_origin, "Loaded config");
        Ok(config)
    }

    /// Override fields from the environment. Empty values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(v) = get("LEVELUP_API_BASE") {
            self.api_base = v;
        }
        if let Some(v) = get("LEVELUP_APP_ORIGIN") {
            self.app_origin = v;
        }
        if let Some(v) = get("LEVELUP_LANG") {
            self.language = v;
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME))
    }

    fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }
}
