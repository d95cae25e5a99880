use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::user_id_from_token;

/// Session file name in cache directory
const SESSION_FILE: &str = "session.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    pub token: String,
    pub user_id: Option<i64>,
    #[serde(default)]
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SessionData {
    /// Build a session from a freshly issued token, reading the user id
    /// from its payload
    pub fn from_token(token: String, email: Option<String>) -> Self {
        let user_id = user_id_from_token(&token);
        Self {
            token,
            user_id,
            email,
            created_at: Utc::now(),
        }
    }

    /// Both a token and a user id are needed to call user endpoints
    pub fn is_authenticated(&self) -> bool {
        !self.token.is_empty() && self.user_id.is_some()
    }
}

pub struct Session {
    cache_dir: PathBuf,
    pub data: Option<SessionData>,
}

impl Session {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self {
            cache_dir,
            data: None,
        }
    }

    /// Load session from disk. Returns whether an authenticated session was found.
    pub fn load(&mut self) -> Result<bool> {
        let path = self.session_path();
        if !path.exists() {
            return Ok(false);
        }
        let contents = std::fs::read_to_string(&path)
            .context("Failed to read session file")?;
        let mut data: SessionData = serde_json::from_str(&contents)
            .context("Failed to parse session file")?;

        // Older session files may predate the stored user id
        if data.user_id.is_none() {
            data.user_id = user_id_from_token(&data.token);
        }
        let authenticated = data.is_authenticated();
        debug!(authenticated, "Loaded session");
        self.data = Some(data);
        Ok(authenticated)
    }

    /// Save session to disk
    pub fn save(&self) -> Result<()> {
        if let Some(ref data) = self.data {
            let path = self.session_path();
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let contents = serde_json::to_string_pretty(data)?;
            std::fs::write(path, contents)?;
        }
        Ok(())
    }

    /// Clear session data
    pub fn clear(&mut self) -> Result<()> {
        self.data = None;
        let path = self.session_path();
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    /// Update session with new data
    pub fn update(&mut self, data: SessionData) {
        self.data = Some(data);
    }

    /// Get the bearer token if a session exists
    pub fn token(&self) -> Option<&str> {
        self.data.as_ref().map(|d| d.token.as_str())
    }

    pub fn user_id(&self) -> Option<i64> {
        self.data.as_ref().and_then(|d| d.user_id)
    }

    pub fn is_authenticated(&self) -> bool {
        self.data
            .as_ref()
            .map(SessionData::is_authenticated)
            .unwrap_or(false)
    }

    fn session_path(&self) -> PathBuf {
        self.cache_dir.join(SESSION_FILE)
    }
}
