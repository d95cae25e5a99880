//! Small client-local flags: whether the offline cache was installed and
//! when the user last turned the install suggestion down.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

const FLAGS_FILE: &str = "flags.json";

/// Quiet period after the suggestion is dismissed
const DISMISS_DAYS: i64 = 30;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientFlags {
    /// Epoch millis of the last dismissal
    pub prompt_dismissed_at: Option<i64>,
    /// Epoch millis until which the suggestion is snoozed
    pub install_dismiss_until: Option<i64>,
    pub installed: bool,
}

impl ClientFlags {
    /// Missing or unreadable files yield default flags
    pub fn load(dir: &Path) -> Self {
        std::fs::read_to_string(Self::path(dir))
            .ok()
            .and_then(|contents| serde_json::from_str(&contents).ok())
            .unwrap_or_default()
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(Self::path(dir), contents).context("Failed to write client flags")?;
        Ok(())
    }

    fn path(dir: &Path) -> PathBuf {
        dir.join(FLAGS_FILE)
    }

    pub fn is_dismissed_recently(&self, now: DateTime<Utc>) -> bool {
        match self.prompt_dismissed_at {
            Some(ts) if ts > 0 => {
                now.timestamp_millis() - ts < Duration::days(DISMISS_DAYS).num_milliseconds()
            }
            _ => false,
        }
    }

    pub fn is_snoozed(&self, now: DateTime<Utc>) -> bool {
        self.install_dismiss_until
            .map(|until| until > now.timestamp_millis())
            .unwrap_or(false)
    }

    pub fn dismiss(&mut self, now: DateTime<Utc>) {
        self.prompt_dismissed_at = Some(now.timestamp_millis());
    }

    /// Snooze the suggestion for `days`. Fails if the end date is not
    /// representable.
    pub fn snooze(&mut self, days: i64, now: DateTime<Utc>) -> Result<()> {
        let until = Duration::try_days(days)
            .and_then(|span| now.checked_add_signed(span))
            .with_context(|| format!("Cannot snooze for {} days", days))?;
        self.install_dismiss_until = Some(until.timestamp_millis());
        Ok(())
    }

    pub fn mark_installed(&mut self) {
        self.installed = true;
    }

    pub fn should_offer_install(&self, now: DateTime<Utc>) -> bool {
        !self.installed && !self.is_dismissed_recently(now) && !self.is_snoozed(now)
    }
}
