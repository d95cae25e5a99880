use serde::{Deserialize, Serialize};

use super::lenient;
use super::template::Category;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub level: Option<i64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub xp: Option<i64>,
    #[serde(default)]
    pub xp_progress: Option<XpProgress>,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub onboarding_done: bool,
}

impl User {
    pub fn display_name(&self) -> String {
        self.username
            .clone()
            .or_else(|| self.email.clone())
            .unwrap_or_else(|| format!("User #{}", self.id))
    }

    pub fn level(&self) -> i64 {
        self.level.unwrap_or(0)
    }

    pub fn xp(&self) -> i64 {
        self.xp.unwrap_or(0)
    }

    pub fn progress_percent(&self) -> u8 {
        self.xp_progress
            .as_ref()
            .map(XpProgress::percent)
            .unwrap_or(0)
    }
}

/// Progress through the current level, as computed by the backend
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct XpProgress {
    #[serde(default)]
    pub current: Option<f64>,
    #[serde(default)]
    pub span: Option<f64>,
    #[serde(default)]
    pub percent: Option<f64>,
}

impl XpProgress {
    /// Percentage towards the next level.
    ///
    /// The server's `percent` wins when it is a finite number; otherwise it is
    /// derived from `current / span`, clamped to 0..=100.
    pub fn percent(&self) -> u8 {
        if let Some(p) = self.percent.filter(|p| p.is_finite()) {
            return p.round().clamp(0.0, 100.0) as u8;
        }
        let span = self.span.unwrap_or(0.0);
        let current = self.current.unwrap_or(0.0);
        if span > 0.0 && current >= 0.0 {
            (current / span * 100.0).round().clamp(0.0, 100.0) as u8
        } else {
            0
        }
    }
}

/// Partial profile update; only the provided fields are sent
#[derive(Debug, Clone, Default, Serialize)]
pub struct UserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.username.is_none()
    }
}

/// A category priority computed by the backend from onboarding answers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Priority {
    pub category_id: i64,
    #[serde(rename = "Category", default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub category_name: Option<String>,
    #[serde(default)]
    pub score: Option<serde_json::Value>,
    #[serde(default)]
    pub score_value: Option<f64>,
}

impl Priority {
    pub fn display_name(&self) -> String {
        self.category
            .as_ref()
            .map(|c| c.name.clone())
            .or_else(|| self.category_name.clone())
            .unwrap_or_else(|| format!("Category {}", self.category_id))
    }

    /// Numeric `score` if the backend sent a number, else `score_value`, else 0
    pub fn score(&self) -> f64 {
        self.score
            .as_ref()
            .and_then(serde_json::Value::as_f64)
            .or(self.score_value)
            .unwrap_or(0.0)
    }
}
