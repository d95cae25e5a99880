use serde::{Deserialize, Serialize};

use super::goal::Cadence;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

/// A goal template from the catalog (`/goal-templates`).
///
/// The same shape is embedded in user goals under `GoalTemplate`, where the
/// backend may send only a subset of the fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GoalTemplate {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub base_xp: Option<i64>,
    #[serde(default)]
    pub frequency_type: Option<String>,
    #[serde(default)]
    pub frequency_interval: Option<i64>,
    #[serde(default)]
    pub max_per_period: Option<i64>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub visibility: Option<String>,
}

impl GoalTemplate {
    pub fn display_title(&self) -> String {
        self.title
            .clone()
            .unwrap_or_else(|| format!("Template #{}", self.id))
    }

    pub fn cadence(&self) -> Cadence {
        self.frequency_type
            .as_deref()
            .map(Cadence::parse_lenient)
            .unwrap_or_default()
    }

    /// Category filter (`None` = all) plus a case-insensitive text match over
    /// title, description, frequency and category name.
    pub fn matches(&self, category: Option<i64>, query: &str, categories: &[Category]) -> bool {
        if let Some(wanted) = category {
            if self.category_id != Some(wanted) {
                return false;
            }
        }
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return true;
        }
        let category_name = self
            .category_id
            .and_then(|id| categories.iter().find(|c| c.id == id))
            .map(|c| c.name.as_str())
            .unwrap_or("");
        let haystack = format!(
            "{} {} {} {}",
            self.title.as_deref().unwrap_or(""),
            self.description.as_deref().unwrap_or(""),
            self.frequency_type.as_deref().unwrap_or(""),
            category_name
        )
        .to_lowercase();
        haystack.contains(&query)
    }
}

/// Payload for `POST /goal-templates` when a user authors a custom goal
#[derive(Debug, Clone, Serialize)]
pub struct NewTemplate {
    pub title: String,
    pub description: Option<String>,
    pub category_id: Option<i64>,
    pub base_xp: i64,
    pub frequency_type: Cadence,
    pub frequency_interval: i64,
    pub max_per_period: i64,
    pub enabled: bool,
    pub visibility: String,
}

impl NewTemplate {
    /// A template private to its author, enabled, once per period
    pub fn private(title: &str, cadence: Cadence, base_xp: i64) -> Self {
        Self {
            title: title.trim().to_string(),
            description: None,
            category_id: None,
            base_xp,
            frequency_type: cadence,
            frequency_interval: 1,
            max_per_period: 1,
            enabled: true,
            visibility: "private".to_string(),
        }
    }

    pub fn with_description(mut self, description: Option<&str>) -> Self {
        self.description = description
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string);
        self
    }

    pub fn with_category(mut self, category_id: Option<i64>) -> Self {
        self.category_id = category_id;
        self
    }

    /// Intervals and per-period caps below 1 fall back to 1
    pub fn with_limits(mut self, frequency_interval: i64, max_per_period: i64) -> Self {
        self.frequency_interval = frequency_interval.max(1);
        self.max_per_period = max_per_period.max(1);
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.title.is_empty() {
            return Err("title is required".to_string());
        }
        if self.base_xp < 0 {
            return Err("base XP cannot be negative".to_string());
        }
        Ok(())
    }
}
