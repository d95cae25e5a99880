use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::template::GoalTemplate;

/// How often a goal can be completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cadence {
    #[default]
    Daily,
    Weekly,
}

impl Cadence {
    /// Lenient parse used on backend data: case-insensitive, anything
    /// unrecognized is treated as daily.
    pub fn parse_lenient(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("weekly") {
            Cadence::Weekly
        } else {
            Cadence::Daily
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Cadence::Daily => "daily",
            Cadence::Weekly => "weekly",
        }
    }
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Cadence {
    type Err = String;

    /// Strict parse for user input.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Cadence::Daily),
            "weekly" => Ok(Cadence::Weekly),
            other => Err(format!("unknown cadence '{}' (expected daily or weekly)", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalStatus {
    #[default]
    Active,
    Archived,
    #[serde(other)]
    Unknown,
}

impl GoalStatus {
    /// Value of the `status` query parameter when listing goals
    pub fn as_query(&self) -> &'static str {
        match self {
            GoalStatus::Active | GoalStatus::Unknown => "active",
            GoalStatus::Archived => "archived",
        }
    }
}

impl fmt::Display for GoalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GoalStatus::Active => write!(f, "active"),
            GoalStatus::Archived => write!(f, "archived"),
            GoalStatus::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GoalSchedule {
    #[serde(default)]
    pub cadence: Option<String>,
}

/// A goal adopted by a user, as returned by `GET /users/:id/user-goals`.
///
/// Timestamps are kept as raw strings: a malformed value must not make the
/// whole list fail to parse, and the eligibility evaluator treats
/// unparseable timestamps as absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserGoal {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub status: GoalStatus,
    #[serde(default)]
    pub schedule: Option<GoalSchedule>,
    #[serde(rename = "GoalTemplate", default)]
    pub template: Option<GoalTemplate>,
    #[serde(default)]
    pub cadence: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub goal_title: Option<String>,
    #[serde(default)]
    pub template_title: Option<String>,
    #[serde(default)]
    pub base_xp: Option<i64>,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub last_completed_at: Option<String>,
    // Older endpoints answer in camelCase
    #[serde(rename = "lastCompletedAt", default, skip_serializing_if = "Option::is_none")]
    pub last_completed_at_camel: Option<String>,
    #[serde(default)]
    pub next_eligible_at: Option<String>,
}

impl UserGoal {
    /// Display title, falling back through the template and legacy fields
    pub fn display_title(&self) -> String {
        self.template
            .as_ref()
            .and_then(|t| t.title.clone())
            .or_else(|| self.title.clone())
            .or_else(|| self.goal_title.clone())
            .or_else(|| self.template_title.clone())
            .unwrap_or_else(|| format!("Goal #{}", self.id))
    }

    /// Effective cadence: the user's schedule wins over the template's
    /// frequency, which wins over a bare `cadence` field. Blank values are
    /// skipped.
    pub fn effective_cadence(&self) -> Cadence {
        let present = |s: &&str| !s.trim().is_empty();
        let raw = self
            .schedule
            .as_ref()
            .and_then(|s| s.cadence.as_deref())
            .filter(present)
            .or_else(|| {
                self.template
                    .as_ref()
                    .and_then(|t| t.frequency_type.as_deref())
                    .filter(present)
            })
            .or_else(|| self.cadence.as_deref().filter(present));
        raw.map(Cadence::parse_lenient).unwrap_or_default()
    }

    pub fn base_xp(&self) -> i64 {
        self.template
            .as_ref()
            .and_then(|t| t.base_xp)
            .or(self.base_xp)
            .unwrap_or(0)
    }

    pub fn category_id(&self) -> Option<i64> {
        self.template
            .as_ref()
            .and_then(|t| t.category_id)
            .or(self.category_id)
    }

    /// Last completion timestamp, whichever spelling the backend used.
    /// Empty strings count as missing.
    pub fn last_completed(&self) -> Option<&str> {
        self.last_completed_at
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.last_completed_at_camel.as_deref().filter(|s| !s.is_empty()))
    }

    pub fn is_active(&self) -> bool {
        self.status == GoalStatus::Active
    }

    /// Case-insensitive match against title, cadence and base XP
    pub fn matches_filter(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return true;
        }
        let haystack = format!(
            "{} {} {}",
            self.display_title(),
            self.effective_cadence(),
            self.base_xp()
        )
        .to_lowercase();
        haystack.contains(&query)
    }
}

/// Result of `PATCH /users/:id/user-goals/:goal/complete`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionResult {
    #[serde(default)]
    pub xp_awarded: Option<i64>,
    #[serde(rename = "newLevel", alias = "new_level", default)]
    pub new_level: Option<i64>,
}

impl CompletionResult {
    pub fn summary(&self) -> String {
        let xp = self.xp_awarded.unwrap_or(0);
        match self.new_level {
            Some(level) => format!("+{} XP (level {})", xp, level),
            None => format!("+{} XP", xp),
        }
    }
}
