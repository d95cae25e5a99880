//! Profile statistics computed client-side from the user's goals.

use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};

use crate::eligibility::{is_eligible, parse_timestamp};
use crate::models::{Cadence, Category, GoalStatus, UserGoal};

/// How many categories / upcoming goals the profile shows
const TOP_N: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryCount {
    pub id: i64,
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default)]
pub struct GoalStats {
    pub total: usize,
    pub active: usize,
    pub archived: usize,
    pub daily: usize,
    pub weekly: usize,
    /// Active goals that can be completed right now
    pub eligible_today: usize,
    /// Categories with the most active goals, largest first
    pub top_categories: Vec<CategoryCount>,
    /// Active goals ordered by when they next open up
    pub next_up: Vec<UserGoal>,
}

impl GoalStats {
    pub fn compute<Tz: TimeZone>(goals: &[UserGoal], categories: &[Category], now: &DateTime<Tz>) -> Self {
        let active: Vec<&UserGoal> = goals.iter().filter(|g| g.is_active()).collect();

        let mut by_category: HashMap<i64, usize> = HashMap::new();
        for goal in &active {
            if let Some(id) = goal.category_id() {
                *by_category.entry(id).or_insert(0) += 1;
            }
        }
        let mut top_categories: Vec<CategoryCount> = by_category
            .into_iter()
            .map(|(id, count)| CategoryCount {
                id,
                name: categories
                    .iter()
                    .find(|c| c.id == id)
                    .map(|c| c.name.clone())
                    .unwrap_or_else(|| format!("Category {}", id)),
                count,
            })
            .collect();
        // Ties broken by id so the order is stable
        top_categories.sort_by(|a, b| b.count.cmp(&a.count).then(a.id.cmp(&b.id)));
        top_categories.truncate(TOP_N);

        // Goals without a (valid) next window sort first: they are open now
        let mut upcoming: Vec<(i64, &UserGoal)> = active
            .iter()
            .map(|g| {
                let when = g
                    .next_eligible_at
                    .as_deref()
                    .and_then(|raw| parse_timestamp(raw, &Utc))
                    .map(|t| t.timestamp_millis())
                    .unwrap_or(0);
                (when, *g)
            })
            .collect();
        upcoming.sort_by_key(|(when, _)| *when);
        let next_up = upcoming
            .into_iter()
            .take(TOP_N)
            .map(|(_, g)| g.clone())
            .collect();

        Self {
            total: goals.len(),
            active: active.len(),
            archived: goals.iter().filter(|g| g.status == GoalStatus::Archived).count(),
            daily: goals.iter().filter(|g| g.effective_cadence() == Cadence::Daily).count(),
            weekly: goals.iter().filter(|g| g.effective_cadence() == Cadence::Weekly).count(),
            eligible_today: active.iter().filter(|g| is_eligible(**g, now)).count(),
            top_categories,
            next_up,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn goals() -> Vec<UserGoal> {
        serde_json::from_value(json!([
            { "id": 1, "status": "active", "GoalTemplate": { "id": 10, "category_id": 1, "frequency_type": "daily" },
              "last_completed_at": "2025-06-11T08:00:00Z" },
            { "id": 2, "status": "active", "GoalTemplate": { "id": 11, "category_id": 1, "frequency_type": "weekly" },
              "next_eligible_at": "2025-06-16T00:00:00Z" },
            { "id": 3, "status": "active", "category_id": 2, "cadence": "daily" },
            { "id": 4, "status": "archived", "category_id": 2, "cadence": "weekly" },
            { "id": 5, "status": "active", "category_id": 3, "next_eligible_at": "2025-06-12T00:00:00Z" }
        ]))
        .unwrap()
    }

    #[test]
    fn test_counts() {
        let now = DateTime::parse_from_rfc3339("2025-06-11T12:00:00Z").unwrap();
        let stats = GoalStats::compute(&goals(), &[], &now);
        assert_eq!(stats.total, 5);
        assert_eq!(stats.active, 4);
        assert_eq!(stats.archived, 1);
        assert_eq!(stats.daily, 3);
        assert_eq!(stats.weekly, 2);
        // 1 completed today, 2 and 5 not open yet, 3 never completed
        assert_eq!(stats.eligible_today, 1);
    }

    #[test]
    fn test_top_categories_only_count_active_goals() {
        let now = DateTime::parse_from_rfc3339("2025-06-11T12:00:00Z").unwrap();
        let categories = vec![Category { id: 1, name: "Health".to_string() }];
        let stats = GoalStats::compute(&goals(), &categories, &now);
        assert_eq!(
            stats.top_categories,
            vec![
                CategoryCount { id: 1, name: "Health".to_string(), count: 2 },
                CategoryCount { id: 2, name: "Category 2".to_string(), count: 1 },
                CategoryCount { id: 3, name: "Category 3".to_string(), count: 1 },
            ]
        );
    }

    #[test]
    fn test_next_up_orders_by_next_window() {
        let now = DateTime::parse_from_rfc3339("2025-06-11T12:00:00Z").unwrap();
        let stats = GoalStats::compute(&goals(), &[], &now);
        let ids: Vec<i64> = stats.next_up.iter().map(|g| g.id).collect();
        assert_eq!(ids, vec![1, 3, 5, 2]);
    }
}
