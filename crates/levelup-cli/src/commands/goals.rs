use anyhow::{bail, Result};
use chrono::{DateTime, Local, TimeZone};
use futures::future::join4;
use levelup_core::eligibility::is_eligible;
use levelup_core::flags::ClientFlags;
use levelup_core::models::{Cadence, GoalStatus, UserGoal};
use levelup_core::utils::progress_bar;
use levelup_core::is_eligible_now;
use tracing::{debug, warn};

use super::print_goal_line;
use crate::app::App;

/// Width of the XP bar on the dashboard
const XP_BAR_WIDTH: usize = 30;

/// Active goals, eligible ones first, then by title
fn sort_for_dashboard<Tz: TimeZone>(goals: &mut [UserGoal], now: &DateTime<Tz>) {
    goals.sort_by_cached_key(|g| (!is_eligible(g, now), g.display_title().to_lowercase()));
}

pub async fn dashboard(app: &App) -> Result<()> {
    let user_id = app.require_ready_user().await?;
    let lang = app.config.language.as_str();

    let (user, priorities, goals, quote) = join4(
        app.client.get_user(user_id),
        app.client.get_priorities(user_id),
        app.client.list_user_goals(user_id, GoalStatus::Active),
        app.client.today_quote(lang),
    )
    .await;
    let user = user?;
    let mut goals = goals?;
    let priorities = priorities.unwrap_or_else(|e| {
        warn!(error = %e, "Could not load priorities");
        Vec::new()
    });

    println!("{}  -  level {}", user.display_name(), user.level());
    let percent = user.progress_percent();
    println!("  {} {:>3}%  ({} XP)", progress_bar(percent, XP_BAR_WIDTH), percent, user.xp());

    match quote {
        Ok(Some(quote)) => println!("\n  {}", quote),
        Ok(None) => {}
        Err(e) => debug!(error = %e, "No quote today"),
    }

    if !priorities.is_empty() {
        println!("\nPriorities:");
        for (rank, p) in priorities.iter().enumerate() {
            println!("  {}. {} ({:.1})", rank + 1, p.display_name(), p.score());
        }
    }

    let now = Local::now();
    sort_for_dashboard(&mut goals, &now);
    let ready = goals.iter().filter(|g| is_eligible(*g, &now)).count();
    println!("\nGoals ({} ready of {}):", ready, goals.len());
    if goals.is_empty() {
        println!("  No active goals. Browse `levelup templates` to adopt one.");
    }
    for goal in &goals {
        print_goal_line(goal);
    }

    let flags = ClientFlags::load(app.cache_dir());
    if flags.should_offer_install(chrono::Utc::now()) {
        println!("\nTip: `levelup offline install` keeps the app usable without a network.");
    }
    Ok(())
}

pub async fn list(app: &App, archived: bool, filter: Option<String>) -> Result<()> {
    let user_id = app.require_ready_user().await?;
    let status = if archived { GoalStatus::Archived } else { GoalStatus::Active };
    let goals = app.client.list_user_goals(user_id, status).await?;
    let query = filter.unwrap_or_default();

    let shown: Vec<&UserGoal> = goals.iter().filter(|g| g.matches_filter(&query)).collect();
    if shown.is_empty() {
        println!("No {} goals found.", status.as_query());
        return Ok(());
    }
    for goal in shown {
        print_goal_line(goal);
    }
    Ok(())
}

async fn find_goal(app: &App, user_id: i64, goal_id: i64) -> Result<UserGoal> {
    let goals = app.client.list_user_goals(user_id, GoalStatus::Active).await?;
    match goals.into_iter().find(|g| g.id == goal_id) {
        Some(goal) => Ok(goal),
        None => bail!("No active goal #{}", goal_id),
    }
}

pub async fn complete(app: &App, goal_id: i64) -> Result<()> {
    let user_id = app.require_ready_user().await?;
    let goal = find_goal(app, user_id, goal_id).await?;
    if !is_eligible_now(&goal) {
        let period = match goal.effective_cadence() {
            Cadence::Daily => "today",
            Cadence::Weekly => "this week",
        };
        bail!("\"{}\" is already completed {}", goal.display_title(), period);
    }

    let result = app.client.complete_user_goal(user_id, goal_id).await?;
    println!("{}: {}", goal.display_title(), result.summary());
    Ok(())
}

pub async fn archive(app: &App, goal_id: i64) -> Result<()> {
    let user_id = app.require_ready_user().await?;
    app.client.archive_goal(user_id, goal_id).await?;
    println!("Goal #{} archived.", goal_id);
    Ok(())
}

pub async fn unarchive(app: &App, goal_id: i64) -> Result<()> {
    let user_id = app.require_ready_user().await?;
    app.client.unarchive_goal(user_id, goal_id).await?;
    println!("Goal #{} restored.", goal_id);
    Ok(())
}

pub async fn schedule(app: &App, goal_id: i64, cadence: Cadence) -> Result<()> {
    let user_id = app.require_ready_user().await?;
    app.client.set_goal_schedule(user_id, goal_id, cadence).await?;
    println!("Goal #{} is now {}.", goal_id, cadence);
    Ok(())
}

pub async fn delete(app: &App, goal_id: i64, yes: bool) -> Result<()> {
    if !yes {
        bail!("Deleting goal #{} cannot be undone; pass --yes to confirm", goal_id);
    }
    let user_id = app.require_ready_user().await?;
    app.client.delete_goal(user_id, goal_id).await?;
    println!("Goal #{} deleted.", goal_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn goal(id: i64, title: &str, last_completed_at: Option<String>) -> UserGoal {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "title": title,
            "cadence": "daily",
            "last_completed_at": last_completed_at,
        }))
        .unwrap()
    }

    #[test]
    fn test_dashboard_order_puts_ready_goals_first() {
        let now = DateTime::parse_from_rfc3339("2025-06-11T23:59:59+02:00").unwrap();
        let mut goals = vec![
            goal(1, "Alpha", Some("2025-06-11T08:00:00+02:00".to_string())),
            goal(2, "zeta", None),
            goal(3, "Beta", None),
        ];
        sort_for_dashboard(&mut goals, &now);
        let ids: Vec<i64> = goals.iter().map(|g| g.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }
}
