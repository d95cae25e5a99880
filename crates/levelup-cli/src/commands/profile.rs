use anyhow::{bail, Result};
use chrono::Local;
use futures::future::join3;
use levelup_core::models::{GoalStatus, UserGoal, UserUpdate};
use levelup_core::stats::GoalStats;
use levelup_core::utils::progress_bar;
use tracing::warn;

use super::print_goal_line;
use crate::app::App;

pub async fn show(app: &App, username: Option<String>, email: Option<String>) -> Result<()> {
    let user_id = app.require_ready_user().await?;

    let update = UserUpdate { email, username };
    if !update.is_empty() {
        let user = app.client.update_user(user_id, &update).await?;
        println!("Profile updated: {}", user.display_name());
    }

    let (user, (active, archived), categories) = join3(
        app.client.get_user(user_id),
        async {
            futures::join!(
                app.client.list_user_goals(user_id, GoalStatus::Active),
                app.client.list_user_goals(user_id, GoalStatus::Archived)
            )
        },
        app.client.list_categories(),
    )
    .await;
    let user = user?;
    let mut goals: Vec<UserGoal> = active?;
    goals.extend(archived.unwrap_or_else(|e| {
        warn!(error = %e, "Could not load archived goals");
        Vec::new()
    }));
    let categories = categories.unwrap_or_default();

    let stats = GoalStats::compute(&goals, &categories, &Local::now());

    println!("{}", user.display_name());
    if let Some(email) = &user.email {
        println!("  {}", email);
    }
    println!(
        "  level {}  {} {}%",
        user.level(),
        progress_bar(user.progress_percent(), 20),
        user.progress_percent()
    );
    println!();
    println!("Goals:    {} active, {} archived", stats.active, stats.archived);
    println!("Cadence:  {} daily, {} weekly", stats.daily, stats.weekly);
    println!("Ready:    {} of {} active goals", stats.eligible_today, stats.active);

    if !stats.top_categories.is_empty() {
        println!("\nTop categories:");
        for c in &stats.top_categories {
            println!("  {:<20} {}", c.name, c.count);
        }
    }
    if !stats.next_up.is_empty() {
        println!("\nNext up:");
        for goal in &stats.next_up {
            print_goal_line(goal);
        }
    }
    Ok(())
}

pub async fn priorities(app: &App, order: Option<Vec<i64>>) -> Result<()> {
    let user_id = app.require_ready_user().await?;
    let current = app.client.get_priorities(user_id).await?;

    if let Some(order) = order {
        let mut known: Vec<i64> = current.iter().map(|p| p.category_id).collect();
        let mut wanted = order.clone();
        known.sort_unstable();
        wanted.sort_unstable();
        if known != wanted {
            bail!("--order must list each of your priority categories exactly once: {:?}", known);
        }
        app.client.save_priority_order(user_id, &order).await?;
        println!("Priority order saved.");
        return Ok(());
    }

    if current.is_empty() {
        println!("No priorities yet. Run `levelup onboarding` to compute them.");
    }
    for (rank, p) in current.iter().enumerate() {
        println!("  {}. #{:<4} {:<20} {:.1}", rank + 1, p.category_id, p.display_name(), p.score());
    }
    Ok(())
}

pub async fn quote(app: &App) -> Result<()> {
    match app.client.today_quote(&app.config.language).await? {
        Some(quote) => println!("{}", quote),
        None => println!("No quote today."),
    }
    Ok(())
}
