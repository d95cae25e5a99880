//! One module per group of subcommands.

pub mod account;
pub mod goals;
pub mod offline;
pub mod onboarding;
pub mod profile;
pub mod templates;

use chrono::Local;
use levelup_core::eligibility::is_eligible;
use levelup_core::models::UserGoal;
use levelup_core::utils::{format_date, truncate_string};

/// Width of the title column in goal listings
const TITLE_WIDTH: usize = 36;

/// One line per goal: eligibility, id, title, cadence, XP
pub(crate) fn print_goal_line(goal: &UserGoal) {
    let now = Local::now();
    let marker = if !goal.is_active() {
        "archived"
    } else if is_eligible(goal, &now) {
        "ready"
    } else {
        "done"
    };
    let next = match goal.next_eligible_at.as_deref() {
        Some(next) if marker == "done" => format!("  next: {}", format_date(next)),
        _ => String::new(),
    };
    println!(
        "  [{:<8}] #{:<5} {:<width$} {:<6} {:>4} XP{}",
        marker,
        goal.id,
        truncate_string(&goal.display_title(), TITLE_WIDTH),
        goal.effective_cadence(),
        goal.base_xp(),
        next,
        width = TITLE_WIDTH
    );
}
