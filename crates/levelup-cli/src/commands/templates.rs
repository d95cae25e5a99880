use anyhow::{bail, Result};
use levelup_core::models::{Cadence, Category, GoalTemplate, NewTemplate};
use levelup_core::utils::truncate_string;
use tracing::warn;

use crate::app::App;

const TITLE_WIDTH: usize = 40;

/// Category id from either a numeric id or a (case-insensitive) name
fn resolve_category(arg: &str, categories: &[Category]) -> Option<i64> {
    let arg = arg.trim();
    arg.parse().ok().or_else(|| {
        categories
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(arg))
            .map(|c| c.id)
    })
}

fn category_name(id: Option<i64>, categories: &[Category]) -> &str {
    id.and_then(|id| categories.iter().find(|c| c.id == id))
        .map(|c| c.name.as_str())
        .unwrap_or("-")
}

pub async fn list(app: &App, category: Option<String>, filter: Option<String>) -> Result<()> {
    app.require_ready_user().await?;
    let (templates, categories) = futures::join!(app.client.list_templates(), app.client.list_categories());
    let templates = templates?;
    let categories = categories.unwrap_or_else(|e| {
        warn!(error = %e, "Could not load categories");
        Vec::new()
    });

    let category_id = match category.as_deref() {
        Some(arg) => match resolve_category(arg, &categories) {
            Some(id) => Some(id),
            None => bail!("Unknown category '{}'", arg),
        },
        None => None,
    };
    let query = filter.unwrap_or_default();

    let shown: Vec<&GoalTemplate> = templates
        .iter()
        .filter(|t| t.enabled != Some(false))
        .filter(|t| t.matches(category_id, &query, &categories))
        .collect();
    if shown.is_empty() {
        println!("No templates match.");
        return Ok(());
    }
    for t in shown {
        println!(
            "  #{:<5} {:<width$} {:<6} {:>4} XP  {}",
            t.id,
            truncate_string(&t.display_title(), TITLE_WIDTH),
            t.cadence(),
            t.base_xp.unwrap_or(0),
            category_name(t.category_id, &categories),
            width = TITLE_WIDTH
        );
    }
    Ok(())
}

pub async fn adopt(app: &App, template_id: i64, cadence: Option<Cadence>) -> Result<()> {
    let user_id = app.require_ready_user().await?;
    let template = app.client.get_template(template_id).await?;
    let cadence = cadence.unwrap_or_else(|| template.cadence());
    let goal = app.client.add_user_goal(user_id, template_id, cadence).await?;
    println!(
        "Added \"{}\" as goal #{} ({}).",
        template.display_title(),
        goal.id,
        cadence
    );
    Ok(())
}

pub struct NewGoalArgs {
    pub title: String,
    pub cadence: Cadence,
    pub xp: i64,
    pub description: Option<String>,
    pub category: Option<String>,
}

/// Author a private template and adopt it straight away
pub async fn create_goal(app: &App, args: NewGoalArgs) -> Result<()> {
    let user_id = app.require_ready_user().await?;
    let category_id = match args.category.as_deref() {
        Some(arg) => {
            let categories = app.client.list_categories().await?;
            match resolve_category(arg, &categories) {
                Some(id) => Some(id),
                None => bail!("Unknown category '{}'", arg),
            }
        }
        None => None,
    };

    let new_template = NewTemplate::private(&args.title, args.cadence, args.xp)
        .with_description(args.description.as_deref())
        .with_category(category_id);
    let template = app.client.create_template(&new_template).await?;
    let goal = app.client.add_user_goal(user_id, template.id, args.cadence).await?;
    println!("Created \"{}\" as goal #{}.", new_template.title, goal.id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn categories() -> Vec<Category> {
        vec![
            Category { id: 1, name: "Health".to_string() },
            Category { id: 2, name: "Learning".to_string() },
        ]
    }

    #[test]
    fn test_resolve_category() {
        let cats = categories();
        assert_eq!(resolve_category("2", &cats), Some(2));
        assert_eq!(resolve_category("health", &cats), Some(1));
        assert_eq!(resolve_category(" Learning ", &cats), Some(2));
        assert_eq!(resolve_category("Sleep", &cats), None);
    }

    #[test]
    fn test_category_name() {
        let cats = categories();
        assert_eq!(category_name(Some(1), &cats), "Health");
        assert_eq!(category_name(Some(9), &cats), "-");
        assert_eq!(category_name(None, &cats), "-");
    }
}
