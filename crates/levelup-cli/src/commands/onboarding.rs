use std::io::{self, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use levelup_core::models::{normalize_answers, Answer, AnswerInput, Question, LIKERT_SCALE};
use levelup_core::ApiError;

use crate::app::App;

fn read_answers_file(path: &Path) -> Result<Vec<Answer>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read answers from {}", path.display()))?;
    let inputs: Vec<AnswerInput> =
        serde_json::from_str(&content).context("Answers file must be a JSON array")?;
    let answers = normalize_answers(&inputs);
    if answers.is_empty() {
        bail!("No usable answers in {}", path.display());
    }
    Ok(answers)
}

/// Parse one Likert answer; `None` when out of range
fn parse_likert(input: &str) -> Option<i64> {
    input.trim().parse().ok().filter(|v| LIKERT_SCALE.contains(v))
}

fn ask(question: &Question, index: usize, total: usize) -> Result<Answer> {
    let (low, high) = (LIKERT_SCALE.start(), LIKERT_SCALE.end());
    loop {
        print!("[{}/{}] {} ({}-{}): ", index + 1, total, question.question, low, high);
        io::stdout().flush()?;
        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            bail!("Onboarding aborted");
        }
        match parse_likert(&line) {
            Some(value) => {
                return Ok(Answer {
                    question_id: question.id,
                    value,
                })
            }
            None => println!("  Please answer with a number from {} to {}.", low, high),
        }
    }
}

pub async fn run(app: &App, answers_file: Option<&Path>) -> Result<()> {
    let user_id = app.user_id()?;
    let lang = app.config.language.as_str();

    let answers = match answers_file {
        Some(path) => read_answers_file(path)?,
        None => {
            let set = app.client.get_questions(user_id, lang).await?;
            if set.items.is_empty() {
                bail!("The server returned no onboarding questions for '{}'", set.language);
            }
            println!("Rate each statement from {} (disagree) to {} (agree).", LIKERT_SCALE.start(), LIKERT_SCALE.end());
            let total = set.items.len();
            set.items
                .iter()
                .enumerate()
                .map(|(i, q)| ask(q, i, total))
                .collect::<Result<Vec<_>>>()?
        }
    };

    match app.client.submit_answers(user_id, &answers, lang).await {
        Ok(_) => {
            println!("Thanks! Your priorities are ready. Next: `levelup dashboard`");
            Ok(())
        }
        Err(e) if e.chain().any(|c| matches!(c.downcast_ref::<ApiError>(), Some(ApiError::Conflict(_)))) => {
            println!("Onboarding was already completed. Next: `levelup dashboard`");
            Ok(())
        }
        Err(e) => Err(e),
    }
}
