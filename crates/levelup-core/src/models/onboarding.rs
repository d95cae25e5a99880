use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::lenient::as_integer;

/// Answers are given on a 1-5 agreement scale
pub const LIKERT_SCALE: std::ops::RangeInclusive<i64> = 1..=5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub question: String,
    #[serde(default)]
    pub sort_order: Option<i64>,
    #[serde(default)]
    pub category_id: Option<i64>,
}

/// Questionnaire as served by `GET /onboarding/questions`
#[derive(Debug, Clone, Default)]
pub struct QuestionSet {
    pub items: Vec<Question>,
    pub count: usize,
    pub language: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawQuestionSet {
    #[serde(default)]
    items: Option<Vec<Question>>,
    #[serde(default)]
    questions: Option<Vec<Question>>,
    #[serde(default)]
    count: Option<usize>,
    #[serde(default)]
    language: Option<String>,
}

impl QuestionSet {
    /// Normalize whichever shape the backend answered with.
    /// Questions come back ordered by `sort_order` (missing = 0).
    pub(crate) fn from_raw(raw: RawQuestionSet, requested_language: &str) -> Self {
        let mut items = raw.items.or(raw.questions).unwrap_or_default();
        items.sort_by_key(|q| q.sort_order.unwrap_or(0));
        let count = raw.count.unwrap_or(items.len());
        let language = raw
            .language
            .unwrap_or_else(|| requested_language.to_string());
        Self { items, count, language }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub question_id: i64,
    pub value: i64,
}

/// A loosely-typed answer as collected from a form or a JSON file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnswerInput {
    #[serde(default)]
    pub question_id: Option<Value>,
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub answer_value: Option<Value>,
}

impl AnswerInput {
    /// `question_id` falls back to `id`, `value` to `answer_value`.
    /// Returns `None` when either is not numeric.
    pub fn normalize(&self) -> Option<Answer> {
        let question_id = self
            .question_id
            .as_ref()
            .filter(|v| !v.is_null())
            .or(self.id.as_ref())
            .and_then(as_integer)?;
        let value = self
            .value
            .as_ref()
            .filter(|v| !v.is_null())
            .or(self.answer_value.as_ref())
            .and_then(as_integer)?;
        Some(Answer { question_id, value })
    }
}

/// Normalize a batch, silently dropping entries that are not numeric
pub fn normalize_answers(inputs: &[AnswerInput]) -> Vec<Answer> {
    inputs.iter().filter_map(AnswerInput::normalize).collect()
}

#[derive(Debug, Serialize)]
pub(crate) struct AnswerSubmission<'a> {
    pub user_id: i64,
    pub language: &'a str,
    pub answers: &'a [Answer],
}
