//! Data models for LevelUp entities.
//!
//! This module contains the data structures returned by the LevelUp
//! backend:
//!
//! - `UserGoal`, `Cadence`, `GoalStatus`: goals a user tracks
//! - `GoalTemplate`, `NewTemplate`, `Category`: the goal catalog
//! - `User`, `XpProgress`, `Priority`: profile, XP and computed priorities
//! - `Question`, `QuestionSet`, `Answer`: the onboarding questionnaire
//! - `Quote`: the motivational quote of the day
//!
//! The backend is loose about field names, so most fields are optional and
//! the display helpers walk the same fallback chains the web client used.

pub mod goal;
mod lenient;
pub mod onboarding;
pub mod quote;
pub mod template;
pub mod user;

pub use goal::{Cadence, CompletionResult, GoalSchedule, GoalStatus, UserGoal};
pub use onboarding::{normalize_answers, Answer, AnswerInput, Question, QuestionSet, LIKERT_SCALE};
pub use quote::Quote;
pub use template::{Category, GoalTemplate, NewTemplate};
pub use user::{Priority, User, UserUpdate, XpProgress};
