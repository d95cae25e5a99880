//! LevelUp core library.
//!
//! Everything a LevelUp front-end needs besides rendering:
//!
//! - `api`: typed client for the LevelUp REST backend
//! - `auth`: bearer-token session and keychain credentials
//! - `eligibility`: may a daily/weekly goal be completed right now
//! - `cache`: offline cache controller (network-first / cache-first)
//! - `stats`: profile statistics over the user's goals
//! - `flags`, `config`: small persisted client state

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod eligibility;
pub mod flags;
pub mod models;
pub mod stats;
pub mod utils;

pub use api::{ApiClient, ApiError};
pub use config::Config;
pub use eligibility::{is_eligible, is_eligible_now, CompletionSchedule};
