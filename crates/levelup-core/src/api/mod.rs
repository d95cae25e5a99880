//! REST API client module for the LevelUp backend.
//!
//! This module provides the `ApiClient` for users, goals, goal templates,
//! categories, onboarding and quotes.
//!
//! The API uses JWT bearer token authentication; the user id is read from
//! the token payload.

pub mod client;
pub mod error;

pub use client::{user_id_from_token, ApiClient, AuthResponse, DEFAULT_API_BASE};
pub use error::ApiError;
