//! Authentication module for managing user sessions and credentials.
//!
//! This module provides:
//! - `Session`: bearer token + user id persisted between runs
//! - `CredentialStore`: optional OS-level password storage via keyring
//!
//! Tokens carry no client-side expiry; a 401 from the backend ends the
//! session.

pub mod credentials;
pub mod session;

pub use credentials::CredentialStore;
pub use session::{Session, SessionData};
