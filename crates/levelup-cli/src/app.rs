//! Application state shared by every command: configuration, API client
//! and the persisted session.

use std::path::PathBuf;

use anyhow::{bail, Result};
use tracing::{debug, info, warn};

use levelup_core::auth::{Session, SessionData};
use levelup_core::{ApiClient, ApiError, Config};

/// Where a user command may proceed, mirroring the web client's route guard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// No usable session
    LoggedOut,
    /// Logged in but the questionnaire is not done yet
    NeedsOnboarding,
    Ready,
}

impl Gate {
    /// `onboarding_done` is `None` when the check itself failed; the command
    /// is let through rather than blocking the user on an API hiccup.
    pub fn decide(authenticated: bool, onboarding_done: Option<bool>) -> Self {
        if !authenticated {
            Gate::LoggedOut
        } else if onboarding_done == Some(false) {
            Gate::NeedsOnboarding
        } else {
            Gate::Ready
        }
    }
}

pub struct App {
    pub config: Config,
    pub client: ApiClient,
    pub session: Session,
    cache_dir: PathBuf,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let cache_dir = config.cache_dir()?;
        let mut session = Session::new(cache_dir.clone());
        if let Err(e) = session.load() {
            warn!(error = %e, "Ignoring unreadable session file");
        }

        let mut client = ApiClient::new(&config.api_base)?;
        if let Some(token) = session.token() {
            client.set_token(token.to_string());
        }

        Ok(Self {
            config,
            client,
            session,
            cache_dir,
        })
    }

    pub fn cache_dir(&self) -> &PathBuf {
        &self.cache_dir
    }

    /// The logged-in user's id, without any onboarding check
    pub fn user_id(&self) -> Result<i64> {
        match self.session.user_id() {
            Some(id) if self.session.is_authenticated() => Ok(id),
            _ => bail!("Not logged in. Run `levelup login` first."),
        }
    }

    /// Guard for commands that need a fully set-up account
    pub async fn require_ready_user(&self) -> Result<i64> {
        let authenticated = self.session.is_authenticated();
        let onboarding_done = match self.session.user_id() {
            Some(id) if authenticated => match self.client.get_user(id).await {
                Ok(user) => Some(user.onboarding_done),
                Err(e) => {
                    debug!(error = %e, "Onboarding check failed, letting command through");
                    None
                }
            },
            _ => None,
        };

        match Gate::decide(authenticated, onboarding_done) {
            Gate::LoggedOut => bail!("Not logged in. Run `levelup login` first."),
            Gate::NeedsOnboarding => {
                bail!("Your profile is not set up yet. Run `levelup onboarding` first.")
            }
            Gate::Ready => self.user_id(),
        }
    }

    /// Persist a freshly issued token as the current session
    pub fn start_session(&mut self, token: String, email: Option<String>) -> Result<SessionData> {
        let data = SessionData::from_token(token, email.clone());
        if data.user_id.is_none() {
            bail!("Invalid token: no user id in payload");
        }
        self.client.set_token(data.token.clone());
        self.session.update(data.clone());
        self.session.save()?;

        if email.is_some() && self.config.last_email != email {
            self.config.last_email = email;
            if let Err(e) = self.config.save() {
                warn!(error = %e, "Failed to remember last email");
            }
        }
        info!(user_id = ?data.user_id, "Session started");
        Ok(data)
    }

    pub fn logout(&mut self) -> Result<()> {
        self.client.clear_token();
        self.session.clear()?;
        info!("Session cleared");
        Ok(())
    }

    /// Drop the session when the backend rejected the token.
    /// Returns whether the error was an authentication failure.
    pub fn handle_unauthorized(&mut self, err: &anyhow::Error) -> bool {
        let unauthorized = err
            .chain()
            .filter_map(|cause| cause.downcast_ref::<ApiError>())
            .any(ApiError::is_unauthorized);
        if unauthorized {
            if let Err(e) = self.logout() {
                warn!(error = %e, "Failed to clear session after 401");
            }
        }
        unauthorized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_decisions() {
        assert_eq!(Gate::decide(false, None), Gate::LoggedOut);
        assert_eq!(Gate::decide(false, Some(true)), Gate::LoggedOut);
        assert_eq!(Gate::decide(true, Some(false)), Gate::NeedsOnboarding);
        assert_eq!(Gate::decide(true, Some(true)), Gate::Ready);
        // A failed onboarding check does not block
        assert_eq!(Gate::decide(true, None), Gate::Ready);
    }
}
