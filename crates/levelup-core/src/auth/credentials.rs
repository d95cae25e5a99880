use anyhow::{Context, Result};
use keyring::Entry;

const SERVICE_NAME: &str = "levelup";

/// Remembered passwords, keyed by account email
pub struct CredentialStore;

impl CredentialStore {
    fn entry(email: &str) -> Result<Entry> {
        Entry::new(SERVICE_NAME, email.trim()).context("Failed to create keyring entry")
    }

    pub fn store(email: &str, password: &str) -> Result<()> {
        Self::entry(email)?
            .set_password(password)
            .context("Failed to store password in keychain")
    }

    pub fn get_password(email: &str) -> Result<String> {
        Self::entry(email)?
            .get_password()
            .context("No remembered password for this account")
    }

    /// Forget the password for `email`. Returns whether one was stored.
    pub fn delete(email: &str) -> Result<bool> {
        match Self::entry(email)?.delete_credential() {
            Ok(()) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(e) => Err(e).context("Failed to delete credential from keychain"),
        }
    }
}
