use std::io::{self, Write};

use anyhow::{bail, Context, Result};
use levelup_core::api::user_id_from_token;
use levelup_core::auth::CredentialStore;
use tracing::warn;

use crate::app::App;

fn prompt(label: &str, default: Option<&str>) -> Result<String> {
    match default {
        Some(d) => print!("{} [{}]: ", label, d),
        None => print!("{}: ", label),
    }
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    let line = line.trim();
    match (line.is_empty(), default) {
        (true, Some(d)) => Ok(d.to_string()),
        (true, None) => bail!("{} is required", label),
        _ => Ok(line.to_string()),
    }
}

fn read_password(email: &str, use_keychain: bool) -> Result<String> {
    if use_keychain {
        if let Ok(password) = CredentialStore::get_password(email) {
            return Ok(password);
        }
    }
    let password = rpassword::prompt_password("Password: ").context("Failed to read password")?;
    if password.trim().is_empty() {
        bail!("Password is required");
    }
    Ok(password)
}

pub async fn login(app: &mut App, email: Option<String>, remember: bool) -> Result<()> {
    let last_email = app.config.last_email.clone();
    let email = match email {
        Some(e) => e,
        None => prompt("Email", last_email.as_deref())?,
    };
    let password = read_password(&email, true)?;

    let response = app.client.login(&email, &password).await?;
    let Some(token) = response.token else {
        bail!("Unexpected response from server: no token");
    };
    let session = app.start_session(token, Some(email.clone()))?;

    if remember {
        if let Err(e) = CredentialStore::store(&email, &password) {
            warn!(error = %e, "Could not store password in keychain");
        }
    }

    let user_id = session.user_id.unwrap_or_default();
    let next = match app.client.get_user(user_id).await {
        Ok(user) if user.onboarding_done => "levelup dashboard",
        Ok(_) => "levelup onboarding",
        Err(e) => {
            warn!(error = %e, "Could not load profile after login");
            "levelup dashboard"
        }
    };
    println!("Logged in as {}. Next: `{}`", email, next);
    Ok(())
}

pub async fn register(app: &mut App, username: Option<String>, email: Option<String>) -> Result<()> {
    let username = match username {
        Some(u) => u,
        None => prompt("Username", None)?,
    };
    let email = match email {
        Some(e) => e,
        None => prompt("Email", None)?,
    };
    let password = read_password(&email, false)?;
    let confirm = rpassword::prompt_password("Confirm password: ")?;
    if password != confirm {
        bail!("Passwords do not match");
    }

    let registered = app.client.register(&username, &email, &password).await?;
    // Some deployments do not log the new account in directly
    let token = match registered.token {
        Some(token) => token,
        None => app
            .client
            .login(&email, &password)
            .await?
            .token
            .context("Account created but login returned no token")?,
    };
    app.start_session(token, Some(email))?;
    println!("Welcome, {}! Run `levelup onboarding` to set up your priorities.", username);
    Ok(())
}

pub fn logout(app: &mut App) -> Result<()> {
    let email = app.session.data.as_ref().and_then(|d| d.email.clone());
    app.logout()?;
    if let Some(email) = email {
        if let Err(e) = CredentialStore::delete(&email) {
            warn!(error = %e, "Could not clear remembered password");
        }
    }
    println!("Logged out.");
    Ok(())
}

pub async fn whoami(app: &App) -> Result<()> {
    let user_id = app.user_id()?;
    let user = app.client.get_user(user_id).await?;
    println!("{} (#{})", user.display_name(), user.id);
    if let Some(email) = &user.email {
        println!("  email:      {}", email);
    }
    println!("  level:      {} ({} XP)", user.level(), user.xp());
    println!("  onboarding: {}", if user.onboarding_done { "done" } else { "pending" });
    if let Some(token) = app.session.token() {
        if user_id_from_token(token) != Some(user_id) {
            warn!("Session user id does not match token payload");
        }
    }
    Ok(())
}

pub async fn ping(app: &App) -> Result<()> {
    let (body, elapsed) = app.client.ping().await?;
    println!("{} answered in {}ms", app.client.base_url(), elapsed.as_millis());
    if !body.trim().is_empty() {
        println!("{}", levelup_core::utils::truncate_string(body.trim(), 200));
    }
    Ok(())
}
