//! API client for communicating with the LevelUp REST API.
//!
//! This module provides the `ApiClient` struct for making authenticated
//! API requests for users, goals, templates and onboarding data.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use reqwest::{header, Client, Method};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::models::onboarding::{AnswerSubmission, RawQuestionSet};
use crate::models::{
    Answer, Cadence, Category, CompletionResult, GoalStatus, GoalTemplate, NewTemplate, Priority,
    QuestionSet, Quote, User, UserGoal, UserUpdate,
};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Production backend, overridable through the config or `LEVELUP_API_BASE`
pub const DEFAULT_API_BASE: &str = "https://level-up-8idt.onrender.com";

/// HTTP request timeout in seconds.
/// The hosted backend sleeps when idle and can take a while to wake up.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RegisterRequest<'a> {
    username: &'a str,
    email: &'a str,
    password: &'a str,
}

/// Read the user id out of a JWT payload (`id`, `userId` or `sub`).
///
/// The signature is not checked; the backend does that on every request.
pub fn user_id_from_token(token: &str) -> Option<i64> {
    let payload = token.split('.').nth(1)?;
    let decoded = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: Value = serde_json::from_slice(&decoded).ok()?;
    ["id", "userId", "sub"].iter().find_map(|key| match claims.get(key)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    })
}

/// API client for LevelUp.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Create a new API client for the given backend
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        let base_url = base_url.trim_end_matches('/').to_string();
        info!(base_url = %base_url, "API client ready");

        Ok(Self {
            client,
            base_url,
            token: None,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Set the bearer token for authenticated requests
    pub fn set_token(&mut self, token: String) {
        debug!("Auth token set");
        self.token = Some(token);
    }

    pub fn clear_token(&mut self) {
        debug!("Auth token cleared");
        self.token = None;
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn auth_headers(&self) -> Result<header::HeaderMap> {
        let mut headers = header::HeaderMap::new();
        if let Some(ref token) = self.token {
            headers.insert(
                header::AUTHORIZATION,
                header::HeaderValue::from_str(&format!("Bearer {}", token))?,
            );
        }
        Ok(headers)
    }

    /// Send a request, retrying on 429 with exponential backoff, and return
    /// the raw body of a successful response.
    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<String> {
        let url = self.url(path);
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let started = Instant::now();
            let mut request = self
                .client
                .request(method.clone(), &url)
                .headers(self.auth_headers()?)
                .query(query);
            if let Some(body) = body {
                request = request.json(body);
            }

            debug!(method = %method, url = %url, "Sending request");
            let response = request
                .send()
                .await
                .with_context(|| format!("Failed to send {} request to {}", method, url))?;

            let status = response.status();
            let elapsed_ms = started.elapsed().as_millis() as u64;

            if status.is_success() {
                let text = response
                    .text()
                    .await
                    .with_context(|| format!("Failed to read response body from {}", url))?;
                debug!(
                    method = %method,
                    url = %url,
                    status = status.as_u16(),
                    elapsed_ms,
                    bytes = text.len(),
                    "Request succeeded"
                );
                return Ok(text);
            }

            if status.as_u16() == 429 {
                retries += 1;
                if retries > MAX_RATE_LIMIT_RETRIES {
                    return Err(ApiError::RateLimited.into());
                }
                warn!(url = %url, retry = retries, backoff_ms, "Rate limited, backing off");
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms *= 2; // Exponential backoff
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            warn!(method = %method, url = %url, status = status.as_u16(), elapsed_ms, "Request failed");
            return Err(ApiError::from_status(status, &body).into());
        }
    }

    /// Parse a JSON body; an empty body reads as `null`
    fn parse<T: DeserializeOwned>(text: &str, what: &str) -> Result<T> {
        let text = if text.trim().is_empty() { "null" } else { text };
        serde_json::from_str(text)
            .map_err(|e| ApiError::InvalidResponse(format!("{}: {}", what, e)).into())
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let text = self.send(Method::GET, path, query, None).await?;
        Self::parse(&text, path)
    }

    async fn with_body<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let body = serde_json::to_value(body)?;
        let text = self.send(method, path, &[], Some(&body)).await?;
        Self::parse(&text, path)
    }

    async fn without_body<T: DeserializeOwned>(&self, method: Method, path: &str) -> Result<T> {
        let text = self.send(method, path, &[], None).await?;
        Self::parse(&text, path)
    }

    /// Check the backend is reachable; returns the root body and round-trip time
    pub async fn ping(&self) -> Result<(String, Duration)> {
        let started = Instant::now();
        let body = self.send(Method::GET, "/", &[], None).await?;
        Ok((body, started.elapsed()))
    }

    // ===== Auth =====

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse> {
        self.with_body(Method::POST, "/auth/login", &LoginRequest { email, password })
            .await
            .context("Login failed")
    }

    /// Register a new account. Some deployments answer with a token directly.
    pub async fn register(&self, username: &str, email: &str, password: &str) -> Result<AuthResponse> {
        self.with_body(
            Method::POST,
            "/auth/register",
            &RegisterRequest {
                username,
                email,
                password,
            },
        )
        .await
        .context("Registration failed")
    }

    // ===== Users =====

    pub async fn get_user(&self, user_id: i64) -> Result<User> {
        self.get(&format!("/users/{}", user_id), &[]).await
    }

    /// Update profile fields; fields left `None` are not sent
    pub async fn update_user(&self, user_id: i64, update: &UserUpdate) -> Result<User> {
        self.with_body(Method::PATCH, &format!("/users/{}", user_id), update)
            .await
    }

    pub async fn get_priorities(&self, user_id: i64) -> Result<Vec<Priority>> {
        let value: Value = self.get(&format!("/users/{}/priorities", user_id), &[]).await?;
        Ok(list_or_empty(value))
    }

    pub async fn save_priority_order(&self, user_id: i64, ordered_category_ids: &[i64]) -> Result<Value> {
        self.with_body(
            Method::PUT,
            &format!("/users/{}/priorities/order", user_id),
            &json!({ "ordered_category_ids": ordered_category_ids }),
        )
        .await
    }

    // ===== User goals =====

    pub async fn list_user_goals(&self, user_id: i64, status: GoalStatus) -> Result<Vec<UserGoal>> {
        let value: Value = self
            .get(
                &format!("/users/{}/user-goals", user_id),
                &[("status", status.as_query())],
            )
            .await?;
        Ok(list_or_empty(value))
    }

    pub async fn add_user_goal(&self, user_id: i64, template_id: i64, cadence: Cadence) -> Result<UserGoal> {
        self.with_body(
            Method::POST,
            &format!("/users/{}/user-goals", user_id),
            &json!({ "template_id": template_id, "cadence": cadence }),
        )
        .await
    }

    pub async fn complete_user_goal(&self, user_id: i64, goal_id: i64) -> Result<CompletionResult> {
        let result: Option<CompletionResult> = self
            .without_body(
                Method::PATCH,
                &format!("/users/{}/user-goals/{}/complete", user_id, goal_id),
            )
            .await?;
        let result = result.unwrap_or_default();
        info!(goal_id, xp = ?result.xp_awarded, new_level = ?result.new_level, "Goal completed");
        Ok(result)
    }

    pub async fn set_goal_schedule(&self, user_id: i64, goal_id: i64, cadence: Cadence) -> Result<Value> {
        self.with_body(
            Method::PATCH,
            &format!("/users/{}/user-goals/{}/schedule", user_id, goal_id),
            &json!({ "cadence": cadence }),
        )
        .await
    }

    pub async fn archive_goal(&self, user_id: i64, goal_id: i64) -> Result<Value> {
        self.without_body(
            Method::PATCH,
            &format!("/users/{}/user-goals/{}/archive", user_id, goal_id),
        )
        .await
    }

    pub async fn unarchive_goal(&self, user_id: i64, goal_id: i64) -> Result<Value> {
        self.without_body(
            Method::PATCH,
            &format!("/users/{}/user-goals/{}/unarchive", user_id, goal_id),
        )
        .await
    }

    pub async fn delete_goal(&self, user_id: i64, goal_id: i64) -> Result<Value> {
        self.without_body(
            Method::DELETE,
            &format!("/users/{}/user-goals/{}", user_id, goal_id),
        )
        .await
    }

    // ===== Goal templates =====

    pub async fn list_templates(&self) -> Result<Vec<GoalTemplate>> {
        let value: Value = self.get("/goal-templates", &[]).await?;
        Ok(list_or_empty(value))
    }

    pub async fn get_template(&self, template_id: i64) -> Result<GoalTemplate> {
        self.get(&format!("/goal-templates/{}", template_id), &[]).await
    }

    pub async fn create_template(&self, template: &NewTemplate) -> Result<GoalTemplate> {
        template
            .validate()
            .map_err(ApiError::Validation)?;
        self.with_body(Method::POST, "/goal-templates", template).await
    }

    pub async fn set_template_enabled(&self, template_id: i64, enabled: bool) -> Result<Value> {
        self.with_body(
            Method::PUT,
            &format!("/goal-templates/{}/enabled", template_id),
            &json!({ "enabled": enabled }),
        )
        .await
    }

    // ===== Categories =====

    pub async fn list_categories(&self) -> Result<Vec<Category>> {
        let value: Value = self.get("/categories", &[]).await?;
        Ok(list_or_empty(value))
    }

    // ===== Onboarding =====

    /// Fetch the questionnaire. The language is sent as both `lang` and
    /// `language`, since backend versions read one or the other.
    pub async fn get_questions(&self, user_id: i64, lang: &str) -> Result<QuestionSet> {
        let user_id = user_id.to_string();
        let raw: Option<RawQuestionSet> = self
            .get(
                "/onboarding/questions",
                &[("user_id", user_id.as_str()), ("lang", lang), ("language", lang)],
            )
            .await?;
        Ok(raw
            .map(|raw| QuestionSet::from_raw(raw, lang))
            .unwrap_or_else(|| QuestionSet {
                language: lang.to_string(),
                ..QuestionSet::default()
            }))
    }

    pub async fn submit_answers(&self, user_id: i64, answers: &[Answer], lang: &str) -> Result<Value> {
        let submission = AnswerSubmission {
            user_id,
            language: lang,
            answers,
        };
        info!(user_id, answers = answers.len(), "Submitting onboarding answers");
        self.with_body(Method::POST, "/onboarding/answers", &submission)
            .await
    }

    // ===== Quotes =====

    pub async fn today_quote(&self, lang: &str) -> Result<Option<Quote>> {
        self.get("/quotes/today", &[("lang", lang)]).await
    }
}

/// Lists come back as bare arrays; anything else is treated as empty
fn list_or_empty<T: DeserializeOwned>(value: Value) -> Vec<T> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match serde_json::from_value(item) {
                Ok(parsed) => Some(parsed),
                Err(e) => {
                    warn!(error = %e, "Skipping unparseable list item");
                    None
                }
            })
            .collect(),
        Value::Null => Vec::new(),
        other => {
            warn!(kind = %value_kind(&other), "Expected a JSON array");
            Vec::new()
        }
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// Tests
// ============================================================================
