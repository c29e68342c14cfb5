//! Hosted backend client for auth and row endpoints over HTTP.
//!
//! Thin wrapper for `/auth/v1/*` (identities, sessions) and
//! `/rest/v1/profiles` (profile rows). Decoding lives in pure `parse_*`
//! functions for testability.
//!
//! The current session is held in a `watch` channel; successful sign-in and
//! sign-up publish it, sign-out publishes `None`. Row calls refresh a session
//! that is about to expire and publish the refreshed one; a rejected refresh
//! token publishes `None`.

use std::time::Duration;

use time::OffsetDateTime;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::{Backend, BackendError, Identity, NewProfileRow, PROFILES_TABLE, ProfileChanges, ProfileRow, Session};

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Refresh this long before the access token's stated expiry.
const REFRESH_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Default for BackendTimeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    }
}

// =============================================================================
// CLIENT
// =============================================================================

pub struct SupabaseClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    session: watch::Sender<Option<Session>>,
}

impl SupabaseClient {
    /// Build a client for the project at `base_url` using its public anon key.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(
        base_url: impl Into<String>,
        anon_key: impl Into<String>,
        timeouts: BackendTimeouts,
    ) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeouts.request_secs))
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .build()
            .map_err(|e| BackendError::HttpClientBuild(e.to_string()))?;
        let (session, _) = watch::channel(None);
        Ok(Self { http, base_url: base_url.into().trim_end_matches('/').to_string(), anon_key: anon_key.into(), session })
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{path}", self.base_url)
    }

    fn rows_url(&self) -> String {
        format!("{}/rest/v1/{PROFILES_TABLE}", self.base_url)
    }

    /// Row requests run as the signed-in user so row-level policies apply.
    async fn row_token(&self) -> Result<String, BackendError> {
        let current = self.session.borrow().clone();
        let Some(session) = current else {
            return Ok(self.anon_key.clone());
        };
        if !needs_refresh(&session, OffsetDateTime::now_utc().unix_timestamp()) {
            return Ok(session.access_token);
        }
        Ok(self.refresh_session(&session).await?.access_token)
    }

    /// Exchange the refresh token of `session` for a new session.
    async fn refresh_session(&self, session: &Session) -> Result<Session, BackendError> {
        let Some(refresh_token) = session.refresh_token.as_deref() else {
            return Ok(session.clone());
        };
        let request = self
            .http
            .post(self.auth_url("token"))
            .query(&[("grant_type", "refresh_token")])
            .json(&serde_json::json!({ "refresh_token": refresh_token }));
        let (status, body) = self.send(request).await?;
        if let Err(e) = check_auth_status(status, &body) {
            if matches!(e, BackendError::Auth(_)) {
                warn!(user_id = %session.user_id, error = %e, "session refresh rejected; signing out");
                self.replace_session(&session.access_token, None);
            }
            return Err(e);
        }

        let refreshed = parse_session(&body)?;
        debug!(user_id = %refreshed.user_id, "session refreshed");
        self.replace_session(&session.access_token, Some(refreshed.clone()));
        Ok(refreshed)
    }

    /// Publish `next` only if the current session still carries `access_token`;
    /// a sign-in or sign-out that landed meanwhile wins.
    fn replace_session(&self, access_token: &str, next: Option<Session>) -> bool {
        self.session.send_if_modified(|current| {
            if current.as_ref().is_some_and(|s| s.access_token == access_token) {
                *current = next;
                true
            } else {
                false
            }
        })
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<(u16, String), BackendError> {
        let response = request
            .header("apikey", &self.anon_key)
            .send()
            .await
            .map_err(|e| BackendError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| BackendError::Request(e.to_string()))?;
        Ok((status, text))
    }
}

#[async_trait::async_trait]
impl Backend for SupabaseClient {
    fn observe_session(&self) -> watch::Receiver<Option<Session>> {
        self.session.subscribe()
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<(), BackendError> {
        let request = self
            .http
            .post(self.auth_url("token"))
            .query(&[("grant_type", "password")])
            .json(&serde_json::json!({ "email": email, "password": password }));
        let (status, body) = self.send(request).await?;
        check_auth_status(status, &body)?;

        let session = parse_session(&body)?;
        info!(user_id = %session.user_id, "signed in");
        self.session.send_replace(Some(session));
        Ok(())
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, BackendError> {
        let request = self
            .http
            .post(self.auth_url("signup"))
            .json(&serde_json::json!({ "email": email, "password": password }));
        let (status, body) = self.send(request).await?;
        check_auth_status(status, &body)?;

        let (identity, session) = parse_sign_up(&body)?;
        info!(user_id = %identity.id, signed_in = session.is_some(), "identity created");
        if let Some(session) = session {
            self.session.send_replace(Some(session));
        }
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        let token = self.session.borrow().as_ref().map(|s| s.access_token.clone());
        let Some(token) = token else {
            debug!("sign out without session");
            return Ok(());
        };

        let request = self.http.post(self.auth_url("logout")).bearer_auth(token);
        let (status, body) = self.send(request).await?;
        // An expired or revoked token means the session is already gone.
        if !matches!(status, 401 | 404) {
            check_auth_status(status, &body)?;
        }

        self.session.send_replace(None);
        Ok(())
    }

    async fn fetch_profile_row(&self, user_id: &str) -> Result<Option<ProfileRow>, BackendError> {
        let request = self
            .http
            .get(self.rows_url())
            .query(&[("id", format!("eq.{user_id}").as_str()), ("select", "*")])
            .bearer_auth(self.row_token().await?)
            .header("Accept", "application/json");
        let (status, body) = self.send(request).await?;
        check_status(status, &body)?;
        parse_profile_rows(&body)
    }

    async fn insert_profile_row(&self, row: &NewProfileRow) -> Result<(), BackendError> {
        let request = self
            .http
            .post(self.rows_url())
            .bearer_auth(self.row_token().await?)
            .header("Prefer", "return=minimal")
            .json(std::slice::from_ref(row));
        let (status, body) = self.send(request).await?;
        check_status(status, &body)
    }

    async fn update_profile_row(&self, user_id: &str, changes: &ProfileChanges) -> Result<(), BackendError> {
        let request = self
            .http
            .patch(self.rows_url())
            .query(&[("id", format!("eq.{user_id}"))])
            .bearer_auth(self.row_token().await?)
            .header("Prefer", "return=minimal")
            .json(changes);
        let (status, body) = self.send(request).await?;
        check_status(status, &body)
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(serde::Deserialize)]
struct SessionResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    expires_in: Option<i64>,
    user: UserResponse,
}

#[derive(serde::Deserialize)]
struct UserResponse {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(serde::Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

// =============================================================================
// PARSING
// =============================================================================

/// Refreshable sessions are renewed once within the margin of their expiry.
fn needs_refresh(session: &Session, now: i64) -> bool {
    session.refresh_token.is_some() && session.expires_at.is_some_and(|at| now >= at - REFRESH_MARGIN_SECS)
}

fn check_status(status: u16, body: &str) -> Result<(), BackendError> {
    if (200..300).contains(&status) {
        Ok(())
    } else {
        Err(BackendError::Status { status, body: body.to_string() })
    }
}

/// Auth endpoints report rejected credentials and identities as 4xx.
fn check_auth_status(status: u16, body: &str) -> Result<(), BackendError> {
    match status {
        200..=299 => Ok(()),
        400..=499 => Err(BackendError::Auth(parse_auth_error(status, body))),
        _ => Err(BackendError::Status { status, body: body.to_string() }),
    }
}

fn parse_auth_error(status: u16, body: &str) -> String {
    serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .and_then(|e| e.error_description.or(e.msg).or(e.message).or(e.error))
        .unwrap_or_else(|| format!("status {status}"))
}

fn parse_session(json: &str) -> Result<Session, BackendError> {
    let api: SessionResponse = serde_json::from_str(json).map_err(|e| BackendError::Parse(e.to_string()))?;
    Ok(session_from_response(api))
}

fn session_from_response(api: SessionResponse) -> Session {
    let expires_at = api.expires_at.or_else(|| {
        api.expires_in
            .map(|secs| OffsetDateTime::now_utc().unix_timestamp() + secs)
    });
    Session {
        user_id: api.user.id,
        email: api.user.email.unwrap_or_default(),
        access_token: api.access_token,
        refresh_token: api.refresh_token,
        expires_at,
    }
}

/// Sign-up answers with a full session when the identity is signed in
/// immediately, or with the bare user when email confirmation is pending.
fn parse_sign_up(json: &str) -> Result<(Identity, Option<Session>), BackendError> {
    let value: serde_json::Value = serde_json::from_str(json).map_err(|e| BackendError::Parse(e.to_string()))?;

    if value.get("access_token").is_some() {
        let api: SessionResponse = serde_json::from_value(value).map_err(|e| BackendError::Parse(e.to_string()))?;
        let session = session_from_response(api);
        let identity = Identity { id: session.user_id.clone(), email: Some(session.email.clone()) };
        return Ok((identity, Some(session)));
    }

    let user = match value.get("user") {
        Some(user) if user.is_object() => user.clone(),
        _ => value,
    };
    let api: UserResponse = serde_json::from_value(user).map_err(|e| BackendError::Parse(e.to_string()))?;
    Ok((Identity { id: api.id, email: api.email }, None))
}

fn parse_profile_rows(json: &str) -> Result<Option<ProfileRow>, BackendError> {
    let rows: Vec<ProfileRow> = serde_json::from_str(json).map_err(|e| BackendError::Parse(e.to_string()))?;
    Ok(rows.into_iter().next())
}

#[cfg(test)]
#[path = "supabase_test.rs"]
mod tests;
