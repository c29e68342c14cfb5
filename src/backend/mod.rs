//! Hosted auth + row service the app delegates to.
//!
//! DESIGN
//! ======
//! The synchronizer only talks to the `Backend` trait. `SupabaseClient`
//! speaks the hosted service's HTTP protocol; `MemoryBackend` keeps the same
//! observable behavior in process memory for offline runs and tests.
//!
//! Sessions are pushed through a `watch` channel: the current value is always
//! readable and every change wakes subscribers.

pub mod memory;
pub mod supabase;

use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::watch;

pub use memory::MemoryBackend;
pub use supabase::SupabaseClient;

/// Table holding one profile row per identity.
pub const PROFILES_TABLE: &str = "profiles";

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by backend calls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// Credentials or identity rejected by the auth service.
    #[error("auth rejected: {0}")]
    Auth(String),

    /// The HTTP request could not be completed.
    #[error("request failed: {0}")]
    Request(String),

    /// The service answered with a non-success status.
    #[error("backend responded with status {status}")]
    Status { status: u16, body: String },

    /// The response body could not be decoded.
    #[error("response parse failed: {0}")]
    Parse(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

// =============================================================================
// SESSION
// =============================================================================

/// Backend-issued evidence of an authenticated identity.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub email: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Unix timestamp (seconds) at which the access token expires.
    pub expires_at: Option<i64>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Identity created by a sign-up.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Identity {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

// =============================================================================
// PROFILE ROWS
// =============================================================================

/// A row of the `profiles` table as the backend stores it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRow {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub birth_date: Option<String>,
    #[serde(default)]
    pub birth_time: Option<String>,
    #[serde(default)]
    pub birth_place: Option<String>,
    #[serde(default)]
    pub zodiac_sign: Option<String>,
    #[serde(default)]
    pub is_premium: Option<bool>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Row inserted when an identity registers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewProfileRow {
    pub id: String,
    pub name: Option<String>,
    pub birth_date: Option<String>,
    pub birth_time: Option<String>,
    pub birth_place: Option<String>,
    pub zodiac_sign: Option<String>,
    pub is_premium: bool,
    pub role: String,
}

/// Column changes written by a profile update. `None` columns are left alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_place: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zodiac_sign: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

// =============================================================================
// TRAIT
// =============================================================================

/// Capability set the synchronizer needs from the hosted backend.
#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    /// Subscribe to session changes. The receiver starts at the current value.
    fn observe_session(&self) -> watch::Receiver<Option<Session>>;

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<(), BackendError>;

    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, BackendError>;

    /// Sign out the current session. Succeeds when no session is active.
    async fn sign_out(&self) -> Result<(), BackendError>;

    /// Fetch the profile row keyed by `user_id`; `Ok(None)` when it does not exist.
    async fn fetch_profile_row(&self, user_id: &str) -> Result<Option<ProfileRow>, BackendError>;

    async fn insert_profile_row(&self, row: &NewProfileRow) -> Result<(), BackendError>;

    async fn update_profile_row(&self, user_id: &str, changes: &ProfileChanges) -> Result<(), BackendError>;
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
