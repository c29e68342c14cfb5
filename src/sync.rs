//! Session/profile synchronizer.
//!
//! ARCHITECTURE
//! ============
//! A single subscription task observes the backend's session stream and
//! mirrors the matching `profiles` row into `SyncState`. The four operations
//! (login, register, logout, profile update) call the backend and hand any
//! failure back to the caller after logging it. State is published through a
//! `watch` channel: consumers read snapshots or subscribe, only this module
//! writes.
//!
//! TRADE-OFFS
//! ==========
//! The session reaction and manual operations are not ordered against each
//! other. Instead of serializing backend traffic, a fetched row is applied
//! only while the mirrored session still belongs to the same user.

use std::sync::{Arc, Mutex, PoisonError};

use time::OffsetDateTime;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::backend::{Backend, BackendError, Session};
use crate::profile::{ProfileUpdate, Registration, UserProfile};

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Credentials or identity rejected, or the auth service unreachable.
    #[error("authentication failed: {0}")]
    Auth(#[source] BackendError),

    /// The identity exists but its profile row could not be inserted.
    #[error("identity {user_id} created but profile insert failed: {source}")]
    ProfileCreation {
        user_id: String,
        #[source]
        source: BackendError,
    },

    /// The operation needs a logged-in user.
    #[error("no user logged in")]
    NotAuthenticated,

    #[error("backend error: {0}")]
    Backend(#[from] BackendError),
}

// =============================================================================
// STATE
// =============================================================================

/// Read-only mirror of the backend session and the user's profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncState {
    pub(crate) session: Option<Session>,
    pub(crate) profile: Option<UserProfile>,
    /// Units of in-flight work; the initial session determination counts as one.
    pub(crate) pending: usize,
}

impl SyncState {
    fn initial() -> Self {
        Self { session: None, profile: None, pending: 1 }
    }

    #[must_use]
    pub fn profile(&self) -> Option<&UserProfile> {
        self.profile.as_ref()
    }

    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    #[must_use]
    pub fn authenticated(&self) -> bool {
        self.profile.is_some()
    }

    #[must_use]
    pub fn loading(&self) -> bool {
        self.pending > 0
    }

    fn clear(&mut self) {
        self.session = None;
        self.profile = None;
    }
}

/// Holds one unit of `pending` until dropped.
struct LoadingGuard<'a> {
    state: &'a watch::Sender<SyncState>,
}

impl<'a> LoadingGuard<'a> {
    fn begin(state: &'a watch::Sender<SyncState>) -> Self {
        state.send_modify(|s| s.pending += 1);
        Self { state }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.state.send_modify(release);
    }
}

/// Owns the unit counted by [`SyncState::initial`]. It moves into the
/// session task, so aborting the task before its first poll still releases it.
struct StartupGuard(Arc<Inner>);

impl Drop for StartupGuard {
    fn drop(&mut self) {
        self.0.state.send_modify(release);
    }
}

fn release(s: &mut SyncState) {
    s.pending = s.pending.saturating_sub(1);
}

// =============================================================================
// SYNCHRONIZER
// =============================================================================

struct Inner {
    backend: Arc<dyn Backend>,
    state: watch::Sender<SyncState>,
}

/// App-wide handle mirroring the backend session into local state.
///
/// Created once by the application shell with [`ProfileSync::start`]; the
/// session subscription lives until [`ProfileSync::dispose`] or drop.
pub struct ProfileSync {
    inner: Arc<Inner>,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl ProfileSync {
    /// Register the session subscription and return the handle.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn start(backend: Arc<dyn Backend>) -> Self {
        let (state, _) = watch::channel(SyncState::initial());
        let sessions = backend.observe_session();
        let inner = Arc::new(Inner { backend, state });
        let startup = StartupGuard(Arc::clone(&inner));
        let watcher = tokio::spawn(watch_sessions(Arc::clone(&inner), sessions, startup));
        Self { inner, watcher: Mutex::new(Some(watcher)) }
    }

    #[must_use]
    pub fn snapshot(&self) -> SyncState {
        self.inner.state.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.inner.state.subscribe()
    }

    #[must_use]
    pub fn profile(&self) -> Option<UserProfile> {
        self.inner.state.borrow().profile.clone()
    }

    #[must_use]
    pub fn authenticated(&self) -> bool {
        self.inner.state.borrow().authenticated()
    }

    #[must_use]
    pub fn loading(&self) -> bool {
        self.inner.state.borrow().loading()
    }

    /// Verify credentials with the backend. The profile arrives through the
    /// session reaction, not from this call.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Auth`] on rejected credentials or an unreachable backend.
    pub async fn login(&self, email: &str, password: &str) -> Result<(), SyncError> {
        let _loading = LoadingGuard::begin(&self.inner.state);
        self.inner
            .backend
            .sign_in_with_password(email, password)
            .await
            .map_err(|e| {
                error!(error = %e, "error logging in");
                SyncError::Auth(e)
            })
    }

    /// Create an identity and its profile row (never premium, role `user`).
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Auth`] if the identity cannot be created, or
    /// [`SyncError::ProfileCreation`] if the identity exists but the row
    /// insert failed. The identity is not rolled back.
    pub async fn register(&self, registration: &Registration) -> Result<(), SyncError> {
        let _loading = LoadingGuard::begin(&self.inner.state);

        let identity = self
            .inner
            .backend
            .sign_up(&registration.email, &registration.password)
            .await
            .map_err(|e| {
                error!(error = %e, "error registering");
                SyncError::Auth(e)
            })?;

        let row = registration.to_row(&identity.id);
        if let Err(source) = self.inner.backend.insert_profile_row(&row).await {
            error!(error = %source, user_id = %identity.id, "profile insert failed; identity has no profile row");
            return Err(SyncError::ProfileCreation { user_id: identity.id, source });
        }
        info!(user_id = %identity.id, "registered");

        // The session reaction may have run before the row existed.
        if let Some(email) = self.pending_profile_email(&identity.id) {
            self.inner.load_profile(&identity.id, &email).await;
        }
        Ok(())
    }

    /// Sign out, then clear the local mirror once the backend confirms.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Auth`] if the backend rejects the sign-out; local
    /// state is left untouched in that case.
    pub async fn logout(&self) -> Result<(), SyncError> {
        let _loading = LoadingGuard::begin(&self.inner.state);
        self.inner.backend.sign_out().await.map_err(|e| {
            error!(error = %e, "error logging out");
            SyncError::Auth(e)
        })?;

        self.inner.state.send_modify(SyncState::clear);
        info!("logged out");
        Ok(())
    }

    /// Write the provided fields to the current user's row and merge them
    /// into the local profile without re-fetching.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotAuthenticated`] without touching the backend
    /// when no profile is loaded, or [`SyncError::Backend`] if the write fails.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<(), SyncError> {
        let _loading = LoadingGuard::begin(&self.inner.state);

        let Some(user_id) = self.current_user_id() else {
            error!("error updating profile: no user logged in");
            return Err(SyncError::NotAuthenticated);
        };

        let changes = update.to_changes(OffsetDateTime::now_utc());
        self.inner
            .backend
            .update_profile_row(&user_id, &changes)
            .await
            .map_err(|e| {
                error!(error = %e, %user_id, "error updating profile");
                SyncError::Backend(e)
            })?;

        self.inner.state.send_modify(|s| {
            if let Some(profile) = s.profile.as_mut().filter(|p| p.id == user_id) {
                profile.apply(update);
            }
        });
        debug!(%user_id, "profile updated");
        Ok(())
    }

    /// Tear down the session subscription. Safe to call more than once.
    pub fn dispose(&self) {
        let watcher = self
            .watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(watcher) = watcher {
            watcher.abort();
            debug!("session subscription disposed");
        }
    }

    fn current_user_id(&self) -> Option<String> {
        self.inner.state.borrow().profile.as_ref().map(|p| p.id.clone())
    }

    /// Email of the mirrored session when it belongs to `user_id` and its
    /// profile has not been loaded yet.
    fn pending_profile_email(&self, user_id: &str) -> Option<String> {
        let state = self.inner.state.borrow();
        if state.profile.is_some() {
            return None;
        }
        state
            .session
            .as_ref()
            .filter(|s| s.user_id == user_id)
            .map(|s| s.email.clone())
    }
}

impl Drop for ProfileSync {
    fn drop(&mut self) {
        self.dispose();
    }
}

// =============================================================================
// SESSION REACTION
// =============================================================================

async fn watch_sessions(inner: Arc<Inner>, mut sessions: watch::Receiver<Option<Session>>, startup: StartupGuard) {
    let mut startup = Some(startup);
    loop {
        let session = sessions.borrow_and_update().clone();
        inner.apply_session(session).await;
        drop(startup.take());

        if sessions.changed().await.is_err() {
            debug!("session stream closed");
            break;
        }
    }
}

impl Inner {
    async fn apply_session(&self, session: Option<Session>) {
        let Some(session) = session else {
            self.state.send_modify(SyncState::clear);
            debug!("session cleared");
            return;
        };

        // Held across the hand-off so a new session is never observed idle
        // without its profile.
        let _loading = LoadingGuard::begin(&self.state);
        let user_id = session.user_id.clone();
        let email = session.email.clone();
        let mut already_loaded = false;
        self.state.send_modify(|s| {
            already_loaded = s.profile.as_ref().is_some_and(|p| p.id == user_id);
            if !already_loaded {
                s.profile = None;
            }
            s.session = Some(session);
        });

        // Token refreshes keep the same user; the mirrored row stays valid.
        if !already_loaded {
            self.load_profile(&user_id, &email).await;
        }
    }

    /// Fetch and mirror the row for `user_id`. Failures are logged, not returned.
    async fn load_profile(&self, user_id: &str, email: &str) {
        let _loading = LoadingGuard::begin(&self.state);
        match self.backend.fetch_profile_row(user_id).await {
            Ok(Some(row)) => {
                let profile = UserProfile::from_row(row, email);
                let applied = self.state.send_if_modified(|s| {
                    if s.session.as_ref().is_some_and(|cur| cur.user_id == user_id) {
                        s.profile = Some(profile);
                        true
                    } else {
                        false
                    }
                });
                if applied {
                    info!(%user_id, "profile synchronized");
                } else {
                    debug!(%user_id, "discarding profile fetched for a stale session");
                }
            }
            Ok(None) => warn!(%user_id, "no profile row for session"),
            Err(e) => error!(error = %e, %user_id, "error fetching user profile"),
        }
    }
}

#[cfg(test)]
#[path = "sync_test.rs"]
mod tests;
