//! In-memory backend: accounts, profile rows and a session stream in process.
//!
//! Mirrors the hosted service's observable behavior closely enough for
//! offline runs and tests: sign-up signs the new identity in, duplicate
//! inserts conflict, and updates of missing rows succeed without effect.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use uuid::Uuid;

use super::{Backend, BackendError, Identity, NewProfileRow, ProfileChanges, ProfileRow, Session};

const MIN_PASSWORD_LEN: usize = 6;

struct Account {
    id: String,
    password: String,
}

#[derive(Default)]
struct Store {
    /// Accounts keyed by lower-cased email.
    accounts: HashMap<String, Account>,
    /// Profile rows keyed by identity id.
    profiles: HashMap<String, ProfileRow>,
}

pub struct MemoryBackend {
    store: Mutex<Store>,
    session: watch::Sender<Option<Session>>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        let (session, _) = watch::channel(None);
        Self { store: Mutex::new(Store::default()), session }
    }

    fn store(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register an account directly, bypassing sign-up. Returns its id.
    pub fn add_account(&self, email: &str, password: &str) -> String {
        let id = Uuid::new_v4().to_string();
        self.store()
            .accounts
            .insert(normalize(email), Account { id: id.clone(), password: password.to_string() });
        id
    }

    /// Insert or replace a profile row.
    pub fn put_profile(&self, row: ProfileRow) {
        self.store().profiles.insert(row.id.clone(), row);
    }

    /// Current copy of the profile row keyed by `user_id`.
    #[must_use]
    pub fn profile(&self, user_id: &str) -> Option<ProfileRow> {
        self.store().profiles.get(user_id).cloned()
    }

    /// Publish an arbitrary session value to subscribers.
    pub fn set_session(&self, session: Option<Session>) {
        self.session.send_replace(session);
    }

    #[must_use]
    pub fn current_session(&self) -> Option<Session> {
        self.session.borrow().clone()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

fn issue_session(user_id: &str, email: &str) -> Session {
    Session {
        user_id: user_id.to_string(),
        email: email.to_string(),
        access_token: Uuid::new_v4().simple().to_string(),
        refresh_token: Some(Uuid::new_v4().simple().to_string()),
        expires_at: None,
    }
}

#[async_trait::async_trait]
impl Backend for MemoryBackend {
    fn observe_session(&self) -> watch::Receiver<Option<Session>> {
        self.session.subscribe()
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<(), BackendError> {
        let email = normalize(email);
        let session = {
            let store = self.store();
            match store.accounts.get(&email) {
                Some(account) if account.password == password => issue_session(&account.id, &email),
                _ => return Err(BackendError::Auth("invalid login credentials".into())),
            }
        };
        self.session.send_replace(Some(session));
        Ok(())
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, BackendError> {
        let email = normalize(email);
        if !email.contains('@') {
            return Err(BackendError::Auth("unable to validate email address".into()));
        }
        if password.len() < MIN_PASSWORD_LEN {
            return Err(BackendError::Auth(format!(
                "password should be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        let id = {
            let mut store = self.store();
            if store.accounts.contains_key(&email) {
                return Err(BackendError::Auth("user already registered".into()));
            }
            let id = Uuid::new_v4().to_string();
            store
                .accounts
                .insert(email.clone(), Account { id: id.clone(), password: password.to_string() });
            id
        };

        self.session.send_replace(Some(issue_session(&id, &email)));
        Ok(Identity { id, email: Some(email) })
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        self.session.send_replace(None);
        Ok(())
    }

    async fn fetch_profile_row(&self, user_id: &str) -> Result<Option<ProfileRow>, BackendError> {
        Ok(self.profile(user_id))
    }

    async fn insert_profile_row(&self, row: &NewProfileRow) -> Result<(), BackendError> {
        let mut store = self.store();
        if store.profiles.contains_key(&row.id) {
            return Err(BackendError::Status {
                status: 409,
                body: format!("duplicate key value violates unique constraint \"profiles_pkey\" ({})", row.id),
            });
        }
        store.profiles.insert(
            row.id.clone(),
            ProfileRow {
                id: row.id.clone(),
                name: row.name.clone(),
                birth_date: row.birth_date.clone(),
                birth_time: row.birth_time.clone(),
                birth_place: row.birth_place.clone(),
                zodiac_sign: row.zodiac_sign.clone(),
                is_premium: Some(row.is_premium),
                role: Some(row.role.clone()),
                updated_at: None,
            },
        );
        Ok(())
    }

    async fn update_profile_row(&self, user_id: &str, changes: &ProfileChanges) -> Result<(), BackendError> {
        let mut store = self.store();
        let Some(row) = store.profiles.get_mut(user_id) else {
            return Ok(());
        };
        if let Some(name) = &changes.name {
            row.name = Some(name.clone());
        }
        if let Some(birth_date) = &changes.birth_date {
            row.birth_date = Some(birth_date.clone());
        }
        if let Some(birth_time) = &changes.birth_time {
            row.birth_time = Some(birth_time.clone());
        }
        if let Some(birth_place) = &changes.birth_place {
            row.birth_place = Some(birth_place.clone());
        }
        if let Some(zodiac_sign) = &changes.zodiac_sign {
            row.zodiac_sign = Some(zodiac_sign.clone());
        }
        row.updated_at = changes
            .updated_at
            .format(&time::format_description::well_known::Rfc3339)
            .ok();
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;
