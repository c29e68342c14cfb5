//! Application shell.
//!
//! DESIGN
//! ======
//! `App` is the single composition root: it builds the backend selected by
//! config, the theme state and the synchronizer, and resolves navigation
//! against the synchronizer's state. Everything it hands out is read-mostly;
//! mutations go through `ProfileSync` operations.

use std::sync::Arc;

use tracing::info;

use crate::backend::{Backend, BackendError, MemoryBackend, SupabaseClient};
use crate::config::{AppConfig, BackendConfig};
use crate::routes::{Access, Route};
use crate::sync::ProfileSync;
use crate::theme::ThemeState;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    #[error("backend init failed: {0}")]
    Backend(#[from] BackendError),
}

/// A route together with the guard decision for the current session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    pub route: Route,
    pub access: Access,
}

pub struct App {
    backend: Arc<dyn Backend>,
    theme: ThemeState,
    user: Arc<ProfileSync>,
}

impl App {
    /// Wire the shell from config. Must be called inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend client cannot be constructed.
    pub fn start(config: AppConfig) -> Result<Self, AppError> {
        let backend: Arc<dyn Backend> = match config.backend {
            BackendConfig::Supabase { url, anon_key, timeouts } => {
                info!(%url, "using hosted backend");
                Arc::new(SupabaseClient::new(url, anon_key, timeouts)?)
            }
            BackendConfig::Memory => {
                info!("using in-memory backend");
                Arc::new(MemoryBackend::new())
            }
        };
        Ok(Self::with_backend(backend, ThemeState::load(config.theme, config.theme_file)))
    }

    /// Wire the shell around an existing backend.
    #[must_use]
    pub fn with_backend(backend: Arc<dyn Backend>, theme: ThemeState) -> Self {
        let user = Arc::new(ProfileSync::start(Arc::clone(&backend)));
        Self { backend, theme, user }
    }

    #[must_use]
    pub fn user(&self) -> &Arc<ProfileSync> {
        &self.user
    }

    #[must_use]
    pub fn theme(&self) -> &ThemeState {
        &self.theme
    }

    #[must_use]
    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// Resolve `path` and check it against the current session state.
    #[must_use]
    pub fn navigate(&self, path: &str) -> Navigation {
        let route = Route::parse(path);
        let access = route.access(&self.user.snapshot());
        Navigation { route, access }
    }

    /// Stop reacting to session changes.
    pub fn shutdown(&self) {
        self.user.dispose();
        info!("app shut down");
    }
}

#[cfg(test)]
#[path = "app_test.rs"]
mod tests;
