//! Application-wide light/dark theme.
//!
//! The preference is read from an optional file at startup and written back
//! on every change. Persistence is best-effort: a missing or unreadable file
//! falls back to the configured default, and write failures are logged.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use tokio::sync::watch;
use tracing::warn;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown theme: {0} (expected 'light' or 'dark')")]
pub struct ThemeParseError(pub String);

impl Theme {
    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = ThemeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Self::Light),
            "dark" => Ok(Self::Dark),
            _ => Err(ThemeParseError(s.to_string())),
        }
    }
}

/// Shared theme state. Consumers read or subscribe; `set`/`toggle` publish.
pub struct ThemeState {
    current: watch::Sender<Theme>,
    store: Option<PathBuf>,
}

impl ThemeState {
    /// Load the stored preference, or `default` when none is readable.
    #[must_use]
    pub fn load(default: Theme, store: Option<PathBuf>) -> Self {
        let initial = store
            .as_ref()
            .and_then(|path| std::fs::read_to_string(path).ok())
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(default);
        let (current, _) = watch::channel(initial);
        Self { current, store }
    }

    #[must_use]
    pub fn get(&self) -> Theme {
        *self.current.borrow()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Theme> {
        self.current.subscribe()
    }

    pub fn set(&self, theme: Theme) {
        self.current.send_replace(theme);
        self.persist(theme);
    }

    /// Flip between light and dark; returns the new theme.
    pub fn toggle(&self) -> Theme {
        let next = self.get().toggled();
        self.set(next);
        next
    }

    fn persist(&self, theme: Theme) {
        let Some(path) = &self.store else {
            return;
        };
        if let Err(e) = std::fs::write(path, theme.as_str()) {
            warn!(error = %e, path = %path.display(), "failed to persist theme preference");
        }
    }
}

#[cfg(test)]
#[path = "theme_test.rs"]
mod tests;
