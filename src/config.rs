//! Application configuration parsed from environment variables.

use std::path::PathBuf;

use crate::backend::supabase::{BackendTimeouts, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_REQUEST_TIMEOUT_SECS};
use crate::theme::Theme;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required variable is not set.
    #[error("missing config: env var {var} not set")]
    Missing { var: String },

    /// A variable is set but its value is not understood.
    #[error("config parse failed: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    Supabase { url: String, anon_key: String, timeouts: BackendTimeouts },
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub backend: BackendConfig,
    pub theme: Theme,
    pub theme_file: Option<PathBuf>,
}

impl AppConfig {
    /// Build typed config from environment variables.
    ///
    /// Optional:
    /// - `STARSIGN_BACKEND`: `supabase` (default) or `memory`
    /// - `BACKEND_REQUEST_TIMEOUT_SECS`: default 30
    /// - `BACKEND_CONNECT_TIMEOUT_SECS`: default 10
    /// - `STARSIGN_THEME`: `light` (default) or `dark`
    /// - `STARSIGN_THEME_FILE`: where the theme preference is kept
    ///
    /// Required for the `supabase` backend:
    /// - `SUPABASE_URL`
    /// - `SUPABASE_ANON_KEY`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`AppConfig::from_env`], reading values through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend = match lookup("STARSIGN_BACKEND").as_deref().unwrap_or("supabase") {
            "supabase" => {
                let url = require(&lookup, "SUPABASE_URL")?
                    .trim_end_matches('/')
                    .to_string();
                let anon_key = require(&lookup, "SUPABASE_ANON_KEY")?;
                let timeouts = BackendTimeouts {
                    request_secs: parse_u64(&lookup, "BACKEND_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
                    connect_secs: parse_u64(&lookup, "BACKEND_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
                };
                BackendConfig::Supabase { url, anon_key, timeouts }
            }
            "memory" => BackendConfig::Memory,
            other => return Err(ConfigError::Parse(format!("unknown STARSIGN_BACKEND: {other}"))),
        };

        let theme = match lookup("STARSIGN_THEME") {
            Some(raw) => raw.parse().map_err(|e| ConfigError::Parse(format!("{e}")))?,
            None => Theme::default(),
        };
        let theme_file = lookup("STARSIGN_THEME_FILE")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self { backend, theme, theme_file })
    }
}

fn require<F>(lookup: &F, key: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::Missing { var: key.to_string() })
}

fn parse_u64<F>(lookup: &F, key: &str, default: u64) -> u64
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
