//! User profile, the local mirror of a `profiles` row.
//!
//! SYSTEM CONTEXT
//! ==============
//! Pages read `UserProfile` through the synchronizer. Rows travel with the
//! backend's column names; this module owns the mapping in both directions.

use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::warn;

use crate::backend::{NewProfileRow, ProfileChanges, ProfileRow};
use crate::zodiac::ZodiacSign;

/// Role assigned to every newly registered identity.
pub const DEFAULT_ROLE: &str = "user";
pub const ADMIN_ROLE: &str = "admin";

// =============================================================================
// USER PROFILE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub name: Option<String>,
    /// Copied from the session when the row was synchronized.
    pub email: String,
    pub birth_date: Option<String>,
    pub birth_time: Option<String>,
    pub birth_place: Option<String>,
    pub zodiac_sign: Option<ZodiacSign>,
    pub is_premium: bool,
    pub role: Option<String>,
}

impl UserProfile {
    #[must_use]
    pub fn from_row(row: ProfileRow, email: &str) -> Self {
        let zodiac_sign = row.zodiac_sign.as_deref().and_then(|raw| match raw.parse() {
            Ok(sign) => Some(sign),
            Err(e) => {
                warn!(user_id = %row.id, error = %e, "ignoring stored zodiac sign");
                None
            }
        });
        Self {
            id: row.id,
            name: row.name,
            email: email.to_string(),
            birth_date: row.birth_date,
            birth_time: row.birth_time,
            birth_place: row.birth_place,
            zodiac_sign,
            is_premium: row.is_premium.unwrap_or(false),
            role: row.role,
        }
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role.as_deref() == Some(ADMIN_ROLE)
    }

    /// Shallow merge: provided fields overwrite, the rest are kept.
    pub fn apply(&mut self, update: &ProfileUpdate) {
        if let Some(name) = &update.name {
            self.name = Some(name.clone());
        }
        if let Some(birth_date) = &update.birth_date {
            self.birth_date = Some(birth_date.clone());
        }
        if let Some(birth_time) = &update.birth_time {
            self.birth_time = Some(birth_time.clone());
        }
        if let Some(birth_place) = &update.birth_place {
            self.birth_place = Some(birth_place.clone());
        }
        if let Some(sign) = update.zodiac_sign {
            self.zodiac_sign = Some(sign);
        }
    }
}

// =============================================================================
// REGISTRATION
// =============================================================================

/// Sign-up form data: credentials plus the initial profile fields.
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub birth_date: Option<String>,
    #[serde(default)]
    pub birth_time: Option<String>,
    #[serde(default)]
    pub birth_place: Option<String>,
    #[serde(default)]
    pub zodiac_sign: Option<ZodiacSign>,
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("name", &self.name)
            .field("birth_date", &self.birth_date)
            .field("birth_time", &self.birth_time)
            .field("birth_place", &self.birth_place)
            .field("zodiac_sign", &self.zodiac_sign)
            .finish()
    }
}

impl Registration {
    /// Zodiac sign as supplied, or derived from the birth date.
    #[must_use]
    pub fn resolved_sign(&self) -> Option<ZodiacSign> {
        self.zodiac_sign
            .or_else(|| self.birth_date.as_deref().and_then(ZodiacSign::from_birth_date))
    }

    /// Row inserted for the identity `user_id`: never premium, default role.
    #[must_use]
    pub fn to_row(&self, user_id: &str) -> NewProfileRow {
        NewProfileRow {
            id: user_id.to_string(),
            name: self.name.clone(),
            birth_date: self.birth_date.clone(),
            birth_time: self.birth_time.clone(),
            birth_place: self.birth_place.clone(),
            zodiac_sign: self.resolved_sign().map(|s| s.to_string()),
            is_premium: false,
            role: DEFAULT_ROLE.to_string(),
        }
    }
}

// =============================================================================
// PROFILE UPDATE
// =============================================================================

/// Fields a user may edit. `None` means "leave unchanged".
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub birth_date: Option<String>,
    #[serde(default)]
    pub birth_time: Option<String>,
    #[serde(default)]
    pub birth_place: Option<String>,
    #[serde(default)]
    pub zodiac_sign: Option<ZodiacSign>,
}

impl ProfileUpdate {
    #[must_use]
    pub fn to_changes(&self, updated_at: OffsetDateTime) -> ProfileChanges {
        ProfileChanges {
            name: self.name.clone(),
            birth_date: self.birth_date.clone(),
            birth_time: self.birth_time.clone(),
            birth_place: self.birth_place.clone(),
            zodiac_sign: self.zodiac_sign.map(|s| s.to_string()),
            updated_at,
        }
    }
}

#[cfg(test)]
#[path = "profile_test.rs"]
mod tests;
