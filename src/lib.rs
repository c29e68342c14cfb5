//! starsign — session/profile synchronization for a horoscope and tarot site.
//!
//! The hosted backend owns identities, rows and row-level access. This crate
//! mirrors the signed-in user's profile into local state (`sync`), exposes
//! the four account operations, and wires them into the application shell
//! (`app`) with its route guards and theme.

pub mod app;
pub mod backend;
pub mod config;
pub mod profile;
pub mod routes;
pub mod sync;
pub mod theme;
pub mod zodiac;

pub use app::App;
pub use sync::{ProfileSync, SyncError, SyncState};
