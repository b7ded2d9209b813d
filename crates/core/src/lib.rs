//! Core domain types and shared logic for the pinboard backend.
//!
//! This crate defines the vocabulary used across all other crates:
//! - Engagement edge kinds and toggle outcomes
//! - Notification kinds
//! - Username uniqueness resolution
//! - Application configuration

pub mod config;
pub mod engagement;
pub mod error;
pub mod username;

pub use engagement::{EngagementKind, NotificationKind, ToggleOutcome};
pub use error::{Error, Result};
pub use username::MAX_USERNAME_ATTEMPTS;

/// Maximum stored username length.
pub const MAX_USERNAME_LEN: usize = 100;

/// Maximum stored display name length.
pub const MAX_FULLNAME_LEN: usize = 255;

/// Maximum comment body length. The store itself has no column limit;
/// this bound is enforced at the request boundary.
pub const MAX_COMMENT_LEN: usize = 2000;
