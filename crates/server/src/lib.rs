//! HTTP API server for the pinboard backend.
//!
//! This crate provides the REST surface over the engagement ledger:
//! - User sync and profile endpoints
//! - Post creation, feed, and cascade deletion
//! - Follow, like, and bookmark toggles
//! - Comments and notifications

pub mod auth;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod keepalive;
pub mod metrics;
pub mod ratelimit;
pub mod routes;
pub mod state;

pub use auth::TraceId;
pub use error::ApiError;
pub use identity::IdentityVerifier;
pub use ratelimit::{RateLimitState, SubjectIdExtension};
pub use routes::create_router;
pub use state::AppState;
