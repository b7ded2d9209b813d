//! Shared handler helpers.

use crate::auth::AuthenticatedIdentity;
use crate::error::{ApiError, ApiResult};
use crate::metrics::{NOTIFICATIONS_EMITTED, NOTIFICATIONS_FAILED, NOTIFICATIONS_SUPPRESSED};
use crate::state::AppState;
use axum::extract::Request;
use pinboard_ledger::models::{NewNotification, UserRow};
use serde::de::DeserializeOwned;

/// Maximum request body size for plain JSON requests (64 KiB).
/// Post creation reads bodies with its own image-sized limit.
pub const MAX_JSON_BODY_SIZE: usize = 64 * 1024;

/// Read and decode a JSON request body with a size limit.
pub async fn read_json_body<T: DeserializeOwned>(req: Request, limit: usize) -> ApiResult<T> {
    let bytes = axum::body::to_bytes(req.into_body(), limit)
        .await
        .map_err(|e| ApiError::BadRequest(format!("failed to read body: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {e}")))
}

/// Resolve the ledger user for a verified identity.
///
/// A valid token whose subject has no user row means the account was
/// never synced; callers must hit `/api/users/sync` first.
pub async fn current_user(state: &AppState, auth: &AuthenticatedIdentity) -> ApiResult<UserRow> {
    state
        .ledger
        .get_user_by_external_id(&auth.claims.sub)
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found, sync the account first".to_string()))
}

/// Record a notification after a primary mutation committed.
///
/// Self-notifications are suppressed. Failures are logged and counted
/// but never surfaced: the primary mutation already committed and must
/// not be rolled back or reported as failed.
pub async fn notify_best_effort(state: &AppState, notification: NewNotification) {
    if notification.receiver_id == notification.sender_id {
        NOTIFICATIONS_SUPPRESSED.inc();
        return;
    }

    match state.ledger.create_notification(&notification).await {
        Ok(_) => {
            NOTIFICATIONS_EMITTED.inc();
        }
        Err(e) => {
            NOTIFICATIONS_FAILED.inc();
            tracing::error!(
                error = %e,
                kind = %notification.kind,
                receiver_id = %notification.receiver_id,
                "Failed to record notification"
            );
        }
    }
}
