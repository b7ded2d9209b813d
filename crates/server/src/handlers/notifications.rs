//! Notification feed handlers.

use crate::auth::require_auth;
use crate::error::ApiResult;
use crate::handlers::common::current_user;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use pinboard_ledger::models::NotificationFeedRow;
use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSender {
    pub id: Uuid,
    pub username: String,
    pub fullname: String,
    pub image: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPost {
    pub id: Uuid,
    pub image_url: String,
    pub caption: Option<String>,
    pub user_id: Uuid,
}

/// Notification with the sender and, when present, the related post.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationResponse {
    pub id: Uuid,
    pub kind: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub sender: NotificationSender,
    pub post: Option<NotificationPost>,
}

impl From<NotificationFeedRow> for NotificationResponse {
    fn from(row: NotificationFeedRow) -> Self {
        let post = match (row.post_id, row.post_user_id) {
            (Some(id), Some(user_id)) => Some(NotificationPost {
                id,
                image_url: row.post_image_url.unwrap_or_default(),
                caption: row.post_caption,
                user_id,
            }),
            _ => None,
        };
        Self {
            id: row.id,
            kind: row.kind,
            created_at: row.created_at,
            sender: NotificationSender {
                id: row.sender_id,
                username: row.sender_username,
                fullname: row.sender_fullname,
                image: row.sender_image,
            },
            post,
        }
    }
}

/// GET /api/notifications - the caller's notifications, newest first.
pub async fn get_notifications(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<Json<Vec<NotificationResponse>>> {
    let auth = require_auth(&req)?;
    let user = current_user(&state, auth).await?;

    let rows = state.ledger.get_notifications(user.id).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

/// DELETE /api/notifications/{notification_id}.
///
/// Scoped to the receiver; someone else's notification is a 404.
pub async fn delete_notification(
    State(state): State<AppState>,
    Path(notification_id): Path<Uuid>,
    req: Request,
) -> ApiResult<StatusCode> {
    let auth = require_auth(&req)?;
    let user = current_user(&state, auth).await?;

    state
        .ledger
        .delete_notification(notification_id, user.id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
