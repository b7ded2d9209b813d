//! Comment handlers.

use crate::auth::require_auth;
use crate::error::{ApiError, ApiResult};
use crate::handlers::common::{MAX_JSON_BODY_SIZE, current_user, notify_best_effort, read_json_body};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use pinboard_core::{MAX_COMMENT_LEN, NotificationKind};
use pinboard_ledger::models::{CommentRow, CommentWithAuthorRow, NewNotification};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub post_id: Uuid,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<CommentRow> for CommentResponse {
    fn from(row: CommentRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            post_id: row.post_id,
            content: row.content,
            created_at: row.created_at,
        }
    }
}

/// Comment with author display fields.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentWithAuthorResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub post_id: Uuid,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub author_fullname: String,
    pub author_image: Option<String>,
}

impl From<CommentWithAuthorRow> for CommentWithAuthorResponse {
    fn from(row: CommentWithAuthorRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            post_id: row.post_id,
            content: row.content,
            created_at: row.created_at,
            author_fullname: row.author_fullname,
            author_image: row.author_image,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateCommentRequest {
    post_id: Uuid,
    content: String,
}

/// POST /api/comments - comment on a post.
pub async fn create_comment(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<(StatusCode, Json<CommentResponse>)> {
    let auth = require_auth(&req)?.clone();
    let user = current_user(&state, &auth).await?;

    let body: CreateCommentRequest = read_json_body(req, MAX_JSON_BODY_SIZE).await?;

    let content = body.content.trim();
    if content.is_empty() {
        return Err(ApiError::BadRequest("comment must not be empty".to_string()));
    }
    if content.len() > MAX_COMMENT_LEN {
        return Err(ApiError::BadRequest(format!(
            "comment exceeds {MAX_COMMENT_LEN} characters"
        )));
    }

    let post = state
        .ledger
        .get_post(body.post_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("post not found".to_string()))?;

    let comment = state
        .ledger
        .create_comment(user.id, post.id, content)
        .await?;

    notify_best_effort(
        &state,
        NewNotification {
            receiver_id: post.user_id,
            sender_id: user.id,
            kind: NotificationKind::Comment,
            post_id: Some(post.id),
            comment_id: Some(comment.id),
        },
    )
    .await;

    Ok((StatusCode::CREATED, Json(comment.into())))
}

/// GET /api/comments/{post_id} - a post's comments, oldest first.
pub async fn get_comments(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    req: Request,
) -> ApiResult<Json<Vec<CommentWithAuthorResponse>>> {
    require_auth(&req)?;

    state
        .ledger
        .get_post(post_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("post not found".to_string()))?;

    let rows = state.ledger.get_post_comments(post_id).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}
