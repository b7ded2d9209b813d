//! Post creation, feed, deletion, and like handlers.

use crate::auth::require_auth;
use crate::error::{ApiError, ApiResult};
use crate::handlers::common::{MAX_JSON_BODY_SIZE, current_user, notify_best_effort, read_json_body};
use crate::metrics::{
    CASCADE_DELETE_DURATION, CASCADE_DELETIONS, MEDIA_DELETE_FAILURES, MEDIA_UPLOADS,
    MEDIA_UPLOAD_BYTES, POSTS_CREATED, record_toggle,
};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use pinboard_core::{EngagementKind, NotificationKind};
use pinboard_ledger::models::{FeedPostRow, NewNotification, NewPost, PostRow};
use pinboard_media::MediaError;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use time::OffsetDateTime;
use uuid::Uuid;

/// Maximum accepted caption length.
const MAX_CAPTION_LEN: usize = 2000;

/// Public post representation.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub image_url: String,
    pub caption: Option<String>,
    pub likes: i32,
    pub comments: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<PostRow> for PostResponse {
    fn from(row: PostRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            image_url: row.image_url,
            caption: row.caption,
            likes: row.likes,
            comments: row.comments,
            created_at: row.created_at,
        }
    }
}

/// Post enriched with author fields and per-viewer engagement flags.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedPostResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub image_url: String,
    pub caption: Option<String>,
    pub likes: i32,
    pub comments: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub author_username: String,
    pub author_image: Option<String>,
    pub is_liked: bool,
    pub is_bookmarked: bool,
}

impl From<FeedPostRow> for FeedPostResponse {
    fn from(row: FeedPostRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            image_url: row.image_url,
            caption: row.caption,
            likes: row.likes,
            comments: row.comments,
            created_at: row.created_at,
            author_username: row.author_username,
            author_image: row.author_image,
            is_liked: row.is_liked,
            is_bookmarked: row.is_bookmarked,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatePostRequest {
    caption: Option<String>,
    /// Image as a `data:<content-type>;base64,<payload>` URI.
    image: Option<String>,
}

/// Decode a `data:image/...;base64,...` URI into its content type and
/// raw bytes.
fn parse_data_uri(uri: &str) -> ApiResult<(String, Bytes)> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| ApiError::BadRequest("image must be a data URI".to_string()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| ApiError::BadRequest("malformed data URI".to_string()))?;
    let content_type = header
        .strip_suffix(";base64")
        .ok_or_else(|| ApiError::BadRequest("image data URI must be base64-encoded".to_string()))?;

    let data = BASE64
        .decode(payload.trim())
        .map_err(|e| ApiError::BadRequest(format!("invalid base64 image payload: {e}")))?;

    Ok((content_type.to_string(), Bytes::from(data)))
}

/// POST /api/posts - create a post from a caption and/or an image.
pub async fn create_post(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<(StatusCode, Json<PostResponse>)> {
    let auth = require_auth(&req)?.clone();
    let user = current_user(&state, &auth).await?;

    // Base64 inflates the image by 4/3, plus JSON envelope overhead.
    let body_limit = (state.config.server.max_image_bytes as usize) * 2 + MAX_JSON_BODY_SIZE;
    let body: CreatePostRequest = read_json_body(req, body_limit).await?;

    let caption = body
        .caption
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());
    if let Some(caption) = &caption
        && caption.len() > MAX_CAPTION_LEN
    {
        return Err(ApiError::BadRequest(format!(
            "caption exceeds {MAX_CAPTION_LEN} characters"
        )));
    }
    if caption.is_none() && body.image.is_none() {
        return Err(ApiError::BadRequest(
            "post requires a caption or an image".to_string(),
        ));
    }

    let asset = match &body.image {
        Some(uri) => {
            let (content_type, data) = parse_data_uri(uri)?;
            if data.len() as u64 > state.config.server.max_image_bytes {
                return Err(ApiError::BadRequest(format!(
                    "image exceeds maximum size of {} bytes",
                    state.config.server.max_image_bytes
                )));
            }
            let size = data.len();
            let asset = state.media.store(data, &content_type).await?;
            MEDIA_UPLOADS.inc();
            MEDIA_UPLOAD_BYTES.inc_by(size as u64);
            Some(asset)
        }
        None => None,
    };

    let new_post = NewPost {
        user_id: user.id,
        image_url: asset.as_ref().map(|a| a.url.clone()).unwrap_or_default(),
        storage_id: asset.as_ref().map(|a| a.storage_id.clone()),
        caption,
    };

    let post = match state.ledger.create_post(&new_post).await {
        Ok(post) => post,
        Err(e) => {
            // The asset is orphaned if the row never lands; clean it up
            // best-effort before surfacing the original error.
            if let Some(asset) = &asset
                && let Err(del_err) = state.media.delete(&asset.storage_id).await
            {
                MEDIA_DELETE_FAILURES.inc();
                tracing::error!(
                    storage_id = %asset.storage_id,
                    error = %del_err,
                    "Failed to delete orphaned media asset"
                );
            }
            return Err(e.into());
        }
    };

    POSTS_CREATED.inc();
    tracing::info!(post_id = %post.id, user_id = %user.id, "Post created");
    Ok((StatusCode::CREATED, Json(post.into())))
}

/// GET /api/posts/feed - all posts with the viewer's engagement flags.
pub async fn get_feed(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<Json<Vec<FeedPostResponse>>> {
    let auth = require_auth(&req)?;
    let user = current_user(&state, auth).await?;

    let rows = state.ledger.get_feed(user.id).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

/// GET /api/posts/user - the caller's own posts.
pub async fn get_own_posts(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<Json<Vec<PostResponse>>> {
    let auth = require_auth(&req)?;
    let user = current_user(&state, auth).await?;

    let rows = state.ledger.get_user_posts(user.id).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

/// GET /api/posts/user/{user_id} - a user's posts.
pub async fn get_user_posts(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    req: Request,
) -> ApiResult<Json<Vec<PostResponse>>> {
    require_auth(&req)?;

    state
        .ledger
        .get_user(user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".to_string()))?;

    let rows = state.ledger.get_user_posts(user_id).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

/// Confirmation with the row counts removed by a cascade deletion.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletePostResponse {
    pub message: &'static str,
    pub likes: u64,
    pub bookmarks: u64,
    pub notifications: u64,
    pub comments: u64,
}

/// DELETE /api/posts/{post_id} - cascade-delete an owned post.
///
/// Only the owner can delete; a post owned by someone else is
/// indistinguishable from an absent one. The media asset goes first and
/// best-effort, then all dependent rows and the owner's posts counter
/// in one transaction.
pub async fn delete_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    req: Request,
) -> ApiResult<Json<DeletePostResponse>> {
    let auth = require_auth(&req)?;
    let user = current_user(&state, auth).await?;

    let post = state
        .ledger
        .get_post_owned(post_id, user.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("post not found".to_string()))?;

    let start = Instant::now();

    if let Some(storage_id) = &post.storage_id {
        match state.media.delete(storage_id).await {
            Ok(()) | Err(MediaError::NotFound(_)) => {}
            Err(e) => {
                MEDIA_DELETE_FAILURES.inc();
                tracing::error!(
                    post_id = %post_id,
                    storage_id = %storage_id,
                    error = %e,
                    "Failed to delete media asset during post deletion"
                );
            }
        }
    }

    let summary = state.ledger.delete_post_cascade(post_id, user.id).await?;

    CASCADE_DELETIONS.inc();
    CASCADE_DELETE_DURATION.observe(start.elapsed().as_secs_f64());
    tracing::info!(
        post_id = %post_id,
        user_id = %user.id,
        likes = summary.likes,
        bookmarks = summary.bookmarks,
        notifications = summary.notifications,
        comments = summary.comments,
        "Post cascade-deleted"
    );

    Ok(Json(DeletePostResponse {
        message: "post deleted",
        likes: summary.likes,
        bookmarks: summary.bookmarks,
        notifications: summary.notifications,
        comments: summary.comments,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToggleLikeRequest {
    post_id: Uuid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleLikeResponse {
    pub liked: bool,
}

/// POST /api/posts/toggle-like - like or unlike a post.
pub async fn toggle_like(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<Json<ToggleLikeResponse>> {
    let auth = require_auth(&req)?.clone();
    let user = current_user(&state, &auth).await?;

    let body: ToggleLikeRequest = read_json_body(req, MAX_JSON_BODY_SIZE).await?;

    let post = state
        .ledger
        .get_post(body.post_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("post not found".to_string()))?;

    let outcome = state.ledger.toggle_like(user.id, body.post_id).await?;
    record_toggle(EngagementKind::Like, &outcome);

    if outcome.created {
        notify_best_effort(
            &state,
            NewNotification {
                receiver_id: post.user_id,
                sender_id: user.id,
                kind: NotificationKind::Like,
                post_id: Some(post.id),
                comment_id: None,
            },
        )
        .await;
    }

    Ok(Json(ToggleLikeResponse {
        liked: outcome.engaged,
    }))
}
