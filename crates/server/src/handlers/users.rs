//! User sync, profile, and follow handlers.

use crate::auth::require_auth;
use crate::error::{ApiError, ApiResult};
use crate::handlers::common::{MAX_JSON_BODY_SIZE, current_user, notify_best_effort, read_json_body};
use crate::metrics::record_toggle;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use pinboard_core::{EngagementKind, MAX_FULLNAME_LEN, NotificationKind, username};
use pinboard_ledger::models::{NewNotification, NewUser, UserRow};
use pinboard_ledger::LedgerError;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Maximum accepted bio length.
const MAX_BIO_LEN: usize = 2000;

/// Public user representation.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub fullname: String,
    pub email: String,
    pub bio: Option<String>,
    pub image: Option<String>,
    pub followers: i32,
    pub following: i32,
    pub posts: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<UserRow> for UserResponse {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            fullname: row.fullname,
            email: row.email,
            bio: row.bio,
            image: row.image,
            followers: row.followers,
            following: row.following,
            posts: row.posts,
            created_at: row.created_at,
        }
    }
}

/// Optional overrides for the profile fields seeded from token claims.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SyncUserRequest {
    username: Option<String>,
    fullname: Option<String>,
    email: Option<String>,
    image: Option<String>,
}

/// POST /api/users/sync - ensure a user row exists for the caller.
///
/// Idempotent: returns the existing row with 200 when the subject is
/// already known, otherwise creates one (201) with a collision-free
/// username derived from the identity profile.
pub async fn sync_user(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<(StatusCode, Json<UserResponse>)> {
    let auth = require_auth(&req)?.clone();

    if let Some(existing) = state
        .ledger
        .get_user_by_external_id(&auth.claims.sub)
        .await?
    {
        return Ok((StatusCode::OK, Json(existing.into())));
    }

    let body: SyncUserRequest = {
        let bytes = axum::body::to_bytes(req.into_body(), MAX_JSON_BODY_SIZE)
            .await
            .map_err(|e| ApiError::BadRequest(format!("failed to read body: {e}")))?;
        if bytes.is_empty() {
            SyncUserRequest::default()
        } else {
            serde_json::from_slice(&bytes)
                .map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {e}")))?
        }
    };

    let claims = &auth.claims;
    let email = body
        .email
        .or_else(|| claims.email.clone())
        .unwrap_or_default();
    let fullname = body
        .fullname
        .or_else(|| claims.name.clone())
        .or_else(|| email.split('@').next().map(str::to_string))
        .unwrap_or_default();
    let image = body.image.or_else(|| claims.picture.clone());

    let preferred = body
        .username
        .as_deref()
        .or(claims.preferred_username.as_deref());
    let base = username::base_from_profile(
        preferred,
        (!email.is_empty()).then_some(email.as_str()),
        &fullname,
        &claims.sub,
    );

    let (user, created) =
        create_with_unique_username(&state, &claims.sub, &base, &fullname, &email, image).await?;

    if created {
        tracing::info!(user_id = %user.id, username = %user.username, "User account created");
        Ok((StatusCode::CREATED, Json(user.into())))
    } else {
        Ok((StatusCode::OK, Json(user.into())))
    }
}

/// Probe numbered username candidates, then fall back to the
/// timestamped name, which itself gets one retry with a fresh
/// timestamp. The unique constraints stay the final arbiter: a
/// candidate that passes the probe but loses the insert race is
/// retried as a collision, and an insert rejected on the subject's own
/// constraint (a concurrent sync of the same caller) resolves to the
/// row that won.
///
/// Returns the user row and whether this call created it.
async fn create_with_unique_username(
    state: &AppState,
    external_id: &str,
    base: &str,
    fullname: &str,
    email: &str,
    image: Option<String>,
) -> ApiResult<(UserRow, bool)> {
    let new_user = |username: String| NewUser {
        external_id: external_id.to_string(),
        username,
        fullname: fullname.to_string(),
        email: email.to_string(),
        bio: None,
        image: image.clone(),
    };

    for attempt in 0..username::MAX_USERNAME_ATTEMPTS {
        let candidate = username::candidate(base, attempt);
        if state.ledger.username_exists(&candidate).await? {
            continue;
        }

        match state.ledger.create_user(&new_user(candidate)).await {
            Ok(user) => return Ok((user, true)),
            Err(LedgerError::AlreadyExists(_)) => {
                if let Some(existing) = state.ledger.get_user_by_external_id(external_id).await? {
                    return Ok((existing, false));
                }
                // Lost the insert race for this candidate, keep probing.
                continue;
            }
            Err(e) => return Err(e.into()),
        }
    }

    for retry in 0..2 {
        let now = OffsetDateTime::now_utc();
        let timestamp = if retry == 0 {
            now.unix_timestamp()
        } else {
            now.unix_timestamp_nanos() as i64
        };
        let fallback = username::fallback(external_id, timestamp);
        match state.ledger.create_user(&new_user(fallback)).await {
            Ok(user) => return Ok((user, true)),
            Err(LedgerError::AlreadyExists(_)) => {
                if let Some(existing) = state.ledger.get_user_by_external_id(external_id).await? {
                    return Ok((existing, false));
                }
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(ApiError::Conflict(
        "could not allocate a unique username".to_string(),
    ))
}

/// GET /api/users/me - the caller's own user record.
pub async fn get_me(State(state): State<AppState>, req: Request) -> ApiResult<Json<UserResponse>> {
    let auth = require_auth(&req)?;
    let user = current_user(&state, auth).await?;
    Ok(Json(user.into()))
}

/// Profile with the viewer's follow relationship.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub is_following: bool,
}

/// GET /api/users/profile/{user_id} - another user's profile.
pub async fn get_profile(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    req: Request,
) -> ApiResult<Json<ProfileResponse>> {
    let auth = require_auth(&req)?;
    let viewer = current_user(&state, auth).await?;

    let user = state
        .ledger
        .get_user(user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".to_string()))?;

    let is_following = state.ledger.is_following(viewer.id, user.id).await?;

    Ok(Json(ProfileResponse {
        user: user.into(),
        is_following,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateProfileRequest {
    fullname: String,
    #[serde(default)]
    bio: String,
}

/// PUT /api/users/profile - update the caller's profile fields.
pub async fn update_profile(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<Json<UserResponse>> {
    let auth = require_auth(&req)?.clone();
    let user = current_user(&state, &auth).await?;

    let body: UpdateProfileRequest = read_json_body(req, MAX_JSON_BODY_SIZE).await?;

    let fullname = body.fullname.trim();
    if fullname.is_empty() {
        return Err(ApiError::BadRequest("fullname must not be empty".to_string()));
    }
    if fullname.len() > MAX_FULLNAME_LEN {
        return Err(ApiError::BadRequest(format!(
            "fullname exceeds {MAX_FULLNAME_LEN} characters"
        )));
    }
    if body.bio.len() > MAX_BIO_LEN {
        return Err(ApiError::BadRequest(format!(
            "bio exceeds {MAX_BIO_LEN} characters"
        )));
    }

    let updated = state
        .ledger
        .update_profile(user.id, fullname, body.bio.trim())
        .await?;
    Ok(Json(updated.into()))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IsFollowingResponse {
    pub is_following: bool,
}

/// GET /api/users/is-following/{following_id}.
pub async fn is_following(
    State(state): State<AppState>,
    Path(following_id): Path<Uuid>,
    req: Request,
) -> ApiResult<Json<IsFollowingResponse>> {
    let auth = require_auth(&req)?;
    let viewer = current_user(&state, auth).await?;

    let is_following = state.ledger.is_following(viewer.id, following_id).await?;
    Ok(Json(IsFollowingResponse { is_following }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToggleFollowRequest {
    following_id: Uuid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleFollowResponse {
    pub followed: bool,
}

/// POST /api/users/toggle-follow - follow or unfollow a user.
///
/// Fan-out keys off the `created` flag so a toggle that lost a
/// concurrent creation race never duplicates the notification.
pub async fn toggle_follow(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<Json<ToggleFollowResponse>> {
    let auth = require_auth(&req)?.clone();
    let user = current_user(&state, &auth).await?;

    let body: ToggleFollowRequest = read_json_body(req, MAX_JSON_BODY_SIZE).await?;

    let outcome = state.ledger.toggle_follow(user.id, body.following_id).await?;
    record_toggle(EngagementKind::Follow, &outcome);

    if outcome.created {
        notify_best_effort(
            &state,
            NewNotification {
                receiver_id: body.following_id,
                sender_id: user.id,
                kind: NotificationKind::Follow,
                post_id: None,
                comment_id: None,
            },
        )
        .await;
    }

    Ok(Json(ToggleFollowResponse {
        followed: outcome.engaged,
    }))
}
