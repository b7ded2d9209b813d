//! Database models mapping to the ledger schema.

use pinboard_core::NotificationKind;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

// =============================================================================
// Users
// =============================================================================

/// User record with denormalized relationship counters.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    /// Subject identifier issued by the external identity provider.
    pub external_id: String,
    pub username: String,
    pub fullname: String,
    pub email: String,
    pub bio: Option<String>,
    pub image: Option<String>,
    pub followers: i32,
    pub following: i32,
    pub posts: i32,
    pub created_at: OffsetDateTime,
}

/// Fields required to create a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub external_id: String,
    pub username: String,
    pub fullname: String,
    pub email: String,
    pub bio: Option<String>,
    pub image: Option<String>,
}

// =============================================================================
// Posts
// =============================================================================

/// Post record with denormalized engagement counters.
#[derive(Debug, Clone, FromRow)]
pub struct PostRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub image_url: String,
    /// Media store deletion handle. Absent for caption-only posts.
    pub storage_id: Option<String>,
    pub caption: Option<String>,
    pub likes: i32,
    pub comments: i32,
    pub created_at: OffsetDateTime,
}

/// Fields required to create a post.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub user_id: Uuid,
    pub image_url: String,
    pub storage_id: Option<String>,
    pub caption: Option<String>,
}

/// Post enriched with author fields and per-viewer engagement flags.
#[derive(Debug, Clone, FromRow)]
pub struct FeedPostRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub image_url: String,
    pub caption: Option<String>,
    pub likes: i32,
    pub comments: i32,
    pub created_at: OffsetDateTime,
    pub author_username: String,
    pub author_image: Option<String>,
    pub is_liked: bool,
    pub is_bookmarked: bool,
}

// =============================================================================
// Comments
// =============================================================================

/// Comment record.
#[derive(Debug, Clone, FromRow)]
pub struct CommentRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub post_id: Uuid,
    pub content: String,
    pub created_at: OffsetDateTime,
}

/// Comment enriched with author display fields.
#[derive(Debug, Clone, FromRow)]
pub struct CommentWithAuthorRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub post_id: Uuid,
    pub content: String,
    pub created_at: OffsetDateTime,
    pub author_fullname: String,
    pub author_image: Option<String>,
}

// =============================================================================
// Notifications
// =============================================================================

/// Notification record.
#[derive(Debug, Clone, FromRow)]
pub struct NotificationRow {
    pub id: Uuid,
    pub receiver_id: Uuid,
    pub sender_id: Uuid,
    pub kind: String,
    pub post_id: Option<Uuid>,
    pub comment_id: Option<Uuid>,
    pub created_at: OffsetDateTime,
}

/// Fields required to create a notification.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub receiver_id: Uuid,
    pub sender_id: Uuid,
    pub kind: NotificationKind,
    pub post_id: Option<Uuid>,
    pub comment_id: Option<Uuid>,
}

/// Notification enriched with sender display fields and the related post.
///
/// Post fields are NULL for notifications without a post reference
/// (follow notifications).
#[derive(Debug, Clone, FromRow)]
pub struct NotificationFeedRow {
    pub id: Uuid,
    pub kind: String,
    pub created_at: OffsetDateTime,
    pub sender_id: Uuid,
    pub sender_username: String,
    pub sender_fullname: String,
    pub sender_image: Option<String>,
    pub post_id: Option<Uuid>,
    pub post_image_url: Option<String>,
    pub post_caption: Option<String>,
    pub post_user_id: Option<Uuid>,
}

// =============================================================================
// Cascade deletion
// =============================================================================

/// Row counts removed by a post cascade deletion.
#[derive(Debug, Clone, Default)]
pub struct CascadeSummary {
    pub likes: u64,
    pub bookmarks: u64,
    pub notifications: u64,
    pub comments: u64,
}
