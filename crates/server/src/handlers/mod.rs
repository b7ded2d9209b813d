//! HTTP request handlers.

pub mod bookmarks;
pub mod comments;
pub mod common;
pub mod health;
pub mod notifications;
pub mod posts;
pub mod users;

pub use bookmarks::{get_bookmarks, toggle_bookmark};
pub use comments::{create_comment, get_comments};
pub use health::health_check;
pub use notifications::{delete_notification, get_notifications};
pub use posts::{create_post, delete_post, get_feed, get_own_posts, get_user_posts, toggle_like};
pub use users::{get_me, get_profile, is_following, sync_user, toggle_follow, update_profile};
