//! Ledger store trait and SQLite implementation.

use crate::error::{LedgerError, LedgerResult};
use crate::repos::{CommentRepo, EngagementRepo, NotificationRepo, PostRepo, UserRepo};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Combined ledger store trait.
#[async_trait]
pub trait LedgerStore:
    UserRepo + PostRepo + EngagementRepo + CommentRepo + NotificationRepo + Send + Sync
{
    /// Run database migrations.
    async fn migrate(&self) -> LedgerResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> LedgerResult<()>;
}

/// SQLite-based ledger store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
    #[allow(dead_code)] // Reserved for future timeout wrapper implementation
    query_timeout_secs: u64,
}

impl SqliteStore {
    /// Create a new SQLite store.
    pub async fn new(
        path: impl AsRef<Path>,
        query_timeout_secs: Option<u64>,
    ) -> LedgerResult<Self> {
        let path = path.as_ref();
        let query_timeout_secs = query_timeout_secs.unwrap_or(600); // 10 minutes default

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            // Prevent transient "database is locked" errors under concurrent access.
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            // SQLite permits limited write concurrency; using a single connection avoids
            // persistent "database is locked" failures under test/axum concurrency.
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self {
            pool,
            query_timeout_secs,
        };
        store.migrate().await?;

        tracing::warn!(
            query_timeout_secs = query_timeout_secs,
            "SQLite query timeout is advisory only - long queries may exceed timeout. \
             SQLite lacks statement cancellation like PostgreSQL's statement_timeout. \
             For production deployments use PostgreSQL; SQLite is recommended for \
             testing and single-instance deployments only."
        );

        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl LedgerStore for SqliteStore {
    async fn migrate(&self) -> LedgerResult<()> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> LedgerResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

// Implement all the repository traits for SqliteStore
mod sqlite_impl {
    use super::*;
    use crate::models::*;
    use pinboard_core::ToggleOutcome;
    use time::OffsetDateTime;
    use uuid::Uuid;

    #[async_trait]
    impl UserRepo for SqliteStore {
        async fn create_user(&self, user: &NewUser) -> LedgerResult<UserRow> {
            let row = UserRow {
                id: Uuid::new_v4(),
                external_id: user.external_id.clone(),
                username: user.username.clone(),
                fullname: user.fullname.clone(),
                email: user.email.clone(),
                bio: user.bio.clone(),
                image: user.image.clone(),
                followers: 0,
                following: 0,
                posts: 0,
                created_at: OffsetDateTime::now_utc(),
            };

            let result = sqlx::query(
                "INSERT INTO users (id, external_id, username, fullname, email, bio, image, followers, following, posts, created_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(row.id)
            .bind(&row.external_id)
            .bind(&row.username)
            .bind(&row.fullname)
            .bind(&row.email)
            .bind(&row.bio)
            .bind(&row.image)
            .bind(row.followers)
            .bind(row.following)
            .bind(row.posts)
            .bind(row.created_at)
            .execute(&self.pool)
            .await;

            match result {
                Ok(_) => Ok(row),
                Err(sqlx::Error::Database(db_err)) => {
                    if db_err.message().contains("UNIQUE constraint") {
                        Err(LedgerError::AlreadyExists(format!(
                            "user with username '{}' or subject '{}'",
                            row.username, row.external_id
                        )))
                    } else {
                        Err(sqlx::Error::Database(db_err).into())
                    }
                }
                Err(e) => Err(e.into()),
            }
        }

        async fn get_user(&self, user_id: Uuid) -> LedgerResult<Option<UserRow>> {
            let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = ?")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn get_user_by_external_id(
            &self,
            external_id: &str,
        ) -> LedgerResult<Option<UserRow>> {
            let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE external_id = ?")
                .bind(external_id)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn username_exists(&self, username: &str) -> LedgerResult<bool> {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE username = ?)")
                    .bind(username)
                    .fetch_one(&self.pool)
                    .await?;
            Ok(exists)
        }

        async fn update_profile(
            &self,
            user_id: Uuid,
            fullname: &str,
            bio: &str,
        ) -> LedgerResult<UserRow> {
            let result = sqlx::query("UPDATE users SET fullname = ?, bio = ? WHERE id = ?")
                .bind(fullname)
                .bind(bio)
                .bind(user_id)
                .execute(&self.pool)
                .await?;

            if result.rows_affected() == 0 {
                return Err(LedgerError::NotFound(format!("user {}", user_id)));
            }

            self.get_user(user_id)
                .await?
                .ok_or_else(|| LedgerError::NotFound(format!("user {}", user_id)))
        }
    }

    #[async_trait]
    impl PostRepo for SqliteStore {
        async fn create_post(&self, post: &NewPost) -> LedgerResult<PostRow> {
            let row = PostRow {
                id: Uuid::new_v4(),
                user_id: post.user_id,
                image_url: post.image_url.clone(),
                storage_id: post.storage_id.clone(),
                caption: post.caption.clone(),
                likes: 0,
                comments: 0,
                created_at: OffsetDateTime::now_utc(),
            };

            let mut tx = self.pool.begin().await?;

            sqlx::query(
                "INSERT INTO posts (id, user_id, image_url, storage_id, caption, likes, comments, created_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(row.id)
            .bind(row.user_id)
            .bind(&row.image_url)
            .bind(&row.storage_id)
            .bind(&row.caption)
            .bind(row.likes)
            .bind(row.comments)
            .bind(row.created_at)
            .execute(&mut *tx)
            .await?;

            sqlx::query("UPDATE users SET posts = posts + 1 WHERE id = ?")
                .bind(row.user_id)
                .execute(&mut *tx)
                .await?;

            tx.commit().await?;
            Ok(row)
        }

        async fn get_post(&self, post_id: Uuid) -> LedgerResult<Option<PostRow>> {
            let row = sqlx::query_as::<_, PostRow>("SELECT * FROM posts WHERE id = ?")
                .bind(post_id)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn get_post_owned(
            &self,
            post_id: Uuid,
            owner_id: Uuid,
        ) -> LedgerResult<Option<PostRow>> {
            let row =
                sqlx::query_as::<_, PostRow>("SELECT * FROM posts WHERE id = ? AND user_id = ?")
                    .bind(post_id)
                    .bind(owner_id)
                    .fetch_optional(&self.pool)
                    .await?;
            Ok(row)
        }

        async fn get_feed(&self, viewer_id: Uuid) -> LedgerResult<Vec<FeedPostRow>> {
            let rows = sqlx::query_as::<_, FeedPostRow>(
                "SELECT p.id, p.user_id, p.image_url, p.caption, p.likes, p.comments, p.created_at, \
                        u.username AS author_username, u.image AS author_image, \
                        EXISTS(SELECT 1 FROM likes l WHERE l.post_id = p.id AND l.user_id = ?) AS is_liked, \
                        EXISTS(SELECT 1 FROM bookmarks b WHERE b.post_id = p.id AND b.user_id = ?) AS is_bookmarked \
                 FROM posts p \
                 JOIN users u ON u.id = p.user_id \
                 ORDER BY p.created_at DESC",
            )
            .bind(viewer_id)
            .bind(viewer_id)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn get_user_posts(&self, user_id: Uuid) -> LedgerResult<Vec<PostRow>> {
            let rows = sqlx::query_as::<_, PostRow>(
                "SELECT * FROM posts WHERE user_id = ? ORDER BY created_at DESC",
            )
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn delete_post_cascade(
            &self,
            post_id: Uuid,
            owner_id: Uuid,
        ) -> LedgerResult<CascadeSummary> {
            let mut tx = self.pool.begin().await?;

            let likes = sqlx::query("DELETE FROM likes WHERE post_id = ?")
                .bind(post_id)
                .execute(&mut *tx)
                .await?
                .rows_affected();

            let bookmarks = sqlx::query("DELETE FROM bookmarks WHERE post_id = ?")
                .bind(post_id)
                .execute(&mut *tx)
                .await?
                .rows_affected();

            let notifications = sqlx::query("DELETE FROM notifications WHERE post_id = ?")
                .bind(post_id)
                .execute(&mut *tx)
                .await?
                .rows_affected();

            let comments = sqlx::query("DELETE FROM comments WHERE post_id = ?")
                .bind(post_id)
                .execute(&mut *tx)
                .await?
                .rows_affected();

            let deleted = sqlx::query("DELETE FROM posts WHERE id = ? AND user_id = ?")
                .bind(post_id)
                .bind(owner_id)
                .execute(&mut *tx)
                .await?
                .rows_affected();

            if deleted == 0 {
                // Dropping the transaction rolls back the deletes above.
                return Err(LedgerError::NotFound(format!("post {}", post_id)));
            }

            sqlx::query("UPDATE users SET posts = MAX(0, posts - 1) WHERE id = ?")
                .bind(owner_id)
                .execute(&mut *tx)
                .await?;

            tx.commit().await?;

            Ok(CascadeSummary {
                likes,
                bookmarks,
                notifications,
                comments,
            })
        }
    }

    #[async_trait]
    impl EngagementRepo for SqliteStore {
        async fn toggle_follow(
            &self,
            follower_id: Uuid,
            following_id: Uuid,
        ) -> LedgerResult<ToggleOutcome> {
            if follower_id == following_id {
                return Err(LedgerError::SelfFollow);
            }

            let mut tx = self.pool.begin().await?;

            let removed = sqlx::query(
                "DELETE FROM follows WHERE follower_id = ? AND following_id = ?",
            )
            .bind(follower_id)
            .bind(following_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

            if removed > 0 {
                sqlx::query("UPDATE users SET following = MAX(0, following - 1) WHERE id = ?")
                    .bind(follower_id)
                    .execute(&mut *tx)
                    .await?;
                sqlx::query("UPDATE users SET followers = MAX(0, followers - 1) WHERE id = ?")
                    .bind(following_id)
                    .execute(&mut *tx)
                    .await?;
                tx.commit().await?;
                return Ok(ToggleOutcome {
                    engaged: false,
                    created: false,
                });
            }

            let result = sqlx::query(
                "INSERT OR IGNORE INTO follows (id, follower_id, following_id, created_at) \
                 VALUES (?, ?, ?, ?)",
            )
            .bind(Uuid::new_v4())
            .bind(follower_id)
            .bind(following_id)
            .bind(OffsetDateTime::now_utc())
            .execute(&mut *tx)
            .await;

            let inserted = match result {
                Ok(r) => r.rows_affected() > 0,
                Err(sqlx::Error::Database(db_err)) => {
                    // OR IGNORE does not swallow foreign key failures; a
                    // missing target user surfaces here.
                    if db_err.message().contains("FOREIGN KEY constraint") {
                        return Err(LedgerError::NotFound(format!("user {}", following_id)));
                    }
                    return Err(sqlx::Error::Database(db_err).into());
                }
                Err(e) => return Err(e.into()),
            };

            if !inserted {
                // Lost a creation race; the edge already exists and the
                // inserting transaction owns the counter increments.
                tx.commit().await?;
                return Ok(ToggleOutcome {
                    engaged: true,
                    created: false,
                });
            }

            sqlx::query("UPDATE users SET following = following + 1 WHERE id = ?")
                .bind(follower_id)
                .execute(&mut *tx)
                .await?;
            sqlx::query("UPDATE users SET followers = followers + 1 WHERE id = ?")
                .bind(following_id)
                .execute(&mut *tx)
                .await?;

            tx.commit().await?;
            Ok(ToggleOutcome {
                engaged: true,
                created: true,
            })
        }

        async fn toggle_like(&self, user_id: Uuid, post_id: Uuid) -> LedgerResult<ToggleOutcome> {
            let mut tx = self.pool.begin().await?;

            let removed = sqlx::query("DELETE FROM likes WHERE user_id = ? AND post_id = ?")
                .bind(user_id)
                .bind(post_id)
                .execute(&mut *tx)
                .await?
                .rows_affected();

            if removed > 0 {
                sqlx::query("UPDATE posts SET likes = MAX(0, likes - 1) WHERE id = ?")
                    .bind(post_id)
                    .execute(&mut *tx)
                    .await?;
                tx.commit().await?;
                return Ok(ToggleOutcome {
                    engaged: false,
                    created: false,
                });
            }

            let result = sqlx::query(
                "INSERT OR IGNORE INTO likes (id, user_id, post_id, created_at) \
                 VALUES (?, ?, ?, ?)",
            )
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(post_id)
            .bind(OffsetDateTime::now_utc())
            .execute(&mut *tx)
            .await;

            let inserted = match result {
                Ok(r) => r.rows_affected() > 0,
                Err(sqlx::Error::Database(db_err)) => {
                    if db_err.message().contains("FOREIGN KEY constraint") {
                        return Err(LedgerError::NotFound(format!("post {}", post_id)));
                    }
                    return Err(sqlx::Error::Database(db_err).into());
                }
                Err(e) => return Err(e.into()),
            };

            if !inserted {
                tx.commit().await?;
                return Ok(ToggleOutcome {
                    engaged: true,
                    created: false,
                });
            }

            sqlx::query("UPDATE posts SET likes = likes + 1 WHERE id = ?")
                .bind(post_id)
                .execute(&mut *tx)
                .await?;

            tx.commit().await?;
            Ok(ToggleOutcome {
                engaged: true,
                created: true,
            })
        }

        async fn toggle_bookmark(
            &self,
            user_id: Uuid,
            post_id: Uuid,
        ) -> LedgerResult<ToggleOutcome> {
            let mut tx = self.pool.begin().await?;

            let removed = sqlx::query("DELETE FROM bookmarks WHERE user_id = ? AND post_id = ?")
                .bind(user_id)
                .bind(post_id)
                .execute(&mut *tx)
                .await?
                .rows_affected();

            if removed > 0 {
                tx.commit().await?;
                return Ok(ToggleOutcome {
                    engaged: false,
                    created: false,
                });
            }

            let result = sqlx::query(
                "INSERT OR IGNORE INTO bookmarks (id, user_id, post_id, created_at) \
                 VALUES (?, ?, ?, ?)",
            )
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(post_id)
            .bind(OffsetDateTime::now_utc())
            .execute(&mut *tx)
            .await;

            let inserted = match result {
                Ok(r) => r.rows_affected() > 0,
                Err(sqlx::Error::Database(db_err)) => {
                    if db_err.message().contains("FOREIGN KEY constraint") {
                        return Err(LedgerError::NotFound(format!("post {}", post_id)));
                    }
                    return Err(sqlx::Error::Database(db_err).into());
                }
                Err(e) => return Err(e.into()),
            };

            tx.commit().await?;
            Ok(ToggleOutcome {
                engaged: true,
                created: inserted,
            })
        }

        async fn is_following(
            &self,
            follower_id: Uuid,
            following_id: Uuid,
        ) -> LedgerResult<bool> {
            let exists: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM follows WHERE follower_id = ? AND following_id = ?)",
            )
            .bind(follower_id)
            .bind(following_id)
            .fetch_one(&self.pool)
            .await?;
            Ok(exists)
        }

        async fn get_bookmarked_posts(&self, user_id: Uuid) -> LedgerResult<Vec<FeedPostRow>> {
            let rows = sqlx::query_as::<_, FeedPostRow>(
                "SELECT p.id, p.user_id, p.image_url, p.caption, p.likes, p.comments, p.created_at, \
                        u.username AS author_username, u.image AS author_image, \
                        EXISTS(SELECT 1 FROM likes l WHERE l.post_id = p.id AND l.user_id = bm.user_id) AS is_liked, \
                        1 AS is_bookmarked \
                 FROM bookmarks bm \
                 JOIN posts p ON p.id = bm.post_id \
                 JOIN users u ON u.id = p.user_id \
                 WHERE bm.user_id = ? \
                 ORDER BY bm.created_at DESC",
            )
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }
    }

    #[async_trait]
    impl CommentRepo for SqliteStore {
        async fn create_comment(
            &self,
            user_id: Uuid,
            post_id: Uuid,
            content: &str,
        ) -> LedgerResult<CommentRow> {
            let row = CommentRow {
                id: Uuid::new_v4(),
                user_id,
                post_id,
                content: content.to_string(),
                created_at: OffsetDateTime::now_utc(),
            };

            let mut tx = self.pool.begin().await?;

            let result = sqlx::query(
                "INSERT INTO comments (id, user_id, post_id, content, created_at) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(row.id)
            .bind(row.user_id)
            .bind(row.post_id)
            .bind(&row.content)
            .bind(row.created_at)
            .execute(&mut *tx)
            .await;

            match result {
                Ok(_) => {}
                Err(sqlx::Error::Database(db_err)) => {
                    if db_err.message().contains("FOREIGN KEY constraint") {
                        return Err(LedgerError::NotFound(format!("post {}", post_id)));
                    }
                    return Err(sqlx::Error::Database(db_err).into());
                }
                Err(e) => return Err(e.into()),
            }

            sqlx::query("UPDATE posts SET comments = comments + 1 WHERE id = ?")
                .bind(post_id)
                .execute(&mut *tx)
                .await?;

            tx.commit().await?;
            Ok(row)
        }

        async fn get_post_comments(
            &self,
            post_id: Uuid,
        ) -> LedgerResult<Vec<CommentWithAuthorRow>> {
            let rows = sqlx::query_as::<_, CommentWithAuthorRow>(
                "SELECT c.id, c.user_id, c.post_id, c.content, c.created_at, \
                        u.fullname AS author_fullname, u.image AS author_image \
                 FROM comments c \
                 JOIN users u ON u.id = c.user_id \
                 WHERE c.post_id = ? \
                 ORDER BY c.created_at ASC",
            )
            .bind(post_id)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }
    }

    #[async_trait]
    impl NotificationRepo for SqliteStore {
        async fn create_notification(
            &self,
            notification: &NewNotification,
        ) -> LedgerResult<NotificationRow> {
            let row = NotificationRow {
                id: Uuid::new_v4(),
                receiver_id: notification.receiver_id,
                sender_id: notification.sender_id,
                kind: notification.kind.as_str().to_string(),
                post_id: notification.post_id,
                comment_id: notification.comment_id,
                created_at: OffsetDateTime::now_utc(),
            };

            sqlx::query(
                "INSERT INTO notifications (id, receiver_id, sender_id, kind, post_id, comment_id, created_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(row.id)
            .bind(row.receiver_id)
            .bind(row.sender_id)
            .bind(&row.kind)
            .bind(row.post_id)
            .bind(row.comment_id)
            .bind(row.created_at)
            .execute(&self.pool)
            .await?;

            Ok(row)
        }

        async fn get_notifications(
            &self,
            receiver_id: Uuid,
        ) -> LedgerResult<Vec<NotificationFeedRow>> {
            let rows = sqlx::query_as::<_, NotificationFeedRow>(
                "SELECT n.id, n.kind, n.created_at, \
                        n.sender_id, su.username AS sender_username, \
                        su.fullname AS sender_fullname, su.image AS sender_image, \
                        n.post_id, p.image_url AS post_image_url, \
                        p.caption AS post_caption, p.user_id AS post_user_id \
                 FROM notifications n \
                 JOIN users su ON su.id = n.sender_id \
                 LEFT JOIN posts p ON p.id = n.post_id \
                 WHERE n.receiver_id = ? \
                 ORDER BY n.created_at DESC",
            )
            .bind(receiver_id)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn delete_notification(
            &self,
            notification_id: Uuid,
            receiver_id: Uuid,
        ) -> LedgerResult<()> {
            let result =
                sqlx::query("DELETE FROM notifications WHERE id = ? AND receiver_id = ?")
                    .bind(notification_id)
                    .bind(receiver_id)
                    .execute(&self.pool)
                    .await?;

            if result.rows_affected() == 0 {
                return Err(LedgerError::NotFound(format!(
                    "notification {}",
                    notification_id
                )));
            }
            Ok(())
        }
    }
}

impl std::convert::From<std::io::Error> for crate::LedgerError {
    fn from(e: std::io::Error) -> Self {
        crate::LedgerError::Config(e.to_string())
    }
}

/// SQL schema for SQLite.
const SCHEMA_SQL: &str = r#"
-- Users with denormalized relationship counters
CREATE TABLE IF NOT EXISTS users (
    id BLOB PRIMARY KEY,
    external_id TEXT NOT NULL UNIQUE,
    username TEXT NOT NULL UNIQUE,
    fullname TEXT NOT NULL,
    email TEXT NOT NULL,
    bio TEXT,
    image TEXT,
    followers INTEGER NOT NULL DEFAULT 0,
    following INTEGER NOT NULL DEFAULT 0,
    posts INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_users_external_id ON users(external_id);

-- Posts with denormalized engagement counters
CREATE TABLE IF NOT EXISTS posts (
    id BLOB PRIMARY KEY,
    user_id BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    image_url TEXT NOT NULL,
    storage_id TEXT,
    caption TEXT,
    likes INTEGER NOT NULL DEFAULT 0,
    comments INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_posts_user_id ON posts(user_id);

-- Like edges; the unique pair constraint arbitrates concurrent toggles
CREATE TABLE IF NOT EXISTS likes (
    id BLOB PRIMARY KEY,
    user_id BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    post_id BLOB NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
    created_at TEXT NOT NULL,
    UNIQUE (user_id, post_id)
);
CREATE INDEX IF NOT EXISTS idx_likes_post_id ON likes(post_id);
CREATE INDEX IF NOT EXISTS idx_likes_user_post ON likes(user_id, post_id);

-- Bookmark edges
CREATE TABLE IF NOT EXISTS bookmarks (
    id BLOB PRIMARY KEY,
    user_id BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    post_id BLOB NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
    created_at TEXT NOT NULL,
    UNIQUE (user_id, post_id)
);
CREATE INDEX IF NOT EXISTS idx_bookmarks_user_id ON bookmarks(user_id);
CREATE INDEX IF NOT EXISTS idx_bookmarks_post_id ON bookmarks(post_id);
CREATE INDEX IF NOT EXISTS idx_bookmarks_user_post ON bookmarks(user_id, post_id);

-- Follow edges
CREATE TABLE IF NOT EXISTS follows (
    id BLOB PRIMARY KEY,
    follower_id BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    following_id BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    created_at TEXT NOT NULL,
    UNIQUE (follower_id, following_id)
);
CREATE INDEX IF NOT EXISTS idx_follows_follower_id ON follows(follower_id);
CREATE INDEX IF NOT EXISTS idx_follows_following_id ON follows(following_id);
CREATE INDEX IF NOT EXISTS idx_follows_follower_following ON follows(follower_id, following_id);

-- Comments
CREATE TABLE IF NOT EXISTS comments (
    id BLOB PRIMARY KEY,
    user_id BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    post_id BLOB NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
    content TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_comments_post_id ON comments(post_id);

-- Notifications
CREATE TABLE IF NOT EXISTS notifications (
    id BLOB PRIMARY KEY,
    receiver_id BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    sender_id BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    kind TEXT NOT NULL CHECK (kind IN ('like', 'comment', 'follow')),
    post_id BLOB REFERENCES posts(id) ON DELETE CASCADE,
    comment_id BLOB REFERENCES comments(id) ON DELETE CASCADE,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_notifications_receiver_id ON notifications(receiver_id);
CREATE INDEX IF NOT EXISTS idx_notifications_post_id ON notifications(post_id);
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewNotification, NewPost, NewUser, PostRow, UserRow};
    use pinboard_core::NotificationKind;
    use time::OffsetDateTime;
    use uuid::Uuid;

    async fn test_store() -> (SqliteStore, tempfile::TempDir) {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::new(temp_dir.path().join("ledger.db"), None)
            .await
            .unwrap();
        (store, temp_dir)
    }

    async fn seed_user(store: &SqliteStore, username: &str) -> UserRow {
        store
            .create_user(&NewUser {
                external_id: format!("subject_{}", username),
                username: username.to_string(),
                fullname: format!("{} Example", username),
                email: format!("{}@example.com", username),
                bio: None,
                image: None,
            })
            .await
            .unwrap()
    }

    async fn seed_post(store: &SqliteStore, user_id: Uuid) -> PostRow {
        store
            .create_post(&NewPost {
                user_id,
                image_url: "http://127.0.0.1:8080/media/test.jpg".to_string(),
                storage_id: Some("test.jpg".to_string()),
                caption: Some("hello".to_string()),
            })
            .await
            .unwrap()
    }

    async fn count_rows(store: &SqliteStore, sql: &str, id: Uuid) -> i64 {
        sqlx::query_scalar(sql)
            .bind(id)
            .fetch_one(store.pool())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_and_get_user() {
        let (store, _tmp) = test_store().await;
        let alice = seed_user(&store, "alice").await;

        let fetched = store.get_user(alice.id).await.unwrap().unwrap();
        assert_eq!(fetched.username, "alice");
        assert_eq!(fetched.followers, 0);
        assert_eq!(fetched.following, 0);
        assert_eq!(fetched.posts, 0);

        let by_subject = store
            .get_user_by_external_id("subject_alice")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_subject.id, alice.id);

        assert!(store.username_exists("alice").await.unwrap());
        assert!(!store.username_exists("bob").await.unwrap());
    }

    #[tokio::test]
    async fn test_create_user_duplicate_username() {
        let (store, _tmp) = test_store().await;
        seed_user(&store, "alice").await;

        let result = store
            .create_user(&NewUser {
                external_id: "another_subject".to_string(),
                username: "alice".to_string(),
                fullname: "Other Alice".to_string(),
                email: "other@example.com".to_string(),
                bio: None,
                image: None,
            })
            .await;
        assert!(matches!(result, Err(LedgerError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_create_user_duplicate_subject() {
        let (store, _tmp) = test_store().await;
        let alice = seed_user(&store, "alice").await;

        // Same subject under a fresh username loses to the first row.
        let result = store
            .create_user(&NewUser {
                external_id: "subject_alice".to_string(),
                username: "alice_again".to_string(),
                fullname: "Alice Again".to_string(),
                email: "alice@example.com".to_string(),
                bio: None,
                image: None,
            })
            .await;
        assert!(matches!(result, Err(LedgerError::AlreadyExists(_))));

        let winner = store
            .get_user_by_external_id("subject_alice")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(winner.id, alice.id);
        assert_eq!(winner.username, "alice");
    }

    #[tokio::test]
    async fn test_update_profile() {
        let (store, _tmp) = test_store().await;
        let alice = seed_user(&store, "alice").await;

        let updated = store
            .update_profile(alice.id, "Alice Updated", "new bio")
            .await
            .unwrap();
        assert_eq!(updated.fullname, "Alice Updated");
        assert_eq!(updated.bio.as_deref(), Some("new bio"));

        let missing = store
            .update_profile(Uuid::new_v4(), "Nobody", "")
            .await;
        assert!(matches!(missing, Err(LedgerError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_create_post_increments_owner_counter() {
        let (store, _tmp) = test_store().await;
        let alice = seed_user(&store, "alice").await;

        let post = seed_post(&store, alice.id).await;
        assert_eq!(post.likes, 0);
        assert_eq!(post.comments, 0);

        let alice = store.get_user(alice.id).await.unwrap().unwrap();
        assert_eq!(alice.posts, 1);
    }

    #[tokio::test]
    async fn test_toggle_like_roundtrip() {
        let (store, _tmp) = test_store().await;
        let alice = seed_user(&store, "alice").await;
        let bob = seed_user(&store, "bob").await;
        let post = seed_post(&store, bob.id).await;

        let outcome = store.toggle_like(alice.id, post.id).await.unwrap();
        assert!(outcome.engaged);
        assert!(outcome.created);
        let fetched = store.get_post(post.id).await.unwrap().unwrap();
        assert_eq!(fetched.likes, 1);

        let outcome = store.toggle_like(alice.id, post.id).await.unwrap();
        assert!(!outcome.engaged);
        assert!(!outcome.created);
        let fetched = store.get_post(post.id).await.unwrap().unwrap();
        assert_eq!(fetched.likes, 0);
    }

    #[tokio::test]
    async fn test_toggle_like_missing_post() {
        let (store, _tmp) = test_store().await;
        let alice = seed_user(&store, "alice").await;

        let result = store.toggle_like(alice.id, Uuid::new_v4()).await;
        assert!(matches!(result, Err(LedgerError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_toggle_follow_counters() {
        let (store, _tmp) = test_store().await;
        let alice = seed_user(&store, "alice").await;
        let bob = seed_user(&store, "bob").await;

        let outcome = store.toggle_follow(bob.id, alice.id).await.unwrap();
        assert!(outcome.engaged);
        assert!(outcome.created);
        assert!(store.is_following(bob.id, alice.id).await.unwrap());

        let alice_row = store.get_user(alice.id).await.unwrap().unwrap();
        let bob_row = store.get_user(bob.id).await.unwrap().unwrap();
        assert_eq!(alice_row.followers, 1);
        assert_eq!(bob_row.following, 1);

        let outcome = store.toggle_follow(bob.id, alice.id).await.unwrap();
        assert!(!outcome.engaged);
        assert!(!store.is_following(bob.id, alice.id).await.unwrap());

        let alice_row = store.get_user(alice.id).await.unwrap().unwrap();
        let bob_row = store.get_user(bob.id).await.unwrap().unwrap();
        assert_eq!(alice_row.followers, 0);
        assert_eq!(bob_row.following, 0);
    }

    #[tokio::test]
    async fn test_self_follow_rejected() {
        let (store, _tmp) = test_store().await;
        let alice = seed_user(&store, "alice").await;

        let result = store.toggle_follow(alice.id, alice.id).await;
        assert!(matches!(result, Err(LedgerError::SelfFollow)));

        let alice_row = store.get_user(alice.id).await.unwrap().unwrap();
        assert_eq!(alice_row.followers, 0);
        assert_eq!(alice_row.following, 0);
        let count = count_rows(
            &store,
            "SELECT COUNT(*) FROM follows WHERE follower_id = ?",
            alice.id,
        )
        .await;
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_toggle_follow_missing_target() {
        let (store, _tmp) = test_store().await;
        let alice = seed_user(&store, "alice").await;

        let result = store.toggle_follow(alice.id, Uuid::new_v4()).await;
        assert!(matches!(result, Err(LedgerError::NotFound(_))));

        let alice_row = store.get_user(alice.id).await.unwrap().unwrap();
        assert_eq!(alice_row.following, 0);
    }

    #[tokio::test]
    async fn test_toggle_bookmark_no_counter() {
        let (store, _tmp) = test_store().await;
        let alice = seed_user(&store, "alice").await;
        let bob = seed_user(&store, "bob").await;
        let post = seed_post(&store, bob.id).await;

        let outcome = store.toggle_bookmark(alice.id, post.id).await.unwrap();
        assert!(outcome.engaged);
        assert!(outcome.created);

        let fetched = store.get_post(post.id).await.unwrap().unwrap();
        assert_eq!(fetched.likes, 0);
        assert_eq!(fetched.comments, 0);

        let bookmarked = store.get_bookmarked_posts(alice.id).await.unwrap();
        assert_eq!(bookmarked.len(), 1);
        assert_eq!(bookmarked[0].id, post.id);
        assert!(bookmarked[0].is_bookmarked);
        assert!(!bookmarked[0].is_liked);

        let outcome = store.toggle_bookmark(alice.id, post.id).await.unwrap();
        assert!(!outcome.engaged);
        assert!(store.get_bookmarked_posts(alice.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_toggle_bookmark_missing_post() {
        let (store, _tmp) = test_store().await;
        let alice = seed_user(&store, "alice").await;

        let result = store.toggle_bookmark(alice.id, Uuid::new_v4()).await;
        assert!(matches!(result, Err(LedgerError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_decrement_floors_at_zero() {
        let (store, _tmp) = test_store().await;
        let alice = seed_user(&store, "alice").await;
        let bob = seed_user(&store, "bob").await;
        let post = seed_post(&store, bob.id).await;

        // Edge inserted behind the toggle's back, so the counter was never
        // incremented. Removal must floor at zero instead of going negative.
        sqlx::query("INSERT INTO likes (id, user_id, post_id, created_at) VALUES (?, ?, ?, ?)")
            .bind(Uuid::new_v4())
            .bind(alice.id)
            .bind(post.id)
            .bind(OffsetDateTime::now_utc())
            .execute(store.pool())
            .await
            .unwrap();

        let outcome = store.toggle_like(alice.id, post.id).await.unwrap();
        assert!(!outcome.engaged);

        let fetched = store.get_post(post.id).await.unwrap().unwrap();
        assert_eq!(fetched.likes, 0);
    }

    #[tokio::test]
    async fn test_counters_match_edge_rows() {
        let (store, _tmp) = test_store().await;
        let alice = seed_user(&store, "alice").await;
        let bob = seed_user(&store, "bob").await;
        let carol = seed_user(&store, "carol").await;
        let post = seed_post(&store, alice.id).await;

        store.toggle_like(bob.id, post.id).await.unwrap();
        store.toggle_like(carol.id, post.id).await.unwrap();
        store.toggle_like(bob.id, post.id).await.unwrap();
        store.toggle_follow(bob.id, alice.id).await.unwrap();
        store.toggle_follow(carol.id, alice.id).await.unwrap();
        store.toggle_follow(bob.id, alice.id).await.unwrap();
        store.toggle_follow(bob.id, alice.id).await.unwrap();

        let like_rows =
            count_rows(&store, "SELECT COUNT(*) FROM likes WHERE post_id = ?", post.id).await;
        let fetched = store.get_post(post.id).await.unwrap().unwrap();
        assert_eq!(fetched.likes as i64, like_rows);
        assert_eq!(fetched.likes, 1);

        let follower_rows = count_rows(
            &store,
            "SELECT COUNT(*) FROM follows WHERE following_id = ?",
            alice.id,
        )
        .await;
        let alice_row = store.get_user(alice.id).await.unwrap().unwrap();
        assert_eq!(alice_row.followers as i64, follower_rows);
        assert_eq!(alice_row.followers, 2);
    }

    #[tokio::test]
    async fn test_create_comment_increments_counter() {
        let (store, _tmp) = test_store().await;
        let alice = seed_user(&store, "alice").await;
        let bob = seed_user(&store, "bob").await;
        let post = seed_post(&store, bob.id).await;

        let comment = store
            .create_comment(alice.id, post.id, "nice shot")
            .await
            .unwrap();
        assert_eq!(comment.content, "nice shot");

        let fetched = store.get_post(post.id).await.unwrap().unwrap();
        assert_eq!(fetched.comments, 1);

        let comments = store.get_post_comments(post.id).await.unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].author_fullname, "alice Example");

        let missing = store
            .create_comment(alice.id, Uuid::new_v4(), "into the void")
            .await;
        assert!(matches!(missing, Err(LedgerError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_get_feed_flags_per_viewer() {
        let (store, _tmp) = test_store().await;
        let alice = seed_user(&store, "alice").await;
        let bob = seed_user(&store, "bob").await;
        let post = seed_post(&store, bob.id).await;

        store.toggle_like(alice.id, post.id).await.unwrap();

        let feed = store.get_feed(alice.id).await.unwrap();
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].author_username, "bob");
        assert!(feed[0].is_liked);
        assert!(!feed[0].is_bookmarked);

        let feed = store.get_feed(bob.id).await.unwrap();
        assert!(!feed[0].is_liked);
        assert_eq!(feed[0].likes, 1);
    }

    #[tokio::test]
    async fn test_notifications_roundtrip() {
        let (store, _tmp) = test_store().await;
        let alice = seed_user(&store, "alice").await;
        let bob = seed_user(&store, "bob").await;
        let post = seed_post(&store, alice.id).await;

        store
            .create_notification(&NewNotification {
                receiver_id: alice.id,
                sender_id: bob.id,
                kind: NotificationKind::Follow,
                post_id: None,
                comment_id: None,
            })
            .await
            .unwrap();
        store
            .create_notification(&NewNotification {
                receiver_id: alice.id,
                sender_id: bob.id,
                kind: NotificationKind::Like,
                post_id: Some(post.id),
                comment_id: None,
            })
            .await
            .unwrap();

        let notifications = store.get_notifications(alice.id).await.unwrap();
        assert_eq!(notifications.len(), 2);
        // Newest first: the like arrived after the follow.
        assert_eq!(notifications[0].kind, "like");
        assert_eq!(notifications[0].sender_username, "bob");
        assert_eq!(notifications[0].post_id, Some(post.id));
        assert_eq!(
            notifications[0].post_image_url.as_deref(),
            Some("http://127.0.0.1:8080/media/test.jpg")
        );
        assert_eq!(notifications[1].kind, "follow");
        assert!(notifications[1].post_id.is_none());
        assert!(notifications[1].post_image_url.is_none());

        // Bob has no notifications of his own.
        assert!(store.get_notifications(bob.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_notification_scoped_to_receiver() {
        let (store, _tmp) = test_store().await;
        let alice = seed_user(&store, "alice").await;
        let bob = seed_user(&store, "bob").await;

        let notification = store
            .create_notification(&NewNotification {
                receiver_id: alice.id,
                sender_id: bob.id,
                kind: NotificationKind::Follow,
                post_id: None,
                comment_id: None,
            })
            .await
            .unwrap();

        let wrong_receiver = store.delete_notification(notification.id, bob.id).await;
        assert!(matches!(wrong_receiver, Err(LedgerError::NotFound(_))));

        store
            .delete_notification(notification.id, alice.id)
            .await
            .unwrap();
        assert!(store.get_notifications(alice.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cascade_delete_removes_dependents() {
        let (store, _tmp) = test_store().await;
        let alice = seed_user(&store, "alice").await;
        let bob = seed_user(&store, "bob").await;
        let post = seed_post(&store, bob.id).await;

        store.toggle_like(alice.id, post.id).await.unwrap();
        store.toggle_bookmark(alice.id, post.id).await.unwrap();
        let comment = store
            .create_comment(alice.id, post.id, "first")
            .await
            .unwrap();
        store
            .create_notification(&NewNotification {
                receiver_id: bob.id,
                sender_id: alice.id,
                kind: NotificationKind::Like,
                post_id: Some(post.id),
                comment_id: None,
            })
            .await
            .unwrap();
        store
            .create_notification(&NewNotification {
                receiver_id: bob.id,
                sender_id: alice.id,
                kind: NotificationKind::Comment,
                post_id: Some(post.id),
                comment_id: Some(comment.id),
            })
            .await
            .unwrap();
        // A follow notification carries no post reference and must survive.
        store
            .create_notification(&NewNotification {
                receiver_id: bob.id,
                sender_id: alice.id,
                kind: NotificationKind::Follow,
                post_id: None,
                comment_id: None,
            })
            .await
            .unwrap();

        let summary = store.delete_post_cascade(post.id, bob.id).await.unwrap();
        assert_eq!(summary.likes, 1);
        assert_eq!(summary.bookmarks, 1);
        assert_eq!(summary.notifications, 2);
        assert_eq!(summary.comments, 1);

        assert!(store.get_post(post.id).await.unwrap().is_none());
        for table in ["likes", "bookmarks", "comments", "notifications"] {
            let sql = format!("SELECT COUNT(*) FROM {} WHERE post_id = ?", table);
            assert_eq!(count_rows(&store, &sql, post.id).await, 0);
        }

        let bob_row = store.get_user(bob.id).await.unwrap().unwrap();
        assert_eq!(bob_row.posts, 0);

        let remaining = store.get_notifications(bob.id).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].kind, "follow");
    }

    #[tokio::test]
    async fn test_cascade_delete_requires_ownership() {
        let (store, _tmp) = test_store().await;
        let alice = seed_user(&store, "alice").await;
        let bob = seed_user(&store, "bob").await;
        let post = seed_post(&store, bob.id).await;
        store.toggle_like(alice.id, post.id).await.unwrap();

        let result = store.delete_post_cascade(post.id, alice.id).await;
        assert!(matches!(result, Err(LedgerError::NotFound(_))));

        // The rejected delete must leave dependent rows untouched.
        assert!(store.get_post(post.id).await.unwrap().is_some());
        let likes =
            count_rows(&store, "SELECT COUNT(*) FROM likes WHERE post_id = ?", post.id).await;
        assert_eq!(likes, 1);
        let bob_row = store.get_user(bob.id).await.unwrap().unwrap();
        assert_eq!(bob_row.posts, 1);
    }

    #[tokio::test]
    async fn test_cascade_delete_posts_counter_floor() {
        let (store, _tmp) = test_store().await;
        let bob = seed_user(&store, "bob").await;
        let post = seed_post(&store, bob.id).await;

        sqlx::query("UPDATE users SET posts = 0 WHERE id = ?")
            .bind(bob.id)
            .execute(store.pool())
            .await
            .unwrap();

        store.delete_post_cascade(post.id, bob.id).await.unwrap();
        let bob_row = store.get_user(bob.id).await.unwrap().unwrap();
        assert_eq!(bob_row.posts, 0);
    }

    #[tokio::test]
    async fn test_get_user_posts_newest_first() {
        let (store, _tmp) = test_store().await;
        let alice = seed_user(&store, "alice").await;
        let first = seed_post(&store, alice.id).await;
        let second = seed_post(&store, alice.id).await;

        let posts = store.get_user_posts(alice.id).await.unwrap();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].id, second.id);
        assert_eq!(posts[1].id, first.id);

        let alice_row = store.get_user(alice.id).await.unwrap().unwrap();
        assert_eq!(alice_row.posts, 2);
    }
}
