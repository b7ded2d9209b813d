//! PostgreSQL-based ledger store implementation.

use crate::error::{LedgerError, LedgerResult};
use crate::models::*;
use crate::repos::{CommentRepo, EngagementRepo, NotificationRepo, PostRepo, UserRepo};
use crate::store::LedgerStore;
use async_trait::async_trait;
use pinboard_core::ToggleOutcome;
use pinboard_core::config::PgSslMode;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode as SqlxPgSslMode};
use sqlx::{Pool, Postgres};
use std::str::FromStr;
use time::OffsetDateTime;
use uuid::Uuid;

/// PostgreSQL schema (embedded).
const POSTGRES_SCHEMA: &str = include_str!("postgres_schema.sql");

fn postgres_schema_statements(schema: &str) -> Vec<&str> {
    schema
        .split(';')
        .filter_map(|statement| {
            let trimmed = statement.trim();
            if trimmed.is_empty() {
                return None;
            }
            let has_sql = trimmed.lines().any(|line| {
                let line = line.trim();
                !line.is_empty() && !line.starts_with("--")
            });
            has_sql.then_some(trimmed)
        })
        .collect()
}

/// PostgreSQL-based ledger store.
pub struct PostgresStore {
    pool: Pool<Postgres>,
}

impl PostgresStore {
    /// Create a new PostgreSQL store from a connection URL.
    pub async fn from_url(
        url: &str,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> LedgerResult<Self> {
        let opts = PgConnectOptions::from_str(url)?;
        Self::connect(opts, max_connections, statement_timeout_ms).await
    }

    /// Create a new PostgreSQL store from individual connection parameters.
    ///
    /// This allows credentials to be passed separately, enabling better
    /// secret management (e.g., passwords via environment variables).
    #[allow(clippy::too_many_arguments)]
    pub async fn from_params(
        host: &str,
        port: u16,
        username: Option<&str>,
        password: Option<&str>,
        database: &str,
        ssl_mode: Option<PgSslMode>,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> LedgerResult<Self> {
        let mut opts = PgConnectOptions::new()
            .host(host)
            .port(port)
            .database(database);

        if let Some(user) = username {
            opts = opts.username(user);
        }

        if let Some(pass) = password {
            opts = opts.password(pass);
        }

        if let Some(mode) = ssl_mode {
            let sqlx_mode = match mode {
                PgSslMode::Disable => SqlxPgSslMode::Disable,
                PgSslMode::Prefer => SqlxPgSslMode::Prefer,
                PgSslMode::Require => SqlxPgSslMode::Require,
            };
            opts = opts.ssl_mode(sqlx_mode);
        }

        // Log connection info without password
        tracing::info!(
            host = host,
            port = port,
            database = database,
            username = username.unwrap_or("<none>"),
            ssl_mode = ?ssl_mode,
            "Connecting to PostgreSQL with individual parameters"
        );

        Self::connect(opts, max_connections, statement_timeout_ms).await
    }

    /// Internal: Connect to PostgreSQL with the given options.
    async fn connect(
        mut opts: PgConnectOptions,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> LedgerResult<Self> {
        // Set statement_timeout if configured to prevent hung queries.
        if let Some(timeout_ms) = statement_timeout_ms {
            opts = opts.options([("statement_timeout", format!("{}ms", timeout_ms))]);
            tracing::info!("PostgreSQL statement_timeout set to {}ms", timeout_ms);
        }

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;

        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }
}

#[async_trait]
impl LedgerStore for PostgresStore {
    async fn migrate(&self) -> LedgerResult<()> {
        // PostgreSQL doesn't allow multiple statements in a single prepared
        // statement, so we split the schema and execute each one separately.
        for statement in postgres_schema_statements(POSTGRES_SCHEMA) {
            sqlx::query(statement).execute(&self.pool).await?;
        }

        Ok(())
    }

    async fn health_check(&self) -> LedgerResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl UserRepo for PostgresStore {
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
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
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
                // PostgreSQL error code 23505 = unique_violation
                if db_err.code().as_deref() == Some("23505") {
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
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn get_user_by_external_id(&self, external_id: &str) -> LedgerResult<Option<UserRow>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE external_id = $1")
            .bind(external_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn username_exists(&self, username: &str) -> LedgerResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE username = $1)")
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
        let result = sqlx::query("UPDATE users SET fullname = $1, bio = $2 WHERE id = $3")
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
impl PostRepo for PostgresStore {
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
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
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

        sqlx::query("UPDATE users SET posts = posts + 1 WHERE id = $1")
            .bind(row.user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(row)
    }

    async fn get_post(&self, post_id: Uuid) -> LedgerResult<Option<PostRow>> {
        let row = sqlx::query_as::<_, PostRow>("SELECT * FROM posts WHERE id = $1")
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
            sqlx::query_as::<_, PostRow>("SELECT * FROM posts WHERE id = $1 AND user_id = $2")
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
                    EXISTS(SELECT 1 FROM likes l WHERE l.post_id = p.id AND l.user_id = $1) AS is_liked, \
                    EXISTS(SELECT 1 FROM bookmarks b WHERE b.post_id = p.id AND b.user_id = $1) AS is_bookmarked \
             FROM posts p \
             JOIN users u ON u.id = p.user_id \
             ORDER BY p.created_at DESC",
        )
        .bind(viewer_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn get_user_posts(&self, user_id: Uuid) -> LedgerResult<Vec<PostRow>> {
        let rows = sqlx::query_as::<_, PostRow>(
            "SELECT * FROM posts WHERE user_id = $1 ORDER BY created_at DESC",
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

        let likes = sqlx::query("DELETE FROM likes WHERE post_id = $1")
            .bind(post_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let bookmarks = sqlx::query("DELETE FROM bookmarks WHERE post_id = $1")
            .bind(post_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let notifications = sqlx::query("DELETE FROM notifications WHERE post_id = $1")
            .bind(post_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let comments = sqlx::query("DELETE FROM comments WHERE post_id = $1")
            .bind(post_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let deleted = sqlx::query("DELETE FROM posts WHERE id = $1 AND user_id = $2")
            .bind(post_id)
            .bind(owner_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if deleted == 0 {
            // Dropping the transaction rolls back the deletes above.
            return Err(LedgerError::NotFound(format!("post {}", post_id)));
        }

        sqlx::query("UPDATE users SET posts = GREATEST(0, posts - 1) WHERE id = $1")
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
impl EngagementRepo for PostgresStore {
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
            "DELETE FROM follows WHERE follower_id = $1 AND following_id = $2",
        )
        .bind(follower_id)
        .bind(following_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if removed > 0 {
            sqlx::query("UPDATE users SET following = GREATEST(0, following - 1) WHERE id = $1")
                .bind(follower_id)
                .execute(&mut *tx)
                .await?;
            sqlx::query("UPDATE users SET followers = GREATEST(0, followers - 1) WHERE id = $1")
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
            "INSERT INTO follows (id, follower_id, following_id, created_at) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (follower_id, following_id) DO NOTHING",
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
                // PostgreSQL error code 23503 = foreign_key_violation
                if db_err.code().as_deref() == Some("23503") {
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

        sqlx::query("UPDATE users SET following = following + 1 WHERE id = $1")
            .bind(follower_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE users SET followers = followers + 1 WHERE id = $1")
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

        let removed = sqlx::query("DELETE FROM likes WHERE user_id = $1 AND post_id = $2")
            .bind(user_id)
            .bind(post_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if removed > 0 {
            sqlx::query("UPDATE posts SET likes = GREATEST(0, likes - 1) WHERE id = $1")
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
            "INSERT INTO likes (id, user_id, post_id, created_at) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (user_id, post_id) DO NOTHING",
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
                if db_err.code().as_deref() == Some("23503") {
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

        sqlx::query("UPDATE posts SET likes = likes + 1 WHERE id = $1")
            .bind(post_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(ToggleOutcome {
            engaged: true,
            created: true,
        })
    }

    async fn toggle_bookmark(&self, user_id: Uuid, post_id: Uuid) -> LedgerResult<ToggleOutcome> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query("DELETE FROM bookmarks WHERE user_id = $1 AND post_id = $2")
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
            "INSERT INTO bookmarks (id, user_id, post_id, created_at) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (user_id, post_id) DO NOTHING",
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
                if db_err.code().as_deref() == Some("23503") {
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

    async fn is_following(&self, follower_id: Uuid, following_id: Uuid) -> LedgerResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM follows WHERE follower_id = $1 AND following_id = $2)",
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
                    TRUE AS is_bookmarked \
             FROM bookmarks bm \
             JOIN posts p ON p.id = bm.post_id \
             JOIN users u ON u.id = p.user_id \
             WHERE bm.user_id = $1 \
             ORDER BY bm.created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[async_trait]
impl CommentRepo for PostgresStore {
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
             VALUES ($1, $2, $3, $4, $5)",
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
                if db_err.code().as_deref() == Some("23503") {
                    return Err(LedgerError::NotFound(format!("post {}", post_id)));
                }
                return Err(sqlx::Error::Database(db_err).into());
            }
            Err(e) => return Err(e.into()),
        }

        sqlx::query("UPDATE posts SET comments = comments + 1 WHERE id = $1")
            .bind(post_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(row)
    }

    async fn get_post_comments(&self, post_id: Uuid) -> LedgerResult<Vec<CommentWithAuthorRow>> {
        let rows = sqlx::query_as::<_, CommentWithAuthorRow>(
            "SELECT c.id, c.user_id, c.post_id, c.content, c.created_at, \
                    u.fullname AS author_fullname, u.image AS author_image \
             FROM comments c \
             JOIN users u ON u.id = c.user_id \
             WHERE c.post_id = $1 \
             ORDER BY c.created_at ASC",
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[async_trait]
impl NotificationRepo for PostgresStore {
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
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
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

    async fn get_notifications(&self, receiver_id: Uuid) -> LedgerResult<Vec<NotificationFeedRow>> {
        let rows = sqlx::query_as::<_, NotificationFeedRow>(
            "SELECT n.id, n.kind, n.created_at, \
                    n.sender_id, su.username AS sender_username, \
                    su.fullname AS sender_fullname, su.image AS sender_image, \
                    n.post_id, p.image_url AS post_image_url, \
                    p.caption AS post_caption, p.user_id AS post_user_id \
             FROM notifications n \
             JOIN users su ON su.id = n.sender_id \
             LEFT JOIN posts p ON p.id = n.post_id \
             WHERE n.receiver_id = $1 \
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
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1 AND receiver_id = $2")
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
