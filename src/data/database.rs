//! SQLite database operations
//!
//! All database access goes through this module.
//! Uses SQLx with embedded migrations.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};
use sqlx::{Executor, Pool, QueryBuilder, Sqlite, SqliteConnection, SqlitePool};

use super::models::*;
use super::relation::{self, RelationSet};
use crate::error::AppError;

/// How long a writer waits for the SQLite write lock before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// Database connection pool wrapper
pub struct Database {
    pool: Pool<Sqlite>,
}

/// Map a unique-constraint violation to `Conflict`, everything else passes through
fn conflict_on_unique(error: sqlx::Error, message: &str) -> AppError {
    match &error {
        sqlx::Error::Database(db_error) if db_error.is_unique_violation() => {
            AppError::Conflict(message.to_string())
        }
        _ => AppError::Database(error),
    }
}

impl Database {
    // =========================================================================
    // Connection
    // =========================================================================

    /// Connect to SQLite database
    ///
    /// Creates the database file if it doesn't exist, switches it to WAL
    /// and runs pending migrations.
    ///
    /// # Arguments
    /// * `path` - Path to SQLite database file
    ///
    /// # Errors
    /// Returns error if connection or migration fails
    pub async fn connect(path: &Path) -> Result<Self, AppError> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AppError::Database(sqlx::Error::Io(e)))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT);
        let pool = SqlitePool::connect_with(options).await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| {
                tracing::error!("Migration failed: {}", e);
                AppError::Internal(anyhow::anyhow!("Migration failed: {}", e))
            })?;

        tracing::info!(path = %path.display(), "Database connected and migrated successfully");

        Ok(Self { pool })
    }

    /// Start a write transaction with `BEGIN IMMEDIATE`
    ///
    /// The write lock is taken before the first read, so concurrent
    /// read-then-write transactions queue on the busy timeout instead of
    /// failing on a lock upgrade. Close it with [`Database::finish`].
    pub async fn begin_immediate(&self) -> Result<PoolConnection<Sqlite>, AppError> {
        let mut conn = self.pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;
        Ok(conn)
    }

    /// Commit a transaction opened by [`Database::begin_immediate`] on
    /// success, roll it back on error
    pub async fn finish<T>(
        conn: &mut SqliteConnection,
        result: Result<T, AppError>,
    ) -> Result<T, AppError> {
        match result {
            Ok(value) => {
                sqlx::query("COMMIT").execute(&mut *conn).await?;
                Ok(value)
            }
            Err(error) => {
                let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                Err(error)
            }
        }
    }

    /// Borrow the pool for single-statement relation reads
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Insert a new user
    ///
    /// # Errors
    /// `Conflict` if the username or email is already taken
    pub async fn insert_user(&self, user: &User) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO users (
                id, username, email, full_name, password_hash,
                bio, link, profile_img, cover_img, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.full_name)
        .bind(&user.password_hash)
        .bind(&user.bio)
        .bind(&user.link)
        .bind(&user.profile_img)
        .bind(&user.cover_img)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "Username or email already exists"))?;

        Ok(())
    }

    /// Save every profile field of an existing user
    ///
    /// # Returns
    /// false if no user with this ID exists
    pub async fn update_user(&self, user: &User) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE users SET
                username = ?, email = ?, full_name = ?, password_hash = ?,
                bio = ?, link = ?, profile_img = ?, cover_img = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.full_name)
        .bind(&user.password_hash)
        .bind(&user.bio)
        .bind(&user.link)
        .bind(&user.profile_img)
        .bind(&user.cover_img)
        .bind(user.updated_at)
        .bind(&user.id)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "Username or email already exists"))?;

        Ok(result.rows_affected() > 0)
    }

    /// Get user by ID
    pub async fn get_user(&self, id: &str) -> Result<Option<User>, AppError> {
        Self::find_user(&self.pool, id).await
    }

    /// Get user by ID on any executor
    pub async fn find_user<'e, E>(executor: E, id: &str) -> Result<Option<User>, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(executor)
            .await?;

        Ok(user)
    }

    /// Get user by username
    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Get user by email
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Get users by IDs (unknown IDs are skipped)
    pub async fn get_users_by_ids(&self, ids: &[String]) -> Result<Vec<User>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM users WHERE id IN (");
        let mut separated = query.separated(", ");
        for id in ids {
            separated.push_bind(id);
        }
        separated.push_unseparated(")");

        let users = query.build_query_as::<User>().fetch_all(&self.pool).await?;
        Ok(users)
    }

    /// Random sample of users other than `exclude_id`
    pub async fn sample_users(&self, exclude_id: &str, limit: usize) -> Result<Vec<User>, AppError> {
        let users = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE id != ? ORDER BY RANDOM() LIMIT ?",
        )
        .bind(exclude_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    /// Members of one relation set, read outside any transaction
    pub async fn get_relation_members(
        &self,
        set: RelationSet,
        owner: &str,
    ) -> Result<Vec<String>, AppError> {
        relation::members(&self.pool, set, owner).await
    }

    // =========================================================================
    // Posts
    // =========================================================================

    /// Insert a new post
    pub async fn insert_post(&self, post: &Post) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO posts (id, user_id, text, img, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&post.id)
        .bind(&post.user_id)
        .bind(&post.text)
        .bind(&post.img)
        .bind(post.created_at)
        .bind(post.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get post by ID
    pub async fn get_post(&self, id: &str) -> Result<Option<Post>, AppError> {
        Self::find_post(&self.pool, id).await
    }

    /// Get post by ID on any executor
    pub async fn find_post<'e, E>(executor: E, id: &str) -> Result<Option<Post>, AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let post = sqlx::query_as::<_, Post>("SELECT * FROM posts WHERE id = ?")
            .bind(id)
            .fetch_optional(executor)
            .await?;

        Ok(post)
    }

    /// Bump a post's `updated_at`
    pub async fn touch_post<'e, E>(
        executor: E,
        id: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query("UPDATE posts SET updated_at = ? WHERE id = ?")
            .bind(updated_at)
            .bind(id)
            .execute(executor)
            .await?;

        Ok(())
    }

    /// Delete a post
    ///
    /// Comments and the post's `likes` set go with it (foreign key cascade);
    /// the post is also pulled from every user's `liked_posts` set in the
    /// same transaction. Notifications are left in place.
    ///
    /// # Returns
    /// false if the post did not exist
    pub async fn delete_post(&self, id: &str) -> Result<bool, AppError> {
        let mut conn = self.begin_immediate().await?;

        let result: Result<bool, AppError> = async {
            relation::remove_everywhere(&mut *conn, RelationSet::LikedPosts, id).await?;
            let deleted = sqlx::query("DELETE FROM posts WHERE id = ?")
                .bind(id)
                .execute(&mut *conn)
                .await?;
            Ok(deleted.rows_affected() > 0)
        }
        .await;

        Self::finish(&mut conn, result).await
    }

    /// All posts, newest first
    pub async fn get_all_posts(&self) -> Result<Vec<Post>, AppError> {
        let posts = sqlx::query_as::<_, Post>(
            "SELECT * FROM posts ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(posts)
    }

    /// Posts of one author, newest first
    pub async fn get_posts_by_user(&self, user_id: &str) -> Result<Vec<Post>, AppError> {
        let posts = sqlx::query_as::<_, Post>(
            "SELECT * FROM posts WHERE user_id = ? ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(posts)
    }

    /// Posts written by users that `user_id` follows, newest first
    pub async fn get_following_posts(&self, user_id: &str) -> Result<Vec<Post>, AppError> {
        let posts = sqlx::query_as::<_, Post>(
            r#"
            SELECT p.* FROM posts p
            JOIN user_following f ON f.following_id = p.user_id
            WHERE f.user_id = ?
            ORDER BY p.created_at DESC, p.id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(posts)
    }

    /// Posts in the `liked_posts` set of `user_id`, most recently liked first
    pub async fn get_liked_posts(&self, user_id: &str) -> Result<Vec<Post>, AppError> {
        let posts = sqlx::query_as::<_, Post>(
            r#"
            SELECT p.* FROM posts p
            JOIN user_liked_posts l ON l.post_id = p.id
            WHERE l.user_id = ?
            ORDER BY l.created_at DESC, l.rowid DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(posts)
    }

    /// `likes` sets for a batch of posts as (post_id, user_id) pairs
    pub async fn get_likes_for_posts(
        &self,
        post_ids: &[String],
    ) -> Result<Vec<(String, String)>, AppError> {
        if post_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query =
            QueryBuilder::<Sqlite>::new("SELECT post_id, user_id FROM post_likes WHERE post_id IN (");
        let mut separated = query.separated(", ");
        for id in post_ids {
            separated.push_bind(id);
        }
        separated.push_unseparated(") ORDER BY created_at ASC, rowid ASC");

        let rows = query
            .build_query_as::<(String, String)>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    // =========================================================================
    // Comments
    // =========================================================================

    /// Append a comment
    pub async fn insert_comment(&self, comment: &Comment) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO comments (id, post_id, user_id, text, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&comment.id)
        .bind(&comment.post_id)
        .bind(&comment.user_id)
        .bind(&comment.text)
        .bind(comment.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Comments for a batch of posts, in insertion order
    pub async fn get_comments_for_posts(
        &self,
        post_ids: &[String],
    ) -> Result<Vec<Comment>, AppError> {
        if post_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM comments WHERE post_id IN (");
        let mut separated = query.separated(", ");
        for id in post_ids {
            separated.push_bind(id);
        }
        separated.push_unseparated(") ORDER BY created_at ASC, id ASC");

        let comments = query
            .build_query_as::<Comment>()
            .fetch_all(&self.pool)
            .await?;
        Ok(comments)
    }

    // =========================================================================
    // Notifications
    // =========================================================================

    /// Insert notification
    pub async fn insert_notification<'e, E>(
        executor: E,
        notification: &Notification,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query(
            r#"
            INSERT INTO notifications (
                id, notification_type, from_user_id, to_user_id, read, created_at
            ) VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&notification.id)
        .bind(&notification.notification_type)
        .bind(&notification.from_user_id)
        .bind(&notification.to_user_id)
        .bind(notification.read)
        .bind(notification.created_at)
        .execute(executor)
        .await?;

        Ok(())
    }

    /// Notifications addressed to `to_user_id`, newest first, with sender fields
    pub async fn get_notifications_for(
        &self,
        to_user_id: &str,
    ) -> Result<Vec<NotificationWithSender>, AppError> {
        let notifications = sqlx::query_as::<_, NotificationWithSender>(
            r#"
            SELECT
                n.id, n.notification_type, n.from_user_id,
                u.username AS from_username, u.profile_img AS from_profile_img,
                n.to_user_id, n.read, n.created_at
            FROM notifications n
            LEFT JOIN users u ON u.id = n.from_user_id
            WHERE n.to_user_id = ?
            ORDER BY n.created_at DESC, n.id DESC
            "#,
        )
        .bind(to_user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(notifications)
    }

    /// Get a single notification by ID
    pub async fn get_notification(&self, id: &str) -> Result<Option<Notification>, AppError> {
        let notification =
            sqlx::query_as::<_, Notification>("SELECT * FROM notifications WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(notification)
    }

    /// Mark every notification of a recipient as read
    pub async fn mark_all_notifications_read(&self, to_user_id: &str) -> Result<u64, AppError> {
        let result = sqlx::query("UPDATE notifications SET read = 1 WHERE to_user_id = ? AND read = 0")
            .bind(to_user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Delete a single notification
    pub async fn delete_notification(&self, id: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete every notification of a recipient
    pub async fn delete_notifications_for(&self, to_user_id: &str) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM notifications WHERE to_user_id = ?")
            .bind(to_user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
