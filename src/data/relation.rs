//! Relationship sets
//!
//! Each mirrored relationship is stored twice, once per owning record:
//!
//! | set | owner | member |
//! |-----|-------|--------|
//! | `Followers` | user | follower user |
//! | `Following` | user | followed user |
//! | `LikedPosts` | user | post |
//! | `PostLikes` | post | liking user |
//!
//! Every function here touches exactly one set of one record, which is the
//! atomic unit the store guarantees. Writes are idempotent: inserting an
//! existing member and removing an absent one are both no-ops, so callers can
//! re-issue a toggle over a half-applied mirror without creating duplicates.
//!
//! Functions take any SQLite executor so they can run on the pool or inside
//! a transaction (`&mut *tx`).

use chrono::Utc;
use sqlx::{Executor, Sqlite, SqliteConnection};

use crate::error::AppError;

/// One side of a mirrored relationship
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationSet {
    Followers,
    Following,
    LikedPosts,
    PostLikes,
}

impl RelationSet {
    fn table(self) -> &'static str {
        match self {
            Self::Followers => "user_followers",
            Self::Following => "user_following",
            Self::LikedPosts => "user_liked_posts",
            Self::PostLikes => "post_likes",
        }
    }

    fn owner_column(self) -> &'static str {
        match self {
            Self::Followers | Self::Following | Self::LikedPosts => "user_id",
            Self::PostLikes => "post_id",
        }
    }

    fn member_column(self) -> &'static str {
        match self {
            Self::Followers => "follower_id",
            Self::Following => "following_id",
            Self::LikedPosts => "post_id",
            Self::PostLikes => "user_id",
        }
    }

    /// Set on the other record that mirrors this one
    pub fn mirror(self) -> Self {
        match self {
            Self::Followers => Self::Following,
            Self::Following => Self::Followers,
            Self::LikedPosts => Self::PostLikes,
            Self::PostLikes => Self::LikedPosts,
        }
    }
}

/// Check whether `member` is in the `set` of `owner`
pub async fn contains<'e, E>(
    executor: E,
    set: RelationSet,
    owner: &str,
    member: &str,
) -> Result<bool, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "SELECT COUNT(*) FROM {} WHERE {} = ? AND {} = ?",
        set.table(),
        set.owner_column(),
        set.member_column()
    );
    let count: i64 = sqlx::query_scalar(&sql)
        .bind(owner)
        .bind(member)
        .fetch_one(executor)
        .await?;

    Ok(count > 0)
}

/// Add `member` to the `set` of `owner` if absent
///
/// # Returns
/// true if the member was added, false if it was already present
pub async fn insert<'e, E>(
    executor: E,
    set: RelationSet,
    owner: &str,
    member: &str,
) -> Result<bool, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "INSERT OR IGNORE INTO {} ({}, {}, created_at) VALUES (?, ?, ?)",
        set.table(),
        set.owner_column(),
        set.member_column()
    );
    let result = sqlx::query(&sql)
        .bind(owner)
        .bind(member)
        .bind(Utc::now())
        .execute(executor)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Remove `member` from the `set` of `owner` if present
///
/// # Returns
/// true if the member was removed, false if it was not present
pub async fn remove<'e, E>(
    executor: E,
    set: RelationSet,
    owner: &str,
    member: &str,
) -> Result<bool, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "DELETE FROM {} WHERE {} = ? AND {} = ?",
        set.table(),
        set.owner_column(),
        set.member_column()
    );
    let result = sqlx::query(&sql)
        .bind(owner)
        .bind(member)
        .execute(executor)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// All members of the `set` of `owner`, oldest first
pub async fn members<'e, E>(
    executor: E,
    set: RelationSet,
    owner: &str,
) -> Result<Vec<String>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "SELECT {} FROM {} WHERE {} = ? ORDER BY created_at ASC, rowid ASC",
        set.member_column(),
        set.table(),
        set.owner_column()
    );
    let members = sqlx::query_scalar::<_, String>(&sql)
        .bind(owner)
        .fetch_all(executor)
        .await?;

    Ok(members)
}

/// Remove `member` from the set of every owner
///
/// Used when the member record itself goes away.
pub async fn remove_everywhere<'e, E>(
    executor: E,
    set: RelationSet,
    member: &str,
) -> Result<u64, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "DELETE FROM {} WHERE {} = ?",
        set.table(),
        set.member_column()
    );
    let result = sqlx::query(&sql).bind(member).execute(executor).await?;

    Ok(result.rows_affected())
}

/// Record `owner -> member` on both sides of the mirror
///
/// Each side is written independently and idempotently, so a side that is
/// already present is left alone and the missing one is filled in.
pub async fn link(
    conn: &mut SqliteConnection,
    set: RelationSet,
    owner: &str,
    member: &str,
) -> Result<(), AppError> {
    insert(&mut *conn, set, owner, member).await?;
    insert(&mut *conn, set.mirror(), member, owner).await?;
    Ok(())
}

/// Remove `owner -> member` from both sides of the mirror
pub async fn unlink(
    conn: &mut SqliteConnection,
    set: RelationSet,
    owner: &str,
    member: &str,
) -> Result<(), AppError> {
    remove(&mut *conn, set, owner, member).await?;
    remove(&mut *conn, set.mirror(), member, owner).await?;
    Ok(())
}
