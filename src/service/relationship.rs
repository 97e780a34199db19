//! Relationship service
//!
//! Follow/unfollow and like/unlike toggles. Every relationship is stored on
//! both records (`following` on the actor and `followers` on the target,
//! `liked_posts` on the user and `likes` on the post), and each toggle
//! decides its direction from the actor-side set, writes both sides and
//! records the notification inside a single `BEGIN IMMEDIATE` transaction.

use std::sync::Arc;

use crate::data::{
    Database, Notification, NotificationType, RelationSet, relation,
};
use crate::error::AppError;
use crate::metrics::{NOTIFICATIONS_CREATED_TOTAL, RELATIONSHIP_TOGGLES_TOTAL};

/// Result of a follow toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowOutcome {
    Followed,
    Unfollowed,
}

impl FollowOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Followed => "followed",
            Self::Unfollowed => "unfollowed",
        }
    }

    /// Message returned to API clients
    pub fn message(&self) -> &'static str {
        match self {
            Self::Followed => "Followed successfully",
            Self::Unfollowed => "Unfollowed successfully",
        }
    }
}

/// Relationship service
pub struct RelationshipService {
    db: Arc<Database>,
}

impl RelationshipService {
    /// Create new relationship service
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Follow `target_id` if the actor does not follow it yet, else unfollow
    ///
    /// # Errors
    /// - `SelfReference` if actor and target are the same id, checked before
    ///   any lookup
    /// - `NotFound` if either user does not exist
    #[tracing::instrument(skip_all, fields(actor = %actor_id, target = %target_id))]
    pub async fn toggle_follow(
        &self,
        actor_id: &str,
        target_id: &str,
    ) -> Result<FollowOutcome, AppError> {
        if actor_id == target_id {
            return Err(AppError::SelfReference);
        }

        let mut conn = self.db.begin_immediate().await?;

        let result: Result<FollowOutcome, AppError> = async {
            if Database::find_user(&mut *conn, target_id).await?.is_none()
                || Database::find_user(&mut *conn, actor_id).await?.is_none()
            {
                return Err(AppError::user_not_found());
            }

            if relation::contains(&mut *conn, RelationSet::Following, actor_id, target_id).await? {
                relation::unlink(&mut *conn, RelationSet::Following, actor_id, target_id).await?;
                Ok(FollowOutcome::Unfollowed)
            } else {
                relation::link(&mut *conn, RelationSet::Following, actor_id, target_id).await?;
                Database::insert_notification(
                    &mut *conn,
                    &Notification::new(NotificationType::Follow, actor_id, target_id),
                )
                .await?;
                Ok(FollowOutcome::Followed)
            }
        }
        .await;

        let outcome = Database::finish(&mut conn, result).await?;

        RELATIONSHIP_TOGGLES_TOTAL
            .with_label_values(&["follow", outcome.as_str()])
            .inc();
        if outcome == FollowOutcome::Followed {
            NOTIFICATIONS_CREATED_TOTAL
                .with_label_values(&[NotificationType::Follow.as_str()])
                .inc();
        }
        tracing::info!(outcome = outcome.as_str(), "Follow toggled");

        Ok(outcome)
    }

    /// Like `post_id` if the actor has not liked it yet, else unlike
    ///
    /// # Returns
    /// The post's `likes` set after the toggle, oldest like first
    ///
    /// # Errors
    /// `NotFound` if the post does not exist
    #[tracing::instrument(skip_all, fields(actor = %actor_id, post = %post_id))]
    pub async fn toggle_like(&self, actor_id: &str, post_id: &str) -> Result<Vec<String>, AppError> {
        let mut conn = self.db.begin_immediate().await?;

        let result: Result<(bool, Vec<String>), AppError> = async {
            let post = Database::find_post(&mut *conn, post_id)
                .await?
                .ok_or_else(AppError::post_not_found)?;

            let liked =
                if relation::contains(&mut *conn, RelationSet::PostLikes, post_id, actor_id).await? {
                    relation::unlink(&mut *conn, RelationSet::PostLikes, post_id, actor_id).await?;
                    false
                } else {
                    relation::link(&mut *conn, RelationSet::PostLikes, post_id, actor_id).await?;
                    Database::touch_post(&mut *conn, post_id, chrono::Utc::now()).await?;
                    Database::insert_notification(
                        &mut *conn,
                        &Notification::new(NotificationType::Like, actor_id, &post.user_id),
                    )
                    .await?;
                    true
                };

            let likes = relation::members(&mut *conn, RelationSet::PostLikes, post_id).await?;
            Ok((liked, likes))
        }
        .await;

        let (liked, likes) = Database::finish(&mut conn, result).await?;

        let outcome = if liked { "liked" } else { "unliked" };
        RELATIONSHIP_TOGGLES_TOTAL
            .with_label_values(&["like", outcome])
            .inc();
        if liked {
            NOTIFICATIONS_CREATED_TOTAL
                .with_label_values(&[NotificationType::Like.as_str()])
                .inc();
        }
        tracing::info!(outcome, likes = likes.len(), "Like toggled");

        Ok(likes)
    }
}
