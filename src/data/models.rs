//! Data models
//!
//! Rust structs representing database entities.
//! All models use ULID for IDs and chrono for timestamps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// ID Types
// =============================================================================

/// Entity ID wrapper (ULID format, 26 characters)
///
/// Example: "01ARZ3NDEKTSV4RRFFQ69G5FAV"
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    /// Generate a new ULID
    pub fn new() -> Self {
        Self(ulid::Ulid::new().to_string())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// User
// =============================================================================

/// A registered user
///
/// The `followers`, `following` and `liked_posts` sets live in their own
/// tables (see [`crate::data::RelationSet`]).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub full_name: String,
    /// argon2 PHC string
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub bio: String,
    pub link: String,
    /// Public URL of the profile image, empty when unset
    pub profile_img: String,
    /// Public URL of the cover image, empty when unset
    pub cover_img: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Post
// =============================================================================

/// A post; at least one of `text` and `img` is set
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: String,
    /// Owning user
    pub user_id: String,
    pub text: Option<String>,
    /// Public URL of the attached image
    pub img: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A comment on a post, ordered by `created_at`
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    pub user_id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Notifications
// =============================================================================

/// Notification for a follow or a like
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Notification {
    pub id: String,
    /// Type: follow, like
    pub notification_type: String,
    /// Who triggered this notification
    pub from_user_id: String,
    /// Recipient
    pub to_user_id: String,
    /// Whether the recipient has seen this
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// New unread notification
    pub fn new(notification_type: NotificationType, from_user_id: &str, to_user_id: &str) -> Self {
        Self {
            id: EntityId::new().0,
            notification_type: notification_type.as_str().to_string(),
            from_user_id: from_user_id.to_string(),
            to_user_id: to_user_id.to_string(),
            read: false,
            created_at: Utc::now(),
        }
    }
}

/// Notification joined with the sender's public fields
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct NotificationWithSender {
    pub id: String,
    pub notification_type: String,
    pub from_user_id: String,
    /// None when the sender has since been deleted
    pub from_username: Option<String>,
    pub from_profile_img: Option<String>,
    pub to_user_id: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// Notification types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationType {
    Follow,
    Like,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Follow => "follow",
            Self::Like => "like",
        }
    }
}
