//! API request and response DTOs
//!
//! JSON bodies use camelCase keys and `_id` for record ids, the shape the
//! web client reads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Full user view with relationship sets
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub followers: Vec<String>,
    pub following: Vec<String>,
    pub liked_posts: Vec<String>,
    pub profile_img: String,
    pub cover_img: String,
    pub bio: String,
    pub link: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// User fields embedded in posts, comments and suggestions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    pub full_name: String,
    pub profile_img: String,
    pub cover_img: String,
    pub bio: String,
    pub link: String,
}

/// Comment on a post
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub text: String,
    /// None when the commenter no longer exists
    pub user: Option<UserSummary>,
    pub created_at: DateTime<Utc>,
}

/// Post with author, likes and comments
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub user: Option<UserSummary>,
    pub text: Option<String>,
    pub img: Option<String>,
    pub likes: Vec<String>,
    pub comments: Vec<CommentResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Sender fields on a notification
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSender {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: Option<String>,
    pub profile_img: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationResponse {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "type")]
    pub notification_type: String,
    pub from: NotificationSender,
    pub to: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// Plain acknowledgement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CreatePostRequest {
    pub text: Option<String>,
    /// `data:` URL of the attached image
    pub img: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CommentRequest {
    pub text: String,
}
