//! User service
//!
//! Registration, credential checks, profiles and profile updates.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use validator::Validate;

use crate::auth::{hash_password, verify_password};
use crate::data::{Database, EntityId, RelationSet, User};
use crate::error::AppError;
use crate::storage::{MediaKind, MediaStorage};

/// Number of users sampled for suggestions
const SUGGESTION_SAMPLE: usize = 4;

/// Registration form
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterInput {
    #[validate(length(min = 1, max = 100, message = "Full name must be 1 to 100 characters"))]
    pub full_name: String,
    #[validate(length(min = 1, max = 30, message = "Username must be 1 to 30 characters"))]
    pub username: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

/// Profile update form; empty fields leave the stored value alone
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateProfileInput {
    #[validate(length(max = 100, message = "Full name must be at most 100 characters"))]
    pub full_name: Option<String>,
    #[validate(length(max = 30, message = "Username must be at most 30 characters"))]
    pub username: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    pub current_password: Option<String>,
    pub new_password: Option<String>,
    pub bio: Option<String>,
    pub link: Option<String>,
    /// `data:` URL of a new profile image
    pub profile_img: Option<String>,
    /// `data:` URL of a new cover image
    pub cover_img: Option<String>,
}

impl UpdateProfileInput {
    /// Treat blank strings as absent
    fn normalized(self) -> Self {
        fn clean(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }

        Self {
            full_name: clean(self.full_name),
            username: clean(self.username),
            email: clean(self.email),
            // Passwords are not trimmed
            current_password: self.current_password.filter(|v| !v.is_empty()),
            new_password: self.new_password.filter(|v| !v.is_empty()),
            bio: clean(self.bio),
            link: clean(self.link),
            profile_img: clean(self.profile_img),
            cover_img: clean(self.cover_img),
        }
    }
}

/// User together with its relationship sets
#[derive(Debug, Clone)]
pub struct UserProfile {
    pub user: User,
    pub followers: Vec<String>,
    pub following: Vec<String>,
    pub liked_posts: Vec<String>,
}

/// User service
pub struct UserService {
    db: Arc<Database>,
    storage: Arc<MediaStorage>,
}

impl UserService {
    /// Create new user service
    pub fn new(db: Arc<Database>, storage: Arc<MediaStorage>) -> Self {
        Self { db, storage }
    }

    /// Register a new user
    ///
    /// # Errors
    /// - `Validation` if a field fails validation
    /// - `Conflict` if the username or email is taken
    pub async fn register(&self, input: RegisterInput) -> Result<User, AppError> {
        let input = RegisterInput {
            full_name: input.full_name.trim().to_string(),
            username: input.username.trim().to_string(),
            email: input.email.trim().to_string(),
            password: input.password,
        };
        input.validate()?;

        if self.db.get_user_by_username(&input.username).await?.is_some() {
            return Err(AppError::Conflict("Username already exists".to_string()));
        }
        if self.db.get_user_by_email(&input.email).await?.is_some() {
            return Err(AppError::Conflict("Email already exists".to_string()));
        }

        let password_hash = hash_blocking(input.password).await?;

        let now = Utc::now();
        let user = User {
            id: EntityId::new().0,
            username: input.username,
            email: input.email,
            full_name: input.full_name,
            password_hash,
            bio: String::new(),
            link: String::new(),
            profile_img: String::new(),
            cover_img: String::new(),
            created_at: now,
            updated_at: now,
        };
        self.db.insert_user(&user).await?;
        tracing::info!(user = %user.id, username = %user.username, "User registered");

        Ok(user)
    }

    /// Check a username and password
    ///
    /// # Errors
    /// `Validation("Invalid credentials")` for an unknown user or a wrong
    /// password alike
    pub async fn login(&self, username: &str, password: &str) -> Result<User, AppError> {
        let invalid = || AppError::Validation("Invalid credentials".to_string());

        let user = self
            .db
            .get_user_by_username(username.trim())
            .await?
            .ok_or_else(invalid)?;

        if !verify_blocking(password.to_string(), user.password_hash.clone()).await? {
            tracing::info!(username = %user.username, "Rejected login");
            return Err(invalid());
        }

        Ok(user)
    }

    /// Public profile by username
    pub async fn get_profile(&self, username: &str) -> Result<UserProfile, AppError> {
        let user = self
            .db
            .get_user_by_username(username)
            .await?
            .ok_or_else(AppError::user_not_found)?;

        self.with_relations(user).await
    }

    /// Attach the relationship sets to a user
    pub async fn with_relations(&self, user: User) -> Result<UserProfile, AppError> {
        let followers = self
            .db
            .get_relation_members(RelationSet::Followers, &user.id)
            .await?;
        let following = self
            .db
            .get_relation_members(RelationSet::Following, &user.id)
            .await?;
        let liked_posts = self
            .db
            .get_relation_members(RelationSet::LikedPosts, &user.id)
            .await?;

        Ok(UserProfile {
            user,
            followers,
            following,
            liked_posts,
        })
    }

    /// Up to four random users the actor does not follow yet
    pub async fn suggested(&self, actor_id: &str) -> Result<Vec<User>, AppError> {
        let following = self
            .db
            .get_relation_members(RelationSet::Following, actor_id)
            .await?;

        let users = self
            .db
            .sample_users(actor_id, SUGGESTION_SAMPLE)
            .await?
            .into_iter()
            .filter(|user| !following.contains(&user.id))
            .collect();

        Ok(users)
    }

    /// Apply a profile update for the actor
    ///
    /// # Errors
    /// - `Validation` if only one of the passwords is given, the current
    ///   password is wrong, or the new one is too short
    /// - `Conflict` if the new username or email is taken
    pub async fn update(
        &self,
        actor_id: &str,
        input: UpdateProfileInput,
    ) -> Result<UserProfile, AppError> {
        let input = input.normalized();
        input.validate()?;

        let mut user = self
            .db
            .get_user(actor_id)
            .await?
            .ok_or_else(AppError::user_not_found)?;

        match (input.current_password, input.new_password) {
            (Some(current), Some(new)) => {
                if !verify_blocking(current, user.password_hash.clone()).await? {
                    return Err(AppError::Validation("Incorrect password".to_string()));
                }
                if new.chars().count() < 6 {
                    return Err(AppError::Validation(
                        "Password must be at least 6 characters".to_string(),
                    ));
                }
                user.password_hash = hash_blocking(new).await?;
            }
            (None, None) => {}
            _ => {
                return Err(AppError::Validation(
                    "Please provide both current and new password".to_string(),
                ));
            }
        }

        if let Some(username) = input.username.filter(|u| *u != user.username) {
            if self.db.get_user_by_username(&username).await?.is_some() {
                return Err(AppError::Conflict("Username already exists".to_string()));
            }
            user.username = username;
        }
        if let Some(email) = input.email.filter(|e| *e != user.email) {
            if self.db.get_user_by_email(&email).await?.is_some() {
                return Err(AppError::Conflict("Email already exists".to_string()));
            }
            user.email = email;
        }

        if let Some(full_name) = input.full_name {
            user.full_name = full_name;
        }
        if let Some(bio) = input.bio {
            user.bio = bio;
        }
        if let Some(link) = input.link {
            user.link = link;
        }
        user.updated_at = Utc::now();

        let (profile_img, cover_img) = (input.profile_img, input.cover_img);
        let mut uploaded = Vec::new();
        let mut replaced_images = Vec::new();
        let saved: Result<(), AppError> = async {
            if let Some(reference) = profile_img {
                let url = self
                    .storage
                    .upload_data_url(MediaKind::ProfileImage, &reference)
                    .await?;
                uploaded.push(url.clone());
                replaced_images.push(std::mem::replace(&mut user.profile_img, url));
            }
            if let Some(reference) = cover_img {
                let url = self
                    .storage
                    .upload_data_url(MediaKind::CoverImage, &reference)
                    .await?;
                uploaded.push(url.clone());
                replaced_images.push(std::mem::replace(&mut user.cover_img, url));
            }

            if !self.db.update_user(&user).await? {
                return Err(AppError::user_not_found());
            }
            Ok(())
        }
        .await;

        if let Err(error) = saved {
            self.discard_uploads(&uploaded).await;
            return Err(error);
        }
        tracing::info!(user = %user.id, "Profile updated");

        for old in replaced_images.into_iter().filter(|url| !url.is_empty()) {
            if let Err(e) = self.storage.delete_by_url(&old).await {
                tracing::warn!(error = %e, url = %old, "Failed to delete replaced image");
            }
        }

        self.with_relations(user).await
    }

    /// Remove images uploaded for an update that was not saved
    async fn discard_uploads(&self, urls: &[String]) {
        for url in urls {
            if let Err(e) = self.storage.delete_by_url(url).await {
                tracing::warn!(error = %e, url = %url, "Failed to delete unsaved upload");
            }
        }
    }
}

async fn hash_blocking(password: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| AppError::Internal(e.into()))?
}

async fn verify_blocking(password: String, hash: String) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| AppError::Internal(e.into()))
}
