//! Post service
//!
//! Creating, deleting and commenting on posts, and the post feeds. Feeds are
//! returned as [`PostThread`]s: the post joined with its author, its `likes`
//! set and its comments with their authors.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;

use crate::data::{Comment, Database, EntityId, Post, User};
use crate::error::AppError;
use crate::storage::{MediaKind, MediaStorage};

/// Maximum post text length in characters
pub const MAX_POST_CHARS: usize = 280;

/// Comment joined with its author
#[derive(Debug, Clone)]
pub struct CommentThread {
    pub comment: Comment,
    /// None when the commenter has since been deleted
    pub user: Option<User>,
}

/// Post joined with everything a feed shows
#[derive(Debug, Clone)]
pub struct PostThread {
    pub post: Post,
    pub author: Option<User>,
    /// User ids in the post's `likes` set
    pub likes: Vec<String>,
    /// Comments in insertion order
    pub comments: Vec<CommentThread>,
}

/// Drop blank values; anything else is kept as submitted
fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Post service
pub struct PostService {
    db: Arc<Database>,
    storage: Arc<MediaStorage>,
}

impl PostService {
    /// Create new post service
    pub fn new(db: Arc<Database>, storage: Arc<MediaStorage>) -> Self {
        Self { db, storage }
    }

    /// Publish a post with text, an image, or both
    ///
    /// `img` is a `data:` URL; it is uploaded before the post is stored.
    ///
    /// # Errors
    /// - `Validation` if neither text nor image is given, or text is too long
    /// - `NotFound` if the actor does not exist
    pub async fn create(
        &self,
        actor_id: &str,
        text: Option<String>,
        img: Option<String>,
    ) -> Result<PostThread, AppError> {
        let author = self
            .db
            .get_user(actor_id)
            .await?
            .ok_or_else(AppError::user_not_found)?;

        let text = non_blank(text);
        let img = non_blank(img);
        if text.is_none() && img.is_none() {
            return Err(AppError::Validation(
                "Please provide text or image".to_string(),
            ));
        }
        if let Some(text) = &text {
            if text.chars().count() > MAX_POST_CHARS {
                return Err(AppError::Validation(format!(
                    "Post text must be at most {} characters",
                    MAX_POST_CHARS
                )));
            }
        }

        let img = match img {
            Some(reference) => Some(
                self.storage
                    .upload_data_url(MediaKind::PostImage, reference.trim())
                    .await?,
            ),
            None => None,
        };

        let now = Utc::now();
        let post = Post {
            id: EntityId::new().0,
            user_id: author.id.clone(),
            text,
            img,
            created_at: now,
            updated_at: now,
        };
        self.db.insert_post(&post).await?;
        tracing::info!(post = %post.id, actor = %actor_id, "Post created");

        Ok(PostThread {
            post,
            author: Some(author),
            likes: Vec::new(),
            comments: Vec::new(),
        })
    }

    /// Delete a post owned by the actor, with its hosted image
    ///
    /// # Errors
    /// - `NotFound` if the post does not exist
    /// - `Unauthorized` if the actor is not the owner
    pub async fn delete(&self, actor_id: &str, post_id: &str) -> Result<(), AppError> {
        let post = self
            .db
            .get_post(post_id)
            .await?
            .ok_or_else(AppError::post_not_found)?;

        if post.user_id != actor_id {
            return Err(AppError::Unauthorized);
        }

        if let Some(img) = &post.img {
            self.storage.delete_by_url(img).await?;
        }

        self.db.delete_post(post_id).await?;
        tracing::info!(post = %post_id, actor = %actor_id, "Post deleted");
        Ok(())
    }

    /// Append a comment to a post
    ///
    /// Comments do not notify the post owner.
    ///
    /// # Returns
    /// The post with its full comment sequence
    pub async fn comment(
        &self,
        actor_id: &str,
        post_id: &str,
        text: &str,
    ) -> Result<PostThread, AppError> {
        if text.trim().is_empty() {
            return Err(AppError::Validation("Please provide comment".to_string()));
        }

        let post = self
            .db
            .get_post(post_id)
            .await?
            .ok_or_else(AppError::post_not_found)?;

        let comment = Comment {
            id: EntityId::new().0,
            post_id: post.id.clone(),
            user_id: actor_id.to_string(),
            text: text.to_string(),
            created_at: Utc::now(),
        };
        self.db.insert_comment(&comment).await?;
        tracing::info!(post = %post_id, actor = %actor_id, "Comment added");

        let mut threads = self.hydrate(vec![post]).await?;
        threads.pop().ok_or_else(AppError::post_not_found)
    }

    /// Every post, newest first
    pub async fn all(&self) -> Result<Vec<PostThread>, AppError> {
        let posts = self.db.get_all_posts().await?;
        self.hydrate(posts).await
    }

    /// Posts by users the actor follows, newest first
    pub async fn following_feed(&self, actor_id: &str) -> Result<Vec<PostThread>, AppError> {
        if self.db.get_user(actor_id).await?.is_none() {
            return Err(AppError::user_not_found());
        }

        let posts = self.db.get_following_posts(actor_id).await?;
        self.hydrate(posts).await
    }

    /// Posts in a user's `liked_posts` set
    pub async fn liked_by(&self, user_id: &str) -> Result<Vec<PostThread>, AppError> {
        if self.db.get_user(user_id).await?.is_none() {
            return Err(AppError::user_not_found());
        }

        let posts = self.db.get_liked_posts(user_id).await?;
        self.hydrate(posts).await
    }

    /// Posts written by `username`, newest first
    pub async fn by_username(&self, username: &str) -> Result<Vec<PostThread>, AppError> {
        let user = self
            .db
            .get_user_by_username(username)
            .await?
            .ok_or_else(AppError::user_not_found)?;

        let posts = self.db.get_posts_by_user(&user.id).await?;
        self.hydrate(posts).await
    }

    /// Join posts with authors, likes and comments in batched queries
    async fn hydrate(&self, posts: Vec<Post>) -> Result<Vec<PostThread>, AppError> {
        if posts.is_empty() {
            return Ok(Vec::new());
        }

        let post_ids: Vec<String> = posts.iter().map(|p| p.id.clone()).collect();

        let mut likes: HashMap<String, Vec<String>> = HashMap::new();
        for (post_id, user_id) in self.db.get_likes_for_posts(&post_ids).await? {
            likes.entry(post_id).or_default().push(user_id);
        }

        let mut comments: HashMap<String, Vec<Comment>> = HashMap::new();
        for comment in self.db.get_comments_for_posts(&post_ids).await? {
            comments
                .entry(comment.post_id.clone())
                .or_default()
                .push(comment);
        }

        let mut user_ids: Vec<String> = posts.iter().map(|p| p.user_id.clone()).collect();
        user_ids.extend(comments.values().flatten().map(|c| c.user_id.clone()));
        user_ids.sort();
        user_ids.dedup();

        let users: HashMap<String, User> = self
            .db
            .get_users_by_ids(&user_ids)
            .await?
            .into_iter()
            .map(|user| (user.id.clone(), user))
            .collect();

        let threads = posts
            .into_iter()
            .map(|post| {
                let comments = comments
                    .remove(&post.id)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|comment| CommentThread {
                        user: users.get(&comment.user_id).cloned(),
                        comment,
                    })
                    .collect();

                PostThread {
                    author: users.get(&post.user_id).cloned(),
                    likes: likes.remove(&post.id).unwrap_or_default(),
                    comments,
                    post,
                }
            })
            .collect();

        Ok(threads)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    use crate::config::MediaStorageConfig;
    use crate::data::RelationSet;
    use crate::service::RelationshipService;

    async fn create_test_db() -> (Arc<Database>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("service-post.db");
        let db = Database::connect(&db_path).await.unwrap();
        (Arc::new(db), temp_dir)
    }

    fn create_test_storage() -> Arc<MediaStorage> {
        Arc::new(MediaStorage::new(&MediaStorageConfig {
            bucket: "test-media-bucket".to_string(),
            public_url: "https://media.test.example.com".to_string(),
            endpoint: "http://127.0.0.1:9".to_string(),
            region: "auto".to_string(),
            access_key_id: "test-access-key".to_string(),
            secret_access_key: "test-secret-key".to_string(),
        }))
    }

    async fn seed_user(db: &Database, username: &str) -> User {
        let user = User {
            id: EntityId::new().0,
            username: username.to_string(),
            email: format!("{username}@example.com"),
            full_name: username.to_string(),
            password_hash: "hash".to_string(),
            bio: String::new(),
            link: String::new(),
            profile_img: String::new(),
            cover_img: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        db.insert_user(&user).await.unwrap();
        user
    }

    #[tokio::test]
    async fn test_create_requires_text_or_image() {
        let (db, _temp_dir) = create_test_db().await;
        let alice = seed_user(&db, "alice").await;
        let service = PostService::new(db.clone(), create_test_storage());

        let result = service.create(&alice.id, None, None).await;
        assert!(
            matches!(result, Err(AppError::Validation(ref msg)) if msg == "Please provide text or image")
        );

        let result = service
            .create(&alice.id, Some("   ".to_string()), Some(String::new()))
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert!(db.get_all_posts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_text_post() {
        let (db, _temp_dir) = create_test_db().await;
        let alice = seed_user(&db, "alice").await;
        let service = PostService::new(db.clone(), create_test_storage());

        let thread = service
            .create(&alice.id, Some("  hello world ".to_string()), None)
            .await
            .unwrap();
        assert_eq!(thread.post.text.as_deref(), Some("  hello world "));
        assert!(thread.post.img.is_none());
        assert_eq!(thread.author.unwrap().id, alice.id);

        let stored = db.get_all_posts().await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].text.as_deref(), Some("  hello world "));
    }

    #[tokio::test]
    async fn test_create_rejects_long_text_and_bad_image() {
        let (db, _temp_dir) = create_test_db().await;
        let alice = seed_user(&db, "alice").await;
        let service = PostService::new(db.clone(), create_test_storage());

        let at_limit = "a".repeat(MAX_POST_CHARS);
        assert!(service.create(&alice.id, Some(at_limit), None).await.is_ok());

        let too_long = "a".repeat(MAX_POST_CHARS + 1);
        let result = service.create(&alice.id, Some(too_long), None).await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let result = service
            .create(&alice.id, None, Some("https://example.com/cat.png".to_string()))
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(db.get_all_posts().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_requires_owner() {
        let (db, _temp_dir) = create_test_db().await;
        let alice = seed_user(&db, "alice").await;
        let bob = seed_user(&db, "bob").await;
        let service = PostService::new(db.clone(), create_test_storage());

        let thread = service
            .create(&bob.id, Some("mine".to_string()), None)
            .await
            .unwrap();

        let result = service.delete(&alice.id, &thread.post.id).await;
        assert!(matches!(result, Err(AppError::Unauthorized)));
        assert!(db.get_post(&thread.post.id).await.unwrap().is_some());

        service.delete(&bob.id, &thread.post.id).await.unwrap();
        assert!(db.get_post(&thread.post.id).await.unwrap().is_none());

        let result = service.delete(&bob.id, &thread.post.id).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_deleted_post_leaves_liked_posts() {
        let (db, _temp_dir) = create_test_db().await;
        let alice = seed_user(&db, "alice").await;
        let bob = seed_user(&db, "bob").await;
        let service = PostService::new(db.clone(), create_test_storage());
        let relationships = RelationshipService::new(db.clone());

        let thread = service
            .create(&bob.id, Some("like me".to_string()), None)
            .await
            .unwrap();
        relationships
            .toggle_like(&alice.id, &thread.post.id)
            .await
            .unwrap();
        assert_eq!(
            db.get_relation_members(RelationSet::LikedPosts, &alice.id)
                .await
                .unwrap()
                .len(),
            1
        );

        service.delete(&bob.id, &thread.post.id).await.unwrap();
        assert!(
            db.get_relation_members(RelationSet::LikedPosts, &alice.id)
                .await
                .unwrap()
                .is_empty()
        );
        assert!(service.liked_by(&alice.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_comment_appends_without_notification() {
        let (db, _temp_dir) = create_test_db().await;
        let alice = seed_user(&db, "alice").await;
        let bob = seed_user(&db, "bob").await;
        let service = PostService::new(db.clone(), create_test_storage());

        let thread = service
            .create(&bob.id, Some("comment here".to_string()), None)
            .await
            .unwrap();

        let result = service.comment(&alice.id, &thread.post.id, "  ").await;
        assert!(
            matches!(result, Err(AppError::Validation(ref msg)) if msg == "Please provide comment")
        );

        service
            .comment(&alice.id, &thread.post.id, " first\n")
            .await
            .unwrap();
        let updated = service
            .comment(&bob.id, &thread.post.id, "second")
            .await
            .unwrap();

        let texts: Vec<&str> = updated
            .comments
            .iter()
            .map(|c| c.comment.text.as_str())
            .collect();
        assert_eq!(texts, vec![" first\n", "second"]);
        assert_eq!(
            updated.comments[0].user.as_ref().unwrap().username,
            "alice"
        );
        assert!(db.get_notifications_for(&bob.id).await.unwrap().is_empty());

        let result = service.comment(&alice.id, "01NOPOST", "hello").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_feeds() {
        let (db, _temp_dir) = create_test_db().await;
        let alice = seed_user(&db, "alice").await;
        let bob = seed_user(&db, "bob").await;
        let carol = seed_user(&db, "carol").await;
        let service = PostService::new(db.clone(), create_test_storage());
        let relationships = RelationshipService::new(db.clone());

        let bob_post = service
            .create(&bob.id, Some("from bob".to_string()), None)
            .await
            .unwrap();
        service
            .create(&carol.id, Some("from carol".to_string()), None)
            .await
            .unwrap();

        assert_eq!(service.all().await.unwrap().len(), 2);
        assert!(service.following_feed(&alice.id).await.unwrap().is_empty());

        relationships.toggle_follow(&alice.id, &bob.id).await.unwrap();
        let feed = service.following_feed(&alice.id).await.unwrap();
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].post.id, bob_post.post.id);

        relationships
            .toggle_like(&alice.id, &bob_post.post.id)
            .await
            .unwrap();
        let liked = service.liked_by(&alice.id).await.unwrap();
        assert_eq!(liked.len(), 1);
        assert_eq!(liked[0].likes, vec![alice.id.clone()]);

        let carols = service.by_username("carol").await.unwrap();
        assert_eq!(carols.len(), 1);
        assert_eq!(carols[0].author.as_ref().unwrap().username, "carol");

        assert!(matches!(
            service.by_username("nobody").await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            service.liked_by("01NOUSER").await,
            Err(AppError::NotFound(_))
        ));
    }
}
