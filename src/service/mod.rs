//! Service layer
//!
//! Contains business logic separated from HTTP handlers.
//! Services orchestrate database and media storage operations.

mod notification;
mod post;
mod relationship;
mod user;

pub use notification::NotificationService;
pub use post::{CommentThread, MAX_POST_CHARS, PostService, PostThread};
pub use relationship::{FollowOutcome, RelationshipService};
pub use user::{RegisterInput, UpdateProfileInput, UserProfile, UserService};
