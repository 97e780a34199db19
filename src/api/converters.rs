//! Conversions from domain types to API responses

use super::dto::*;
use crate::data::{NotificationWithSender, User};
use crate::service::{CommentThread, PostThread, UserProfile};

/// Full user view; the password hash never leaves the server
pub fn profile_to_response(profile: &UserProfile) -> UserResponse {
    let user = &profile.user;
    UserResponse {
        id: user.id.clone(),
        username: user.username.clone(),
        full_name: user.full_name.clone(),
        email: user.email.clone(),
        followers: profile.followers.clone(),
        following: profile.following.clone(),
        liked_posts: profile.liked_posts.clone(),
        profile_img: user.profile_img.clone(),
        cover_img: user.cover_img.clone(),
        bio: user.bio.clone(),
        link: user.link.clone(),
        created_at: user.created_at,
        updated_at: user.updated_at,
    }
}

pub fn user_to_summary(user: &User) -> UserSummary {
    UserSummary {
        id: user.id.clone(),
        username: user.username.clone(),
        full_name: user.full_name.clone(),
        profile_img: user.profile_img.clone(),
        cover_img: user.cover_img.clone(),
        bio: user.bio.clone(),
        link: user.link.clone(),
    }
}

fn comment_to_response(thread: &CommentThread) -> CommentResponse {
    CommentResponse {
        id: thread.comment.id.clone(),
        text: thread.comment.text.clone(),
        user: thread.user.as_ref().map(user_to_summary),
        created_at: thread.comment.created_at,
    }
}

pub fn thread_to_response(thread: &PostThread) -> PostResponse {
    PostResponse {
        id: thread.post.id.clone(),
        user: thread.author.as_ref().map(user_to_summary),
        text: thread.post.text.clone(),
        img: thread.post.img.clone(),
        likes: thread.likes.clone(),
        comments: thread.comments.iter().map(comment_to_response).collect(),
        created_at: thread.post.created_at,
        updated_at: thread.post.updated_at,
    }
}

pub fn notification_to_response(notification: &NotificationWithSender) -> NotificationResponse {
    NotificationResponse {
        id: notification.id.clone(),
        notification_type: notification.notification_type.clone(),
        from: NotificationSender {
            id: notification.from_user_id.clone(),
            username: notification.from_username.clone(),
            profile_img: notification.from_profile_img.clone(),
        },
        to: notification.to_user_id.clone(),
        read: notification.read,
        created_at: notification.created_at,
    }
}
