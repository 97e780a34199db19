//! Post endpoints

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
};

use super::converters::thread_to_response;
use super::dto::{CommentRequest, CreatePostRequest, MessageResponse, PostResponse};
use crate::AppState;
use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::service::{PostService, PostThread, RelationshipService};

pub fn posts_router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_all_posts))
        .route("/following", get(get_following_posts))
        .route("/likes/:id", get(get_liked_posts))
        .route("/user/:username", get(get_user_posts))
        .route("/create", post(create_post))
        .route("/like/:id", post(toggle_like))
        .route("/comment/:id", post(comment_on_post))
        .route("/:id", delete(delete_post))
}

fn post_service(state: &AppState) -> PostService {
    PostService::new(state.db.clone(), state.storage.clone())
}

fn to_responses(threads: &[PostThread]) -> Json<Vec<PostResponse>> {
    Json(threads.iter().map(thread_to_response).collect())
}

/// GET /api/posts
async fn get_all_posts(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
) -> Result<Json<Vec<PostResponse>>, AppError> {
    let threads = post_service(&state).all().await?;
    Ok(to_responses(&threads))
}

/// GET /api/posts/following
async fn get_following_posts(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<PostResponse>>, AppError> {
    let threads = post_service(&state).following_feed(&user.id).await?;
    Ok(to_responses(&threads))
}

/// GET /api/posts/likes/:id
async fn get_liked_posts(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<PostResponse>>, AppError> {
    let threads = post_service(&state).liked_by(&user_id).await?;
    Ok(to_responses(&threads))
}

/// GET /api/posts/user/:username
async fn get_user_posts(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    Path(username): Path<String>,
) -> Result<Json<Vec<PostResponse>>, AppError> {
    let threads = post_service(&state).by_username(&username).await?;
    Ok(to_responses(&threads))
}

/// POST /api/posts/create
async fn create_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<PostResponse>), AppError> {
    let thread = post_service(&state)
        .create(&user.id, request.text, request.img)
        .await?;
    Ok((StatusCode::CREATED, Json(thread_to_response(&thread))))
}

/// POST /api/posts/like/:id
///
/// Likes the post if not liked yet, else unlikes. Returns the updated
/// list of liking user ids.
async fn toggle_like(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(post_id): Path<String>,
) -> Result<Json<Vec<String>>, AppError> {
    let likes = RelationshipService::new(state.db.clone())
        .toggle_like(&user.id, &post_id)
        .await?;
    Ok(Json(likes))
}

/// POST /api/posts/comment/:id
async fn comment_on_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(post_id): Path<String>,
    Json(request): Json<CommentRequest>,
) -> Result<Json<PostResponse>, AppError> {
    let thread = post_service(&state)
        .comment(&user.id, &post_id, &request.text)
        .await?;
    Ok(Json(thread_to_response(&thread)))
}

/// DELETE /api/posts/:id
async fn delete_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(post_id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    post_service(&state).delete(&user.id, &post_id).await?;
    Ok(Json(MessageResponse::new("Post deleted successfully")))
}
