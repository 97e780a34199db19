//! User endpoints

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};

use super::converters::{profile_to_response, user_to_summary};
use super::dto::{MessageResponse, UserResponse, UserSummary};
use crate::AppState;
use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::service::{RelationshipService, UpdateProfileInput, UserService};

pub fn users_router() -> Router<AppState> {
    Router::new()
        .route("/profile/:username", get(get_profile))
        .route("/suggested", get(get_suggested))
        .route("/follow/:id", post(toggle_follow))
        .route("/update", post(update_profile))
}

fn user_service(state: &AppState) -> UserService {
    UserService::new(state.db.clone(), state.storage.clone())
}

/// GET /api/users/profile/:username
async fn get_profile(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    Path(username): Path<String>,
) -> Result<Json<UserResponse>, AppError> {
    let profile = user_service(&state).get_profile(&username).await?;
    Ok(Json(profile_to_response(&profile)))
}

/// GET /api/users/suggested
async fn get_suggested(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<UserSummary>>, AppError> {
    let users = user_service(&state).suggested(&user.id).await?;
    Ok(Json(users.iter().map(user_to_summary).collect()))
}

/// POST /api/users/follow/:id
///
/// Follows the user if not followed yet, else unfollows.
async fn toggle_follow(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(target_id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let outcome = RelationshipService::new(state.db.clone())
        .toggle_follow(&user.id, &target_id)
        .await?;

    Ok(Json(MessageResponse::new(outcome.message())))
}

/// POST /api/users/update
async fn update_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<UpdateProfileInput>,
) -> Result<Json<UserResponse>, AppError> {
    let profile = user_service(&state).update(&user.id, input).await?;
    Ok(Json(profile_to_response(&profile)))
}
