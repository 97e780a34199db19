//! Notification endpoints

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get},
};

use super::converters::notification_to_response;
use super::dto::{MessageResponse, NotificationResponse};
use crate::AppState;
use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::service::NotificationService;

pub fn notifications_router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_notifications).delete(delete_notifications))
        .route("/:id", delete(delete_notification))
}

/// GET /api/notifications
///
/// Marks the listed notifications read.
async fn get_notifications(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<NotificationResponse>>, AppError> {
    let notifications = NotificationService::new(state.db.clone())
        .list(&user.id)
        .await?;
    Ok(Json(
        notifications.iter().map(notification_to_response).collect(),
    ))
}

/// DELETE /api/notifications
async fn delete_notifications(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<MessageResponse>, AppError> {
    NotificationService::new(state.db.clone())
        .delete_all(&user.id)
        .await?;
    Ok(Json(MessageResponse::new("Notifications deleted successfully")))
}

/// DELETE /api/notifications/:id
async fn delete_notification(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    NotificationService::new(state.db.clone())
        .delete_one(&user.id, &id)
        .await?;
    Ok(Json(MessageResponse::new("Notification deleted successfully")))
}
