//! API layer
//!
//! HTTP handlers for:
//! - Auth, users, posts and notifications (JSON API under /api)
//! - Metrics (Prometheus)

mod auth;
mod converters;
mod dto;
pub mod metrics;
mod notifications;
mod posts;
mod users;

use axum::Router;

use crate::AppState;

pub use converters::*;
pub use dto::*;
pub use metrics::metrics_router;

/// JSON API, mounted under `/api`
pub fn api_router() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::auth_router())
        .nest("/users", users::users_router())
        .nest("/posts", posts::posts_router())
        .nest("/notifications", notifications::notifications_router())
}
