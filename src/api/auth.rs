//! Authentication endpoints
//!
//! Register, log in and out with an HMAC-signed session cookie.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};

use super::converters::profile_to_response;
use super::dto::{LoginRequest, MessageResponse, UserResponse};
use crate::AppState;
use crate::auth::{CurrentUser, SESSION_COOKIE, Session, create_session_token};
use crate::data::User;
use crate::error::AppError;
use crate::service::{RegisterInput, UserService};

/// Create authentication router
///
/// Routes:
/// - POST /register
/// - POST /login
/// - POST /logout
/// - GET /me
pub fn auth_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me))
}

fn user_service(state: &AppState) -> UserService {
    UserService::new(state.db.clone(), state.storage.clone())
}

fn build_session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .build()
}

fn clear_session_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::build((SESSION_COOKIE, String::new()))
        .path("/")
        .http_only(true)
        .build();
    cookie.make_removal();
    cookie
}

/// Issue a session for `user` and attach it to the jar
fn start_session(state: &AppState, jar: CookieJar, user: &User) -> Result<CookieJar, AppError> {
    let session = Session::new(&user.id, state.config.auth.session_max_age);
    let token = create_session_token(&session, &state.config.auth.session_secret)?;
    Ok(jar.add(build_session_cookie(
        token,
        state.config.should_use_secure_cookies(),
    )))
}

/// POST /api/auth/register
async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(input): Json<RegisterInput>,
) -> Result<impl IntoResponse, AppError> {
    let service = user_service(&state);
    let user = service.register(input).await?;
    let jar = start_session(&state, jar, &user)?;
    let profile = service.with_relations(user).await?;

    Ok((StatusCode::CREATED, jar, Json(profile_to_response(&profile))))
}

/// POST /api/auth/login
async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let service = user_service(&state);
    let user = service.login(&request.username, &request.password).await?;
    let jar = start_session(&state, jar, &user)?;
    let profile = service.with_relations(user).await?;

    Ok((jar, Json(profile_to_response(&profile))))
}

/// POST /api/auth/logout
///
/// Tokens are stateless, so logging out only clears the cookie.
async fn logout(jar: CookieJar) -> impl IntoResponse {
    (
        jar.add(clear_session_cookie()),
        Json(MessageResponse::new("Logged out successfully")),
    )
}

/// GET /api/auth/me
async fn me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<UserResponse>, AppError> {
    let profile = user_service(&state).with_relations(user).await?;
    Ok(Json(profile_to_response(&profile)))
}
