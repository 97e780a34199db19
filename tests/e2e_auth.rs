//! E2E tests for registration, login and session handling

mod common;

use common::{TestServer, session_token};
use serde_json::{Value, json};

#[tokio::test]
async fn test_register_returns_profile_and_session_cookie() {
    let server = TestServer::new().await;

    let response = server
        .client
        .post(server.url("/api/auth/register"))
        .json(&json!({
            "fullName": "Alice Example",
            "username": "alice",
            "email": "alice@example.com",
            "password": "password123",
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 201);
    let set_cookie = response
        .headers()
        .get("set-cookie")
        .and_then(|v| v.to_str().ok())
        .expect("set-cookie header")
        .to_string();
    assert!(set_cookie.starts_with("session="));
    assert!(set_cookie.contains("HttpOnly"));

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["username"], "alice");
    assert_eq!(body["fullName"], "Alice Example");
    assert!(body["_id"].is_string());
    assert_eq!(body["followers"], json!([]));
    assert!(body.get("passwordHash").is_none());
    assert!(body.get("password_hash").is_none());
}

#[tokio::test]
async fn test_register_validation() {
    let server = TestServer::new().await;
    server.register("alice").await;

    let cases = [
        (
            json!({"fullName": "A", "username": "short", "email": "short@example.com", "password": "12345"}),
            400,
        ),
        (
            json!({"fullName": "A", "username": "mail", "email": "not-an-email", "password": "123456"}),
            400,
        ),
        (
            json!({"fullName": "A", "username": "alice", "email": "other@example.com", "password": "123456"}),
            409,
        ),
        (
            json!({"fullName": "A", "username": "other", "email": "alice@example.com", "password": "123456"}),
            409,
        ),
    ];

    for (body, expected) in cases {
        let response = server
            .client
            .post(server.url("/api/auth/register"))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), expected, "body: {body}");
        let error: Value = response.json().await.unwrap();
        assert!(error["error"].is_string());
    }

    let response = server
        .client
        .post(server.url("/api/auth/register"))
        .json(&json!({"fullName": "A", "username": "six", "email": "six@example.com", "password": "123456"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
}

#[tokio::test]
async fn test_login_and_me() {
    let server = TestServer::new().await;
    let alice = server.register("alice").await;

    let response = server
        .client
        .post(server.url("/api/auth/login"))
        .json(&json!({"username": "alice", "password": "password123"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let token = session_token(&response).expect("session cookie");

    let response = server
        .client
        .get(server.url("/api/auth/me"))
        .header("Cookie", format!("session={token}"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["_id"], alice.id.as_str());
    assert_eq!(body["email"], "alice@example.com");
}

#[tokio::test]
async fn test_login_failures_share_one_message() {
    let server = TestServer::new().await;
    server.register("alice").await;

    for body in [
        json!({"username": "alice", "password": "wrong-password"}),
        json!({"username": "nobody", "password": "password123"}),
    ] {
        let response = server
            .client
            .post(server.url("/api/auth/login"))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
        assert!(session_token(&response).is_none());
        let error: Value = response.json().await.unwrap();
        assert_eq!(error["error"], "Invalid credentials");
    }
}

#[tokio::test]
async fn test_logout_clears_cookie() {
    let server = TestServer::new().await;

    let response = server
        .client
        .post(server.url("/api/auth/logout"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let set_cookie = response
        .headers()
        .get("set-cookie")
        .and_then(|v| v.to_str().ok())
        .expect("set-cookie header")
        .to_string();
    assert!(set_cookie.starts_with("session=;"));
    assert!(set_cookie.contains("Max-Age=0"));

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Logged out successfully");
}

#[tokio::test]
async fn test_me_requires_valid_session() {
    let server = TestServer::new().await;

    let response = server
        .client
        .get(server.url("/api/auth/me"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);

    let response = server
        .client
        .get(server.url("/api/auth/me"))
        .bearer_auth("forged.token")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);
}
