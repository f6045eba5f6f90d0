//! Integration tests for the HTTP API.
//!
//! Drives the full router with `oneshot` over in-memory stores.

use axum::body::Body;
use axum::http::{Request, Response, StatusCode, header};
use ca_server::api::{AppState, create_router};
use ca_server::config::CookieConfig;
use campus_auth::auth::{RegisterRequest, Role};
use campus_auth::{AuthManager, AuthSettings, TokenSecrets};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt; // For `oneshot` method

const EMAIL: &str = "abc12345@tezu.ac.in";
const PASSWORD: &str = "Abcd1!2";

/// Helper to create a test server over in-memory stores
fn create_test_server() -> (axum::Router, Arc<AuthManager>) {
    create_test_server_with_cookie(CookieConfig::default())
}

fn create_test_server_with_cookie(cookie: CookieConfig) -> (axum::Router, Arc<AuthManager>) {
    let auth_manager = AuthManager::in_memory(
        TokenSecrets {
            access_secret: "server_test_access_secret_0123456789ab".to_string(),
            refresh_secret: "server_test_refresh_secret_0123456789a".to_string(),
            pepper: "server_test_pepper_value".to_string(),
        },
        AuthSettings::default(),
    )
    .expect("Failed to create auth manager");

    let state = AppState::new(auth_manager, cookie, "15m");
    let auth_manager = state.auth_manager.clone();
    (create_router(state), auth_manager)
}

async fn create_user(auth_manager: &AuthManager) {
    auth_manager
        .register(RegisterRequest {
            email: EMAIL.to_string(),
            password: PASSWORD.to_string(),
            role: Role::Student,
        })
        .await
        .expect("Registration should succeed");
}

fn post(uri: &str) -> axum::http::request::Builder {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
}

fn json_request(uri: &str, body: Value) -> Request<Body> {
    post(uri)
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn set_cookie(response: &Response<Body>) -> String {
    response
        .headers()
        .get(header::SET_COOKIE)
        .expect("Set-Cookie header")
        .to_str()
        .unwrap()
        .to_string()
}

/// `name=value` part of a Set-Cookie header, ready for a Cookie header
fn cookie_pair(set_cookie: &str) -> String {
    set_cookie.split(';').next().unwrap().to_string()
}

async fn login(app: &axum::Router) -> (String, String) {
    let response = app
        .clone()
        .oneshot(json_request(
            "/api/auth/login",
            json!({ "email": EMAIL, "password": PASSWORD }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = cookie_pair(&set_cookie(&response));
    let body = body_json(response).await;
    (body["accessToken"].as_str().unwrap().to_string(), cookie)
}

async fn refresh_with_cookie(app: &axum::Router, cookie: &str) -> Response<Body> {
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/refresh")
                .header(header::COOKIE, cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
}

// ============================================================================
// Health Check Tests
// ============================================================================

#[tokio::test]
async fn test_health_check_endpoint() {
    let (app, _) = create_test_server();

    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["store"], true);
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let (app, _) = create_test_server();

    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "trace-me-42")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.headers()["x-request-id"], "trace-me-42");
}

// ============================================================================
// Signup Tests
// ============================================================================

#[tokio::test]
async fn test_signup_endpoint() {
    let (app, _) = create_test_server();

    let response = app
        .clone()
        .oneshot(json_request(
            "/api/auth/signup",
            json!({ "email": "Teacher@Tezu.ac.in", "password": PASSWORD, "role": "teacher" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Teacher registered");
    assert_eq!(body["user"]["email"], "teacher@tezu.ac.in");
    assert_eq!(body["user"]["role"], "teacher");
    assert!(body["user"].get("passwordHash").is_none());

    let duplicate = app
        .oneshot(json_request(
            "/api/auth/signup",
            json!({ "email": "teacher@tezu.ac.in", "password": PASSWORD, "role": "student" }),
        ))
        .await
        .unwrap();
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_signup_rejects_bad_role() {
    let (app, _) = create_test_server();

    for body in [
        json!({ "email": EMAIL, "password": PASSWORD, "role": "admin" }),
        json!({ "email": EMAIL, "password": PASSWORD, "role": "dean" }),
        json!({ "email": EMAIL, "password": PASSWORD }),
    ] {
        let response = app
            .clone()
            .oneshot(json_request("/api/auth/signup", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["success"], false);
    }
}

// ============================================================================
// Login Tests
// ============================================================================

#[tokio::test]
async fn test_login_sets_refresh_cookie() {
    let (app, auth_manager) = create_test_server();
    create_user(&auth_manager).await;

    let response = app
        .oneshot(json_request(
            "/api/auth/login",
            json!({ "email": EMAIL, "password": PASSWORD }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = set_cookie(&response);
    assert!(cookie.starts_with("refreshToken="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Strict"));
    assert!(cookie.contains("Path=/api/auth/refresh"));
    assert!(cookie.contains("Max-Age=604800"));
    assert!(!cookie.contains("Secure"));

    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["user"]["email"], EMAIL);
    let access_token = body["accessToken"].as_str().unwrap();
    let claims = auth_manager.verify_access_token(access_token).unwrap();
    assert_eq!(claims.email, EMAIL);
}

#[tokio::test]
async fn test_invalid_login_returns_error() {
    let (app, auth_manager) = create_test_server();
    create_user(&auth_manager).await;

    let wrong = app
        .clone()
        .oneshot(json_request(
            "/api/auth/login",
            json!({ "email": EMAIL, "password": "wrong" }),
        ))
        .await
        .unwrap();
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    assert!(wrong.headers().get(header::SET_COOKIE).is_none());
    assert_eq!(body_json(wrong).await["success"], false);

    let missing = app
        .clone()
        .oneshot(json_request("/api/auth/login", json!({ "email": EMAIL })))
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);

    let malformed = app
        .oneshot(
            post("/api/auth/login")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);
}

// ============================================================================
// Refresh Tests
// ============================================================================

#[tokio::test]
async fn test_refresh_rotation_and_replay() {
    let (app, auth_manager) = create_test_server();
    create_user(&auth_manager).await;
    let (_, first_cookie) = login(&app).await;

    let response = refresh_with_cookie(&app, &first_cookie).await;
    assert_eq!(response.status(), StatusCode::OK);
    let second_cookie = cookie_pair(&set_cookie(&response));
    assert_ne!(second_cookie, first_cookie);

    let body = body_json(response).await;
    assert_eq!(body["expiresIn"], "15m");
    assert_eq!(body["rotated"], true);
    assert!(
        auth_manager
            .verify_access_token(body["accessToken"].as_str().unwrap())
            .is_ok()
    );

    // Replaying the consumed cookie is rejected
    let replay = refresh_with_cookie(&app, &first_cookie).await;
    assert_eq!(replay.status(), StatusCode::UNAUTHORIZED);
    let replay_body = body_json(replay).await;
    assert_eq!(replay_body["success"], false);
    assert_eq!(replay_body["error"], "Invalid or expired refresh token");

    // ...and takes the rotated session down with it
    let after = refresh_with_cookie(&app, &second_cookie).await;
    assert_eq!(after.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(after).await, replay_body);
}

#[tokio::test]
async fn test_refresh_from_body() {
    let (app, auth_manager) = create_test_server();
    create_user(&auth_manager).await;
    let (_, cookie) = login(&app).await;
    let raw = cookie.trim_start_matches("refreshToken=");

    let response = app
        .oneshot(json_request(
            "/api/auth/refresh",
            json!({ "refreshToken": raw }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_refresh_without_token() {
    let (app, _) = create_test_server();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/refresh")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let garbage = refresh_with_cookie(&app, "refreshToken=not.a.jwt").await;
    assert_eq!(garbage.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_json(garbage).await["error"],
        "Invalid or expired refresh token"
    );
}

#[tokio::test]
async fn test_refresh_cookie_ignores_unparseable_body() {
    let (app, auth_manager) = create_test_server();
    create_user(&auth_manager).await;
    let (_, cookie) = login(&app).await;

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/refresh")
                .header(header::CONTENT_TYPE, "text/plain")
                .header(header::COOKIE, &cookie)
                .body(Body::from("ping"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_ne!(cookie_pair(&set_cookie(&response)), cookie);
}

#[tokio::test]
async fn test_refresh_body_field_follows_cookie_name() {
    let (app, auth_manager) = create_test_server_with_cookie(CookieConfig {
        name: "rt".to_string(),
        ..CookieConfig::default()
    });
    create_user(&auth_manager).await;
    let (_, cookie) = login(&app).await;
    assert!(cookie.starts_with("rt="));
    let raw = cookie.trim_start_matches("rt=");

    let response = app
        .oneshot(json_request("/api/auth/refresh", json!({ "rt": raw })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(set_cookie(&response).starts_with("rt="));
}

// ============================================================================
// Logout Tests
// ============================================================================

#[tokio::test]
async fn test_logout_requires_bearer() {
    let (app, auth_manager) = create_test_server();
    create_user(&auth_manager).await;
    let (_, cookie) = login(&app).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/logout")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // The session is untouched
    assert_eq!(
        refresh_with_cookie(&app, &cookie).await.status(),
        StatusCode::OK
    );
}

#[tokio::test]
async fn test_logout_revokes_session_and_clears_cookie() {
    let (app, auth_manager) = create_test_server();
    create_user(&auth_manager).await;
    let (access_token, cookie) = login(&app).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/logout")
                .header(header::AUTHORIZATION, format!("Bearer {access_token}"))
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(set_cookie(&response).contains("Max-Age=0"));
    assert_eq!(body_json(response).await["success"], true);

    assert_eq!(
        refresh_with_cookie(&app, &cookie).await.status(),
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn test_logout_with_unparseable_body() {
    let (app, auth_manager) = create_test_server();
    create_user(&auth_manager).await;
    let (access_token, cookie) = login(&app).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/logout")
                .header(header::AUTHORIZATION, format!("Bearer {access_token}"))
                .header(header::COOKIE, &cookie)
                .header(header::CONTENT_TYPE, "text/plain")
                .body(Body::from("ping"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(
        refresh_with_cookie(&app, &cookie).await.status(),
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn test_logout_all_with_bearer() {
    let (app, auth_manager) = create_test_server();
    create_user(&auth_manager).await;
    let (access_token, laptop) = login(&app).await;
    let (_, phone) = login(&app).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/logoutAll")
                .header(header::AUTHORIZATION, format!("Bearer {access_token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(set_cookie(&response).contains("Max-Age=0"));

    for cookie in [&laptop, &phone] {
        assert_eq!(
            refresh_with_cookie(&app, cookie).await.status(),
            StatusCode::UNAUTHORIZED
        );
    }
}

#[tokio::test]
async fn test_logout_all_with_refresh_token_only() {
    let (app, auth_manager) = create_test_server();
    create_user(&auth_manager).await;
    let (_, laptop) = login(&app).await;
    let (_, phone) = login(&app).await;
    let raw = phone.trim_start_matches("refreshToken=");

    let response = app
        .clone()
        .oneshot(json_request(
            "/api/auth/logoutAll",
            json!({ "refreshToken": raw }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(
        refresh_with_cookie(&app, &laptop).await.status(),
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn test_logout_all_without_identity() {
    let (app, _) = create_test_server();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/logoutAll")
                .header(header::AUTHORIZATION, "Bearer not.a.token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
