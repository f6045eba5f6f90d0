//! HTTP API for campus authentication.
//!
//! # Modules
//!
//! - [`auth`]: Signup, login, refresh-token rotation and logout handlers
//! - [`cookies`]: Refresh cookie formatting and extraction
//! - [`error`]: `AuthError` to HTTP response mapping
//! - [`middleware`]: Bearer-token authentication
//! - [`request_id`]: Request correlation and request metrics
//!
//! # Endpoints Overview
//!
//! ```text
//! GET  /health                 - Store connectivity (public)
//! POST /api/auth/signup        - Register student/teacher (public)
//! POST /api/auth/login         - Login, sets refresh cookie (public)
//! POST /api/auth/refresh       - Rotate refresh token (cookie or body)
//! POST /api/auth/logout        - End one session (bearer required)
//! POST /api/auth/logoutAll     - End all sessions (bearer, cookie or body)
//! ```
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use ca_server::api::{create_router, AppState};
//! use ca_server::config::CookieConfig;
//! use campus_auth::{AuthManager, AuthSettings, TokenSecrets};
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! # let secrets: TokenSecrets = unimplemented!();
//!
//! let auth_manager = AuthManager::in_memory(secrets, AuthSettings::default())?;
//! let state = AppState::new(auth_manager, CookieConfig::default(), "15m");
//!
//! let app = create_router(state);
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:6969").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # CORS
//!
//! CORS is configured permissively for development. In production, configure
//! appropriate origins, methods, and headers.

pub mod auth;
pub mod cookies;
pub mod error;
pub mod middleware;
pub mod request_id;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
};
use campus_auth::AuthManager;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::config::CookieConfig;

/// Application state shared across all HTTP handlers.
///
/// Cloned for each request; every field is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub auth_manager: Arc<AuthManager>,
    pub cookie: Arc<CookieConfig>,
    /// Access token lifetime as configured, echoed as `expiresIn`
    pub access_expires_in: String,
}

impl AppState {
    pub fn new(
        auth_manager: AuthManager,
        cookie: CookieConfig,
        access_expires_in: impl Into<String>,
    ) -> Self {
        Self {
            auth_manager: Arc::new(auth_manager),
            cookie: Arc::new(cookie),
            access_expires_in: access_expires_in.into(),
        }
    }

    /// Refresh cookie lifetime, matching the refresh token lifetime
    pub fn refresh_max_age_secs(&self) -> i64 {
        self.auth_manager.settings().refresh_ttl.num_seconds()
    }
}

/// Create the complete API router with all endpoints and middleware.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/auth", create_auth_router(state.clone()))
        .layer(axum::middleware::from_fn(request_id::request_id_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn create_auth_router(state: AppState) -> Router<AppState> {
    // Public routes. logoutAll resolves the caller itself from a bearer
    // token or a refresh token.
    let public_routes = Router::new()
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh))
        .route("/logoutAll", post(auth::logout_all));

    // Protected routes (require a valid access token)
    let protected_routes = Router::new()
        .route("/logout", post(auth::logout))
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::auth_middleware,
        ));

    Router::new().merge(public_routes).merge(protected_routes)
}

/// Health check endpoint for monitoring and load balancers.
///
/// Returns `200 OK` when the session store answers, `503 Service Unavailable`
/// otherwise.
///
/// ```bash
/// curl http://localhost:6969/health
/// # {"status":"healthy","version":"1.0.0","store":true,"timestamp":"2025-11-22T10:30:00Z"}
/// ```
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let store_healthy = match state.auth_manager.health_check().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed");
            false
        }
    };

    let status_code = if store_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = json!({
        "status": if store_healthy { "healthy" } else { "unhealthy" },
        "version": env!("CARGO_PKG_VERSION"),
        "store": store_healthy,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (status_code, Json(response))
}
