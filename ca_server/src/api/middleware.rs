//! Authentication middleware for protected endpoints.
//!
//! Validates the `Authorization: Bearer <token>` access token and injects its
//! [`AccessTokenClaims`] into request extensions for downstream handlers.
//!
//! # Usage
//!
//! ```rust,no_run
//! use axum::{Extension, Router, routing::post, middleware};
//! use campus_auth::auth::AccessTokenClaims;
//! # use ca_server::api::middleware::auth_middleware;
//! # use ca_server::api::AppState;
//! # let state: AppState = unimplemented!();
//!
//! async fn protected(Extension(claims): Extension<AccessTokenClaims>) -> String {
//!     format!("Authenticated as {}", claims.email)
//! }
//!
//! let protected_routes: Router<AppState> = Router::new()
//!     .route("/api/protected", post(protected))
//!     .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));
//! # let _ = protected_routes;
//! ```

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use campus_auth::{AuthError, auth::AccessTokenClaims};
use std::convert::Infallible;

use super::{AppState, error::ApiError};

/// Token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Rejects the request with `401` unless it carries a valid access token.
///
/// - **Success**: Injects `AccessTokenClaims` into request extensions
/// - **Missing header / invalid or expired token**: `401` with the standard error body
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(request.headers()).ok_or(AuthError::InvalidOrExpiredToken)?;
    let claims = state.auth_manager.verify_access_token(token)?;

    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

/// Claims of a valid bearer token, if the request carries one.
///
/// Never rejects; an absent or invalid token yields `None`.
pub struct MaybeAuthenticated(pub Option<AccessTokenClaims>);

impl FromRequestParts<AppState> for MaybeAuthenticated {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let claims = bearer_token(&parts.headers)
            .and_then(|token| state.auth_manager.verify_access_token(token).ok());
        Ok(Self(claims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&headers), Some("abc.def.ghi"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }
}
