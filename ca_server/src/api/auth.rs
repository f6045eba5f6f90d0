//! Authentication API handlers.
//!
//! Bodies are JSON with camelCase fields. Errors share one shape,
//! `{"success": false, "error": "..."}`.
//!
//! # Examples
//!
//! Login:
//! ```bash
//! curl -i -X POST http://localhost:6969/api/auth/login \
//!   -H "Content-Type: application/json" \
//!   -d '{"email": "abc12345@tezu.ac.in", "password": "Abcd1!2"}'
//! ```
//!
//! Refresh with the cookie set by login:
//! ```bash
//! curl -i -X POST http://localhost:6969/api/auth/refresh \
//!   --cookie "refreshToken=eyJhbGciOiJIUzI1NiIs..."
//! ```

use axum::{
    Extension, Json,
    body::Bytes,
    extract::State,
    http::{StatusCode, header::SET_COOKIE},
    response::IntoResponse,
};
use axum_extra::extract::CookieJar;
use campus_auth::{
    AuthError,
    auth::{AccessTokenClaims, LoginRequest, RegisterRequest, Role, User},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use super::{
    AppState, cookies,
    error::ApiError,
    middleware::MaybeAuthenticated,
    request_id::RequestId,
};
use crate::{logging::log_security_event, metrics};

#[derive(Debug, Default, Deserialize)]
pub struct SignupPayload {
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginPayload {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub message: String,
    pub user: User,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub success: bool,
    pub access_token: String,
    pub user: User,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
    pub expires_in: String,
    pub rotated: bool,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

/// Parse an optional JSON body. An empty body yields the default payload so
/// that missing fields surface as validation errors rather than extractor
/// rejections.
fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|_| ApiError(AuthError::Validation("Malformed JSON body".to_string())))
}

/// Register a student or teacher account.
///
/// # Request Body
///
/// ```json
/// { "email": "abc12345@tezu.ac.in", "password": "Abcd1!2", "role": "student" }
/// ```
///
/// # Response
///
/// `201 Created` with `{ "message": "Student registered", "user": { ... } }`.
///
/// # Errors
///
/// - `400 Bad Request`: Missing field or a role other than student/teacher
/// - `409 Conflict`: Email already registered
pub async fn signup(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let payload: SignupPayload = parse_body(&body)?;

    let role: Role = payload
        .role
        .as_deref()
        .ok_or_else(|| AuthError::Validation("role must be 'student' or 'teacher'".to_string()))?
        .parse()?;

    let user = state
        .auth_manager
        .register(RegisterRequest {
            email: payload.email.unwrap_or_default(),
            password: payload.password.unwrap_or_default(),
            role,
        })
        .await?;

    let message = match user.role {
        Role::Teacher => "Teacher registered",
        _ => "Student registered",
    };

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            message: message.to_string(),
            user,
        }),
    ))
}

/// Authenticate and open a session.
///
/// # Response
///
/// `200 OK` with `{ "success": true, "accessToken": "...", "user": { ... } }` and
/// the refresh token in an HttpOnly cookie scoped to the refresh endpoint.
///
/// # Errors
///
/// - `400 Bad Request`: Missing email or password
/// - `401 Unauthorized`: Invalid credentials
pub async fn login(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let payload: LoginPayload = parse_body(&body)?;

    let outcome = state
        .auth_manager
        .login(LoginRequest {
            email: payload.email.unwrap_or_default(),
            password: payload.password.unwrap_or_default(),
        })
        .await
        .inspect_err(|err| {
            if matches!(err, AuthError::InvalidCredentials) {
                metrics::login_attempts_total(false);
            }
        })?;

    metrics::login_attempts_total(true);
    tracing::info!(user_id = %outcome.user.user_id, "Login succeeded");

    let cookie = cookies::refresh_cookie(
        &state.cookie,
        &outcome.tokens.refresh_token,
        state.refresh_max_age_secs(),
    );

    Ok((
        [(SET_COOKIE, cookie)],
        Json(LoginResponse {
            success: true,
            access_token: outcome.tokens.access_token,
            user: outcome.user,
        }),
    ))
}

/// Rotate the refresh token and issue a new access token.
///
/// The token is read from the refresh cookie, or when there is none from the
/// body field named after the cookie (`{"refreshToken": "..."}` by default).
///
/// # Response
///
/// `200 OK` with `{ "accessToken": "...", "expiresIn": "15m", "rotated": true }`
/// and the replacement refresh cookie.
///
/// # Errors
///
/// - `401 Unauthorized`: Missing, invalid, unknown, expired or reused token.
///   All cases share one message. Reuse additionally revokes every session
///   of the token's owner.
pub async fn refresh(
    State(state): State<AppState>,
    request_id: RequestId,
    jar: CookieJar,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let Some(token) = cookies::presented_refresh_token(&jar, &state.cookie, &body) else {
        metrics::token_refresh_total("missing");
        return Err(AuthError::InvalidRefreshToken.into());
    };

    let rotated = match state.auth_manager.refresh(&token).await {
        Ok(rotated) => rotated,
        Err(err) => {
            metrics::token_refresh_total(err.kind());
            if matches!(err, AuthError::TokenReuseDetected) {
                metrics::token_reuse_detected_total();
                let owner = state
                    .auth_manager
                    .codec()
                    .verify_refresh(&token)
                    .ok()
                    .map(|claims| claims.sub);
                log_security_event(
                    "token_reuse_detected",
                    owner,
                    Some(request_id.as_str()),
                    "Revoked refresh token presented again; all sessions revoked",
                );
            }
            return Err(err.into());
        }
    };

    metrics::token_refresh_total("rotated");

    let cookie = cookies::refresh_cookie(
        &state.cookie,
        &rotated.tokens.refresh_token,
        state.refresh_max_age_secs(),
    );

    Ok((
        [(SET_COOKIE, cookie)],
        Json(RefreshResponse {
            access_token: rotated.tokens.access_token,
            expires_in: state.access_expires_in.clone(),
            rotated: true,
        }),
    ))
}

/// End the presented session. Requires a bearer access token.
///
/// Revokes the refresh token from the cookie or body if there is a valid one
/// and always clears the cookie.
pub async fn logout(
    State(state): State<AppState>,
    Extension(claims): Extension<AccessTokenClaims>,
    jar: CookieJar,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let token = cookies::presented_refresh_token(&jar, &state.cookie, &body);

    let revoked = state.auth_manager.logout(token.as_deref()).await?;
    metrics::logout_total("session");
    tracing::info!(user_id = %claims.sub, revoked, "Logout");

    Ok((
        [(SET_COOKIE, cookies::clear_refresh_cookie(&state.cookie))],
        Json(MessageResponse {
            success: true,
            message: "Logged out".to_string(),
        }),
    ))
}

/// End every session of the caller.
///
/// The user is identified by a valid bearer token, or else by the refresh
/// token in the cookie or body.
///
/// # Errors
///
/// - `401 Unauthorized`: Neither identifies a user
pub async fn logout_all(
    State(state): State<AppState>,
    MaybeAuthenticated(claims): MaybeAuthenticated,
    request_id: RequestId,
    jar: CookieJar,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let token = cookies::presented_refresh_token(&jar, &state.cookie, &body);

    let user_id = claims.map(|claims| claims.sub).or_else(|| {
        token
            .as_deref()
            .and_then(|token| state.auth_manager.codec().verify_refresh(token).ok())
            .map(|claims| claims.sub)
    });

    let revoked = state
        .auth_manager
        .logout_all(user_id, token.as_deref())
        .await?;
    metrics::logout_total("all");
    log_security_event(
        "logout_all",
        user_id,
        Some(request_id.as_str()),
        &format!("Revoked {revoked} session(s)"),
    );

    Ok((
        [(SET_COOKIE, cookies::clear_refresh_cookie(&state.cookie))],
        Json(MessageResponse {
            success: true,
            message: "Logged out from all devices".to_string(),
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_body_empty_is_default() {
        let payload: LoginPayload = parse_body(&Bytes::from_static(b"  ")).unwrap();
        assert!(payload.email.is_none());
    }

    #[test]
    fn test_parse_body_malformed() {
        let err = parse_body::<LoginPayload>(&Bytes::from_static(b"{not json")).unwrap_err();
        assert!(matches!(err.0, AuthError::Validation(_)));
    }
}
