//! Refresh-token cookie handling.

use axum::body::Bytes;
use axum_extra::extract::CookieJar;
use serde_json::Value;

use crate::config::CookieConfig;

/// `Set-Cookie` value carrying a refresh token
pub fn refresh_cookie(config: &CookieConfig, token: &str, max_age_secs: i64) -> String {
    format!(
        "{}={}; Path={}; HttpOnly; SameSite=Strict; Max-Age={}{}",
        config.name,
        token,
        config.path,
        max_age_secs.max(0),
        secure_flag(config)
    )
}

/// `Set-Cookie` value that makes the client drop the refresh cookie
pub fn clear_refresh_cookie(config: &CookieConfig) -> String {
    format!(
        "{}=; Path={}; HttpOnly; SameSite=Strict; Max-Age=0{}",
        config.name,
        config.path,
        secure_flag(config)
    )
}

fn secure_flag(config: &CookieConfig) -> &'static str {
    if config.secure { "; Secure" } else { "" }
}

/// Refresh token from the cookie, falling back to the request body.
///
/// The body is only consulted when the cookie is absent, and is read
/// leniently: a non-JSON body or a missing field yields `None`. The body
/// field has the same name as the cookie. Empty values count as absent.
pub fn presented_refresh_token(
    jar: &CookieJar,
    config: &CookieConfig,
    body: &Bytes,
) -> Option<String> {
    jar.get(&config.name)
        .map(|cookie| cookie.value().to_string())
        .filter(|token| !token.is_empty())
        .or_else(|| body_refresh_token(config, body))
}

fn body_refresh_token(config: &CookieConfig, body: &Bytes) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    value
        .get(&config.name)?
        .as_str()
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}
