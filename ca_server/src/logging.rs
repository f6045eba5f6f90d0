//! Structured logging configuration.
//!
//! `campus_auth` logs through the `log` facade; those records are bridged
//! into the tracing subscriber installed here.

use campus_auth::auth::UserId;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize structured logging
///
/// Levels come from `RUST_LOG`, defaulting to `info,sqlx=warn,hyper=warn`.
///
/// # Example
///
/// ```no_run
/// use ca_server::logging;
///
/// #[tokio::main]
/// async fn main() {
///     logging::init();
///     tracing::info!("Server starting");
/// }
/// ```
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,hyper=warn"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!("Structured logging initialized");
}

/// Log security event with structured data
///
/// # Example
///
/// ```
/// use ca_server::logging::log_security_event;
///
/// log_security_event(
///     "token_reuse_detected",
///     None,
///     Some("9f1c0c7e-request"),
///     "Revoked refresh token presented again"
/// );
/// ```
pub fn log_security_event(
    event_type: &str,
    user_id: Option<UserId>,
    request_id: Option<&str>,
    message: &str,
) {
    let user_id = user_id.map(|id| id.to_string());
    tracing::warn!(
        event_type = event_type,
        user_id = user_id.as_deref(),
        request_id = request_id,
        "SECURITY: {}",
        message
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_log_security_event() {
        // Just ensure it doesn't panic
        log_security_event("logout_all", Some(Uuid::new_v4()), Some("req-1"), "Test message");
        log_security_event("token_reuse_detected", None, None, "Test message");
    }
}
