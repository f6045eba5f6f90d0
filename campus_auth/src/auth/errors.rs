//! Authentication error types.

use std::time::Duration;

use thiserror::Error;

/// Message returned for every refresh failure so callers cannot tell the
/// failure kinds apart.
const REFRESH_FAILED_MESSAGE: &str = "Invalid or expired refresh token";

/// Authentication errors
#[derive(Debug, Error)]
pub enum AuthError {
    /// Malformed or missing input
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Unknown email or wrong password
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Signature or expiry check failed on a presented token
    #[error("Invalid or expired token")]
    InvalidOrExpiredToken,

    /// Refresh token failed signature or expiry verification
    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    /// No session record matches the presented refresh token
    #[error("Unknown refresh token")]
    UnknownToken,

    /// Session record is past its expiry
    #[error("Refresh token expired")]
    Expired,

    /// Presented refresh token was already consumed or revoked
    #[error("Refresh token reuse detected")]
    TokenReuseDetected,

    /// Unique constraint collision
    #[error("{0}")]
    DuplicateResource(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),

    /// JWT encoding error
    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    /// Password hashing failed
    #[error("Password hashing failed")]
    HashingFailed,

    /// Store operation exceeded its deadline
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),
}

impl From<sqlx::Error> for AuthError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.is_unique_violation() {
                let message = match db_err.constraint() {
                    Some(c) if c.contains("email") => "Email already exists",
                    _ => "Duplicate value",
                };
                return AuthError::DuplicateResource(message.to_string());
            }
        }
        AuthError::Database(err)
    }
}

impl AuthError {
    /// HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::Validation(_) => 400,
            AuthError::InvalidCredentials
            | AuthError::InvalidOrExpiredToken
            | AuthError::InvalidRefreshToken
            | AuthError::UnknownToken
            | AuthError::Expired
            | AuthError::TokenReuseDetected => 401,
            AuthError::DuplicateResource(_) => 409,
            AuthError::Database(_)
            | AuthError::Jwt(_)
            | AuthError::HashingFailed
            | AuthError::Timeout(_) => 500,
        }
    }

    /// Stable identifier for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::Validation(_) => "validation",
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::InvalidOrExpiredToken => "invalid_or_expired_token",
            AuthError::InvalidRefreshToken => "invalid_refresh_token",
            AuthError::UnknownToken => "unknown_token",
            AuthError::Expired => "expired",
            AuthError::TokenReuseDetected => "token_reuse_detected",
            AuthError::DuplicateResource(_) => "duplicate_resource",
            AuthError::Database(_) => "database",
            AuthError::Jwt(_) => "jwt",
            AuthError::HashingFailed => "hashing_failed",
            AuthError::Timeout(_) => "timeout",
        }
    }

    /// True for the refresh failure kinds that share one external message
    pub fn is_refresh_failure(&self) -> bool {
        matches!(
            self,
            AuthError::InvalidRefreshToken
                | AuthError::UnknownToken
                | AuthError::Expired
                | AuthError::TokenReuseDetected
        )
    }

    /// Get a client-safe error message that doesn't leak sensitive information
    ///
    /// Refresh failures collapse into one message, and internal failures
    /// never expose SQL or token structure.
    pub fn client_message(&self) -> String {
        match self {
            _ if self.is_refresh_failure() => REFRESH_FAILED_MESSAGE.to_string(),
            AuthError::Database(_)
            | AuthError::Jwt(_)
            | AuthError::HashingFailed
            | AuthError::Timeout(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Result type for authentication operations
pub type AuthResult<T> = Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_failures_share_status_and_message() {
        let kinds = [
            AuthError::InvalidRefreshToken,
            AuthError::UnknownToken,
            AuthError::Expired,
            AuthError::TokenReuseDetected,
        ];

        for err in &kinds {
            assert_eq!(err.status_code(), 401);
            assert_eq!(err.client_message(), REFRESH_FAILED_MESSAGE);
        }

        let distinct: std::collections::HashSet<_> = kinds.iter().map(AuthError::kind).collect();
        assert_eq!(distinct.len(), kinds.len());
    }

    #[test]
    fn test_internal_errors_are_sanitized() {
        let err = AuthError::Database(sqlx::Error::PoolTimedOut);
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.client_message(), "Internal server error");

        let err = AuthError::Timeout(Duration::from_secs(10));
        assert_eq!(err.client_message(), "Internal server error");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(AuthError::Validation("x".into()).status_code(), 400);
        assert_eq!(AuthError::InvalidCredentials.status_code(), 401);
        assert_eq!(
            AuthError::DuplicateResource("Email already exists".into()).status_code(),
            409
        );
        assert_eq!(
            AuthError::DuplicateResource("Email already exists".into()).client_message(),
            "Email already exists"
        );
    }

    #[test]
    fn test_non_unique_sqlx_error_is_database() {
        let err: AuthError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, AuthError::Database(_)));
    }

    #[test]
    fn test_database_error_keeps_source() {
        let err: AuthError = sqlx::Error::PoolTimedOut.into();
        let source = std::error::Error::source(&err).expect("sqlx error as source");
        assert_eq!(source.to_string(), sqlx::Error::PoolTimedOut.to_string());
    }
}
