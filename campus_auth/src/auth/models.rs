//! Authentication data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

use super::errors::AuthError;

/// User ID type
pub type UserId = Uuid;

/// Session (refresh token record) ID type
pub type TokenId = Uuid;

/// Account role carried in access tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "teacher" => Ok(Role::Teacher),
            "admin" => Ok(Role::Admin),
            other => Err(AuthError::Validation(format!("Unknown role: {other}"))),
        }
    }
}

/// User model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub user_id: UserId,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// User row together with its password hash. Never leaves the crate's
/// credential path.
#[derive(Debug, Clone)]
pub struct StoredUser {
    pub user: User,
    pub password_hash: String,
}

/// User registration request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub role: Role,
}

/// User login request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Persisted refresh-token session.
///
/// `token_hash` is the keyed digest of the raw token; the raw value is never
/// stored. `revoked` only ever moves from `false` to `true`.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub token_id: TokenId,
    pub user_id: UserId,
    pub token_hash: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
}

/// Observable state of a session record at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Eligible for rotation
    Active,
    /// Rotated away or explicitly revoked
    Revoked,
    /// Past `expires_at`
    Expired,
}

impl SessionRecord {
    /// Classify the record. Revocation wins over expiry so that replays of
    /// consumed tokens are always reported as reuse.
    pub fn state_at(&self, now: DateTime<Utc>) -> SessionState {
        if self.revoked {
            SessionState::Revoked
        } else if self.expires_at < now {
            SessionState::Expired
        } else {
            SessionState::Active
        }
    }
}

/// JWT claims for access token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    pub sub: UserId,
    pub role: Role,
    pub email: String,
    pub exp: i64,
    pub iat: i64,
}

/// JWT claims for refresh token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshTokenClaims {
    pub sub: UserId,
    /// Unique per issued token
    pub jti: Uuid,
    pub exp: i64,
    pub iat: i64,
}

/// Freshly issued access/refresh pair
#[derive(Debug, Clone)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub refresh_expires_at: DateTime<Utc>,
}

/// Result of a successful login
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: User,
    pub tokens: SessionTokens,
}

/// Result of a successful rotation
#[derive(Debug, Clone)]
pub struct RotatedSession {
    pub user_id: UserId,
    pub tokens: SessionTokens,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(revoked: bool, expires_in: Duration) -> SessionRecord {
        let now = Utc::now();
        SessionRecord {
            token_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            token_hash: "digest".to_string(),
            issued_at: now,
            expires_at: now + expires_in,
            revoked,
        }
    }

    #[test]
    fn test_session_state() {
        let now = Utc::now();
        assert_eq!(record(false, Duration::days(1)).state_at(now), SessionState::Active);
        assert_eq!(record(true, Duration::days(1)).state_at(now), SessionState::Revoked);
        assert_eq!(record(false, Duration::days(-1)).state_at(now), SessionState::Expired);
        assert_eq!(record(true, Duration::days(-1)).state_at(now), SessionState::Revoked);
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("Student".parse::<Role>().unwrap(), Role::Student);
        assert_eq!(" teacher ".parse::<Role>().unwrap(), Role::Teacher);
        assert!("janitor".parse::<Role>().is_err());
        assert_eq!(Role::Admin.to_string(), "admin");
    }
}
