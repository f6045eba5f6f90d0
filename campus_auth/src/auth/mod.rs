//! Authentication module providing registration, login and rotating
//! refresh-token sessions.
//!
//! This module implements:
//! - Argon2id password hashing with server-side pepper
//! - HS256 access tokens (15-minute expiry by default)
//! - Rotating refresh tokens (7-day expiry by default) with reuse detection
//! - Single-session and all-session logout
//!
//! ## Example
//!
//! ```no_run
//! use campus_auth::auth::{AuthManager, AuthSettings, LoginRequest, TokenSecrets};
//! use campus_auth::db::{Database, DatabaseConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::new(&DatabaseConfig::from_env()).await?;
//!     let auth = AuthManager::postgres(
//!         db.pool().clone(),
//!         TokenSecrets {
//!             access_secret: "access_secret_at_least_32_characters".to_string(),
//!             refresh_secret: "refresh_secret_at_least_32_characters".to_string(),
//!             pepper: "server_side_pepper".to_string(),
//!         },
//!         AuthSettings::default(),
//!     )?;
//!
//!     let outcome = auth
//!         .login(LoginRequest {
//!             email: "abc12345@tezu.ac.in".to_string(),
//!             password: "Abcd1!2".to_string(),
//!         })
//!         .await?;
//!
//!     let rotated = auth.refresh(&outcome.tokens.refresh_token).await?;
//!     println!("new access token: {}", rotated.tokens.access_token);
//!     Ok(())
//! }
//! ```

pub mod credentials;
pub mod errors;
pub mod manager;
pub mod models;
pub mod revocation;
pub mod rotation;
pub mod sessions;
pub mod tokens;

pub use credentials::CredentialVerifier;
pub use errors::{AuthError, AuthResult};
pub use manager::{AuthManager, AuthSettings};
pub use models::{
    AccessTokenClaims, LoginOutcome, LoginRequest, RefreshTokenClaims, RegisterRequest, Role,
    RotatedSession, SessionRecord, SessionState, SessionTokens, StoredUser, TokenId, User, UserId,
};
pub use revocation::RevocationManager;
pub use rotation::RotationEngine;
pub use sessions::SessionStore;
pub use tokens::{IssuedToken, TokenCodec, TokenHasher, TokenSecrets};
