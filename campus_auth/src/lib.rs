//! # Campus Auth
//!
//! Rotating refresh-token authentication for the campus API.
//!
//! A login exchanges an email/password pair for a short-lived access token
//! and a long-lived refresh token. Every refresh consumes the presented
//! refresh token and issues a new one; presenting a consumed token again is
//! treated as theft and revokes every session of its owner.
//!
//! ## Core Modules
//!
//! - [`auth`]: Credential checks, token codec, session store, rotation and revocation
//! - [`db`]: PostgreSQL pool, repository traits and their Postgres/in-memory backends
//!
//! ## Example
//!
//! ```
//! use campus_auth::{AuthManager, AuthSettings, TokenSecrets};
//!
//! let auth = AuthManager::in_memory(
//!     TokenSecrets {
//!         access_secret: "access_secret_at_least_32_characters".to_string(),
//!         refresh_secret: "refresh_secret_at_least_32_characters".to_string(),
//!         pepper: "server_side_pepper".to_string(),
//!     },
//!     AuthSettings::default(),
//! )
//! .unwrap();
//! assert!(auth.verify_access_token("not-a-token").is_err());
//! ```

/// Authentication flows and session lifecycle.
pub mod auth;
pub use auth::{AuthError, AuthManager, AuthResult, AuthSettings, TokenSecrets};

/// Database access.
pub mod db;
pub use db::{Database, DatabaseConfig};
