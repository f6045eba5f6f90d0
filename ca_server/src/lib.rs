//! HTTP server for campus authentication.
//!
//! Exposes signup, login, refresh-token rotation and logout under
//! `/api/auth`, backed by [`campus_auth::AuthManager`].

pub mod api;
pub mod config;
pub mod logging;
pub mod metrics;
