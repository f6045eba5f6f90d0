//! Deadlines for store operations.
//!
//! A timed-out future is dropped, so an open transaction inside it rolls
//! back instead of leaving a half-applied rotation behind.

use std::{future::Future, time::Duration};
use tokio::time::timeout;

use crate::auth::{AuthError, AuthResult};

/// Default timeout for single queries (5 seconds)
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Default timeout for transactions (10 seconds)
pub const DEFAULT_TRANSACTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for maintenance operations such as the retention purge (30 seconds)
pub const LONG_OPERATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Run a store operation with a deadline
///
/// # Example
///
/// ```no_run
/// use campus_auth::db::timeouts::{with_timeout, DEFAULT_QUERY_TIMEOUT};
/// use campus_auth::db::SessionRepository;
/// # async fn example(repo: &dyn SessionRepository) -> campus_auth::auth::AuthResult<()> {
///
/// let record = with_timeout(DEFAULT_QUERY_TIMEOUT, repo.find_by_hash("digest")).await?;
/// # let _ = record;
/// # Ok(())
/// # }
/// ```
pub async fn with_timeout<F, T>(duration: Duration, future: F) -> AuthResult<T>
where
    F: Future<Output = AuthResult<T>>,
{
    match timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(AuthError::Timeout(duration)),
    }
}

/// Run a single query with the default 5 second deadline
pub async fn with_default_timeout<F, T>(future: F) -> AuthResult<T>
where
    F: Future<Output = AuthResult<T>>,
{
    with_timeout(DEFAULT_QUERY_TIMEOUT, future).await
}

/// Run a maintenance operation with the extended 30 second deadline
pub async fn with_long_timeout<F, T>(future: F) -> AuthResult<T>
where
    F: Future<Output = AuthResult<T>>,
{
    with_timeout(LONG_OPERATION_TIMEOUT, future).await
}
