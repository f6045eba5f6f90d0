//! Refresh-token rotation.
//!
//! A session moves `Issued -> Active -> {Rotated, Revoked, Expired}` and only
//! `Active` sessions can be rotated. The lookup, the revocation of the old
//! record and the insert of its successor share one transaction with the
//! old row locked, so two requests presenting the same token cannot both
//! succeed.

use chrono::{Duration, Utc};
use std::{sync::Arc, time::Duration as StdDuration};

use super::{
    errors::{AuthError, AuthResult},
    models::{RotatedSession, SessionState, SessionTokens},
    sessions::SessionStore,
    tokens::TokenCodec,
};
use crate::db::{UserRepository, timeouts::{DEFAULT_TRANSACTION_TIMEOUT, with_timeout}};

#[derive(Clone)]
pub struct RotationEngine {
    codec: TokenCodec,
    store: SessionStore,
    users: Arc<dyn UserRepository>,
    access_ttl: Duration,
    refresh_ttl: Duration,
    transaction_timeout: StdDuration,
}

impl RotationEngine {
    pub fn new(
        codec: TokenCodec,
        store: SessionStore,
        users: Arc<dyn UserRepository>,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            codec,
            store,
            users,
            access_ttl,
            refresh_ttl,
            transaction_timeout: DEFAULT_TRANSACTION_TIMEOUT,
        }
    }

    /// Override the deadline for the rotation transaction
    pub fn with_transaction_timeout(mut self, timeout: StdDuration) -> Self {
        self.transaction_timeout = timeout;
        self
    }

    /// Exchange a raw refresh token for a new access/refresh pair
    ///
    /// # Errors
    ///
    /// * `AuthError::InvalidRefreshToken` - Bad signature or expired JWT (store untouched)
    /// * `AuthError::UnknownToken` - No session matches the token
    /// * `AuthError::TokenReuseDetected` - Session already revoked; every
    ///   session of the owner has been revoked as well
    /// * `AuthError::Expired` - Session record past its expiry
    pub async fn rotate(&self, raw_token: &str) -> AuthResult<RotatedSession> {
        self.codec
            .verify_refresh(raw_token)
            .map_err(|_| AuthError::InvalidRefreshToken)?;

        with_timeout(self.transaction_timeout, self.rotate_locked(raw_token)).await
    }

    async fn rotate_locked(&self, raw_token: &str) -> AuthResult<RotatedSession> {
        let token_hash = self.store.hash(raw_token);
        let mut tx = self.store.begin().await?;

        let record = tx
            .lock_by_hash(&token_hash)
            .await?
            .filter(|record| self.store.matches(raw_token, record))
            .ok_or(AuthError::UnknownToken)?;

        match record.state_at(Utc::now()) {
            SessionState::Active => {}
            SessionState::Revoked => {
                let revoked = tx.revoke_all_for_user(record.user_id).await?;
                tx.commit().await?;
                log::warn!(
                    "refresh token reuse for session {} of user {}; revoked {} active session(s)",
                    record.token_id,
                    record.user_id,
                    revoked
                );
                return Err(AuthError::TokenReuseDetected);
            }
            SessionState::Expired => return Err(AuthError::Expired),
        }

        let user = self
            .users
            .find_by_id(record.user_id)
            .await?
            .ok_or(AuthError::UnknownToken)?;

        tx.revoke(record.token_id).await?;

        let refresh = self.codec.issue_refresh(user.user_id, self.refresh_ttl)?;
        let successor = self
            .store
            .new_record(user.user_id, &refresh.token, refresh.expires_at);
        tx.insert(&successor).await?;

        let access = self.codec.issue_access(&user, self.access_ttl)?;
        tx.commit().await?;

        log::info!(
            "rotated session {} -> {} for user {}",
            record.token_id,
            successor.token_id,
            user.user_id
        );

        Ok(RotatedSession {
            user_id: user.user_id,
            tokens: SessionTokens {
                access_token: access.token,
                refresh_token: refresh.token,
                refresh_expires_at: refresh.expires_at,
            },
        })
    }
}
