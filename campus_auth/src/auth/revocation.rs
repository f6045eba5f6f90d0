//! Explicit session termination.

use super::{
    errors::{AuthError, AuthResult},
    models::UserId,
    sessions::SessionStore,
    tokens::TokenCodec,
};

/// Ends one session or every session of a user
#[derive(Clone)]
pub struct RevocationManager {
    codec: TokenCodec,
    store: SessionStore,
}

impl RevocationManager {
    pub fn new(codec: TokenCodec, store: SessionStore) -> Self {
        Self { codec, store }
    }

    /// Revoke the session behind `raw_token`, if any.
    ///
    /// Best effort: a missing, malformed or unknown token is not an error and
    /// yields `Ok(false)`. Only store failures are reported.
    pub async fn logout(&self, raw_token: Option<&str>) -> AuthResult<bool> {
        let Some(raw_token) = raw_token else {
            return Ok(false);
        };

        if self.codec.verify_refresh(raw_token).is_err() {
            log::debug!("logout with unverifiable refresh token ignored");
            return Ok(false);
        }

        let revoked = self.store.revoke_by_hash(&self.store.hash(raw_token)).await?;
        if revoked {
            log::info!("session logged out");
        }
        Ok(revoked)
    }

    /// Revoke every session of a user.
    ///
    /// The user is taken from `user_id` when the caller is authenticated,
    /// otherwise from the `sub` of a verified refresh token.
    ///
    /// # Errors
    ///
    /// * `AuthError::InvalidRefreshToken` - Neither identity source is usable
    pub async fn logout_all(
        &self,
        user_id: Option<UserId>,
        raw_token: Option<&str>,
    ) -> AuthResult<u64> {
        let user_id = match (user_id, raw_token) {
            (Some(user_id), _) => user_id,
            (None, Some(raw_token)) => {
                self.codec
                    .verify_refresh(raw_token)
                    .map_err(|_| AuthError::InvalidRefreshToken)?
                    .sub
            }
            (None, None) => return Err(AuthError::InvalidRefreshToken),
        };

        let revoked = self.store.revoke_all_for_user(user_id).await?;
        log::info!("logout-all for user {user_id} revoked {revoked} session(s)");
        Ok(revoked)
    }
}
