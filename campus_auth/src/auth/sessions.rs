//! Persisted refresh-token sessions.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use super::{
    errors::AuthResult,
    models::{SessionRecord, TokenId, UserId},
    tokens::TokenHasher,
};
use crate::db::{
    SessionRepository, SessionTransaction,
    timeouts::{with_default_timeout, with_long_timeout},
};

/// Session records keyed by the digest of their raw refresh token.
///
/// Raw tokens pass through here only to be hashed; they are never handed to
/// the repository.
#[derive(Clone)]
pub struct SessionStore {
    repo: Arc<dyn SessionRepository>,
    hasher: TokenHasher,
}

impl SessionStore {
    pub fn new(repo: Arc<dyn SessionRepository>, hasher: TokenHasher) -> Self {
        Self { repo, hasher }
    }

    /// Digest used as the lookup key for a raw token
    pub fn hash(&self, raw_token: &str) -> String {
        self.hasher.hash(raw_token)
    }

    /// Constant-time check that `raw_token` belongs to `record`
    pub fn matches(&self, raw_token: &str, record: &SessionRecord) -> bool {
        self.hasher.verify(raw_token, &record.token_hash)
    }

    /// Build an unsaved record with a fresh token id
    pub fn new_record(
        &self,
        user_id: UserId,
        raw_token: &str,
        expires_at: DateTime<Utc>,
    ) -> SessionRecord {
        SessionRecord {
            token_id: Uuid::new_v4(),
            user_id,
            token_hash: self.hash(raw_token),
            issued_at: Utc::now(),
            expires_at,
            revoked: false,
        }
    }

    /// Hash `raw_token` and persist a new active session
    pub async fn create(
        &self,
        user_id: UserId,
        raw_token: &str,
        expires_at: DateTime<Utc>,
    ) -> AuthResult<TokenId> {
        let record = self.new_record(user_id, raw_token, expires_at);
        with_default_timeout(self.repo.insert(&record)).await?;
        log::debug!("session {} created for user {}", record.token_id, user_id);
        Ok(record.token_id)
    }

    /// Look up a record by digest whatever its state, so callers can tell
    /// "never existed" apart from "already revoked".
    pub async fn find_by_hash(&self, token_hash: &str) -> AuthResult<Option<SessionRecord>> {
        with_default_timeout(self.repo.find_by_hash(token_hash)).await
    }

    /// Idempotent. Returns whether the record was active before the call.
    pub async fn revoke(&self, token_id: TokenId) -> AuthResult<bool> {
        with_default_timeout(self.repo.revoke(token_id)).await
    }

    /// Idempotent. Returns whether the record was active before the call.
    pub async fn revoke_by_hash(&self, token_hash: &str) -> AuthResult<bool> {
        with_default_timeout(self.repo.revoke_by_hash(token_hash)).await
    }

    /// Revoke every active session of `user_id`, returning how many changed
    pub async fn revoke_all_for_user(&self, user_id: UserId) -> AuthResult<u64> {
        with_default_timeout(self.repo.revoke_all_for_user(user_id)).await
    }

    /// Delete revoked sessions whose expiry is older than `retention`.
    /// Maintenance only.
    pub async fn purge_expired_revoked(&self, retention: Duration) -> AuthResult<u64> {
        let cutoff = Utc::now() - retention;
        let purged = with_long_timeout(self.repo.purge_expired_revoked(cutoff)).await?;
        log::info!("purged {purged} revoked session(s) expired before {cutoff}");
        Ok(purged)
    }

    /// Open a transaction for rotation
    pub async fn begin(&self) -> AuthResult<Box<dyn SessionTransaction>> {
        with_default_timeout(self.repo.begin()).await
    }

    pub async fn health_check(&self) -> AuthResult<()> {
        with_default_timeout(self.repo.ping()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemorySessionRepository;

    fn store() -> (SessionStore, MemorySessionRepository) {
        let repo = MemorySessionRepository::new();
        let hasher = TokenHasher::new(b"session_store_test_pepper").unwrap();
        (SessionStore::new(Arc::new(repo.clone()), hasher), repo)
    }

    #[tokio::test]
    async fn test_create_never_persists_raw_token() {
        let (store, repo) = store();
        let user_id = Uuid::new_v4();

        let token_id = store
            .create(user_id, "raw-token-value", Utc::now() + Duration::days(7))
            .await
            .unwrap();

        let records = repo.snapshot().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].token_id, token_id);
        assert_ne!(records[0].token_hash, "raw-token-value");
        assert!(store.matches("raw-token-value", &records[0]));
    }

    #[tokio::test]
    async fn test_find_by_hash_returns_revoked_records() {
        let (store, _) = store();
        let user_id = Uuid::new_v4();
        let token_id = store
            .create(user_id, "raw", Utc::now() + Duration::days(1))
            .await
            .unwrap();

        assert!(store.revoke(token_id).await.unwrap());
        let found = store.find_by_hash(&store.hash("raw")).await.unwrap().unwrap();
        assert!(found.revoked);
        assert!(store.find_by_hash(&store.hash("other")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_revoke_all_for_user_only_touches_owner() {
        let (store, repo) = store();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let expires = Utc::now() + Duration::days(1);

        store.create(alice, "a1", expires).await.unwrap();
        store.create(alice, "a2", expires).await.unwrap();
        store.create(bob, "b1", expires).await.unwrap();

        assert_eq!(store.revoke_all_for_user(alice).await.unwrap(), 2);
        assert_eq!(store.revoke_all_for_user(alice).await.unwrap(), 0);

        let records = repo.snapshot().await;
        assert!(records.iter().filter(|r| r.user_id == alice).all(|r| r.revoked));
        assert!(records.iter().filter(|r| r.user_id == bob).all(|r| !r.revoked));
    }

    #[tokio::test]
    async fn test_purge_respects_retention_window() {
        let (store, repo) = store();
        let user_id = Uuid::new_v4();
        let now = Utc::now();

        let old = store.create(user_id, "old", now - Duration::days(10)).await.unwrap();
        let recent = store.create(user_id, "recent", now - Duration::days(1)).await.unwrap();
        store.create(user_id, "expired-active", now - Duration::days(10)).await.unwrap();
        store.revoke(old).await.unwrap();
        store.revoke(recent).await.unwrap();

        let purged = store.purge_expired_revoked(Duration::days(5)).await.unwrap();
        assert_eq!(purged, 1);

        let remaining: Vec<_> = repo.snapshot().await.into_iter().map(|r| r.token_id).collect();
        assert!(!remaining.contains(&old));
        assert!(remaining.contains(&recent));
        assert_eq!(remaining.len(), 2);
    }
}
