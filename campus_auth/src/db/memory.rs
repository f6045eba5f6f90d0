//! In-process repositories for tests and database-less development runs.
//!
//! A transaction holds the session map's mutex for its whole lifetime and
//! works on a staged copy, so it serializes against every other writer and
//! discards its changes unless committed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use uuid::Uuid;

use super::repository::{SessionRepository, SessionTransaction, UserRepository};
use crate::auth::{AuthError, AuthResult, Role, SessionRecord, StoredUser, TokenId, User, UserId};

/// In-memory `UserRepository`
#[derive(Default)]
pub struct MemoryUserRepository {
    users: RwLock<HashMap<UserId, StoredUser>>,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn create_user(&self, email: &str, password_hash: &str, role: Role) -> AuthResult<User> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.user.email == email) {
            return Err(AuthError::DuplicateResource("Email already exists".to_string()));
        }

        let user = User {
            user_id: Uuid::new_v4(),
            email: email.to_string(),
            role,
            created_at: Utc::now(),
        };
        users.insert(
            user.user_id,
            StoredUser {
                user: user.clone(),
                password_hash: password_hash.to_string(),
            },
        );
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> AuthResult<Option<StoredUser>> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.user.email == email).cloned())
    }

    async fn find_by_id(&self, user_id: UserId) -> AuthResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users.get(&user_id).map(|u| u.user.clone()))
    }
}

type SessionMap = HashMap<TokenId, SessionRecord>;

fn insert_unique(map: &mut SessionMap, record: &SessionRecord) -> AuthResult<()> {
    if map.contains_key(&record.token_id)
        || map.values().any(|r| r.token_hash == record.token_hash)
    {
        return Err(AuthError::DuplicateResource("Duplicate value".to_string()));
    }
    map.insert(record.token_id, record.clone());
    Ok(())
}

fn revoke_where(map: &mut SessionMap, pred: impl Fn(&SessionRecord) -> bool) -> u64 {
    let mut changed = 0;
    for record in map.values_mut().filter(|r| !r.revoked && pred(r)) {
        record.revoked = true;
        changed += 1;
    }
    changed
}

/// In-memory `SessionRepository`
#[derive(Clone, Default)]
pub struct MemorySessionRepository {
    sessions: Arc<Mutex<SessionMap>>,
}

impl MemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every stored record
    pub async fn snapshot(&self) -> Vec<SessionRecord> {
        self.sessions.lock().await.values().cloned().collect()
    }
}

#[async_trait]
impl SessionRepository for MemorySessionRepository {
    async fn insert(&self, record: &SessionRecord) -> AuthResult<()> {
        insert_unique(&mut *self.sessions.lock().await, record)
    }

    async fn find_by_hash(&self, token_hash: &str) -> AuthResult<Option<SessionRecord>> {
        let sessions = self.sessions.lock().await;
        Ok(sessions.values().find(|r| r.token_hash == token_hash).cloned())
    }

    async fn revoke(&self, token_id: TokenId) -> AuthResult<bool> {
        let mut sessions = self.sessions.lock().await;
        Ok(revoke_where(&mut sessions, |r| r.token_id == token_id) > 0)
    }

    async fn revoke_by_hash(&self, token_hash: &str) -> AuthResult<bool> {
        let mut sessions = self.sessions.lock().await;
        Ok(revoke_where(&mut sessions, |r| r.token_hash == token_hash) > 0)
    }

    async fn revoke_all_for_user(&self, user_id: UserId) -> AuthResult<u64> {
        let mut sessions = self.sessions.lock().await;
        Ok(revoke_where(&mut sessions, |r| r.user_id == user_id))
    }

    async fn purge_expired_revoked(&self, cutoff: DateTime<Utc>) -> AuthResult<u64> {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, r| !(r.revoked && r.expires_at < cutoff));
        Ok((before - sessions.len()) as u64)
    }

    async fn begin(&self) -> AuthResult<Box<dyn SessionTransaction>> {
        let guard = self.sessions.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemorySessionTransaction { guard, staged }))
    }

    async fn ping(&self) -> AuthResult<()> {
        Ok(())
    }
}

/// Transaction over [`MemorySessionRepository`]
pub struct MemorySessionTransaction {
    guard: OwnedMutexGuard<SessionMap>,
    staged: SessionMap,
}

#[async_trait]
impl SessionTransaction for MemorySessionTransaction {
    async fn lock_by_hash(&mut self, token_hash: &str) -> AuthResult<Option<SessionRecord>> {
        Ok(self
            .staged
            .values()
            .find(|r| r.token_hash == token_hash)
            .cloned())
    }

    async fn revoke(&mut self, token_id: TokenId) -> AuthResult<()> {
        revoke_where(&mut self.staged, |r| r.token_id == token_id);
        Ok(())
    }

    async fn insert(&mut self, record: &SessionRecord) -> AuthResult<()> {
        insert_unique(&mut self.staged, record)
    }

    async fn revoke_all_for_user(&mut self, user_id: UserId) -> AuthResult<u64> {
        Ok(revoke_where(&mut self.staged, |r| r.user_id == user_id))
    }

    async fn commit(self: Box<Self>) -> AuthResult<()> {
        let MemorySessionTransaction { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }
}
