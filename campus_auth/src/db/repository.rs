//! Repository trait definitions for testability and dependency injection.
//!
//! The traits abstract over where users and session records live. The
//! PostgreSQL implementations here are the production backends; the
//! in-memory ones in [`super::memory`] back tests and local development.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::auth::{AuthResult, Role, SessionRecord, StoredUser, TokenId, User, UserId};

/// Trait for user repository operations
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a new user with a freshly generated id
    async fn create_user(&self, email: &str, password_hash: &str, role: Role) -> AuthResult<User>;

    /// Find user and password hash by (already normalized) email
    async fn find_by_email(&self, email: &str) -> AuthResult<Option<StoredUser>>;

    /// Find user by ID
    async fn find_by_id(&self, user_id: UserId) -> AuthResult<Option<User>>;
}

/// Trait for refresh-token session persistence
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Insert a new session record
    async fn insert(&self, record: &SessionRecord) -> AuthResult<()>;

    /// Find a record by token digest, revoked or not
    async fn find_by_hash(&self, token_hash: &str) -> AuthResult<Option<SessionRecord>>;

    /// Revoke one record. Returns whether a row changed state.
    async fn revoke(&self, token_id: TokenId) -> AuthResult<bool>;

    /// Revoke the record with this digest. Returns whether a row changed state.
    async fn revoke_by_hash(&self, token_hash: &str) -> AuthResult<bool>;

    /// Revoke every active record of a user
    async fn revoke_all_for_user(&self, user_id: UserId) -> AuthResult<u64>;

    /// Delete revoked records that expired before `cutoff`
    async fn purge_expired_revoked(&self, cutoff: DateTime<Utc>) -> AuthResult<u64>;

    /// Open a transaction. Dropping it without `commit` rolls back.
    async fn begin(&self) -> AuthResult<Box<dyn SessionTransaction>>;

    /// Connectivity check
    async fn ping(&self) -> AuthResult<()>;
}

/// Session operations bound to one open transaction
#[async_trait]
pub trait SessionTransaction: Send {
    /// Fetch a record by digest and lock it until the transaction ends
    async fn lock_by_hash(&mut self, token_hash: &str) -> AuthResult<Option<SessionRecord>>;

    async fn revoke(&mut self, token_id: TokenId) -> AuthResult<()>;

    async fn insert(&mut self, record: &SessionRecord) -> AuthResult<()>;

    async fn revoke_all_for_user(&mut self, user_id: UserId) -> AuthResult<u64>;

    async fn commit(self: Box<Self>) -> AuthResult<()>;
}

const SELECT_BY_HASH: &str = "SELECT token_id, user_id, token_hash, issued_at, expires_at, revoked \
     FROM refresh_tokens WHERE token_hash = $1";

const LOCK_BY_HASH: &str = "SELECT token_id, user_id, token_hash, issued_at, expires_at, revoked \
     FROM refresh_tokens WHERE token_hash = $1 FOR UPDATE";

fn session_from_row(row: &PgRow) -> SessionRecord {
    SessionRecord {
        token_id: row.get("token_id"),
        user_id: row.get("user_id"),
        token_hash: row.get("token_hash"),
        issued_at: row.get("issued_at"),
        expires_at: row.get("expires_at"),
        revoked: row.get("revoked"),
    }
}

fn user_from_row(row: &PgRow) -> AuthResult<User> {
    Ok(User {
        user_id: row.get("user_id"),
        email: row.get("email"),
        role: row.get::<String, _>("role").parse()?,
        created_at: row.get("created_at"),
    })
}

/// Default PostgreSQL implementation of `UserRepository`
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create_user(&self, email: &str, password_hash: &str, role: Role) -> AuthResult<User> {
        let row = sqlx::query(
            r#"
            INSERT INTO users (user_id, email, password_hash, role)
            VALUES ($1, $2, $3, $4)
            RETURNING user_id, email, role, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(password_hash)
        .bind(role.as_str())
        .fetch_one(&self.pool)
        .await?;

        user_from_row(&row)
    }

    async fn find_by_email(&self, email: &str) -> AuthResult<Option<StoredUser>> {
        let row = sqlx::query(
            "SELECT user_id, email, password_hash, role, created_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| {
            Ok(StoredUser {
                user: user_from_row(&r)?,
                password_hash: r.get("password_hash"),
            })
        })
        .transpose()
    }

    async fn find_by_id(&self, user_id: UserId) -> AuthResult<Option<User>> {
        let row = sqlx::query("SELECT user_id, email, role, created_at FROM users WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(user_from_row).transpose()
    }
}

/// Default PostgreSQL implementation of `SessionRepository`
pub struct PgSessionRepository {
    pool: PgPool,
}

impl PgSessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionRepository for PgSessionRepository {
    async fn insert(&self, record: &SessionRecord) -> AuthResult<()> {
        insert_session(&self.pool, record).await
    }

    async fn find_by_hash(&self, token_hash: &str) -> AuthResult<Option<SessionRecord>> {
        let row = sqlx::query(SELECT_BY_HASH)
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(session_from_row))
    }

    async fn revoke(&self, token_id: TokenId) -> AuthResult<bool> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked = TRUE WHERE token_id = $1 AND revoked = FALSE",
        )
        .bind(token_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn revoke_by_hash(&self, token_hash: &str) -> AuthResult<bool> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked = TRUE WHERE token_hash = $1 AND revoked = FALSE",
        )
        .bind(token_hash)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn revoke_all_for_user(&self, user_id: UserId) -> AuthResult<u64> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked = TRUE WHERE user_id = $1 AND revoked = FALSE",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn purge_expired_revoked(&self, cutoff: DateTime<Utc>) -> AuthResult<u64> {
        let result =
            sqlx::query("DELETE FROM refresh_tokens WHERE revoked = TRUE AND expires_at < $1")
                .bind(cutoff)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected())
    }

    async fn begin(&self) -> AuthResult<Box<dyn SessionTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgSessionTransaction { tx }))
    }

    async fn ping(&self) -> AuthResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

async fn insert_session<'e, E>(executor: E, record: &SessionRecord) -> AuthResult<()>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (token_id, user_id, token_hash, issued_at, expires_at, revoked)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(record.token_id)
    .bind(record.user_id)
    .bind(&record.token_hash)
    .bind(record.issued_at)
    .bind(record.expires_at)
    .bind(record.revoked)
    .execute(executor)
    .await?;

    Ok(())
}

/// Open PostgreSQL transaction. `sqlx` rolls back on drop.
pub struct PgSessionTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl SessionTransaction for PgSessionTransaction {
    async fn lock_by_hash(&mut self, token_hash: &str) -> AuthResult<Option<SessionRecord>> {
        let row = sqlx::query(LOCK_BY_HASH)
            .bind(token_hash)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(row.as_ref().map(session_from_row))
    }

    async fn revoke(&mut self, token_id: TokenId) -> AuthResult<()> {
        sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE token_id = $1")
            .bind(token_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn insert(&mut self, record: &SessionRecord) -> AuthResult<()> {
        insert_session(&mut *self.tx, record).await
    }

    async fn revoke_all_for_user(&mut self, user_id: UserId) -> AuthResult<u64> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked = TRUE WHERE user_id = $1 AND revoked = FALSE",
        )
        .bind(user_id)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> AuthResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
