//! Authentication manager implementation.

use chrono::Duration;
use sqlx::PgPool;
use std::sync::Arc;

use super::{
    credentials::{CredentialVerifier, hash_password, normalize_email},
    errors::{AuthError, AuthResult},
    models::{
        AccessTokenClaims, LoginOutcome, LoginRequest, RegisterRequest, Role, RotatedSession,
        SessionTokens, User, UserId,
    },
    revocation::RevocationManager,
    rotation::RotationEngine,
    sessions::SessionStore,
    tokens::{TokenCodec, TokenSecrets},
};
use crate::db::{
    MemorySessionRepository, MemoryUserRepository, PgSessionRepository, PgUserRepository,
    SessionRepository, UserRepository,
};

/// Token lifetimes and retention
#[derive(Debug, Clone, Copy)]
pub struct AuthSettings {
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    /// How long revoked sessions are kept past their expiry
    pub session_retention: Duration,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            access_ttl: Duration::minutes(15),
            refresh_ttl: Duration::days(7),
            session_retention: Duration::days(5),
        }
    }
}

/// Authentication manager
///
/// Wires the credential check, token codec, session store, rotation engine
/// and revocation manager over one pair of repositories.
#[derive(Clone)]
pub struct AuthManager {
    users: Arc<dyn UserRepository>,
    verifier: CredentialVerifier,
    codec: TokenCodec,
    store: SessionStore,
    rotation: RotationEngine,
    revocation: RevocationManager,
    settings: AuthSettings,
}

impl AuthManager {
    /// Create a new authentication manager
    ///
    /// # Errors
    ///
    /// * `AuthError::HashingFailed` - The pepper cannot key the token digest
    pub fn new(
        users: Arc<dyn UserRepository>,
        sessions: Arc<dyn SessionRepository>,
        secrets: TokenSecrets,
        settings: AuthSettings,
    ) -> AuthResult<Self> {
        let codec = TokenCodec::new(&secrets)?;
        let store = SessionStore::new(sessions, codec.hasher().clone());
        let verifier = CredentialVerifier::new(users.clone(), secrets.pepper);
        let rotation = RotationEngine::new(
            codec.clone(),
            store.clone(),
            users.clone(),
            settings.access_ttl,
            settings.refresh_ttl,
        );
        let revocation = RevocationManager::new(codec.clone(), store.clone());

        Ok(Self {
            users,
            verifier,
            codec,
            store,
            rotation,
            revocation,
            settings,
        })
    }

    /// Manager backed by PostgreSQL
    pub fn postgres(pool: PgPool, secrets: TokenSecrets, settings: AuthSettings) -> AuthResult<Self> {
        Self::new(
            Arc::new(PgUserRepository::new(pool.clone())),
            Arc::new(PgSessionRepository::new(pool)),
            secrets,
            settings,
        )
    }

    /// Manager backed by in-process maps. State is lost on drop.
    pub fn in_memory(secrets: TokenSecrets, settings: AuthSettings) -> AuthResult<Self> {
        Self::new(
            Arc::new(MemoryUserRepository::new()),
            Arc::new(MemorySessionRepository::new()),
            secrets,
            settings,
        )
    }

    /// Register a new user
    ///
    /// # Errors
    ///
    /// * `AuthError::Validation` - Missing email or password, or an admin role
    /// * `AuthError::DuplicateResource` - Email already exists
    pub async fn register(&self, request: RegisterRequest) -> AuthResult<User> {
        let email = normalize_email(&request.email);
        if email.is_empty() || !email.contains('@') {
            return Err(AuthError::Validation("A valid email is required".to_string()));
        }
        if request.password.is_empty() {
            return Err(AuthError::Validation("Password is required".to_string()));
        }
        if request.role == Role::Admin {
            return Err(AuthError::Validation(
                "Role must be student or teacher".to_string(),
            ));
        }

        let password_hash = hash_password(&request.password, self.verifier.pepper())?;
        let user = self
            .users
            .create_user(&email, &password_hash, request.role)
            .await?;

        log::info!("registered user {} ({})", user.user_id, user.role);
        Ok(user)
    }

    /// Verify credentials and open a new session
    ///
    /// # Errors
    ///
    /// * `AuthError::Validation` - Missing email or password
    /// * `AuthError::InvalidCredentials` - Unknown email or wrong password
    pub async fn login(&self, request: LoginRequest) -> AuthResult<LoginOutcome> {
        if request.email.trim().is_empty() || request.password.is_empty() {
            return Err(AuthError::Validation(
                "Email and password are required".to_string(),
            ));
        }

        let user = match self.verifier.verify(&request.email, &request.password).await {
            Ok(user) => user,
            Err(err) => {
                if matches!(err, AuthError::InvalidCredentials) {
                    log::warn!("failed login attempt");
                }
                return Err(err);
            }
        };

        let tokens = self.create_session(&user).await?;
        log::info!("user {} logged in", user.user_id);

        Ok(LoginOutcome { user, tokens })
    }

    /// Sign both tokens, then persist the refresh session. Nothing is stored
    /// unless signing succeeded.
    async fn create_session(&self, user: &User) -> AuthResult<SessionTokens> {
        let tokens = self.issue_tokens(user)?;
        self.store
            .create(user.user_id, &tokens.refresh_token, tokens.refresh_expires_at)
            .await?;
        Ok(tokens)
    }

    fn issue_tokens(&self, user: &User) -> AuthResult<SessionTokens> {
        let refresh = self.codec.issue_refresh(user.user_id, self.settings.refresh_ttl)?;
        let access = self.codec.issue_access(user, self.settings.access_ttl)?;

        Ok(SessionTokens {
            access_token: access.token,
            refresh_token: refresh.token,
            refresh_expires_at: refresh.expires_at,
        })
    }

    /// Rotate a refresh token. See [`RotationEngine::rotate`].
    pub async fn refresh(&self, raw_token: &str) -> AuthResult<RotatedSession> {
        self.rotation.rotate(raw_token).await
    }

    /// Revoke a single session. See [`RevocationManager::logout`].
    pub async fn logout(&self, raw_token: Option<&str>) -> AuthResult<bool> {
        self.revocation.logout(raw_token).await
    }

    /// Revoke every session of a user. See [`RevocationManager::logout_all`].
    pub async fn logout_all(
        &self,
        user_id: Option<UserId>,
        raw_token: Option<&str>,
    ) -> AuthResult<u64> {
        self.revocation.logout_all(user_id, raw_token).await
    }

    /// Verify an access token. Pure; touches no store.
    pub fn verify_access_token(&self, token: &str) -> AuthResult<AccessTokenClaims> {
        self.codec.verify_access(token)
    }

    /// Delete revoked sessions expired longer than the retention window
    pub async fn purge_expired_sessions(&self) -> AuthResult<u64> {
        self.store
            .purge_expired_revoked(self.settings.session_retention)
            .await
    }

    pub async fn health_check(&self) -> AuthResult<()> {
        self.store.health_check().await
    }

    pub fn settings(&self) -> &AuthSettings {
        &self.settings
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.store
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }
}
