//! Access/refresh token signing and refresh-token digests.

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use super::{
    errors::{AuthError, AuthResult},
    models::{AccessTokenClaims, RefreshTokenClaims, User, UserId},
};

type HmacSha256 = Hmac<Sha256>;

/// Secrets for the two token classes and the digest key.
///
/// The access and refresh secrets must differ: leaking one must not let an
/// attacker mint the other kind of token.
#[derive(Clone)]
pub struct TokenSecrets {
    pub access_secret: String,
    pub refresh_secret: String,
    pub pepper: String,
}

/// Signed token plus the expiry embedded in it
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Keyed one-way digest of raw refresh tokens.
///
/// HMAC-SHA256 keyed with the server pepper: deterministic, so records can
/// be looked up by digest, but useless without the key.
#[derive(Clone)]
pub struct TokenHasher {
    mac: HmacSha256,
}

impl TokenHasher {
    pub fn new(key: &[u8]) -> AuthResult<Self> {
        let mac = <HmacSha256 as Mac>::new_from_slice(key).map_err(|_| AuthError::HashingFailed)?;
        Ok(Self { mac })
    }

    /// Hex digest of a raw token
    pub fn hash(&self, raw_token: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(raw_token.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Constant-time comparison of a raw token against a stored digest
    pub fn verify(&self, raw_token: &str, digest: &str) -> bool {
        self.hash(raw_token)
            .as_bytes()
            .ct_eq(digest.as_bytes())
            .into()
    }
}

/// Stateless signer/verifier for both token classes
#[derive(Clone)]
pub struct TokenCodec {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    validation: Validation,
    hasher: TokenHasher,
}

impl TokenCodec {
    pub fn new(secrets: &TokenSecrets) -> AuthResult<Self> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Ok(Self {
            access_encoding: EncodingKey::from_secret(secrets.access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(secrets.access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(secrets.refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(secrets.refresh_secret.as_bytes()),
            validation,
            hasher: TokenHasher::new(secrets.pepper.as_bytes())?,
        })
    }

    /// Sign an access token carrying the user's id, role and email
    pub fn issue_access(&self, user: &User, ttl: Duration) -> AuthResult<IssuedToken> {
        let now = Utc::now();
        let expires_at = now + ttl;
        let claims = AccessTokenClaims {
            sub: user.user_id,
            role: user.role,
            email: user.email.clone(),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.access_encoding)?;
        Ok(IssuedToken { token, expires_at })
    }

    /// Sign a refresh token. Every call gets a fresh `jti`.
    pub fn issue_refresh(&self, user_id: UserId, ttl: Duration) -> AuthResult<IssuedToken> {
        let now = Utc::now();
        let expires_at = now + ttl;
        let claims = RefreshTokenClaims {
            sub: user_id,
            jti: Uuid::new_v4(),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.refresh_encoding)?;
        Ok(IssuedToken { token, expires_at })
    }

    /// Verify an access token. Bad signatures and expiry are reported identically.
    pub fn verify_access(&self, token: &str) -> AuthResult<AccessTokenClaims> {
        decode::<AccessTokenClaims>(token, &self.access_decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                log::debug!("access token rejected: {e}");
                AuthError::InvalidOrExpiredToken
            })
    }

    /// Verify a refresh token. Bad signatures and expiry are reported identically.
    pub fn verify_refresh(&self, token: &str) -> AuthResult<RefreshTokenClaims> {
        decode::<RefreshTokenClaims>(token, &self.refresh_decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                log::debug!("refresh token rejected: {e}");
                AuthError::InvalidOrExpiredToken
            })
    }

    /// Storage digest of a raw refresh token
    pub fn hash(&self, raw_token: &str) -> String {
        self.hasher.hash(raw_token)
    }

    /// Constant-time check of a raw token against a stored digest
    pub fn verify_hash(&self, raw_token: &str, digest: &str) -> bool {
        self.hasher.verify(raw_token, digest)
    }

    pub fn hasher(&self) -> &TokenHasher {
        &self.hasher
    }
}
