//! Email/password verification against stored Argon2id hashes.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use std::sync::Arc;

use super::{
    errors::{AuthError, AuthResult},
    models::User,
};
use crate::db::UserRepository;

/// Well-formed Argon2id hash with default cost parameters that no password
/// matches. Verified against on unknown emails so both login failures cost
/// one Argon2 run.
const DUMMY_PASSWORD_HASH: &str = "$argon2id$v=19$m=19456,t=2,p=1$Y2FtcHVzLWF1dGgtc2FsdA$BwgJCgsMDQ4PEBESExQVFhcYGRobHB0eHyAhIiMkJSY";

/// Lower-case and trim an email so lookups are case-insensitive
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Hash a password with Argon2id + pepper
pub fn hash_password(password: &str, pepper: &str) -> AuthResult<String> {
    let peppered = format!("{}{}", password, pepper);
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    Ok(argon2
        .hash_password(peppered.as_bytes(), &salt)
        .map_err(|_| AuthError::HashingFailed)?
        .to_string())
}

/// Verify a password against a stored PHC hash. The comparison inside
/// argon2 is constant time.
fn verify_password(password: &str, pepper: &str, hash: &str) -> AuthResult<()> {
    let peppered = format!("{}{}", password, pepper);
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(peppered.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

/// Checks email/password pairs. Has no side effects.
#[derive(Clone)]
pub struct CredentialVerifier {
    users: Arc<dyn UserRepository>,
    pepper: String,
}

impl CredentialVerifier {
    pub fn new(users: Arc<dyn UserRepository>, pepper: String) -> Self {
        Self { users, pepper }
    }

    /// Resolve the user owning `email` if `password` matches.
    ///
    /// # Errors
    ///
    /// * `AuthError::InvalidCredentials` - Unknown email or wrong password
    pub async fn verify(&self, email: &str, password: &str) -> AuthResult<User> {
        let email = normalize_email(email);
        let Some(stored) = self.users.find_by_email(&email).await? else {
            let _ = verify_password(password, &self.pepper, DUMMY_PASSWORD_HASH);
            return Err(AuthError::InvalidCredentials);
        };

        verify_password(password, &self.pepper, &stored.password_hash)?;
        Ok(stored.user)
    }

    pub fn pepper(&self) -> &str {
        &self.pepper
    }
}
