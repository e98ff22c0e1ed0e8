//! Token hashing and verification.
//!
//! The expected token is stored only as an Argon2 PHC string. Verification
//! is deliberately expensive, so it runs on the blocking pool.

use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors from the verification collaborator itself, as opposed to a
/// token that simply does not match.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("malformed token hash: {0}")]
    MalformedHash(String),

    #[error("token hashing failed: {0}")]
    Hash(String),

    #[error("verification task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Checks a presented token against the expected hash.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// `Ok(false)` means the token does not match.
    async fn verify(&self, token: &str, expected_hash: &str) -> Result<bool, VerifyError>;
}

/// Argon2 verifier. Parameters come from the PHC string.
#[derive(Debug, Clone, Copy, Default)]
pub struct Argon2Verifier;

#[async_trait]
impl TokenVerifier for Argon2Verifier {
    async fn verify(&self, token: &str, expected_hash: &str) -> Result<bool, VerifyError> {
        let token = token.to_owned();
        let expected_hash = expected_hash.to_owned();
        tokio::task::spawn_blocking(move || verify_blocking(&token, &expected_hash)).await?
    }
}

fn verify_blocking(token: &str, expected_hash: &str) -> Result<bool, VerifyError> {
    let parsed =
        PasswordHash::new(expected_hash).map_err(|e| VerifyError::MalformedHash(e.to_string()))?;

    match Argon2::default().verify_password(token.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(VerifyError::MalformedHash(e.to_string())),
    }
}

/// Hash `token` into an Argon2id PHC string with a random salt.
pub fn hash_token(token: &str) -> Result<String, VerifyError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(token.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| VerifyError::Hash(e.to_string()))
}

/// Short, non-reversible token identifier for logs.
pub fn fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    hex::encode(&digest[..4])
}
