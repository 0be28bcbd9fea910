//! Credential primitives: password hashing and session tokens.
//!
//! Passwords are stored as Argon2id PHC strings (random salt, argon2 crate
//! defaults). Session tokens are 32 random bytes, hex-encoded for the client;
//! only their SHA-256 digest is ever persisted.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use lazy_static::lazy_static;
use rand::Rng;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Number of random bytes in a session token
pub const TOKEN_BYTES: usize = 32;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("stored password hash is malformed")]
    MalformedHash(#[source] argon2::password_hash::Error),

    #[error("password hashing failed")]
    Hashing(#[source] argon2::password_hash::Error),
}

lazy_static! {
    /// Hash checked against when a login names an unknown user, so that the
    /// response takes as long as a real verification.
    static ref DUMMY_HASH: Option<String> = hash_password("eciple-dummy-password").ok();
}

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(PasswordError::Hashing)?;
    Ok(hash.to_string())
}

/// Verify a password against a stored hash.
///
/// `Ok(false)` means the check ran and the password did not match. An error
/// means the check could not run at all.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed_hash = PasswordHash::new(hash).map_err(PasswordError::MalformedHash)?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::Hashing(e)),
    }
}

/// Burn the same work as a real verification without revealing anything.
pub fn dummy_verify(password: &str) {
    if let Some(hash) = DUMMY_HASH.as_deref() {
        let _ = verify_password(password, hash);
    }
}

/// Generate a random session token
pub fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; TOKEN_BYTES] = rng.random();
    hex::encode(bytes)
}

/// Hash a token for storage
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}
