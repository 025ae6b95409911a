//! Password hashing and verification.
//!
//! # Security
//!
//! - Hashing uses Argon2id (hybrid mode) with default parameters
//! - Salts are generated using OsRng (cryptographically secure RNG)
//! - Hashes are stored in PHC string format
//!
//! Both operations are CPU-bound; the async wrappers run them on the blocking
//! thread pool so request tasks are not starved.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::AuthResult;
use crate::error::AuthError;

/// Hash a password for secure storage using Argon2id.
///
/// # Errors
///
/// Returns `argon2::password_hash::Error` if hashing fails (rare).
///
/// # Example
///
/// ```
/// use coreroot_auth::password::{hash_password, verify_password};
///
/// let hash = hash_password("my_secure_password").unwrap();
/// assert!(hash.starts_with("$argon2id$"));
/// assert!(verify_password("my_secure_password", &hash).unwrap());
/// ```
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a stored Argon2 hash.
///
/// Returns `Ok(false)` on mismatch; `Err` only if the stored hash is not a
/// valid PHC string.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, argon2::password_hash::Error> {
    let parsed_hash = PasswordHash::new(hash)?;
    let result = Argon2::default().verify_password(password.as_bytes(), &parsed_hash);
    Ok(result.is_ok())
}

/// [`hash_password`] on the blocking pool.
pub async fn hash_password_async(password: String) -> AuthResult<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| AuthError::internal(format!("Password hashing task failed: {e}")))?
        .map_err(|e| AuthError::internal(format!("Failed to hash password: {e}")))
}

/// [`verify_password`] on the blocking pool.
///
/// A corrupt stored hash is reported as a mismatch and logged.
pub async fn verify_password_async(password: String, hash: String) -> AuthResult<bool> {
    let verified = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| AuthError::internal(format!("Password verification task failed: {e}")))?;

    match verified {
        Ok(matches) => Ok(matches),
        Err(e) => {
            tracing::error!(error = %e, "Stored password hash is malformed");
            Ok(false)
        }
    }
}
