//! Argon2 password hashing.
//!
//! Hashes are PHC strings (`$argon2id$...`) with a fresh random salt each.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use manga_core::{MangaError, MangaResult};

/// Hash a plaintext password.
pub fn hash_password(password: &str) -> MangaResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| MangaError::internal(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

/// Check a plaintext password against a stored hash.
///
/// An unparseable hash is treated as a mismatch and logged.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed = match PasswordHash::new(hash) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!(error = %e, "Stored password hash is not a PHC string");
            return false;
        }
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// [`hash_password`] on the blocking pool, keeping argon2 off the async
/// workers.
pub async fn hash_password_async(password: String) -> MangaResult<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| MangaError::internal(format!("Password hashing task failed: {}", e)))?
}

/// [`verify_password`] on the blocking pool.
pub async fn verify_password_async(password: String, hash: String) -> MangaResult<bool> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| MangaError::internal(format!("Password verification task failed: {}", e)))
}
