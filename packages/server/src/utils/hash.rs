use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng};
use argon2::Argon2;

/// Hash a password with Argon2id and a random salt (PHC string format).
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}

/// Check a password against a stored PHC hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, argon2::password_hash::Error> {
    let parsed = PasswordHash::new(hash)?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Hash on the blocking pool; Argon2 is deliberately slow.
pub async fn hash_password_blocking(password: String) -> Result<String, crate::error::AppError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| crate::error::AppError::Internal(format!("Hashing task failed: {e}")))?
        .map_err(|e| crate::error::AppError::Internal(format!("Password hash error: {e}")))
}

pub async fn verify_password_blocking(
    password: String,
    hash: String,
) -> Result<bool, crate::error::AppError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| crate::error::AppError::Internal(format!("Verify task failed: {e}")))?
        .map_err(|e| crate::error::AppError::Internal(format!("Password verify error: {e}")))
}
