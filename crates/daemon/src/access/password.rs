use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use password_hash::{PasswordHash, SaltString};

use super::AccessError;

pub const MIN_PASSWORD_LEN: usize = 8;

/// Argon2id PHC string for `password` with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, AccessError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AccessError::Malformed(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes)
        .map_err(|e| AccessError::Configuration(format!("salt: {e}")))?;
    let salt = SaltString::encode_b64(&salt_bytes)?;
    let phc = Argon2::default()
        .hash_password(password.as_bytes(), &salt)?
        .to_string();
    Ok(phc)
}

/// `false` for a wrong password and for an unparsable stored hash alike.
pub fn verify_password(hash: &str, password: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Hashing is deliberately slow; keep it off the async workers.
pub async fn hash_password_blocking(password: String) -> Result<String, AccessError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| AccessError::Configuration(format!("hash task: {e}")))?
}

pub async fn verify_password_blocking(hash: String, password: String) -> Result<bool, AccessError> {
    tokio::task::spawn_blocking(move || verify_password(&hash, &password))
        .await
        .map_err(|e| AccessError::Configuration(format!("verify task: {e}")))
}
