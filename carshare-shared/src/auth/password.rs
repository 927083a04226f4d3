//! Password hashing with Argon2id
//!
//! Hashes are PHC strings with the parameters embedded, so verification keeps
//! working if the parameters below are raised later.
//!
//! - Memory: 64 MiB
//! - Iterations: 3
//! - Parallelism: 4
//!
//! # Example
//!
//! ```
//! use carshare_shared::auth::password::{hash_password, verify_password};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let hash = hash_password("Renter#2024")?;
//! assert!(verify_password("Renter#2024", &hash)?);
//! assert!(!verify_password("renter#2024", &hash)?);
//! # Ok(())
//! # }
//! ```

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, ParamsBuilder, Version,
};

pub const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("Failed to hash password: {0}")]
    HashError(String),

    #[error("Failed to verify password: {0}")]
    VerifyError(String),

    #[error("Invalid password hash format: {0}")]
    InvalidHash(String),

    /// Rejected by [`validate_password_strength`]
    #[error("{0}")]
    Weak(&'static str),
}

fn hasher() -> Result<Argon2<'static>, PasswordError> {
    let params = ParamsBuilder::new()
        .m_cost(65536)
        .t_cost(3)
        .p_cost(4)
        .output_len(32)
        .build()
        .map_err(|e| PasswordError::HashError(format!("Invalid parameters: {}", e)))?;

    Ok(Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params))
}

/// Hashes a password with a fresh random salt
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    let hash = hasher()?
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashError(e.to_string()))?;

    Ok(hash.to_string())
}

/// Verifies a password against a stored PHC hash in constant time
///
/// Returns `Ok(false)` for a wrong password and an error only for a hash
/// that cannot be parsed.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed = PasswordHash::new(hash).map_err(|e| PasswordError::InvalidHash(e.to_string()))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::VerifyError(e.to_string())),
    }
}

/// Requires at least 8 characters with an uppercase letter, a lowercase
/// letter, a digit and a special character
pub fn validate_password_strength(password: &str) -> Result<(), PasswordError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(PasswordError::Weak(
            "Password must be at least 8 characters long",
        ));
    }
    if !password.chars().any(char::is_uppercase) {
        return Err(PasswordError::Weak(
            "Password must contain at least one uppercase letter",
        ));
    }
    if !password.chars().any(char::is_lowercase) {
        return Err(PasswordError::Weak(
            "Password must contain at least one lowercase letter",
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(PasswordError::Weak("Password must contain at least one digit"));
    }
    if password.chars().all(char::is_alphanumeric) {
        return Err(PasswordError::Weak(
            "Password must contain at least one special character",
        ));
    }

    Ok(())
}
