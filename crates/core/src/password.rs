//! Password hashing with Argon2id.
//!
//! Shared by the storefront (customer login), the admin panel (staff login)
//! and the CLI (creating staff accounts and seed users).

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Errors from password validation and hashing.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PasswordError {
    /// Password shorter than [`MIN_PASSWORD_LENGTH`].
    #[error("A senha deve ter pelo menos {MIN_PASSWORD_LENGTH} caracteres")]
    TooShort,

    /// Password does not match the stored hash (or the hash is unreadable).
    #[error("invalid credentials")]
    Mismatch,

    /// Hashing failed.
    #[error("password hashing error")]
    Hash,
}

/// Validate password meets requirements.
///
/// # Errors
///
/// Returns [`PasswordError::TooShort`] for passwords under eight characters.
pub fn validate_password(password: &str) -> Result<(), PasswordError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(PasswordError::TooShort);
    }
    Ok(())
}

/// Hash a password using Argon2id with a random salt.
///
/// # Errors
///
/// Returns [`PasswordError::Hash`] if Argon2 fails.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| PasswordError::Hash)
}

/// Verify a password against a PHC-format hash.
///
/// # Errors
///
/// Returns [`PasswordError::Mismatch`] if the password is wrong or the hash
/// cannot be parsed.
pub fn verify_password(password: &str, hash: &str) -> Result<(), PasswordError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| PasswordError::Mismatch)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| PasswordError::Mismatch)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_then_verify() {
        let hash = hash_password("cliente123").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("cliente123", &hash).is_ok());
        assert_eq!(
            verify_password("cliente124", &hash),
            Err(PasswordError::Mismatch)
        );
    }

    #[test]
    fn test_hashes_are_salted() {
        assert_ne!(
            hash_password("admin123").unwrap(),
            hash_password("admin123").unwrap()
        );
    }

    #[test]
    fn test_plaintext_hash_never_verifies() {
        // Legacy rows stored plaintext passwords.
        assert_eq!(
            verify_password("admin123", "admin123"),
            Err(PasswordError::Mismatch)
        );
    }

    #[test]
    fn test_validate_password_length() {
        assert_eq!(validate_password("1234567"), Err(PasswordError::TooShort));
        assert!(validate_password("12345678").is_ok());
        // Counted in characters, not bytes.
        assert_eq!(validate_password("maçã123"), Err(PasswordError::TooShort));
    }
}
