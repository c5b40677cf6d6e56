//! Admin authentication error types.

use thiserror::Error;

use hortifruti_core::db::RepositoryError;
use hortifruti_core::password::PasswordError;

/// Errors from staff login.
///
/// The first two display the same text so the login form does not reveal
/// whether an email belongs to a staff account.
#[derive(Debug, Error)]
pub enum AdminAuthError {
    /// Unknown email or wrong password.
    #[error("Email ou senha incorretos")]
    InvalidCredentials,

    /// Valid customer account without staff access.
    #[error("Email ou senha incorretos")]
    NotAdmin,

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("password hashing error")]
    PasswordHash,
}

impl From<PasswordError> for AdminAuthError {
    fn from(err: PasswordError) -> Self {
        match err {
            PasswordError::Mismatch | PasswordError::TooShort => Self::InvalidCredentials,
            PasswordError::Hash => Self::PasswordHash,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_admin_is_indistinguishable() {
        assert_eq!(
            AdminAuthError::NotAdmin.to_string(),
            AdminAuthError::InvalidCredentials.to_string()
        );
    }

    #[test]
    fn test_password_mismatch_maps_to_invalid_credentials() {
        assert!(matches!(
            AdminAuthError::from(PasswordError::Mismatch),
            AdminAuthError::InvalidCredentials
        ));
    }
}
