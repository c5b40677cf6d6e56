//! Authentication error types.

use thiserror::Error;

use hortifruti_core::db::RepositoryError;
use hortifruti_core::password::PasswordError;

/// Errors that can occur during authentication operations.
///
/// Display strings are shown to customers as-is.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("Email inválido")]
    InvalidEmail(#[from] hortifruti_core::EmailError),

    /// Wrong password or unknown email.
    #[error("Credenciais inválidas")]
    InvalidCredentials,

    /// User not found (token for a deleted account).
    #[error("Usuário não encontrado")]
    UserNotFound,

    /// Email already registered.
    #[error("Email já cadastrado")]
    UserAlreadyExists,

    /// Password too weak.
    #[error("{0}")]
    WeakPassword(String),

    /// Password and confirmation differ.
    #[error("As senhas não coincidem")]
    PasswordMismatch,

    /// New password sent without the current one.
    #[error("Informe a senha atual")]
    CurrentPasswordRequired,

    /// Current password does not match.
    #[error("Senha atual incorreta")]
    WrongCurrentPassword,

    /// Name left blank.
    #[error("Dados incompletos")]
    MissingName,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}

impl From<RepositoryError> for AuthError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict(_) => Self::UserAlreadyExists,
            RepositoryError::NotFound => Self::UserNotFound,
            other => Self::Repository(other),
        }
    }
}

impl From<PasswordError> for AuthError {
    fn from(err: PasswordError) -> Self {
        match err {
            PasswordError::TooShort => Self::WeakPassword(err.to_string()),
            PasswordError::Mismatch => Self::InvalidCredentials,
            PasswordError::Hash => Self::PasswordHash,
        }
    }
}
