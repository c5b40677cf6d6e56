//! Staff account management.
//!
//! Staff are `shop.users` rows with `is_admin` set. Creating an account for
//! an email that is already registered promotes that user instead; the
//! existing password is kept.

use thiserror::Error;

use hortifruti_core::Email;
use hortifruti_core::db::{RepositoryError, UserRepository};
use hortifruti_core::password::{PasswordError, hash_password, validate_password};

use super::{ConnectError, connect};

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    #[error("Name cannot be empty")]
    MissingName,

    #[error("Invalid password: {0}")]
    Password(#[from] PasswordError),
}

/// Validate the arguments before touching the database.
fn validate(email: &str, name: &str, password: &str) -> Result<Email, AdminError> {
    let email = Email::parse(email).map_err(|_| AdminError::InvalidEmail(email.to_owned()))?;
    if name.trim().is_empty() {
        return Err(AdminError::MissingName);
    }
    validate_password(password)?;
    Ok(email)
}

/// Create a staff account or promote the existing user.
///
/// # Errors
///
/// Returns an error for invalid arguments or database failures.
pub async fn create_user(email: &str, name: &str, password: &str) -> Result<(), AdminError> {
    let email = validate(email, name, password)?;

    let pool = connect().await?;
    let users = UserRepository::new(&pool);

    match users.get_by_email(&email).await? {
        Some(user) if user.is_admin => {
            tracing::info!(user_id = %user.id, "User is already an admin");
        }
        Some(user) => {
            users.set_admin(user.id, true).await?;
            tracing::info!(user_id = %user.id, %email, "Existing user promoted to admin");
            tracing::warn!("Password unchanged for promoted user");
        }
        None => {
            let password_hash = hash_password(password)?;
            let user = users
                .create(name.trim(), &email, &password_hash, None, true)
                .await?;
            tracing::info!(user_id = %user.id, %email, "Admin user created");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_arguments() {
        assert!(validate("Gerente@Hortifruti.com.br", "Gerente", "senha-forte").is_ok());
        assert!(matches!(
            validate("gerente", "Gerente", "senha-forte"),
            Err(AdminError::InvalidEmail(_))
        ));
        assert!(matches!(
            validate("gerente@hortifruti.com.br", " ", "senha-forte"),
            Err(AdminError::MissingName)
        ));
        assert!(matches!(
            validate("gerente@hortifruti.com.br", "Gerente", "curta"),
            Err(AdminError::Password(PasswordError::TooShort))
        ));
    }
}
