//! Authentication service.
//!
//! Email and password accounts stored in `shop.users`, shared by the HTML
//! session login and the JSON API.

mod error;

pub use error::AuthError;

use sqlx::PgPool;
use tracing::instrument;

use hortifruti_core::db::UserRepository;
use hortifruti_core::models::User;
use hortifruti_core::password::{PasswordError, hash_password, validate_password, verify_password};
use hortifruti_core::{Email, UserId};

/// Fields accepted when registering.
#[derive(Debug, Clone)]
pub struct Registration<'r> {
    pub name: &'r str,
    pub email: &'r str,
    pub password: &'r str,
    /// Confirmation typed by the customer; the API passes `None`.
    pub password_confirm: Option<&'r str>,
    pub phone: Option<&'r str>,
}

/// Profile changes. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate<'r> {
    pub name: Option<&'r str>,
    pub email: Option<&'r str>,
    pub phone: Option<&'r str>,
    pub password: Option<&'r str>,
    pub password_confirm: Option<&'r str>,
    /// Required whenever `password` is set.
    pub current_password: Option<&'r str>,
}

/// Validate a password change and hash the new password.
///
/// # Errors
///
/// `AuthError::CurrentPasswordRequired` or `AuthError::WrongCurrentPassword`
/// unless `current` matches `stored_hash`, then the usual new-password checks.
fn new_password_hash(
    password: &str,
    confirm: Option<&str>,
    current: Option<&str>,
    stored_hash: &str,
) -> Result<String, AuthError> {
    let current = current
        .filter(|p| !p.is_empty())
        .ok_or(AuthError::CurrentPasswordRequired)?;
    verify_password(current, stored_hash).map_err(|e| match e {
        PasswordError::Mismatch => AuthError::WrongCurrentPassword,
        other => other.into(),
    })?;

    validate_password(password)?;
    if let Some(confirm) = confirm
        && confirm != password
    {
        return Err(AuthError::PasswordMismatch);
    }
    Ok(hash_password(password)?)
}

/// Authentication service.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
}

impl<'a> AuthService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            users: UserRepository::new(pool),
        }
    }

    /// Register a new customer.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MissingName`, `AuthError::InvalidEmail`,
    /// `AuthError::WeakPassword` or `AuthError::PasswordMismatch` for bad
    /// input, `AuthError::UserAlreadyExists` if the email is taken.
    #[instrument(skip(self, registration), fields(email = %registration.email))]
    pub async fn register(&self, registration: &Registration<'_>) -> Result<User, AuthError> {
        let name = registration.name.trim();
        if name.is_empty() {
            return Err(AuthError::MissingName);
        }
        let email = Email::parse(registration.email)?;

        validate_password(registration.password)?;
        if let Some(confirm) = registration.password_confirm
            && confirm != registration.password
        {
            return Err(AuthError::PasswordMismatch);
        }

        let password_hash = hash_password(registration.password)?;
        let phone = registration
            .phone
            .map(str::trim)
            .filter(|p| !p.is_empty());

        let user = self
            .users
            .create(name, &email, &password_hash, phone, false)
            .await?;

        tracing::info!(user_id = %user.id, "customer registered");
        Ok(user)
    }

    /// Check email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email is unknown or the
    /// password is wrong.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let (user, password_hash) = self
            .users
            .get_with_password(&email)
            .await
            .map_err(AuthError::Repository)?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        Ok(user)
    }

    /// Load a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the account no longer exists.
    pub async fn user(&self, id: UserId) -> Result<User, AuthError> {
        self.users
            .get_by_id(id)
            .await
            .map_err(AuthError::Repository)?
            .ok_or(AuthError::UserNotFound)
    }

    /// Apply profile changes and, if given, a new password.
    ///
    /// # Errors
    ///
    /// Returns validation errors as for [`Self::register`],
    /// `AuthError::WrongCurrentPassword` for a password change without the
    /// right current password and `AuthError::UserAlreadyExists` when the
    /// new email is taken.
    #[instrument(skip(self, update))]
    pub async fn update_profile(
        &self,
        id: UserId,
        update: &ProfileUpdate<'_>,
    ) -> Result<User, AuthError> {
        let current = self.user(id).await?;

        let name = match update.name.map(str::trim) {
            Some("") => return Err(AuthError::MissingName),
            Some(name) => name.to_string(),
            None => current.name.clone(),
        };
        let email = match update.email {
            Some(email) => Email::parse(email)?,
            None => current.email.clone(),
        };
        let phone = match update.phone.map(str::trim) {
            Some("") => None,
            Some(phone) => Some(phone.to_string()),
            None => current.phone.clone(),
        };

        if let Some(password) = update.password.filter(|p| !p.is_empty()) {
            let (_, stored_hash) = self
                .users
                .get_with_password(&current.email)
                .await?
                .ok_or(AuthError::UserNotFound)?;
            let password_hash = new_password_hash(
                password,
                update.password_confirm,
                update.current_password,
                &stored_hash,
            )?;
            self.users.update_password(id, &password_hash).await?;
            tracing::info!(user_id = %id, "password changed");
        }

        let user = self
            .users
            .update_profile(id, &name, &email, phone.as_deref())
            .await?;
        Ok(user)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use hortifruti_core::db::RepositoryError;

    #[test]
    fn test_password_change_requires_current_password() {
        let stored = hash_password("senha-antiga").unwrap();
        assert!(matches!(
            new_password_hash("senha-nova-1", None, None, &stored),
            Err(AuthError::CurrentPasswordRequired)
        ));
        assert!(matches!(
            new_password_hash("senha-nova-1", None, Some(""), &stored),
            Err(AuthError::CurrentPasswordRequired)
        ));
    }

    #[test]
    fn test_password_change_rejects_wrong_current_password() {
        let stored = hash_password("senha-antiga").unwrap();
        let err = new_password_hash("senha-nova-1", None, Some("chute-errado"), &stored).unwrap_err();
        assert!(matches!(err, AuthError::WrongCurrentPassword));
        assert_eq!(err.to_string(), "Senha atual incorreta");
    }

    #[test]
    fn test_password_change_with_current_password() {
        let stored = hash_password("senha-antiga").unwrap();
        assert!(matches!(
            new_password_hash("curta", None, Some("senha-antiga"), &stored),
            Err(AuthError::WeakPassword(_))
        ));
        assert!(matches!(
            new_password_hash("senha-nova-1", Some("outra"), Some("senha-antiga"), &stored),
            Err(AuthError::PasswordMismatch)
        ));

        let hash = new_password_hash(
            "senha-nova-1",
            Some("senha-nova-1"),
            Some("senha-antiga"),
            &stored,
        )
        .unwrap();
        assert!(verify_password("senha-nova-1", &hash).is_ok());
    }

    #[test]
    fn test_conflict_maps_to_user_already_exists() {
        let err = AuthError::from(RepositoryError::Conflict("Email já cadastrado".to_string()));
        assert!(matches!(err, AuthError::UserAlreadyExists));
        assert_eq!(err.to_string(), "Email já cadastrado");
    }

    #[test]
    fn test_password_errors_map() {
        assert!(matches!(
            AuthError::from(PasswordError::Mismatch),
            AuthError::InvalidCredentials
        ));
        let weak = AuthError::from(PasswordError::TooShort);
        assert_eq!(
            weak.to_string(),
            "A senha deve ter pelo menos 8 caracteres"
        );
    }

    #[test]
    fn test_messages_are_portuguese() {
        assert_eq!(AuthError::InvalidCredentials.to_string(), "Credenciais inválidas");
        assert_eq!(AuthError::UserNotFound.to_string(), "Usuário não encontrado");
    }
}
