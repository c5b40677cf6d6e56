//! Staff login.
//!
//! Staff are ordinary `shop.users` rows with `is_admin` set; accounts are
//! created or promoted with `hrt-cli admin create`.

mod error;

pub use error::AdminAuthError;

use sqlx::PgPool;
use tracing::instrument;

use hortifruti_core::Email;
use hortifruti_core::db::UserRepository;
use hortifruti_core::models::User;
use hortifruti_core::password::verify_password;

/// Admin authentication service.
pub struct AdminAuthService<'a> {
    users: UserRepository<'a>,
}

impl<'a> AdminAuthService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            users: UserRepository::new(pool),
        }
    }

    /// Check credentials and staff access.
    ///
    /// # Errors
    ///
    /// Returns `AdminAuthError::InvalidCredentials` for an unknown email or
    /// wrong password, `AdminAuthError::NotAdmin` for customer accounts.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AdminAuthError> {
        let email = Email::parse(email).map_err(|_| AdminAuthError::InvalidCredentials)?;

        let (user, password_hash) = self
            .users
            .get_with_password(&email)
            .await?
            .ok_or(AdminAuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        if !user.is_admin {
            tracing::warn!(user_id = %user.id, "customer account tried to log in to admin");
            return Err(AdminAuthError::NotAdmin);
        }

        Ok(user)
    }
}
