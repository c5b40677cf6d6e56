//! User repository for customers and staff.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;

use super::{RepositoryError, conflict_on_unique};
use crate::models::{CustomerSummary, User};
use crate::types::{Email, Price, UserId};

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: UserId,
    name: String,
    email: String,
    phone: Option<String>,
    is_admin: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: row.id,
            name: row.name,
            email,
            phone: row.phone,
            is_admin: row.is_admin,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserWithHashRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: String,
}

#[derive(Debug, sqlx::FromRow)]
struct CustomerRow {
    #[sqlx(flatten)]
    user: UserRow,
    order_count: i64,
    total_spent: Price,
    last_order_at: Option<DateTime<Utc>>,
}

const EMAIL_TAKEN: &str = "Email já cadastrado";

/// Repository for `shop.users`.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create a user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email is already registered.
    #[instrument(skip(self, password_hash), fields(email = %email))]
    pub async fn create(
        &self,
        name: &str,
        email: &Email,
        password_hash: &str,
        phone: Option<&str>,
        is_admin: bool,
    ) -> Result<User, RepositoryError> {
        let row: UserRow = sqlx::query_as(
            r"
            INSERT INTO shop.users (name, email, password_hash, phone, is_admin)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, email, phone, is_admin, created_at
            ",
        )
        .bind(name)
        .bind(email.as_str())
        .bind(password_hash)
        .bind(phone)
        .bind(is_admin)
        .fetch_one(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, EMAIL_TAKEN))?;

        row.try_into()
    }

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row: Option<UserRow> = sqlx::query_as(
            r"
            SELECT id, name, email, phone, is_admin, created_at
            FROM shop.users
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Get a user by email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let row: Option<UserRow> = sqlx::query_as(
            r"
            SELECT id, name, email, phone, is_admin, created_at
            FROM shop.users
            WHERE email = $1
            ",
        )
        .bind(email.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Get a user together with their password hash, for login.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_with_password(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let row: Option<UserWithHashRow> = sqlx::query_as(
            r"
            SELECT id, name, email, phone, is_admin, created_at, password_hash
            FROM shop.users
            WHERE email = $1
            ",
        )
        .bind(email.as_str())
        .fetch_optional(self.pool)
        .await?;

        match row {
            Some(r) => Ok(Some((User::try_from(r.user)?, r.password_hash))),
            None => Ok(None),
        }
    }

    /// Update name, email and phone.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the new email belongs to another
    /// account, `RepositoryError::NotFound` if the user does not exist.
    #[instrument(skip(self))]
    pub async fn update_profile(
        &self,
        id: UserId,
        name: &str,
        email: &Email,
        phone: Option<&str>,
    ) -> Result<User, RepositoryError> {
        let row: Option<UserRow> = sqlx::query_as(
            r"
            UPDATE shop.users
            SET name = $2, email = $3, phone = $4, updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, email, phone, is_admin, created_at
            ",
        )
        .bind(id)
        .bind(name)
        .bind(email.as_str())
        .bind(phone)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, EMAIL_TAKEN))?;

        row.ok_or(RepositoryError::NotFound)?.try_into()
    }

    /// Replace the password hash.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    #[instrument(skip(self, password_hash))]
    pub async fn update_password(
        &self,
        id: UserId,
        password_hash: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE shop.users SET password_hash = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Grant or revoke staff access.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    #[instrument(skip(self))]
    pub async fn set_admin(&self, id: UserId, is_admin: bool) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("UPDATE shop.users SET is_admin = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(is_admin)
                .execute(self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// List non-staff users with their order totals, newest first.
    ///
    /// Cancelled orders are excluded from `total_spent`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_customers(&self) -> Result<Vec<CustomerSummary>, RepositoryError> {
        let rows: Vec<CustomerRow> = sqlx::query_as(
            r"
            SELECT u.id, u.name, u.email, u.phone, u.is_admin, u.created_at,
                   COUNT(o.id) AS order_count,
                   COALESCE(SUM(o.total) FILTER (WHERE o.status <> 'cancelled'), 0)
                       AS total_spent,
                   MAX(o.created_at) AS last_order_at
            FROM shop.users u
            LEFT JOIN shop.orders o ON o.user_id = u.id
            WHERE NOT u.is_admin
            GROUP BY u.id
            ORDER BY u.created_at DESC
            ",
        )
        .fetch_all(self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<CustomerSummary, RepositoryError> {
                Ok(CustomerSummary {
                    user: User::try_from(row.user)?,
                    order_count: row.order_count,
                    total_spent: row.total_spent,
                    last_order_at: row.last_order_at,
                })
            })
            .collect()
    }

    /// Count customers (non-staff users).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_customers(&self) -> Result<i64, RepositoryError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM shop.users WHERE NOT is_admin")
                .fetch_one(self.pool)
                .await?;
        Ok(count)
    }
}
