//! Database access for the admin panel.
//!
//! The admin shares the `shop` schema with the storefront; repositories live
//! in `hortifruti_core::db`. Sessions are stored in `admin.session`.
//!
//! # Migrations
//!
//! ```bash
//! hrt-cli migrate
//! ```

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

pub use hortifruti_core::db::RepositoryError;

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(5)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
