//! `PostgreSQL` repositories over the `shop` schema.
//!
//! # Tables
//!
//! - `shop.users` - Customers and staff (`is_admin`)
//! - `shop.categories` - Product categories
//! - `shop.products` - Catalog with stock and discounts
//! - `shop.orders` / `shop.order_items` - Placed orders
//! - `shop.store_settings` - Single-row store configuration
//!
//! # Migrations
//!
//! Migrations live in the workspace `migrations/` directory and run via:
//! ```bash
//! cargo run -p hortifruti-cli -- migrate
//! ```
//!
//! Queries are built at runtime with `sqlx::query_as` and mapped through
//! private `FromRow` row types, so no database is needed at compile time.

pub mod categories;
pub mod orders;
pub mod products;
pub mod reports;
pub mod settings;
pub mod users;

use thiserror::Error;

pub use categories::CategoryRepository;
pub use orders::{NewOrder, NewOrderItem, OrderRepository, PlacedOrder};
pub use products::{ProductFilter, ProductInput, ProductRepository};
pub use reports::{DashboardCounters, ReportRepository, SalesByDay, StatusRevenue, TopProduct};
pub use settings::SettingsRepository;
pub use users::UserRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// Not enough stock to fulfil an order line.
    #[error("insufficient stock for {product}: {available} available, {requested} requested")]
    InsufficientStock {
        product: String,
        available: i32,
        requested: i32,
    },
}

/// Map unique violations to [`RepositoryError::Conflict`].
pub(crate) fn conflict_on_unique(e: sqlx::Error, message: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(message.to_owned());
    }
    RepositoryError::Database(e)
}

/// Escape `%` and `_` for use inside an `ILIKE` pattern.
pub(crate) fn like_pattern(search: &str) -> String {
    let escaped = search
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("maçã"), "%maçã%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[test]
    fn test_repository_error_display() {
        let err = RepositoryError::InsufficientStock {
            product: "Banana".to_owned(),
            available: 2,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "insufficient stock for Banana: 2 available, 5 requested"
        );
        assert_eq!(RepositoryError::NotFound.to_string(), "not found");
    }
}
