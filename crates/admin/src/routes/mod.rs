//! HTTP route handlers for admin.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health, /health/ready          - Health checks (see lib.rs)
//!
//! # Auth (is_admin accounts only)
//! GET  /auth/login                     - Login page
//! POST /auth/login                     - Check credentials
//! POST /auth/logout                    - Logout
//!
//! # Dashboard
//! GET  /                               - Counters + 5 recent orders
//!
//! # Catalog
//! GET  /products, /products/new        - List, creation form
//! POST /products                       - Create
//! GET  /products/{id}/edit             - Edit form
//! POST /products/{id}                  - Update
//! POST /products/{id}/delete           - Delete
//! GET  /categories                     - List + creation form
//! POST /categories                     - Create
//! GET  /categories/{id}/edit           - Edit form
//! POST /categories/{id}                - Update
//! POST /categories/{id}/delete         - Delete (refused while products use it)
//!
//! # Orders
//! GET  /orders[?status]                - List
//! GET  /orders/{id}                    - Detail
//! POST /orders/{id}/status             - Change status
//! POST /orders/{id}/items/{item_id}    - Edit quantity / unit price
//! POST /orders/{id}/items/{item_id}/delete
//!
//! # Other
//! GET  /customers                      - Customers with order totals
//! GET  /reports[?days=30]              - Sales reports
//! GET  /settings, POST /settings       - Store settings
//! ```
//!
//! Forms post back and redirect with `?success=` or `?error=` messages.

pub mod auth;
pub mod categories;
pub mod customers;
pub mod dashboard;
pub mod orders;
pub mod products;
pub mod reports;
pub mod settings;

use axum::{Router, response::Redirect};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::models::CurrentAdmin;
use crate::state::AppState;

/// Admin user view for templates.
#[derive(Debug, Clone)]
pub struct AdminUserView {
    pub name: String,
    pub email: String,
}

impl From<&CurrentAdmin> for AdminUserView {
    fn from(admin: &CurrentAdmin) -> Self {
        Self {
            name: admin.name.clone(),
            email: admin.email.to_string(),
        }
    }
}

/// Messages carried across a post/redirect/get cycle.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FlashQuery {
    pub success: Option<String>,
    pub error: Option<String>,
}

/// Redirect to `path` with a success message.
#[must_use]
pub fn redirect_success(path: &str, message: &str) -> Redirect {
    Redirect::to(&format!("{path}?success={}", urlencoding::encode(message)))
}

/// Redirect to `path` with an error message.
#[must_use]
pub fn redirect_error(path: &str, message: &str) -> Redirect {
    Redirect::to(&format!("{path}?error={}", urlencoding::encode(message)))
}

/// `dd/mm/yyyy hh:mm`, as shown across the panel.
#[must_use]
pub fn format_datetime(at: &DateTime<Utc>) -> String {
    at.format("%d/%m/%Y %H:%M").to_string()
}

/// Build the full admin router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(auth::router())
        .merge(dashboard::router())
        .merge(products::router())
        .merge(categories::router())
        .merge(orders::router())
        .merge(customers::router())
        .merge(reports::router())
        .merge(settings::router())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use axum::http::header;
    use axum::response::IntoResponse;
    use chrono::TimeZone;

    #[test]
    fn test_redirect_encodes_message() {
        let response = redirect_error("/categories", "Categoria em uso").into_response();
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "/categories?error=Categoria%20em%20uso"
        );
    }

    #[test]
    fn test_format_datetime() {
        let at = Utc.with_ymd_and_hms(2025, 3, 9, 14, 5, 0).unwrap();
        assert_eq!(format_datetime(&at), "09/03/2025 14:05");
    }
}
