//! JSON API under `/api`.
//!
//! Bearer tokens (`Authorization: Bearer <jwt>`) identify the caller; see
//! [`crate::middleware::ApiUser`]. Every error body is `{"error": "..."}`.
//!
//! ```text
//! GET    /api/health
//! GET    /api/products                 ?category_id&search&featured
//! GET    /api/products/{id}
//! GET    /api/categories
//! GET    /api/categories/{id}
//! POST   /api/users/register
//! POST   /api/users/login
//! GET    /api/users/profile
//! PUT    /api/users/update
//! GET    /api/orders                   own orders (admins: all)
//! POST   /api/orders
//! POST   /api/orders/sync              queued offline orders
//! GET    /api/orders/{id}
//! PUT    /api/orders/{id}/status       admin
//! GET    /api/order-items/{order_id}
//! PUT    /api/order-items/{item_id}    admin
//! DELETE /api/order-items/{item_id}    admin
//! ```

pub mod categories;
pub mod order_items;
pub mod orders;
pub mod products;
pub mod users;

use axum::{
    Json, Router,
    extract::rejection::JsonRejection,
    response::IntoResponse,
    routing::{get, post, put},
};
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::error::ApiError;
use crate::middleware::{api_rate_limiter, auth_rate_limiter};
use crate::state::AppState;

/// `GET /api/health`
pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Unwrap a JSON body, answering malformed or missing bodies with
/// 400 "Dados incompletos".
///
/// # Errors
///
/// Returns `ApiError::BadRequest` when the body was rejected.
pub fn body<T: DeserializeOwned>(
    payload: Result<Json<T>, JsonRejection>,
) -> Result<T, ApiError> {
    match payload {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => {
            tracing::debug!("Rejected API body: {rejection}");
            Err(ApiError::incomplete())
        }
    }
}

/// Trimmed non-empty string, or `None`.
#[must_use]
pub fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Create the API router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/products", get(products::index))
        .route("/products/{id}", get(products::show))
        .route("/categories", get(categories::index))
        .route("/categories/{id}", get(categories::show))
        .route(
            "/users/register",
            post(users::register).layer(auth_rate_limiter()),
        )
        .route("/users/login", post(users::login).layer(auth_rate_limiter()))
        .route("/users/profile", get(users::profile))
        .route("/users/update", put(users::update))
        .route("/orders", get(orders::index).post(orders::create))
        .route("/orders/sync", post(orders::sync))
        .route("/orders/{id}", get(orders::show))
        .route("/orders/{id}/status", put(orders::update_status))
        .route(
            "/order-items/{id}",
            get(order_items::index)
                .put(order_items::update)
                .delete(order_items::delete),
        )
        .layer(api_rate_limiter())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_present() {
        assert_eq!(present(Some("  a ")), Some("a"));
        assert_eq!(present(Some("   ")), None);
        assert_eq!(present(None), None);
    }
}
