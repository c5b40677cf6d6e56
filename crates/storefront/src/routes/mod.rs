//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                         - Home: featured products + categories
//! GET  /products                 - Listing (?category_id, ?search, ?featured)
//! GET  /products/{id}            - Product detail
//! GET  /categories               - Category listing
//!
//! # Cart (session)
//! GET  /cart                     - Cart page
//! POST /cart/add                 - Add product
//! POST /cart/update              - Set quantity (<= 0 removes)
//! POST /cart/increment           - +1
//! POST /cart/decrement           - -1, never below 1
//! POST /cart/remove              - Remove product
//! POST /cart/clear               - Empty the cart
//! POST /cart/coupon              - Apply coupon
//! POST /cart/coupon/remove       - Remove coupon
//! GET  /cart/count               - Count badge fragment
//!
//! # Checkout (requires login)
//! GET  /checkout                 - Checkout form
//! POST /checkout                 - Place order
//!
//! # Auth
//! GET/POST /auth/login, GET/POST /auth/register, POST /auth/logout
//!
//! # Account (requires login)
//! GET/POST /account, GET /account/orders, GET /account/orders/{id}
//!
//! # PWA shell
//! GET  /manifest.webmanifest, GET /service-worker.js, GET /offline
//!
//! # JSON API
//! /api/...                       - see `api`
//! ```

pub mod account;
pub mod api;
pub mod auth;
pub mod cart;
pub mod categories;
pub mod checkout;
pub mod home;
pub mod products;
pub mod pwa;

use axum::{
    Router,
    extract::FromRequestParts,
    http::request::Parts,
    routing::{get, post},
};
use tower_sessions::Session;

use hortifruti_core::cart::Cart;

use crate::middleware::auth_rate_limiter;
use crate::models::{CurrentUser, session_keys};
use crate::state::AppState;

/// Data every page layout needs: the header greeting and the cart badge.
#[derive(Debug, Clone, Default)]
pub struct PageContext {
    pub user: Option<CurrentUser>,
    pub cart_count: i32,
}

impl PageContext {
    #[must_use]
    pub fn greeting(&self) -> Option<String> {
        self.user.as_ref().map(|u| format!("Olá, {}", u.first_name()))
    }
}

impl<S> FromRequestParts<S> for PageContext
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(session) = parts.extensions.get::<Session>() else {
            return Ok(Self::default());
        };

        let user = session
            .get::<CurrentUser>(session_keys::CURRENT_USER)
            .await
            .ok()
            .flatten();
        let cart_count = session
            .get::<Cart>(session_keys::CART)
            .await
            .ok()
            .flatten()
            .map_or(0, |cart| cart.item_count());

        Ok(Self { user, cart_count })
    }
}

/// Accept only local absolute paths as redirect targets.
#[must_use]
pub fn safe_redirect(target: Option<&str>, fallback: &'static str) -> String {
    match target {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => {
            path.to_string()
        }
        _ => fallback.to_string(),
    }
}

/// Parse an optional numeric query value; empty strings (blank selects)
/// mean "not set".
#[must_use]
pub fn parse_optional_id(value: Option<&str>) -> Option<i32> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse().ok())
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/{id}", get(products::show))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/increment", post(cart::increment))
        .route("/decrement", post(cart::decrement))
        .route("/remove", post(cart::remove))
        .route("/clear", post(cart::clear))
        .route("/coupon", post(cart::apply_coupon))
        .route("/coupon/remove", post(cart::remove_coupon))
        .route("/count", get(cart::count))
}

/// Create the auth routes router. Form submissions are rate limited.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/login",
            get(auth::login_page).merge(post(auth::login).layer(auth_rate_limiter())),
        )
        .route(
            "/register",
            get(auth::register_page).merge(post(auth::register).layer(auth_rate_limiter())),
        )
        .route("/logout", post(auth::logout))
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(account::index).post(account::update))
        .route("/orders", get(account::orders))
        .route("/orders/{id}", get(account::order_detail))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home::home))
        .nest("/products", product_routes())
        .route("/categories", get(categories::index))
        .nest("/cart", cart_routes())
        .route("/checkout", get(checkout::show).post(checkout::place))
        .nest("/account", account_routes())
        .nest("/auth", auth_routes())
        .merge(pwa::routes())
        .nest("/api", api::routes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_redirect() {
        assert_eq!(safe_redirect(Some("/checkout"), "/"), "/checkout");
        assert_eq!(safe_redirect(Some("//evil.example"), "/"), "/");
        assert_eq!(safe_redirect(Some("https://evil.example"), "/"), "/");
        assert_eq!(safe_redirect(Some("/\\evil.example"), "/"), "/");
        assert_eq!(safe_redirect(None, "/account"), "/account");
    }

    #[test]
    fn test_parse_optional_id() {
        assert_eq!(parse_optional_id(Some("3")), Some(3));
        assert_eq!(parse_optional_id(Some("")), None);
        assert_eq!(parse_optional_id(Some("abc")), None);
        assert_eq!(parse_optional_id(None), None);
    }

    #[test]
    fn test_greeting() {
        assert_eq!(PageContext::default().greeting(), None);
    }
}
