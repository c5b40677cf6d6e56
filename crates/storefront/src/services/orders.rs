//! Order placement shared by the checkout page and the JSON API.
//!
//! Validation order: duplicate `client_ref` short-circuits, then every
//! product must exist and be on sale, then the quote must satisfy the store
//! rules (minimum order, delivery area) and the cash change must cover the
//! total. Stock is checked again under row locks by the repository.

use std::collections::HashMap;

use sqlx::PgPool;
use thiserror::Error;
use tracing::instrument;
use uuid::Uuid;

use hortifruti_core::UserId;
use hortifruti_core::checkout::{
    CheckoutError, Coupon, DeliveryAddress, PaymentChoice, Quote, StoreRules,
};
use hortifruti_core::db::{
    NewOrder, NewOrderItem, OrderRepository, PlacedOrder, ProductRepository, RepositoryError,
};
use hortifruti_core::models::Order;
use hortifruti_core::ProductId;

/// Why an order could not be placed.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    #[error("Produto {0} não encontrado")]
    ProductNotFound(ProductId),

    #[error("Produto {0} indisponível")]
    ProductUnavailable(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// An order as submitted by a customer.
#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub items: Vec<NewOrderItem>,
    pub address: DeliveryAddress,
    pub payment: PaymentChoice,
    pub coupon: Option<Coupon>,
    pub notes: Option<String>,
    pub client_ref: Option<Uuid>,
}

/// Quote `request` against current catalog prices without placing it.
///
/// # Errors
///
/// Returns `OrderError::ProductNotFound` or `OrderError::ProductUnavailable`
/// for items that cannot be bought, and the `CheckoutError` raised by the
/// quote or payment checks.
pub async fn quote(
    pool: &PgPool,
    rules: &StoreRules,
    request: &OrderRequest,
) -> Result<Quote, OrderError> {
    if request.items.is_empty() {
        return Err(CheckoutError::EmptyCart.into());
    }

    let ids: Vec<ProductId> = request.items.iter().map(|i| i.product_id).collect();
    let products: HashMap<ProductId, _> = ProductRepository::new(pool)
        .get_many(&ids)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    let mut lines = Vec::with_capacity(request.items.len());
    for item in &request.items {
        let product = products
            .get(&item.product_id)
            .ok_or(OrderError::ProductNotFound(item.product_id))?;
        if !product.active {
            return Err(OrderError::ProductUnavailable(product.name.clone()));
        }
        lines.push((product.unit_price(), item.quantity));
    }

    let quote = Quote::compute(lines, request.coupon, rules);
    quote.check(&request.address.zipcode, rules)?;
    request.payment.check(quote.total)?;
    Ok(quote)
}

/// Place an order for `user_id`.
///
/// A `client_ref` that was already used by the same customer returns the
/// existing order as [`PlacedOrder::Duplicate`] without re-validating it.
///
/// # Errors
///
/// See [`quote`]; stock and concurrency failures come back as
/// `OrderError::Repository`.
#[instrument(skip(pool, rules, request), fields(user_id = %user_id, items = request.items.len()))]
pub async fn place_order(
    pool: &PgPool,
    rules: &StoreRules,
    user_id: UserId,
    request: OrderRequest,
) -> Result<PlacedOrder, OrderError> {
    let orders = OrderRepository::new(pool);

    if let Some(client_ref) = request.client_ref
        && let Some(existing) = orders.get_by_client_ref(user_id, client_ref).await?
    {
        return Ok(PlacedOrder::Duplicate(existing));
    }

    quote(pool, rules, &request).await?;

    let new_order = NewOrder {
        user_id,
        items: request.items,
        address: request.address,
        payment: request.payment,
        coupon: request.coupon,
        notes: request.notes.filter(|n| !n.trim().is_empty()),
        client_ref: request.client_ref,
    };

    Ok(orders.create(&new_order, rules).await?)
}

/// Whether `user` may see `order`.
#[must_use]
pub fn can_view(order: &Order, user_id: UserId, is_admin: bool) -> bool {
    is_admin || order.user_id == user_id
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use chrono::Utc;
    use hortifruti_core::{OrderId, OrderStatus, PaymentMethod, Price};

    fn order(user_id: i32) -> Order {
        Order {
            id: OrderId::new(1),
            user_id: UserId::new(user_id),
            status: OrderStatus::Pending,
            address: "Rua A, 1 - Centro, São Paulo - 01310-100".to_string(),
            zipcode: "01310-100".to_string(),
            payment_method: PaymentMethod::Pix,
            payment_details: "pix".to_string(),
            coupon: None,
            subtotal: Price::from_cents(2500),
            discount: Price::ZERO,
            delivery_fee: Price::from_cents(599),
            total: Price::from_cents(3099),
            notes: None,
            client_ref: None,
            created_at: Utc::now(),
            items: Vec::new(),
        }
    }

    #[test]
    fn test_can_view_own_order() {
        assert!(can_view(&order(3), UserId::new(3), false));
    }

    #[test]
    fn test_cannot_view_other_customers_order() {
        assert!(!can_view(&order(3), UserId::new(4), false));
    }

    #[test]
    fn test_admin_can_view_any_order() {
        assert!(can_view(&order(3), UserId::new(1), true));
    }

    #[test]
    fn test_product_not_found_message() {
        let err = OrderError::ProductNotFound(ProductId::new(42));
        assert_eq!(err.to_string(), "Produto 42 não encontrado");
    }

    #[test]
    fn test_checkout_error_is_transparent() {
        let err = OrderError::from(CheckoutError::EmptyCart);
        assert_eq!(err.to_string(), CheckoutError::EmptyCart.to_string());
    }
}
