//! Order management route handlers: listing, detail, status changes and
//! item edits.

mod detail;
mod list;

pub use detail::{ItemForm, OrderDetailTemplate, OrderDetailView, StatusForm};
pub use list::{OrdersIndexTemplate, OrdersQuery};

use axum::{
    Router,
    routing::{get, post},
};

use hortifruti_core::models::OrderSummary;

use crate::routes::format_datetime;
use crate::state::AppState;

/// Order row shared by the order list and the dashboard.
#[derive(Debug, Clone)]
pub struct OrderRowView {
    pub id: i32,
    pub customer_name: String,
    pub status_label: &'static str,
    pub status_badge: &'static str,
    pub payment_label: &'static str,
    pub total: String,
    pub item_count: i64,
    pub created_at: String,
}

impl From<&OrderSummary> for OrderRowView {
    fn from(order: &OrderSummary) -> Self {
        Self {
            id: order.id.as_i32(),
            customer_name: order.customer_name.clone(),
            status_label: order.status.label(),
            status_badge: order.status.badge_class(),
            payment_label: order.payment_method.label(),
            total: order.total.to_string(),
            item_count: order.item_count,
            created_at: format_datetime(&order.created_at),
        }
    }
}

/// Build the orders router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list::index))
        .route("/orders/{id}", get(detail::show))
        .route("/orders/{id}/status", post(detail::update_status))
        .route("/orders/{id}/items/{item_id}", post(detail::update_item))
        .route(
            "/orders/{id}/items/{item_id}/delete",
            post(detail::delete_item),
        )
}
