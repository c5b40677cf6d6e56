//! Order detail page and the actions posted from it.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::Redirect,
};
use serde::Deserialize;
use tracing::instrument;

use hortifruti_core::db::{OrderRepository, RepositoryError, UserRepository};
use hortifruti_core::models::{Order, User};
use hortifruti_core::{OrderId, OrderItemId, OrderStatus, Price};

use crate::error::{AppError, Result};
use crate::middleware::RequireAdminAuth;
use crate::routes::{AdminUserView, FlashQuery, format_datetime, redirect_error, redirect_success};
use crate::state::AppState;

/// Order item row with an inline edit form.
#[derive(Debug, Clone)]
pub struct ItemView {
    pub id: i32,
    pub product_name: String,
    pub unit: String,
    pub quantity: i32,
    /// Unit price as a bare number for the edit input.
    pub price_input: String,
    pub price: String,
    pub subtotal: String,
}

/// Order detail for templates.
#[derive(Debug, Clone)]
pub struct OrderDetailView {
    pub id: i32,
    pub status_label: &'static str,
    pub status_badge: &'static str,
    pub address: String,
    pub zipcode: String,
    pub payment_label: &'static str,
    pub payment_details: String,
    pub coupon: Option<String>,
    pub subtotal: String,
    pub discount: Option<String>,
    pub delivery_fee: String,
    pub total: String,
    pub notes: Option<String>,
    pub created_at: String,
    pub items: Vec<ItemView>,
}

impl From<&Order> for OrderDetailView {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id.as_i32(),
            status_label: order.status.label(),
            status_badge: order.status.badge_class(),
            address: order.address.clone(),
            zipcode: order.zipcode.clone(),
            payment_label: order.payment_method.label(),
            payment_details: order.payment_details.clone(),
            coupon: order.coupon.clone(),
            subtotal: order.subtotal.to_string(),
            discount: (!order.discount.is_zero()).then(|| order.discount.to_string()),
            delivery_fee: order.delivery_fee.to_string(),
            total: order.total.to_string(),
            notes: order.notes.clone().filter(|n| !n.trim().is_empty()),
            created_at: format_datetime(&order.created_at),
            items: order
                .items
                .iter()
                .map(|item| ItemView {
                    id: item.id.as_i32(),
                    product_name: item.product_name.clone(),
                    unit: item.unit.clone(),
                    quantity: item.quantity,
                    price_input: item.price.plain(),
                    price: item.price.to_string(),
                    subtotal: item.subtotal().to_string(),
                })
                .collect(),
        }
    }
}

/// Status `<option>`.
#[derive(Debug, Clone)]
pub struct StatusOption {
    pub value: &'static str,
    pub label: &'static str,
    pub selected: bool,
}

/// Order detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/show.html")]
pub struct OrderDetailTemplate {
    pub admin_user: AdminUserView,
    pub current_path: String,
    pub order: OrderDetailView,
    pub customer: Option<User>,
    pub statuses: Vec<StatusOption>,
    pub success_message: Option<String>,
    pub error_message: Option<String>,
}

/// Order detail page handler.
#[instrument(skip(admin, state, flash))]
pub async fn show(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
    Query(flash): Query<FlashQuery>,
) -> Result<OrderDetailTemplate> {
    let order = OrderRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("pedido {id}")))?;
    let customer = UserRepository::new(state.pool())
        .get_by_id(order.user_id)
        .await?;

    Ok(OrderDetailTemplate {
        admin_user: AdminUserView::from(&admin),
        current_path: "/orders".to_string(),
        statuses: OrderStatus::ALL
            .into_iter()
            .map(|status| StatusOption {
                value: status.as_str(),
                label: status.label(),
                selected: status == order.status,
            })
            .collect(),
        order: OrderDetailView::from(&order),
        customer,
        success_message: flash.success,
        error_message: flash.error,
    })
}

/// Status change form.
#[derive(Debug, Deserialize)]
pub struct StatusForm {
    pub status: String,
}

/// Change the status of an order.
///
/// POST /orders/{id}/status
#[instrument(skip(admin, state), fields(admin_id = %admin.id))]
pub async fn update_status(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
    Form(form): Form<StatusForm>,
) -> Result<Redirect> {
    let path = format!("/orders/{id}");
    let Ok(status) = form.status.parse::<OrderStatus>() else {
        return Ok(redirect_error(&path, "Status inválido"));
    };

    match OrderRepository::new(state.pool())
        .update_status(id, status)
        .await
    {
        Ok(_) => Ok(redirect_success(
            &path,
            &format!("Status alterado para {}", status.label()),
        )),
        Err(RepositoryError::NotFound) => Err(AppError::NotFound(format!("pedido {id}"))),
        Err(e) => Err(e.into()),
    }
}

/// Item edit form. Blank fields keep their current value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemForm {
    #[serde(default)]
    pub quantity: String,
    #[serde(default)]
    pub price: String,
}

impl ItemForm {
    /// Parse the submitted quantity and unit price.
    ///
    /// # Errors
    ///
    /// Returns the message to show for a non-positive quantity or an
    /// unparseable price.
    pub fn parse(&self) -> std::result::Result<(Option<i32>, Option<Price>), &'static str> {
        let quantity = match self.quantity.trim() {
            "" => None,
            raw => match raw.parse::<i32>() {
                Ok(q) if q > 0 => Some(q),
                _ => return Err("Quantidade inválida"),
            },
        };
        let price = match self.price.trim() {
            "" => None,
            raw => Some(raw.parse::<Price>().map_err(|_| "Preço inválido")?),
        };
        Ok((quantity, price))
    }
}

/// Change quantity and/or unit price of an order item.
///
/// POST /orders/{id}/items/{item_id}
#[instrument(skip(admin, state), fields(admin_id = %admin.id))]
pub async fn update_item(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    Path((id, item_id)): Path<(OrderId, OrderItemId)>,
    Form(form): Form<ItemForm>,
) -> Result<Redirect> {
    let path = format!("/orders/{id}");
    let (quantity, price) = match form.parse() {
        Ok(parsed) => parsed,
        Err(message) => return Ok(redirect_error(&path, message)),
    };
    if quantity.is_none() && price.is_none() {
        return Ok(redirect_error(&path, "Nada para atualizar"));
    }

    match OrderRepository::new(state.pool())
        .update_item(id, item_id, quantity, price)
        .await
    {
        Ok(order) => {
            tracing::info!(order_id = %id, item_id = %item_id, total = %order.total, "order item updated");
            Ok(redirect_success(&path, "Item atualizado"))
        }
        Err(RepositoryError::NotFound) => Ok(redirect_error(&path, "Item não encontrado")),
        Err(RepositoryError::Conflict(_)) => Ok(redirect_error(&path, "Quantidade inválida")),
        Err(e) => Err(e.into()),
    }
}

/// Remove an item from an order.
///
/// POST /orders/{id}/items/{item_id}/delete
#[instrument(skip(admin, state), fields(admin_id = %admin.id))]
pub async fn delete_item(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    Path((id, item_id)): Path<(OrderId, OrderItemId)>,
) -> Result<Redirect> {
    let path = format!("/orders/{id}");
    match OrderRepository::new(state.pool())
        .delete_item(id, item_id)
        .await
    {
        Ok(order) => {
            tracing::info!(order_id = %id, item_id = %item_id, total = %order.total, "order item removed");
            Ok(redirect_success(&path, "Item removido"))
        }
        Err(RepositoryError::NotFound) => Ok(redirect_error(&path, "Item não encontrado")),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn form(quantity: &str, price: &str) -> ItemForm {
        ItemForm {
            quantity: quantity.to_string(),
            price: price.to_string(),
        }
    }

    #[test]
    fn test_item_form_blank_keeps_values() {
        assert_eq!(form("", " ").parse().unwrap(), (None, None));
    }

    #[test]
    fn test_item_form_parses_comma_price() {
        assert_eq!(
            form("3", "4,49").parse().unwrap(),
            (Some(3), Some(Price::from_cents(449)))
        );
    }

    #[test]
    fn test_item_form_rejects_non_positive_quantity() {
        assert_eq!(form("0", "").parse(), Err("Quantidade inválida"));
        assert_eq!(form("-2", "").parse(), Err("Quantidade inválida"));
        assert_eq!(form("dois", "").parse(), Err("Quantidade inválida"));
    }

    #[test]
    fn test_item_form_rejects_bad_price() {
        assert_eq!(form("", "abc").parse(), Err("Preço inválido"));
        assert_eq!(form("", "-1").parse(), Err("Preço inválido"));
    }
}
