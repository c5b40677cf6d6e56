//! Order item endpoints. Changes recompute the order totals.

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use hortifruti_core::db::{OrderRepository, RepositoryError};
use hortifruti_core::{OrderId, OrderItemId, Price};

use crate::error::ApiError;
use crate::middleware::ApiUser;
use crate::routes::api::body;
use crate::routes::api::orders::accessible_order;
use crate::state::AppState;

fn item_not_found() -> ApiError {
    ApiError::NotFound("Item de pedido não encontrado".to_string())
}

fn item_error(err: RepositoryError) -> ApiError {
    match err {
        RepositoryError::NotFound => item_not_found(),
        RepositoryError::Conflict(_) => ApiError::BadRequest("Quantidade inválida".to_string()),
        other => other.into(),
    }
}

#[derive(Debug, Deserialize)]
pub struct ItemUpdateRequest {
    pub quantity: Option<i32>,
    pub price: Option<Price>,
}

/// `GET /api/order-items/{order_id}`
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    caller: ApiUser,
    Path(order_id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    let order = accessible_order(&state, caller, OrderId::new(order_id)).await?;
    Ok(Json(json!({ "order_items": order.items })))
}

/// `PUT /api/order-items/{item_id}` - admin only.
#[instrument(skip(state, payload))]
pub async fn update(
    State(state): State<AppState>,
    caller: ApiUser,
    Path(item_id): Path<i32>,
    payload: Result<Json<ItemUpdateRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    caller.require_admin()?;
    let request = body(payload)?;
    if request.quantity.is_none() && request.price.is_none() {
        return Err(ApiError::incomplete());
    }

    let item_id = OrderItemId::new(item_id);
    let repo = OrderRepository::new(state.pool());
    let order_id = repo
        .order_of_item(item_id)
        .await?
        .ok_or_else(item_not_found)?;

    let order = repo
        .update_item(order_id, item_id, request.quantity, request.price)
        .await
        .map_err(item_error)?;
    let item = order
        .items
        .into_iter()
        .find(|item| item.id == item_id)
        .ok_or_else(item_not_found)?;

    Ok(Json(json!({
        "message": "Item de pedido atualizado com sucesso",
        "order_item": item,
    })))
}

/// `DELETE /api/order-items/{item_id}` - admin only.
#[instrument(skip(state))]
pub async fn delete(
    State(state): State<AppState>,
    caller: ApiUser,
    Path(item_id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    caller.require_admin()?;

    let item_id = OrderItemId::new(item_id);
    let repo = OrderRepository::new(state.pool());
    let order_id = repo
        .order_of_item(item_id)
        .await?
        .ok_or_else(item_not_found)?;
    repo.delete_item(order_id, item_id)
        .await
        .map_err(item_error)?;

    Ok(Json(json!({ "message": "Item de pedido excluído com sucesso" })))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use axum::http::StatusCode;

    #[test]
    fn test_update_request_rejects_negative_price() {
        let parsed = serde_json::from_str::<ItemUpdateRequest>(r#"{"price": "-10.00"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_update_request_rounds_price_to_cents() {
        let request: ItemUpdateRequest =
            serde_json::from_str(r#"{"quantity": 2, "price": "1.999"}"#).unwrap();
        assert_eq!(request.quantity, Some(2));
        assert_eq!(request.price, Some(Price::from_cents(200)));
    }

    #[test]
    fn test_item_errors() {
        let err = item_error(RepositoryError::NotFound);
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "Item de pedido não encontrado");

        let err = item_error(RepositoryError::Conflict("invalid quantity 0".to_string()));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
