//! Order endpoints, including the offline sync batch.

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::instrument;
use uuid::Uuid;

use hortifruti_core::checkout::{CheckoutError, Coupon, DeliveryAddress, PaymentChoice};
use hortifruti_core::db::{NewOrderItem, OrderRepository, PlacedOrder};
use hortifruti_core::models::Order;
use hortifruti_core::{OrderId, OrderStatus, PaymentMethod, Price, ProductId};

use crate::error::ApiError;
use crate::middleware::ApiUser;
use crate::routes::api::{body, present};
use crate::services::orders::{OrderError, OrderRequest, can_view, place_order};
use crate::state::AppState;

/// Largest batch accepted by `/api/orders/sync`.
pub const MAX_SYNC_BATCH: usize = 50;

#[derive(Debug, Clone, Deserialize)]
pub struct ItemPayload {
    pub product_id: Option<i32>,
    pub quantity: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddressPayload {
    pub street: Option<String>,
    pub number: Option<String>,
    pub complement: Option<String>,
    pub neighborhood: Option<String>,
    pub city: Option<String>,
    pub zipcode: Option<String>,
}

/// Order as posted by clients.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderPayload {
    #[serde(default)]
    pub items: Vec<ItemPayload>,
    pub address: Option<AddressPayload>,
    pub payment_method: Option<String>,
    pub change_for: Option<Price>,
    pub coupon: Option<String>,
    pub notes: Option<String>,
    pub client_ref: Option<Uuid>,
}

impl OrderPayload {
    /// Validate the payload into an order request.
    ///
    /// # Errors
    ///
    /// 400 "Dados incompletos" for missing items, address or payment
    /// method; the `CheckoutError` text for invalid values.
    pub fn into_request(self) -> Result<OrderRequest, ApiError> {
        if self.items.is_empty() {
            return Err(ApiError::incomplete());
        }
        let items = self
            .items
            .iter()
            .map(|item| match (item.product_id, item.quantity) {
                (Some(product_id), Some(quantity)) if quantity > 0 => Ok(NewOrderItem {
                    product_id: ProductId::new(product_id),
                    quantity,
                }),
                _ => Err(ApiError::incomplete()),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let address = self.address.ok_or_else(ApiError::incomplete)?;
        let address = DeliveryAddress::new(
            address.street.as_deref().unwrap_or_default(),
            address.number.as_deref().unwrap_or_default(),
            address.complement.as_deref(),
            address.neighborhood.as_deref().unwrap_or_default(),
            address.city.as_deref().unwrap_or_default(),
            address.zipcode.as_deref().unwrap_or_default(),
        )?;

        let method: PaymentMethod = present(self.payment_method.as_deref())
            .ok_or_else(ApiError::incomplete)?
            .parse()
            .map_err(|_| ApiError::BadRequest("Forma de pagamento inválida".to_string()))?;

        let coupon = match present(self.coupon.as_deref()) {
            Some(code) => Some(Coupon::lookup(code).ok_or(CheckoutError::InvalidCoupon)?),
            None => None,
        };

        Ok(OrderRequest {
            items,
            address,
            payment: PaymentChoice::new(method, self.change_for),
            coupon,
            notes: self.notes,
            client_ref: self.client_ref,
        })
    }
}

impl From<OrderError> for ApiError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::Checkout(e) => e.into(),
            OrderError::ProductNotFound(_) => Self::NotFound(err.to_string()),
            OrderError::ProductUnavailable(_) => Self::Conflict(err.to_string()),
            OrderError::Repository(e) => e.into(),
        }
    }
}

fn order_not_found() -> ApiError {
    ApiError::NotFound("Pedido não encontrado".to_string())
}

/// Load an order the caller may see.
///
/// # Errors
///
/// 404 when the order does not exist, 403 when it belongs to someone else.
pub async fn accessible_order(
    state: &AppState,
    caller: ApiUser,
    id: OrderId,
) -> Result<Order, ApiError> {
    let order = OrderRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(order_not_found)?;
    if !can_view(&order, caller.id, caller.is_admin) {
        return Err(ApiError::denied());
    }
    Ok(order)
}

/// `GET /api/orders` - own orders; admins see every order.
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    caller: ApiUser,
) -> Result<impl IntoResponse, ApiError> {
    let repo = OrderRepository::new(state.pool());
    let orders = if caller.is_admin {
        repo.list_all().await?
    } else {
        repo.list_for_user(caller.id).await?
    };
    Ok(Json(json!({ "orders": orders })))
}

/// `GET /api/orders/{id}`
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    caller: ApiUser,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    let order = accessible_order(&state, caller, OrderId::new(id)).await?;
    Ok(Json(json!({ "order": order })))
}

/// `POST /api/orders`
///
/// A repeated `client_ref` answers 200 with the existing order instead of
/// 201.
#[instrument(skip(state, payload))]
pub async fn create(
    State(state): State<AppState>,
    caller: ApiUser,
    payload: Result<Json<OrderPayload>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let request = body(payload)?.into_request()?;
    let settings = state.catalog().settings(state.pool()).await?;

    let placed = place_order(state.pool(), &settings.rules(), caller.id, request).await?;
    let status = if placed.is_new() {
        state.catalog().invalidate();
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((
        status,
        Json(json!({
            "message": "Pedido criado com sucesso",
            "order": placed.order(),
        })),
    ))
}

/// Queued offline orders.
#[derive(Debug, Deserialize)]
pub struct SyncRequest {
    #[serde(default)]
    pub orders: Vec<OrderPayload>,
}

/// Outcome of one queued order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Created,
    Duplicate,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncResult {
    pub client_ref: Option<Uuid>,
    pub status: SyncStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<OrderId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SyncResult {
    fn placed(client_ref: Option<Uuid>, placed: &PlacedOrder) -> Self {
        Self {
            client_ref,
            status: if placed.is_new() {
                SyncStatus::Created
            } else {
                SyncStatus::Duplicate
            },
            order_id: Some(placed.order().id),
            error: None,
        }
    }

    fn failed(client_ref: Option<Uuid>, err: &ApiError) -> Self {
        let message = match err {
            ApiError::Internal(_) => "Erro interno do servidor".to_string(),
            other => other.to_string(),
        };
        Self {
            client_ref,
            status: SyncStatus::Failed,
            order_id: None,
            error: Some(message),
        }
    }
}

/// `POST /api/orders/sync`
///
/// Each order must carry a `client_ref`; orders already synced come back as
/// `duplicate`, so clients may resend the whole queue. One failing order
/// does not stop the rest.
#[instrument(skip(state, payload))]
pub async fn sync(
    State(state): State<AppState>,
    caller: ApiUser,
    payload: Result<Json<SyncRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let request = body(payload)?;
    if request.orders.is_empty() {
        return Err(ApiError::incomplete());
    }
    if request.orders.len() > MAX_SYNC_BATCH {
        return Err(ApiError::BadRequest(format!(
            "Máximo de {MAX_SYNC_BATCH} pedidos por sincronização"
        )));
    }

    let settings = state.catalog().settings(state.pool()).await?;
    let rules = settings.rules();
    let mut results = Vec::with_capacity(request.orders.len());
    let mut created = 0usize;

    for payload in request.orders {
        let client_ref = payload.client_ref;
        if client_ref.is_none() {
            results.push(SyncResult::failed(None, &ApiError::incomplete()));
            continue;
        }

        let outcome = match payload.into_request() {
            Ok(order) => place_order(state.pool(), &rules, caller.id, order)
                .await
                .map_err(ApiError::from),
            Err(err) => Err(err),
        };

        match outcome {
            Ok(placed) => {
                if placed.is_new() {
                    created += 1;
                }
                results.push(SyncResult::placed(client_ref, &placed));
            }
            Err(err) => {
                tracing::warn!(?client_ref, error = %err, "offline order rejected");
                results.push(SyncResult::failed(client_ref, &err));
            }
        }
    }

    if created > 0 {
        state.catalog().invalidate();
    }
    tracing::info!(user_id = %caller.id, created, total = results.len(), "orders synced");

    Ok(Json(json!({ "results": results })))
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: Option<String>,
}

/// Parse a status from a request body.
///
/// # Errors
///
/// 400 "Status não fornecido" or "Status inválido".
pub fn parse_status(raw: Option<&str>) -> Result<OrderStatus, ApiError> {
    present(raw)
        .ok_or_else(|| ApiError::BadRequest("Status não fornecido".to_string()))?
        .parse()
        .map_err(|_| ApiError::BadRequest("Status inválido".to_string()))
}

/// `PUT /api/orders/{id}/status` - admin only.
#[instrument(skip(state, payload))]
pub async fn update_status(
    State(state): State<AppState>,
    caller: ApiUser,
    Path(id): Path<i32>,
    payload: Result<Json<StatusRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    caller.require_admin()?;
    let status = parse_status(body(payload)?.status.as_deref())?;

    let order = OrderRepository::new(state.pool())
        .update_status(OrderId::new(id), status)
        .await
        .map_err(|e| match e {
            hortifruti_core::db::RepositoryError::NotFound => order_not_found(),
            other => other.into(),
        })?;

    Ok(Json(json!({
        "message": "Status do pedido atualizado com sucesso",
        "order": order,
    })))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn payload() -> OrderPayload {
        serde_json::from_value(json!({
            "items": [{ "product_id": 1, "quantity": 3 }],
            "address": {
                "street": "Rua das Frutas",
                "number": "123",
                "neighborhood": "Centro",
                "city": "São Paulo",
                "zipcode": "01310-100"
            },
            "payment_method": "money",
            "change_for": "100.00",
            "coupon": "frete",
            "client_ref": "8d6f1d1e-0a57-4c33-9f0a-3f3b8f0c2a11"
        }))
        .unwrap()
    }

    #[test]
    fn test_payload_into_request() {
        let request = payload().into_request().unwrap();
        assert_eq!(request.items.len(), 1);
        assert_eq!(request.payment.method, PaymentMethod::Cash);
        assert_eq!(request.payment.change_for, Some(Price::from_cents(10_000)));
        assert_eq!(request.coupon, Some(Coupon::Frete));
        assert!(request.client_ref.is_some());
    }

    #[test]
    fn test_missing_address_is_incomplete() {
        let mut p = payload();
        p.address = None;
        let err = p.into_request().unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Dados incompletos");
    }

    #[test]
    fn test_non_positive_quantity_is_rejected() {
        let mut p = payload();
        p.items[0].quantity = Some(0);
        assert!(p.into_request().is_err());
    }

    #[test]
    fn test_unknown_coupon_is_rejected() {
        let mut p = payload();
        p.coupon = Some("BLACKFRIDAY".to_string());
        let err = p.into_request().unwrap_err();
        assert_eq!(err.to_string(), "Cupom inválido ou expirado");
    }

    #[test]
    fn test_unserved_zipcode_passes_parsing() {
        // Delivery area is checked against store rules when quoting.
        let mut p = payload();
        p.address.as_mut().unwrap().zipcode = Some("00000-000".to_string());
        assert!(p.into_request().is_ok());
    }

    #[test]
    fn test_parse_status() {
        assert_eq!(parse_status(Some("shipped")).unwrap(), OrderStatus::Shipped);
        assert_eq!(
            parse_status(None).unwrap_err().to_string(),
            "Status não fornecido"
        );
        assert_eq!(
            parse_status(Some("lost")).unwrap_err().to_string(),
            "Status inválido"
        );
    }

    #[test]
    fn test_sync_result_serialization() {
        let result = SyncResult::failed(None, &ApiError::incomplete());
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["status"], "failed");
        assert_eq!(value["error"], "Dados incompletos");
        assert!(value.get("order_id").is_none());
    }

    #[test]
    fn test_order_error_mapping() {
        let err = ApiError::from(OrderError::ProductNotFound(ProductId::new(9)));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        let err = ApiError::from(OrderError::Checkout(CheckoutError::EmptyCart));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
