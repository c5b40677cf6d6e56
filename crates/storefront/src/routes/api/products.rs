//! Product endpoints.

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde_json::json;
use tracing::instrument;

use hortifruti_core::ProductId;
use hortifruti_core::db::ProductRepository;

use crate::error::ApiError;
use crate::routes::products::ProductQuery;
use crate::state::AppState;

/// `GET /api/products` - active products, filtered like the HTML listing.
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let products = ProductRepository::new(state.pool())
        .list(&query.to_filter())
        .await?;
    Ok(Json(json!({ "products": products })))
}

/// `GET /api/products/{id}`
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    let product = ProductRepository::new(state.pool())
        .get(ProductId::new(id))
        .await?
        .filter(|p| p.active)
        .ok_or_else(|| ApiError::NotFound("Produto não encontrado".to_string()))?;
    Ok(Json(json!({ "product": product })))
}
