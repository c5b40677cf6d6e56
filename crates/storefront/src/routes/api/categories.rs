//! Category endpoints.

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde_json::json;
use tracing::instrument;

use hortifruti_core::CategoryId;
use hortifruti_core::db::CategoryRepository;

use crate::error::ApiError;
use crate::state::AppState;

/// `GET /api/categories`
#[instrument(skip(state))]
pub async fn index(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let categories = state.catalog().categories(state.pool()).await?;
    Ok(Json(json!({ "categories": categories.as_slice() })))
}

/// `GET /api/categories/{id}`
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    let category = CategoryRepository::new(state.pool())
        .get(CategoryId::new(id))
        .await?
        .ok_or_else(|| ApiError::NotFound("Categoria não encontrada".to_string()))?;
    Ok(Json(json!({ "category": category })))
}
