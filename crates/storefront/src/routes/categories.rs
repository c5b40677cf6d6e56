//! Category listing.

use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse};
use tracing::instrument;

use hortifruti_core::db::CategoryRepository;

use crate::error::Result;
use crate::routes::PageContext;
use crate::state::AppState;

#[derive(Clone)]
pub struct CategoryView {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub image: Option<String>,
    pub product_count: i64,
}

#[derive(Template, WebTemplate)]
#[template(path = "categories.html")]
pub struct CategoriesTemplate {
    pub page: PageContext,
    pub categories: Vec<CategoryView>,
}

/// Display every category with its number of products on sale.
#[instrument(skip(state, page))]
pub async fn index(State(state): State<AppState>, page: PageContext) -> Result<impl IntoResponse> {
    let categories = CategoryRepository::new(state.pool())
        .list_with_counts()
        .await?
        .into_iter()
        .map(|(category, product_count)| CategoryView {
            id: category.id.as_i32(),
            name: category.name,
            description: category.description.unwrap_or_default(),
            image: category.image,
            product_count,
        })
        .collect();

    Ok(CategoriesTemplate { page, categories })
}
