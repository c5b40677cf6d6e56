//! Home page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse};
use tracing::instrument;

use crate::error::Result;
use crate::routes::PageContext;
use crate::routes::products::ProductCardView;
use crate::state::AppState;

/// Category tile on the home page.
#[derive(Clone)]
pub struct CategoryTileView {
    pub id: i32,
    pub name: String,
    pub image: Option<String>,
}

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub page: PageContext,
    pub store_name: String,
    pub delivery_fee: String,
    pub min_order_value: String,
    pub featured: Vec<ProductCardView>,
    pub categories: Vec<CategoryTileView>,
}

/// Display the home page.
#[instrument(skip(state, page))]
pub async fn home(State(state): State<AppState>, page: PageContext) -> Result<impl IntoResponse> {
    let catalog = state.catalog();
    let featured = catalog.featured(state.pool()).await?;
    let categories = catalog.categories(state.pool()).await?;
    let settings = catalog.settings(state.pool()).await?;

    Ok(HomeTemplate {
        page,
        store_name: settings.store_name.clone(),
        delivery_fee: settings.delivery_fee.to_string(),
        min_order_value: settings.min_order_value.to_string(),
        featured: featured.iter().map(ProductCardView::from).collect(),
        categories: categories
            .iter()
            .map(|c| CategoryTileView {
                id: c.id.as_i32(),
                name: c.name.clone(),
                image: c.image.clone(),
            })
            .collect(),
    })
}
