//! Product route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::instrument;

use hortifruti_core::db::{ProductFilter, ProductRepository};
use hortifruti_core::models::Product;
use hortifruti_core::{CategoryId, ProductId};

use crate::error::{AppError, Result};
use crate::routes::{PageContext, parse_optional_id};
use crate::state::AppState;

/// Placeholder shown for products without a photo.
pub const PLACEHOLDER_IMAGE: &str = "/static/icons/icon-192x192.png";

/// Product card data for listings.
#[derive(Clone)]
pub struct ProductCardView {
    pub id: i32,
    pub name: String,
    pub unit: String,
    pub price: String,
    /// List price when a discount applies.
    pub list_price: Option<String>,
    pub discount: i32,
    pub image: String,
    pub organic: bool,
    pub purchasable: bool,
}

impl From<&Product> for ProductCardView {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id.as_i32(),
            name: product.name.clone(),
            unit: product.unit.clone(),
            price: product.unit_price().to_string(),
            list_price: product
                .has_discount()
                .then(|| product.price.to_string()),
            discount: product.discount,
            image: product
                .image
                .clone()
                .unwrap_or_else(|| PLACEHOLDER_IMAGE.to_string()),
            organic: product.organic,
            purchasable: product.is_purchasable(),
        }
    }
}

/// Full product data for the detail page.
#[derive(Clone)]
pub struct ProductView {
    pub card: ProductCardView,
    pub description: String,
    pub stock: i32,
    pub category: Option<String>,
}

/// Category option for the filter bar.
#[derive(Clone)]
pub struct CategoryOption {
    pub id: i32,
    pub name: String,
    pub selected: bool,
}

/// Listing filters. Blank values from the filter form mean "any".
#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub category_id: Option<String>,
    pub search: Option<String>,
    pub featured: Option<String>,
}

impl ProductQuery {
    fn category(&self) -> Option<CategoryId> {
        parse_optional_id(self.category_id.as_deref()).map(CategoryId::new)
    }

    fn search(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    fn featured(&self) -> bool {
        matches!(self.featured.as_deref(), Some("1" | "true" | "on"))
    }

    /// Repository filter for the storefront (active products only).
    #[must_use]
    pub fn to_filter(&self) -> ProductFilter {
        ProductFilter {
            category_id: self.category(),
            search: self.search(),
            featured: self.featured().then_some(true),
            ..ProductFilter::storefront()
        }
    }
}

/// Product listing page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/index.html")]
pub struct ProductsIndexTemplate {
    pub page: PageContext,
    pub products: Vec<ProductCardView>,
    pub categories: Vec<CategoryOption>,
    pub search: String,
    pub featured_only: bool,
    pub heading: String,
}

/// Product detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/show.html")]
pub struct ProductShowTemplate {
    pub page: PageContext,
    pub product: ProductView,
    pub related: Vec<ProductCardView>,
}

/// Display product listing page.
#[instrument(skip(state, page))]
pub async fn index(
    State(state): State<AppState>,
    page: PageContext,
    Query(query): Query<ProductQuery>,
) -> Result<impl IntoResponse> {
    let filter = query.to_filter();
    let products = ProductRepository::new(state.pool()).list(&filter).await?;
    let categories = state.catalog().categories(state.pool()).await?;

    let heading = filter
        .category_id
        .and_then(|id| categories.iter().find(|c| c.id == id))
        .map_or_else(
            || {
                if filter.featured == Some(true) {
                    "Destaques".to_string()
                } else {
                    "Produtos".to_string()
                }
            },
            |c| c.name.clone(),
        );

    Ok(ProductsIndexTemplate {
        page,
        products: products.iter().map(ProductCardView::from).collect(),
        categories: categories
            .iter()
            .map(|c| CategoryOption {
                id: c.id.as_i32(),
                name: c.name.clone(),
                selected: filter.category_id == Some(c.id),
            })
            .collect(),
        search: filter.search.clone().unwrap_or_default(),
        featured_only: filter.featured == Some(true),
        heading,
    })
}

/// Display a single product. Inactive products are not found.
#[instrument(skip(state, page))]
pub async fn show(
    State(state): State<AppState>,
    page: PageContext,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse> {
    let repo = ProductRepository::new(state.pool());
    let product = repo
        .get(ProductId::new(id))
        .await?
        .filter(|p| p.active)
        .ok_or_else(|| AppError::NotFound("Produto não encontrado".to_string()))?;

    let categories = state.catalog().categories(state.pool()).await?;
    let category = product
        .category_id
        .and_then(|cid| categories.iter().find(|c| c.id == cid))
        .map(|c| c.name.clone());

    let related = match product.category_id {
        Some(category_id) => repo
            .list(&ProductFilter {
                category_id: Some(category_id),
                limit: Some(5),
                ..ProductFilter::storefront()
            })
            .await?
            .iter()
            .filter(|p| p.id != product.id)
            .take(4)
            .map(ProductCardView::from)
            .collect(),
        None => Vec::new(),
    };

    Ok(ProductShowTemplate {
        page,
        product: ProductView {
            card: ProductCardView::from(&product),
            description: product.description.clone().unwrap_or_default(),
            stock: product.stock,
            category,
        },
        related,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Utc;
    use hortifruti_core::Price;

    #[test]
    fn test_query_blank_values_are_ignored() {
        let query = ProductQuery {
            category_id: Some(String::new()),
            search: Some("   ".to_string()),
            featured: None,
        };
        let filter = query.to_filter();
        assert_eq!(filter.category_id, None);
        assert_eq!(filter.search, None);
        assert_eq!(filter.featured, None);
        assert_eq!(filter.active, Some(true));
    }

    #[test]
    fn test_query_filters() {
        let query = ProductQuery {
            category_id: Some("2".to_string()),
            search: Some(" maçã ".to_string()),
            featured: Some("1".to_string()),
        };
        let filter = query.to_filter();
        assert_eq!(filter.category_id, Some(CategoryId::new(2)));
        assert_eq!(filter.search.as_deref(), Some("maçã"));
        assert_eq!(filter.featured, Some(true));
    }

    #[test]
    fn test_card_shows_list_price_only_when_discounted() {
        let mut product = Product {
            id: ProductId::new(1),
            name: "Banana".to_string(),
            description: None,
            price: Price::from_cents(1000),
            image: None,
            stock: 4,
            category_id: None,
            unit: "kg".to_string(),
            discount: 0,
            organic: true,
            featured: false,
            active: true,
            created_at: Utc::now(),
        };
        let card = ProductCardView::from(&product);
        assert_eq!(card.list_price, None);
        assert_eq!(card.image, PLACEHOLDER_IMAGE);

        product.discount = 20;
        let card = ProductCardView::from(&product);
        assert_eq!(card.price, Price::from_cents(800).to_string());
        assert_eq!(card.list_price, Some(Price::from_cents(1000).to_string()));
    }
}
