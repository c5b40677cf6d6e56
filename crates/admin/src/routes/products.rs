//! Product management route handlers.

use std::collections::HashMap;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tracing::instrument;

use hortifruti_core::db::{
    CategoryRepository, ProductFilter, ProductInput, ProductRepository, RepositoryError,
};
use hortifruti_core::models::{Category, Product};
use hortifruti_core::{CategoryId, Price, ProductId};

use crate::error::{AppError, Result};
use crate::middleware::RequireAdminAuth;
use crate::routes::dashboard::LOW_STOCK_THRESHOLD;
use crate::routes::{AdminUserView, FlashQuery, redirect_error, redirect_success};
use crate::state::AppState;

// =============================================================================
// Views
// =============================================================================

/// Product table row.
#[derive(Debug, Clone)]
pub struct ProductRowView {
    pub id: i32,
    pub name: String,
    pub category: String,
    pub price: String,
    pub unit_price: String,
    pub discount: i32,
    pub stock: i32,
    pub unit: String,
    pub organic: bool,
    pub featured: bool,
    pub active: bool,
    pub low_stock: bool,
}

impl ProductRowView {
    fn new(product: &Product, categories: &HashMap<CategoryId, String>) -> Self {
        Self {
            id: product.id.as_i32(),
            name: product.name.clone(),
            category: product
                .category_id
                .and_then(|id| categories.get(&id).cloned())
                .unwrap_or_else(|| "-".to_string()),
            price: product.price.to_string(),
            unit_price: product.unit_price().to_string(),
            discount: product.discount,
            stock: product.stock,
            unit: product.unit.clone(),
            organic: product.organic,
            featured: product.featured,
            active: product.active,
            low_stock: product.stock <= LOW_STOCK_THRESHOLD,
        }
    }
}

/// Category `<option>`.
#[derive(Debug, Clone)]
pub struct CategoryOption {
    pub id: i32,
    pub name: String,
    pub selected: bool,
}

fn category_options(categories: &[Category], selected: &str) -> Vec<CategoryOption> {
    categories
        .iter()
        .map(|c| CategoryOption {
            id: c.id.as_i32(),
            name: c.name.clone(),
            selected: c.id.to_string() == selected,
        })
        .collect()
}

/// Products list template.
#[derive(Template, WebTemplate)]
#[template(path = "products/index.html")]
pub struct ProductsIndexTemplate {
    pub admin_user: AdminUserView,
    pub current_path: String,
    pub products: Vec<ProductRowView>,
    pub search: String,
    pub success_message: Option<String>,
    pub error_message: Option<String>,
}

/// Product create/edit form template.
#[derive(Template, WebTemplate)]
#[template(path = "products/form.html")]
pub struct ProductFormTemplate {
    pub admin_user: AdminUserView,
    pub current_path: String,
    /// `None` when creating.
    pub product_id: Option<i32>,
    pub form: ProductForm,
    pub categories: Vec<CategoryOption>,
    pub error: Option<String>,
}

impl ProductFormTemplate {
    #[must_use]
    pub fn action(&self) -> String {
        self.product_id
            .map_or_else(|| "/products".to_string(), |id| format!("/products/{id}"))
    }
}

// =============================================================================
// Form
// =============================================================================

/// Product form fields as submitted. Checkboxes are absent when unchecked.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub stock: String,
    #[serde(default)]
    pub category_id: String,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub discount: String,
    pub organic: Option<String>,
    pub featured: Option<String>,
    pub active: Option<String>,
}

fn optional_text(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

impl ProductForm {
    /// Blank form for a new product: active, sold by unit.
    #[must_use]
    pub fn blank() -> Self {
        Self {
            unit: "un".to_string(),
            discount: "0".to_string(),
            stock: "0".to_string(),
            active: Some("on".to_string()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn from_product(product: &Product) -> Self {
        let flag = |on: bool| on.then(|| "on".to_string());
        Self {
            name: product.name.clone(),
            description: product.description.clone().unwrap_or_default(),
            price: product.price.plain(),
            image: product.image.clone().unwrap_or_default(),
            stock: product.stock.to_string(),
            category_id: product
                .category_id
                .map(|id| id.to_string())
                .unwrap_or_default(),
            unit: product.unit.clone(),
            discount: product.discount.to_string(),
            organic: flag(product.organic),
            featured: flag(product.featured),
            active: flag(product.active),
        }
    }

    /// Validate the form.
    ///
    /// # Errors
    ///
    /// Returns the message for the first invalid field.
    pub fn to_input(&self) -> std::result::Result<ProductInput, &'static str> {
        let name = optional_text(&self.name).ok_or("Informe o nome do produto")?;

        let price: Price = self.price.trim().parse().map_err(|_| "Preço inválido")?;
        if price.is_zero() {
            return Err("Preço inválido");
        }

        let stock = match self.stock.trim() {
            "" => 0,
            raw => raw
                .parse::<i32>()
                .ok()
                .filter(|s| *s >= 0)
                .ok_or("Estoque inválido")?,
        };

        let discount = match self.discount.trim() {
            "" => 0,
            raw => raw
                .parse::<i32>()
                .ok()
                .filter(|d| (0..=100).contains(d))
                .ok_or("Desconto deve estar entre 0 e 100")?,
        };

        let category_id = match self.category_id.trim() {
            "" => None,
            raw => Some(CategoryId::new(
                raw.parse().map_err(|_| "Categoria não encontrada")?,
            )),
        };

        Ok(ProductInput {
            name,
            description: optional_text(&self.description),
            price,
            image: optional_text(&self.image),
            stock,
            category_id,
            unit: optional_text(&self.unit).unwrap_or_else(|| "un".to_string()),
            discount,
            organic: self.organic.is_some(),
            featured: self.featured.is_some(),
            active: self.active.is_some(),
        })
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Build the products router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/products", get(index).post(create))
        .route("/products/new", get(new))
        .route("/products/{id}", post(update))
        .route("/products/{id}/edit", get(edit))
        .route("/products/{id}/delete", post(delete))
}

/// Product list query.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductsQuery {
    pub search: Option<String>,
    pub success: Option<String>,
    pub error: Option<String>,
}

/// Products list page handler.
#[instrument(skip(admin, state))]
async fn index(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    Query(query): Query<ProductsQuery>,
) -> Result<ProductsIndexTemplate> {
    let filter = ProductFilter {
        search: query.search.clone(),
        ..ProductFilter::default()
    };
    let product_repo = ProductRepository::new(state.pool());
    let category_repo = CategoryRepository::new(state.pool());
    let (products, categories) =
        tokio::try_join!(product_repo.list(&filter), category_repo.list(),)?;
    let names: HashMap<CategoryId, String> =
        categories.into_iter().map(|c| (c.id, c.name)).collect();

    Ok(ProductsIndexTemplate {
        admin_user: AdminUserView::from(&admin),
        current_path: "/products".to_string(),
        products: products
            .iter()
            .map(|p| ProductRowView::new(p, &names))
            .collect(),
        search: query.search.unwrap_or_default(),
        success_message: query.success,
        error_message: query.error,
    })
}

async fn render_form(
    state: &AppState,
    admin: &AdminUserView,
    product_id: Option<i32>,
    form: ProductForm,
    error: Option<String>,
) -> Result<ProductFormTemplate> {
    let categories = CategoryRepository::new(state.pool()).list().await?;
    Ok(ProductFormTemplate {
        admin_user: admin.clone(),
        current_path: "/products".to_string(),
        product_id,
        categories: category_options(&categories, &form.category_id),
        form,
        error,
    })
}

/// New product form.
#[instrument(skip(admin, state))]
async fn new(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
) -> Result<ProductFormTemplate> {
    render_form(
        &state,
        &AdminUserView::from(&admin),
        None,
        ProductForm::blank(),
        None,
    )
    .await
}

/// Validate the form and the referenced category.
async fn validated_input(
    state: &AppState,
    form: &ProductForm,
) -> Result<std::result::Result<ProductInput, &'static str>> {
    let input = match form.to_input() {
        Ok(input) => input,
        Err(message) => return Ok(Err(message)),
    };
    if let Some(category_id) = input.category_id
        && CategoryRepository::new(state.pool())
            .get(category_id)
            .await?
            .is_none()
    {
        return Ok(Err("Categoria não encontrada"));
    }
    Ok(Ok(input))
}

/// Create a product.
///
/// POST /products
#[instrument(skip(admin, state, form), fields(admin_id = %admin.id))]
async fn create(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    Form(form): Form<ProductForm>,
) -> Result<Response> {
    let input = match validated_input(&state, &form).await? {
        Ok(input) => input,
        Err(message) => {
            let view = AdminUserView::from(&admin);
            let page = render_form(&state, &view, None, form, Some(message.to_string())).await?;
            return Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response());
        }
    };

    let product = ProductRepository::new(state.pool()).create(&input).await?;
    tracing::info!(product_id = %product.id, name = %product.name, "product created");
    Ok(redirect_success("/products", "Produto criado").into_response())
}

/// Edit product form.
#[instrument(skip(admin, state, flash))]
async fn edit(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    Query(flash): Query<FlashQuery>,
) -> Result<ProductFormTemplate> {
    let product = ProductRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("produto {id}")))?;

    render_form(
        &state,
        &AdminUserView::from(&admin),
        Some(id.as_i32()),
        ProductForm::from_product(&product),
        flash.error,
    )
    .await
}

/// Update a product.
///
/// POST /products/{id}
#[instrument(skip(admin, state, form), fields(admin_id = %admin.id))]
async fn update(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    Form(form): Form<ProductForm>,
) -> Result<Response> {
    let input = match validated_input(&state, &form).await? {
        Ok(input) => input,
        Err(message) => {
            let view = AdminUserView::from(&admin);
            let page =
                render_form(&state, &view, Some(id.as_i32()), form, Some(message.to_string()))
                    .await?;
            return Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response());
        }
    };

    match ProductRepository::new(state.pool()).update(id, &input).await {
        Ok(product) => {
            tracing::info!(product_id = %product.id, "product updated");
            Ok(redirect_success("/products", "Produto atualizado").into_response())
        }
        Err(RepositoryError::NotFound) => Err(AppError::NotFound(format!("produto {id}"))),
        Err(e) => Err(e.into()),
    }
}

/// Delete a product. Past order items keep their name and price.
///
/// POST /products/{id}/delete
#[instrument(skip(admin, state), fields(admin_id = %admin.id))]
async fn delete(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Redirect> {
    match ProductRepository::new(state.pool()).delete(id).await {
        Ok(()) => {
            tracing::info!(product_id = %id, "product deleted");
            Ok(redirect_success("/products", "Produto excluído"))
        }
        Err(RepositoryError::NotFound) => Ok(redirect_error("/products", "Produto não encontrado")),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn form() -> ProductForm {
        ProductForm {
            name: " Maçã Fuji ".to_string(),
            description: String::new(),
            price: "5,99".to_string(),
            image: String::new(),
            stock: "40".to_string(),
            category_id: "1".to_string(),
            unit: "kg".to_string(),
            discount: "10".to_string(),
            organic: Some("on".to_string()),
            featured: None,
            active: Some("on".to_string()),
        }
    }

    #[test]
    fn test_form_to_input() {
        let input = form().to_input().unwrap();
        assert_eq!(input.name, "Maçã Fuji");
        assert_eq!(input.price, Price::from_cents(599));
        assert_eq!(input.stock, 40);
        assert_eq!(input.category_id, Some(CategoryId::new(1)));
        assert_eq!(input.discount, 10);
        assert_eq!(input.description, None);
        assert!(input.organic);
        assert!(!input.featured);
        assert!(input.active);
    }

    #[test]
    fn test_form_requires_name_and_price() {
        let mut f = form();
        f.name = "  ".to_string();
        assert_eq!(f.to_input().unwrap_err(), "Informe o nome do produto");

        let mut f = form();
        f.price = "0".to_string();
        assert_eq!(f.to_input().unwrap_err(), "Preço inválido");
    }

    #[test]
    fn test_form_rejects_price_beyond_column_range() {
        let mut f = form();
        f.price = "100000000".to_string();
        assert_eq!(f.to_input().unwrap_err(), "Preço inválido");

        f.price = "99999999,99".to_string();
        assert_eq!(f.to_input().unwrap().price, Price::from_cents(9_999_999_999));
    }

    #[test]
    fn test_form_discount_bounds() {
        let mut f = form();
        f.discount = "101".to_string();
        assert_eq!(f.to_input().unwrap_err(), "Desconto deve estar entre 0 e 100");
        f.discount = String::new();
        assert_eq!(f.to_input().unwrap().discount, 0);
    }

    #[test]
    fn test_form_rejects_negative_stock() {
        let mut f = form();
        f.stock = "-1".to_string();
        assert_eq!(f.to_input().unwrap_err(), "Estoque inválido");
    }

    #[test]
    fn test_blank_category_and_unit_defaults() {
        let mut f = form();
        f.category_id = String::new();
        f.unit = " ".to_string();
        let input = f.to_input().unwrap();
        assert_eq!(input.category_id, None);
        assert_eq!(input.unit, "un");
    }

    #[test]
    fn test_form_round_trips_product() {
        let input = form().to_input().unwrap();
        let product = Product {
            id: ProductId::new(3),
            name: input.name.clone(),
            description: input.description.clone(),
            price: input.price,
            image: input.image.clone(),
            stock: input.stock,
            category_id: input.category_id,
            unit: input.unit.clone(),
            discount: input.discount,
            organic: input.organic,
            featured: input.featured,
            active: input.active,
            created_at: chrono::Utc::now(),
        };
        assert_eq!(ProductForm::from_product(&product).to_input().unwrap(), input);
    }

    #[test]
    fn test_category_options_mark_selected() {
        let categories = vec![
            Category {
                id: CategoryId::new(1),
                name: "Frutas".to_string(),
                description: None,
                image: None,
            },
            Category {
                id: CategoryId::new(2),
                name: "Verduras".to_string(),
                description: None,
                image: None,
            },
        ];
        let options = category_options(&categories, "2");
        assert!(!options[0].selected);
        assert!(options[1].selected);
    }
}
