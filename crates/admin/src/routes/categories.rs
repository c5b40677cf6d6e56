//! Category management route handlers.
//!
//! The list page carries the creation form; editing uses its own page.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Router,
    extract::{Path, Query, State},
    response::Redirect,
    routing::{get, post},
};
use serde::Deserialize;
use tracing::instrument;

use hortifruti_core::CategoryId;
use hortifruti_core::db::{CategoryRepository, RepositoryError};
use hortifruti_core::models::Category;

use crate::error::{AppError, Result};
use crate::middleware::RequireAdminAuth;
use crate::routes::{AdminUserView, FlashQuery, redirect_error, redirect_success};
use crate::state::AppState;

/// Category table row.
#[derive(Debug, Clone)]
pub struct CategoryRowView {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub product_count: i64,
}

/// Category list template.
#[derive(Template, WebTemplate)]
#[template(path = "categories/index.html")]
pub struct CategoriesIndexTemplate {
    pub admin_user: AdminUserView,
    pub current_path: String,
    pub categories: Vec<CategoryRowView>,
    pub success_message: Option<String>,
    pub error_message: Option<String>,
}

/// Category edit template.
#[derive(Template, WebTemplate)]
#[template(path = "categories/edit.html")]
pub struct CategoryEditTemplate {
    pub admin_user: AdminUserView,
    pub current_path: String,
    pub category: Category,
    pub error_message: Option<String>,
}

/// Category form fields.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: String,
}

impl CategoryForm {
    /// Trimmed `(name, description, image)`.
    ///
    /// # Errors
    ///
    /// Returns a message when the name is blank.
    pub fn fields(&self) -> std::result::Result<(&str, Option<&str>, Option<&str>), &'static str> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err("Informe o nome da categoria");
        }
        Ok((name, non_blank(&self.description), non_blank(&self.image)))
    }
}

fn non_blank(s: &str) -> Option<&str> {
    let s = s.trim();
    (!s.is_empty()).then_some(s)
}

/// Build the categories router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/categories", get(index).post(create))
        .route("/categories/{id}", post(update))
        .route("/categories/{id}/edit", get(edit))
        .route("/categories/{id}/delete", post(delete))
}

/// Text for repository errors caused by user input.
fn conflict_message(err: &RepositoryError, on_delete: bool) -> Option<&'static str> {
    match err {
        RepositoryError::Conflict(_) if on_delete => {
            Some("Não é possível excluir uma categoria com produtos associados")
        }
        RepositoryError::Conflict(_) => Some("Já existe uma categoria com esse nome"),
        RepositoryError::NotFound => Some("Categoria não encontrada"),
        _ => None,
    }
}

/// Categories list page handler.
#[instrument(skip(admin, state, flash))]
async fn index(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    Query(flash): Query<FlashQuery>,
) -> Result<CategoriesIndexTemplate> {
    let categories = CategoryRepository::new(state.pool())
        .list_with_counts()
        .await?;

    Ok(CategoriesIndexTemplate {
        admin_user: AdminUserView::from(&admin),
        current_path: "/categories".to_string(),
        categories: categories
            .into_iter()
            .map(|(c, product_count)| CategoryRowView {
                id: c.id.as_i32(),
                name: c.name,
                description: c.description.unwrap_or_default(),
                product_count,
            })
            .collect(),
        success_message: flash.success,
        error_message: flash.error,
    })
}

/// Create a category.
///
/// POST /categories
#[instrument(skip(admin, state), fields(admin_id = %admin.id))]
async fn create(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    Form(form): Form<CategoryForm>,
) -> Result<Redirect> {
    let (name, description, image) = match form.fields() {
        Ok(fields) => fields,
        Err(message) => return Ok(redirect_error("/categories", message)),
    };

    match CategoryRepository::new(state.pool())
        .create(name, description, image)
        .await
    {
        Ok(category) => {
            tracing::info!(category_id = %category.id, "category created");
            Ok(redirect_success("/categories", "Categoria criada"))
        }
        Err(err) => match conflict_message(&err, false) {
            Some(message) => Ok(redirect_error("/categories", message)),
            None => Err(err.into()),
        },
    }
}

/// Edit category page.
#[instrument(skip(admin, state, flash))]
async fn edit(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    Path(id): Path<CategoryId>,
    Query(flash): Query<FlashQuery>,
) -> Result<CategoryEditTemplate> {
    let category = CategoryRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("categoria {id}")))?;

    Ok(CategoryEditTemplate {
        admin_user: AdminUserView::from(&admin),
        current_path: "/categories".to_string(),
        category,
        error_message: flash.error,
    })
}

/// Update a category.
///
/// POST /categories/{id}
#[instrument(skip(admin, state), fields(admin_id = %admin.id))]
async fn update(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    Path(id): Path<CategoryId>,
    Form(form): Form<CategoryForm>,
) -> Result<Redirect> {
    let edit_path = format!("/categories/{id}/edit");
    let (name, description, image) = match form.fields() {
        Ok(fields) => fields,
        Err(message) => return Ok(redirect_error(&edit_path, message)),
    };

    match CategoryRepository::new(state.pool())
        .update(id, name, description, image)
        .await
    {
        Ok(_) => Ok(redirect_success("/categories", "Categoria atualizada")),
        Err(RepositoryError::NotFound) => Err(AppError::NotFound(format!("categoria {id}"))),
        Err(err) => match conflict_message(&err, false) {
            Some(message) => Ok(redirect_error(&edit_path, message)),
            None => Err(err.into()),
        },
    }
}

/// Delete a category with no products.
///
/// POST /categories/{id}/delete
#[instrument(skip(admin, state), fields(admin_id = %admin.id))]
async fn delete(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    Path(id): Path<CategoryId>,
) -> Result<Redirect> {
    match CategoryRepository::new(state.pool()).delete(id).await {
        Ok(()) => {
            tracing::info!(category_id = %id, "category deleted");
            Ok(redirect_success("/categories", "Categoria excluída"))
        }
        Err(err) => match conflict_message(&err, true) {
            Some(message) => Ok(redirect_error("/categories", message)),
            None => Err(err.into()),
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_form_fields_trim_and_drop_blanks() {
        let form = CategoryForm {
            name: " Frutas ".to_string(),
            description: "  ".to_string(),
            image: "/static/img/frutas.jpg".to_string(),
        };
        assert_eq!(
            form.fields().unwrap(),
            ("Frutas", None, Some("/static/img/frutas.jpg"))
        );
    }

    #[test]
    fn test_form_requires_name() {
        assert_eq!(
            CategoryForm::default().fields().unwrap_err(),
            "Informe o nome da categoria"
        );
    }

    #[test]
    fn test_delete_conflict_message() {
        let err = RepositoryError::Conflict("category has 2 associated products".to_string());
        assert_eq!(
            conflict_message(&err, true),
            Some("Não é possível excluir uma categoria com produtos associados")
        );
        assert_eq!(
            conflict_message(&err, false),
            Some("Já existe uma categoria com esse nome")
        );
        assert_eq!(
            conflict_message(&RepositoryError::DataCorruption("x".to_string()), true),
            None
        );
    }
}
