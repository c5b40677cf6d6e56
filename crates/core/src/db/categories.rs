//! Category repository.

use sqlx::PgPool;
use tracing::instrument;

use super::{RepositoryError, conflict_on_unique};
use crate::models::Category;
use crate::types::CategoryId;

#[derive(Debug, sqlx::FromRow)]
struct CategoryRow {
    id: CategoryId,
    name: String,
    description: Option<String>,
    image: Option<String>,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            image: row.image,
        }
    }
}

/// Repository for `shop.categories`.
pub struct CategoryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CategoryRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List all categories by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Category>, RepositoryError> {
        let rows: Vec<CategoryRow> = sqlx::query_as(
            r"
            SELECT id, name, description, image
            FROM shop.categories
            ORDER BY name
            ",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get a category by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: CategoryId) -> Result<Option<Category>, RepositoryError> {
        let row: Option<CategoryRow> = sqlx::query_as(
            r"
            SELECT id, name, description, image
            FROM shop.categories
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Create a category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the name is taken.
    #[instrument(skip(self, description, image))]
    pub async fn create(
        &self,
        name: &str,
        description: Option<&str>,
        image: Option<&str>,
    ) -> Result<Category, RepositoryError> {
        let row: CategoryRow = sqlx::query_as(
            r"
            INSERT INTO shop.categories (name, description, image)
            VALUES ($1, $2, $3)
            RETURNING id, name, description, image
            ",
        )
        .bind(name)
        .bind(description)
        .bind(image)
        .fetch_one(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "category name already exists"))?;

        Ok(row.into())
    }

    /// Update a category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category does not exist,
    /// `RepositoryError::Conflict` if the new name is taken.
    #[instrument(skip(self, description, image))]
    pub async fn update(
        &self,
        id: CategoryId,
        name: &str,
        description: Option<&str>,
        image: Option<&str>,
    ) -> Result<Category, RepositoryError> {
        let row: Option<CategoryRow> = sqlx::query_as(
            r"
            UPDATE shop.categories
            SET name = $2, description = $3, image = $4
            WHERE id = $1
            RETURNING id, name, description, image
            ",
        )
        .bind(id)
        .bind(name)
        .bind(description)
        .bind(image)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "category name already exists"))?;

        row.map(Into::into).ok_or(RepositoryError::NotFound)
    }

    /// Delete a category that no product references.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` while products are associated,
    /// `RepositoryError::NotFound` if the category does not exist.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: CategoryId) -> Result<(), RepositoryError> {
        let (in_use,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM shop.products WHERE category_id = $1")
                .bind(id)
                .fetch_one(self.pool)
                .await?;

        if in_use > 0 {
            return Err(RepositoryError::Conflict(format!(
                "category has {in_use} associated products"
            )));
        }

        let result = sqlx::query("DELETE FROM shop.categories WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Categories with the number of active products in each.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_with_counts(&self) -> Result<Vec<(Category, i64)>, RepositoryError> {
        #[derive(sqlx::FromRow)]
        struct Row {
            #[sqlx(flatten)]
            category: CategoryRow,
            product_count: i64,
        }

        let rows: Vec<Row> = sqlx::query_as(
            r"
            SELECT c.id, c.name, c.description, c.image,
                   COUNT(p.id) FILTER (WHERE p.active) AS product_count
            FROM shop.categories c
            LEFT JOIN shop.products p ON p.category_id = c.id
            GROUP BY c.id
            ORDER BY c.name
            ",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| (row.category.into(), row.product_count))
            .collect())
    }
}
