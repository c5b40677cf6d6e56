//! Product repository.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::instrument;

use super::{RepositoryError, like_pattern};
use crate::models::Product;
use crate::types::{CategoryId, Price, ProductId};

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    name: String,
    description: Option<String>,
    price: Price,
    image: Option<String>,
    stock: i32,
    category_id: Option<CategoryId>,
    unit: String,
    discount: i32,
    organic: bool,
    featured: bool,
    active: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        if !(0..=100).contains(&row.discount) {
            return Err(RepositoryError::DataCorruption(format!(
                "product {} has discount {}",
                row.id, row.discount
            )));
        }

        Ok(Self {
            id: row.id,
            name: row.name,
            description: row.description,
            price: row.price,
            image: row.image,
            stock: row.stock,
            category_id: row.category_id,
            unit: row.unit,
            discount: row.discount,
            organic: row.organic,
            featured: row.featured,
            active: row.active,
            created_at: row.created_at,
        })
    }
}

const PRODUCT_COLUMNS: &str = "id, name, description, price, image, stock, category_id, unit, \
                               discount, organic, featured, active, created_at";

/// Listing filters. `None` means "don't filter".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFilter {
    pub category_id: Option<CategoryId>,
    /// Case-insensitive substring of the name.
    pub search: Option<String>,
    pub featured: Option<bool>,
    /// Storefront listings pass `Some(true)`; the admin sees everything.
    pub active: Option<bool>,
    pub limit: Option<i64>,
}

impl ProductFilter {
    /// Filter for what customers may see.
    #[must_use]
    pub fn storefront() -> Self {
        Self {
            active: Some(true),
            ..Self::default()
        }
    }
}

/// Fields for creating or updating a product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductInput {
    pub name: String,
    pub description: Option<String>,
    pub price: Price,
    pub image: Option<String>,
    pub stock: i32,
    pub category_id: Option<CategoryId>,
    pub unit: String,
    pub discount: i32,
    pub organic: bool,
    pub featured: bool,
    pub active: bool,
}

/// Repository for `shop.products`.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List products matching `filter`, featured first then by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn list(&self, filter: &ProductFilter) -> Result<Vec<Product>, RepositoryError> {
        let mut query: QueryBuilder<'_, Postgres> =
            QueryBuilder::new(format!("SELECT {PRODUCT_COLUMNS} FROM shop.products WHERE TRUE"));

        if let Some(category_id) = filter.category_id {
            query.push(" AND category_id = ").push_bind(category_id);
        }
        if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            query
                .push(" AND name ILIKE ")
                .push_bind(like_pattern(search));
        }
        if let Some(featured) = filter.featured {
            query.push(" AND featured = ").push_bind(featured);
        }
        if let Some(active) = filter.active {
            query.push(" AND active = ").push_bind(active);
        }
        query.push(" ORDER BY featured DESC, name");
        if let Some(limit) = filter.limit {
            query.push(" LIMIT ").push_bind(limit);
        }

        let rows: Vec<ProductRow> = query.build_query_as().fetch_all(self.pool).await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row: Option<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM shop.products WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Fetch several products at once (used to refresh cart snapshots).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let raw: Vec<i32> = ids.iter().map(ProductId::as_i32).collect();
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM shop.products WHERE id = ANY($1)"
        ))
        .bind(raw)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails (including an
    /// unknown category).
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create(&self, input: &ProductInput) -> Result<Product, RepositoryError> {
        let row: ProductRow = sqlx::query_as(&format!(
            r"
            INSERT INTO shop.products
                (name, description, price, image, stock, category_id, unit,
                 discount, organic, featured, active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(&input.name)
        .bind(input.description.as_deref())
        .bind(input.price)
        .bind(input.image.as_deref())
        .bind(input.stock)
        .bind(input.category_id)
        .bind(&input.unit)
        .bind(input.discount)
        .bind(input.organic)
        .bind(input.featured)
        .bind(input.active)
        .fetch_one(self.pool)
        .await?;

        row.try_into()
    }

    /// Update a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn update(
        &self,
        id: ProductId,
        input: &ProductInput,
    ) -> Result<Product, RepositoryError> {
        let row: Option<ProductRow> = sqlx::query_as(&format!(
            r"
            UPDATE shop.products
            SET name = $2, description = $3, price = $4, image = $5, stock = $6,
                category_id = $7, unit = $8, discount = $9, organic = $10,
                featured = $11, active = $12, updated_at = NOW()
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(&input.name)
        .bind(input.description.as_deref())
        .bind(input.price)
        .bind(input.image.as_deref())
        .bind(input.stock)
        .bind(input.category_id)
        .bind(&input.unit)
        .bind(input.discount)
        .bind(input.organic)
        .bind(input.featured)
        .bind(input.active)
        .fetch_optional(self.pool)
        .await?;

        row.ok_or(RepositoryError::NotFound)?.try_into()
    }

    /// Delete a product. Past order items keep their name and price.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.products WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Count all products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count(&self) -> Result<i64, RepositoryError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM shop.products")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// Active products at or below `threshold` units of stock.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn low_stock(&self, threshold: i32) -> Result<Vec<Product>, RepositoryError> {
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM shop.products \
             WHERE active AND stock <= $1 ORDER BY stock, name"
        ))
        .bind(threshold)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}
