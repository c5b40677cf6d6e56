//! Cached catalog reads.
//!
//! The home page, the category menu and every checkout read the same few
//! rows; these are kept in `moka` for 60 seconds. Product listings with
//! filters go straight to the database.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;
use tracing::{debug, instrument};

use hortifruti_core::db::{
    CategoryRepository, ProductFilter, ProductRepository, RepositoryError, SettingsRepository,
};
use hortifruti_core::models::{Category, Product, StoreSettings};

/// Featured products shown on the home page.
pub const FEATURED_LIMIT: i64 = 8;

const CACHE_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
enum CacheKey {
    Featured,
    Categories,
    Settings,
}

#[derive(Debug, Clone)]
enum CacheValue {
    Products(Arc<Vec<Product>>),
    Categories(Arc<Vec<Category>>),
    Settings(Arc<StoreSettings>),
}

/// Catalog cache shared through `AppState`.
#[derive(Clone)]
pub struct CatalogCache {
    cache: Cache<CacheKey, CacheValue>,
}

impl Default for CatalogCache {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(16)
                .time_to_live(CACHE_TTL)
                .build(),
        }
    }

    /// Active featured products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the database query fails.
    #[instrument(skip(self, pool))]
    pub async fn featured(&self, pool: &PgPool) -> Result<Arc<Vec<Product>>, RepositoryError> {
        if let Some(CacheValue::Products(products)) = self.cache.get(&CacheKey::Featured).await {
            debug!("Cache hit for featured products");
            return Ok(products);
        }

        let filter = ProductFilter {
            featured: Some(true),
            limit: Some(FEATURED_LIMIT),
            ..ProductFilter::storefront()
        };
        let products = Arc::new(ProductRepository::new(pool).list(&filter).await?);
        self.cache
            .insert(CacheKey::Featured, CacheValue::Products(Arc::clone(&products)))
            .await;
        Ok(products)
    }

    /// All categories by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the database query fails.
    #[instrument(skip(self, pool))]
    pub async fn categories(&self, pool: &PgPool) -> Result<Arc<Vec<Category>>, RepositoryError> {
        if let Some(CacheValue::Categories(categories)) =
            self.cache.get(&CacheKey::Categories).await
        {
            debug!("Cache hit for categories");
            return Ok(categories);
        }

        let categories = Arc::new(CategoryRepository::new(pool).list().await?);
        self.cache
            .insert(
                CacheKey::Categories,
                CacheValue::Categories(Arc::clone(&categories)),
            )
            .await;
        Ok(categories)
    }

    /// Store settings (delivery fee, minimum order, contact details).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the database query fails.
    #[instrument(skip(self, pool))]
    pub async fn settings(&self, pool: &PgPool) -> Result<Arc<StoreSettings>, RepositoryError> {
        if let Some(CacheValue::Settings(settings)) = self.cache.get(&CacheKey::Settings).await {
            return Ok(settings);
        }

        let settings = Arc::new(SettingsRepository::new(pool).get().await?);
        self.cache
            .insert(CacheKey::Settings, CacheValue::Settings(Arc::clone(&settings)))
            .await;
        Ok(settings)
    }

    /// Drop everything, e.g. after an order changes stock.
    pub fn invalidate(&self) {
        self.cache.invalidate_all();
    }
}
