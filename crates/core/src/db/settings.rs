//! Store settings (single row in `shop.store_settings`).

use sqlx::PgPool;
use tracing::instrument;

use super::RepositoryError;
use crate::models::StoreSettings;
use crate::types::Price;

#[derive(Debug, sqlx::FromRow)]
struct SettingsRow {
    store_name: String,
    email: String,
    phone: String,
    address: String,
    delivery_fee: Price,
    min_order_value: Price,
    max_delivery_distance_km: i32,
}

impl From<SettingsRow> for StoreSettings {
    fn from(row: SettingsRow) -> Self {
        Self {
            store_name: row.store_name,
            email: row.email,
            phone: row.phone,
            address: row.address,
            delivery_fee: row.delivery_fee,
            min_order_value: row.min_order_value,
            max_delivery_distance_km: row.max_delivery_distance_km,
        }
    }
}

/// Repository for the store settings row.
pub struct SettingsRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SettingsRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Current settings, or the defaults if the row is missing.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self) -> Result<StoreSettings, RepositoryError> {
        let row: Option<SettingsRow> = sqlx::query_as(
            r"
            SELECT store_name, email, phone, address, delivery_fee,
                   min_order_value, max_delivery_distance_km
            FROM shop.store_settings
            WHERE id
            ",
        )
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into).unwrap_or_default())
    }

    /// Replace the settings.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the upsert fails.
    #[instrument(skip(self, settings), fields(store_name = %settings.store_name))]
    pub async fn update(&self, settings: &StoreSettings) -> Result<StoreSettings, RepositoryError> {
        let row: SettingsRow = sqlx::query_as(
            r"
            INSERT INTO shop.store_settings
                (id, store_name, email, phone, address, delivery_fee,
                 min_order_value, max_delivery_distance_km)
            VALUES (TRUE, $1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET
                store_name = EXCLUDED.store_name,
                email = EXCLUDED.email,
                phone = EXCLUDED.phone,
                address = EXCLUDED.address,
                delivery_fee = EXCLUDED.delivery_fee,
                min_order_value = EXCLUDED.min_order_value,
                max_delivery_distance_km = EXCLUDED.max_delivery_distance_km,
                updated_at = NOW()
            RETURNING store_name, email, phone, address, delivery_fee,
                      min_order_value, max_delivery_distance_km
            ",
        )
        .bind(&settings.store_name)
        .bind(&settings.email)
        .bind(&settings.phone)
        .bind(&settings.address)
        .bind(settings.delivery_fee)
        .bind(settings.min_order_value)
        .bind(settings.max_delivery_distance_km)
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }
}
