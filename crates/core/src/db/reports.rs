//! Aggregate queries for the admin dashboard and reports page.
//!
//! Revenue never includes cancelled orders.

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::PgPool;

use super::RepositoryError;
use crate::types::{OrderStatus, Price};

/// Headline numbers on the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct DashboardCounters {
    pub orders: i64,
    pub products: i64,
    pub customers: i64,
    pub revenue: Price,
    pub pending_orders: i64,
}

/// Orders and revenue of one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct SalesByDay {
    pub day: NaiveDate,
    pub orders: i64,
    pub revenue: Price,
}

/// Best-selling product by units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct TopProduct {
    pub product_name: String,
    pub units: i64,
    pub revenue: Price,
}

/// Order count and value per status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct StatusRevenue {
    pub status: OrderStatus,
    pub orders: i64,
    pub total: Price,
}

/// Read-only reporting queries.
pub struct ReportRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ReportRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Dashboard counters.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn dashboard(&self) -> Result<DashboardCounters, RepositoryError> {
        let counters: DashboardCounters = sqlx::query_as(
            r"
            SELECT
                (SELECT COUNT(*) FROM shop.orders) AS orders,
                (SELECT COUNT(*) FROM shop.products) AS products,
                (SELECT COUNT(*) FROM shop.users WHERE NOT is_admin) AS customers,
                (SELECT COALESCE(SUM(total), 0) FROM shop.orders
                  WHERE status <> 'cancelled') AS revenue,
                (SELECT COUNT(*) FROM shop.orders WHERE status = 'pending') AS pending_orders
            ",
        )
        .fetch_one(self.pool)
        .await?;

        Ok(counters)
    }

    /// Daily sales for the last `days` days, oldest first. Days without
    /// orders are included with zeros.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn sales_by_day(&self, days: i32) -> Result<Vec<SalesByDay>, RepositoryError> {
        let rows: Vec<SalesByDay> = sqlx::query_as(
            r"
            SELECT d::date AS day,
                   COUNT(o.id) AS orders,
                   COALESCE(SUM(o.total), 0) AS revenue
            FROM generate_series(
                     (CURRENT_DATE - ($1 - 1))::timestamp,
                     CURRENT_DATE::timestamp,
                     INTERVAL '1 day'
                 ) AS d
            LEFT JOIN shop.orders o
                   ON o.created_at::date = d::date AND o.status <> 'cancelled'
            GROUP BY d
            ORDER BY d
            ",
        )
        .bind(days.max(1))
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Products with the most units sold in the last `days` days.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn top_products(
        &self,
        days: i32,
        limit: i64,
    ) -> Result<Vec<TopProduct>, RepositoryError> {
        let rows: Vec<TopProduct> = sqlx::query_as(
            r"
            SELECT i.product_name,
                   SUM(i.quantity)::BIGINT AS units,
                   SUM(i.quantity * i.price) AS revenue
            FROM shop.order_items i
            JOIN shop.orders o ON o.id = i.order_id
            WHERE o.status <> 'cancelled'
              AND o.created_at >= NOW() - make_interval(days => $1)
            GROUP BY i.product_name
            ORDER BY units DESC, revenue DESC
            LIMIT $2
            ",
        )
        .bind(days.max(1))
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Order count and total per status, in lifecycle order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn revenue_by_status(&self) -> Result<Vec<StatusRevenue>, RepositoryError> {
        let rows: Vec<StatusRevenue> = sqlx::query_as(
            r"
            SELECT status, COUNT(*) AS orders, COALESCE(SUM(total), 0) AS total
            FROM shop.orders
            GROUP BY status
            ORDER BY status
            ",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }
}
