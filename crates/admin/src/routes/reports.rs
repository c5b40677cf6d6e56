//! Sales reports.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Router,
    extract::{Query, State},
    routing::get,
};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Deserialize;
use tracing::instrument;

use hortifruti_core::Price;
use hortifruti_core::db::{ReportRepository, SalesByDay, StatusRevenue, TopProduct};

use crate::error::Result;
use crate::middleware::RequireAdminAuth;
use crate::routes::AdminUserView;
use crate::state::AppState;

const DEFAULT_DAYS: i32 = 30;
const MAX_DAYS: i32 = 365;
const TOP_PRODUCTS: i64 = 10;

/// Report period query.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportQuery {
    pub days: Option<i32>,
}

impl ReportQuery {
    /// Period length, clamped to `1..=365`.
    #[must_use]
    pub fn days(&self) -> i32 {
        self.days.unwrap_or(DEFAULT_DAYS).clamp(1, MAX_DAYS)
    }
}

/// One day of the sales chart.
#[derive(Debug, Clone)]
pub struct SalesDayView {
    pub day: String,
    pub orders: i64,
    pub revenue: String,
    /// Bar width relative to the best day (0-100).
    pub bar_percent: u32,
}

fn sales_views(days: &[SalesByDay]) -> Vec<SalesDayView> {
    let best = days
        .iter()
        .map(|d| d.revenue.amount())
        .max()
        .unwrap_or(Decimal::ZERO);

    days.iter()
        .map(|d| {
            let bar_percent = if best.is_zero() {
                0
            } else {
                (d.revenue.amount() * Decimal::ONE_HUNDRED / best)
                    .round()
                    .to_u32()
                    .unwrap_or(0)
            };
            SalesDayView {
                day: d.day.format("%d/%m").to_string(),
                orders: d.orders,
                revenue: d.revenue.to_string(),
                bar_percent,
            }
        })
        .collect()
}

/// Best-seller row.
#[derive(Debug, Clone)]
pub struct TopProductView {
    pub name: String,
    pub units: i64,
    pub revenue: String,
}

impl From<&TopProduct> for TopProductView {
    fn from(p: &TopProduct) -> Self {
        Self {
            name: p.product_name.clone(),
            units: p.units,
            revenue: p.revenue.to_string(),
        }
    }
}

/// Per-status row.
#[derive(Debug, Clone)]
pub struct StatusView {
    pub label: &'static str,
    pub badge: &'static str,
    pub orders: i64,
    pub total: String,
}

impl From<&StatusRevenue> for StatusView {
    fn from(s: &StatusRevenue) -> Self {
        Self {
            label: s.status.label(),
            badge: s.status.badge_class(),
            orders: s.orders,
            total: s.total.to_string(),
        }
    }
}

/// Reports page template.
#[derive(Template, WebTemplate)]
#[template(path = "reports.html")]
pub struct ReportsTemplate {
    pub admin_user: AdminUserView,
    pub current_path: String,
    pub days: i32,
    pub period_orders: i64,
    pub period_revenue: String,
    pub average_ticket: String,
    pub sales: Vec<SalesDayView>,
    pub top_products: Vec<TopProductView>,
    pub by_status: Vec<StatusView>,
}

/// Build the reports router.
pub fn router() -> Router<AppState> {
    Router::new().route("/reports", get(index))
}

#[instrument(skip(admin, state))]
async fn index(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> Result<ReportsTemplate> {
    let days = query.days();
    let reports = ReportRepository::new(state.pool());

    let (sales, top, by_status) = tokio::try_join!(
        reports.sales_by_day(days),
        reports.top_products(days, TOP_PRODUCTS),
        reports.revenue_by_status(),
    )?;

    let period_orders: i64 = sales.iter().map(|d| d.orders).sum();
    let period_revenue: Price = sales.iter().map(|d| d.revenue).sum();
    let average_ticket = if period_orders > 0 {
        Price::new(period_revenue.amount() / Decimal::from(period_orders))
    } else {
        Price::ZERO
    };

    Ok(ReportsTemplate {
        admin_user: AdminUserView::from(&admin),
        current_path: "/reports".to_string(),
        days,
        period_orders,
        period_revenue: period_revenue.to_string(),
        average_ticket: average_ticket.to_string(),
        sales: sales_views(&sales),
        top_products: top.iter().map(TopProductView::from).collect(),
        by_status: by_status.iter().map(StatusView::from).collect(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use chrono::NaiveDate;

    #[test]
    fn test_days_default_and_clamp() {
        assert_eq!(ReportQuery::default().days(), 30);
        assert_eq!(ReportQuery { days: Some(0) }.days(), 1);
        assert_eq!(ReportQuery { days: Some(9999) }.days(), 365);
        assert_eq!(ReportQuery { days: Some(7) }.days(), 7);
    }

    #[test]
    fn test_sales_bars_relative_to_best_day() {
        let day = |d: u32, cents: i64| SalesByDay {
            day: NaiveDate::from_ymd_opt(2025, 3, d).unwrap(),
            orders: i64::from(cents > 0),
            revenue: Price::from_cents(cents),
        };
        let views = sales_views(&[day(1, 5000), day(2, 0), day(3, 2500)]);
        assert_eq!(views[0].bar_percent, 100);
        assert_eq!(views[1].bar_percent, 0);
        assert_eq!(views[2].bar_percent, 50);
        assert_eq!(views[0].day, "01/03");
    }

    #[test]
    fn test_sales_bars_without_sales() {
        let views = sales_views(&[SalesByDay {
            day: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            orders: 0,
            revenue: Price::ZERO,
        }]);
        assert_eq!(views[0].bar_percent, 0);
    }
}
