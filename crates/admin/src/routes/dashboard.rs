//! Dashboard route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::{Router, extract::State, routing::get};
use tracing::instrument;

use hortifruti_core::db::{DashboardCounters, OrderRepository, ProductRepository, ReportRepository};

use crate::error::Result;
use crate::middleware::RequireAdminAuth;
use crate::routes::AdminUserView;
use crate::routes::orders::OrderRowView;
use crate::state::AppState;

/// Number of orders shown under "Pedidos recentes".
const RECENT_ORDERS: i64 = 5;

/// Products at or below this stock are flagged.
pub const LOW_STOCK_THRESHOLD: i32 = 10;

/// Dashboard metrics.
#[derive(Debug, Clone)]
pub struct DashboardMetrics {
    pub orders: i64,
    pub pending_orders: i64,
    pub revenue: String,
    pub customers: i64,
    pub products: i64,
}

impl From<DashboardCounters> for DashboardMetrics {
    fn from(counters: DashboardCounters) -> Self {
        Self {
            orders: counters.orders,
            pending_orders: counters.pending_orders,
            revenue: counters.revenue.to_string(),
            customers: counters.customers,
            products: counters.products,
        }
    }
}

/// Low-stock warning row.
#[derive(Debug, Clone)]
pub struct LowStockView {
    pub id: i32,
    pub name: String,
    pub stock: i32,
    pub unit: String,
}

/// Dashboard template.
#[derive(Template, WebTemplate)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub admin_user: AdminUserView,
    pub current_path: String,
    pub metrics: DashboardMetrics,
    /// Most recent orders.
    pub orders: Vec<OrderRowView>,
    pub low_stock: Vec<LowStockView>,
}

/// Build the dashboard router.
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(dashboard))
}

/// Dashboard page handler.
#[instrument(skip(admin, state))]
async fn dashboard(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
) -> Result<DashboardTemplate> {
    let reports = ReportRepository::new(state.pool());
    let orders = OrderRepository::new(state.pool());
    let products = ProductRepository::new(state.pool());

    let (counters, recent, low_stock) = tokio::try_join!(
        reports.dashboard(),
        orders.list_summaries(None, Some(RECENT_ORDERS)),
        products.low_stock(LOW_STOCK_THRESHOLD),
    )?;

    Ok(DashboardTemplate {
        admin_user: AdminUserView::from(&admin),
        current_path: "/".to_string(),
        metrics: DashboardMetrics::from(counters),
        orders: recent.iter().map(OrderRowView::from).collect(),
        low_stock: low_stock
            .into_iter()
            .map(|p| LowStockView {
                id: p.id.as_i32(),
                name: p.name,
                stock: p.stock,
                unit: p.unit,
            })
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use hortifruti_core::Price;

    #[test]
    fn test_metrics_format_revenue() {
        let metrics = DashboardMetrics::from(DashboardCounters {
            orders: 12,
            products: 4,
            customers: 3,
            revenue: Price::from_cents(15_990),
            pending_orders: 2,
        });
        assert_eq!(metrics.revenue, "R$ 159.90");
        assert_eq!(metrics.pending_orders, 2);
    }
}
