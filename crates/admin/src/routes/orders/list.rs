//! Orders list page handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::{Query, State};
use serde::Deserialize;
use tracing::instrument;

use hortifruti_core::OrderStatus;
use hortifruti_core::db::OrderRepository;

use super::OrderRowView;
use crate::error::Result;
use crate::middleware::RequireAdminAuth;
use crate::routes::AdminUserView;
use crate::state::AppState;

/// Query parameters for the order list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrdersQuery {
    /// Status filter; empty or unknown values show every order.
    pub status: Option<String>,
}

impl OrdersQuery {
    #[must_use]
    pub fn status_filter(&self) -> Option<OrderStatus> {
        self.status.as_deref().and_then(|s| s.parse().ok())
    }
}

/// Status filter tab.
#[derive(Debug, Clone)]
pub struct StatusTab {
    pub value: &'static str,
    pub label: &'static str,
    pub active: bool,
}

fn status_tabs(selected: Option<OrderStatus>) -> Vec<StatusTab> {
    std::iter::once(StatusTab {
        value: "",
        label: "Todos",
        active: selected.is_none(),
    })
    .chain(OrderStatus::ALL.into_iter().map(|status| StatusTab {
        value: status.as_str(),
        label: status.label(),
        active: selected == Some(status),
    }))
    .collect()
}

/// Orders list page template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/index.html")]
pub struct OrdersIndexTemplate {
    pub admin_user: AdminUserView,
    pub current_path: String,
    pub tabs: Vec<StatusTab>,
    pub orders: Vec<OrderRowView>,
}

/// Orders list page handler.
#[instrument(skip(admin, state))]
pub async fn index(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    Query(query): Query<OrdersQuery>,
) -> Result<OrdersIndexTemplate> {
    let status = query.status_filter();
    let orders = OrderRepository::new(state.pool())
        .list_summaries(status, None)
        .await?;

    Ok(OrdersIndexTemplate {
        admin_user: AdminUserView::from(&admin),
        current_path: "/orders".to_string(),
        tabs: status_tabs(status),
        orders: orders.iter().map(OrderRowView::from).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_filter_ignores_unknown_values() {
        let query = OrdersQuery {
            status: Some("shipped".to_string()),
        };
        assert_eq!(query.status_filter(), Some(OrderStatus::Shipped));

        let query = OrdersQuery {
            status: Some("archived".to_string()),
        };
        assert_eq!(query.status_filter(), None);
        assert_eq!(OrdersQuery::default().status_filter(), None);
    }

    #[test]
    fn test_tabs_mark_selected_status() {
        let tabs = status_tabs(Some(OrderStatus::Pending));
        assert_eq!(tabs.len(), 6);
        assert!(!tabs[0].active);
        assert!(tabs.iter().any(|t| t.value == "pending" && t.active));
    }
}
