//! Customer listing.

use askama::Template;
use askama_web::WebTemplate;
use axum::{Router, extract::State, routing::get};
use tracing::instrument;

use hortifruti_core::db::UserRepository;
use hortifruti_core::models::CustomerSummary;

use crate::error::Result;
use crate::middleware::RequireAdminAuth;
use crate::routes::{AdminUserView, format_datetime};
use crate::state::AppState;

/// Customer table row.
#[derive(Debug, Clone)]
pub struct CustomerView {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub order_count: i64,
    pub total_spent: String,
    pub last_order_at: Option<String>,
    pub created_at: String,
}

impl From<&CustomerSummary> for CustomerView {
    fn from(summary: &CustomerSummary) -> Self {
        Self {
            id: summary.user.id.as_i32(),
            name: summary.user.name.clone(),
            email: summary.user.email.to_string(),
            phone: summary.user.phone.clone().unwrap_or_else(|| "-".to_string()),
            order_count: summary.order_count,
            total_spent: summary.total_spent.to_string(),
            last_order_at: summary.last_order_at.as_ref().map(format_datetime),
            created_at: summary.user.created_at.format("%d/%m/%Y").to_string(),
        }
    }
}

/// Customers list template.
#[derive(Template, WebTemplate)]
#[template(path = "customers/index.html")]
pub struct CustomersIndexTemplate {
    pub admin_user: AdminUserView,
    pub current_path: String,
    pub customers: Vec<CustomerView>,
}

/// Build the customers router.
pub fn router() -> Router<AppState> {
    Router::new().route("/customers", get(index))
}

#[instrument(skip(admin, state))]
async fn index(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
) -> Result<CustomersIndexTemplate> {
    let customers = UserRepository::new(state.pool()).list_customers().await?;

    Ok(CustomersIndexTemplate {
        admin_user: AdminUserView::from(&admin),
        current_path: "/customers".to_string(),
        customers: customers.iter().map(CustomerView::from).collect(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use chrono::{TimeZone, Utc};
    use hortifruti_core::models::User;
    use hortifruti_core::{Email, Price, UserId};

    #[test]
    fn test_customer_view() {
        let summary = CustomerSummary {
            user: User {
                id: UserId::new(2),
                name: "Cliente Teste".to_string(),
                email: Email::parse("cliente@teste.com").unwrap(),
                phone: None,
                is_admin: false,
                created_at: Utc.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap(),
            },
            order_count: 0,
            total_spent: Price::ZERO,
            last_order_at: None,
        };
        let view = CustomerView::from(&summary);
        assert_eq!(view.phone, "-");
        assert_eq!(view.total_spent, "R$ 0.00");
        assert_eq!(view.created_at, "15/01/2025");
        assert!(view.last_order_at.is_none());
    }
}
