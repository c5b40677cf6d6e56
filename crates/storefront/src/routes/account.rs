//! Account route handlers.
//!
//! These routes require authentication.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use hortifruti_core::OrderId;
use hortifruti_core::db::OrderRepository;
use hortifruti_core::models::{Order, OrderItem, User};

use crate::error::{AppError, Result};
use crate::middleware::{RequireAuth, set_current_user};
use crate::models::CurrentUser;
use crate::routes::PageContext;
use crate::services::auth::{AuthError, AuthService, ProfileUpdate};
use crate::services::orders::can_view;
use crate::state::AppState;

/// Number of orders shown on the account overview.
const RECENT_ORDERS: usize = 3;

/// Date format used across account pages.
pub const DATE_FORMAT: &str = "%d/%m/%Y %H:%M";

/// Profile display data for templates.
#[derive(Clone)]
pub struct ProfileView {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub member_since: String,
}

impl From<&User> for ProfileView {
    fn from(user: &User) -> Self {
        Self {
            name: user.name.clone(),
            email: user.email.to_string(),
            phone: user.phone.clone().unwrap_or_default(),
            member_since: user.created_at.format("%d/%m/%Y").to_string(),
        }
    }
}

/// Order line display data for templates.
#[derive(Clone)]
pub struct OrderItemView {
    pub name: String,
    pub unit: String,
    pub quantity: i32,
    pub price: String,
    pub line_price: String,
}

impl From<&OrderItem> for OrderItemView {
    fn from(item: &OrderItem) -> Self {
        Self {
            name: item.product_name.clone(),
            unit: item.unit.clone(),
            quantity: item.quantity,
            price: item.price.to_string(),
            line_price: item.subtotal().to_string(),
        }
    }
}

/// Order display data for templates.
#[derive(Clone)]
pub struct OrderView {
    pub id: i32,
    pub created_at: String,
    pub status: &'static str,
    pub status_class: &'static str,
    pub address: String,
    pub payment: String,
    pub coupon: Option<String>,
    pub subtotal: String,
    pub discount: Option<String>,
    pub delivery_fee: String,
    pub total: String,
    pub notes: Option<String>,
    pub item_count: i32,
    pub items: Vec<OrderItemView>,
}

impl From<&Order> for OrderView {
    fn from(order: &Order) -> Self {
        let payment = match order.payment_details.split_once(" (") {
            Some((_, change)) => format!("{} ({change}", order.payment_method.label()),
            None => order.payment_method.label().to_string(),
        };

        Self {
            id: order.id.as_i32(),
            created_at: order.created_at.format(DATE_FORMAT).to_string(),
            status: order.status.label(),
            status_class: order.status.badge_class(),
            address: order.address.clone(),
            payment,
            coupon: order.coupon.clone(),
            subtotal: order.subtotal.to_string(),
            discount: (!order.discount.is_zero()).then(|| order.discount.to_string()),
            delivery_fee: order.delivery_fee.to_string(),
            total: order.total.to_string(),
            notes: order.notes.clone(),
            item_count: order.item_count(),
            items: order.items.iter().map(OrderItemView::from).collect(),
        }
    }
}

/// Profile form data. Password fields are optional.
#[derive(Debug, Deserialize)]
pub struct ProfileForm {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub password_confirm: String,
    #[serde(default)]
    pub current_password: String,
}

/// Query parameters for error/success display.
#[derive(Debug, Default, Deserialize)]
pub struct MessageQuery {
    pub error: Option<String>,
    pub success: Option<String>,
}

fn error_message(code: &str) -> Option<&'static str> {
    Some(match code {
        "email_taken" => "Email já cadastrado",
        "email_invalid" => "Email inválido",
        "password_mismatch" => "As senhas não coincidem",
        "password_too_short" => "A senha deve ter pelo menos 8 caracteres",
        "current_password_required" => "Informe a senha atual para trocar a senha",
        "current_password_wrong" => "Senha atual incorreta",
        "missing" => "Preencha todos os campos obrigatórios",
        _ => return None,
    })
}

fn success_message(code: &str) -> Option<&'static str> {
    Some(match code {
        "updated" => "Perfil atualizado com sucesso",
        _ => return None,
    })
}

const fn profile_error_code(err: &AuthError) -> Option<&'static str> {
    Some(match err {
        AuthError::UserAlreadyExists => "email_taken",
        AuthError::InvalidEmail(_) => "email_invalid",
        AuthError::PasswordMismatch => "password_mismatch",
        AuthError::WeakPassword(_) => "password_too_short",
        AuthError::CurrentPasswordRequired => "current_password_required",
        AuthError::WrongCurrentPassword => "current_password_wrong",
        AuthError::MissingName => "missing",
        _ => return None,
    })
}

/// Account overview page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/index.html")]
pub struct AccountIndexTemplate {
    pub page: PageContext,
    pub profile: ProfileView,
    /// Most recent orders only.
    pub orders: Vec<OrderView>,
    pub error: Option<&'static str>,
    pub success: Option<&'static str>,
}

/// Order history page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/orders.html")]
pub struct AccountOrdersTemplate {
    pub page: PageContext,
    pub orders: Vec<OrderView>,
}

/// Order detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/order.html")]
pub struct AccountOrderTemplate {
    pub page: PageContext,
    pub order: OrderView,
}

/// Display account overview with the profile form.
#[instrument(skip(state, page, current_user), fields(user_id = %current_user.id))]
pub async fn index(
    State(state): State<AppState>,
    page: PageContext,
    RequireAuth(current_user): RequireAuth,
    Query(query): Query<MessageQuery>,
) -> Result<impl IntoResponse> {
    let user = AuthService::new(state.pool()).user(current_user.id).await?;
    let orders = OrderRepository::new(state.pool())
        .list_for_user(current_user.id)
        .await?;

    Ok(AccountIndexTemplate {
        page,
        profile: ProfileView::from(&user),
        orders: orders
            .iter()
            .take(RECENT_ORDERS)
            .map(OrderView::from)
            .collect(),
        error: query.error.as_deref().and_then(error_message),
        success: query.success.as_deref().and_then(success_message),
    })
}

/// Update name, email, phone and optionally the password.
#[instrument(skip(state, session, current_user, form), fields(user_id = %current_user.id))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(current_user): RequireAuth,
    Form(form): Form<ProfileForm>,
) -> Result<Response> {
    let update = ProfileUpdate {
        name: Some(&form.name),
        email: Some(&form.email),
        phone: Some(&form.phone),
        password: Some(&form.password),
        password_confirm: Some(&form.password_confirm),
        current_password: Some(&form.current_password),
    };

    let user = match AuthService::new(state.pool())
        .update_profile(current_user.id, &update)
        .await
    {
        Ok(user) => user,
        Err(err) => {
            return match profile_error_code(&err) {
                Some(code) => Ok(Redirect::to(&format!("/account?error={code}")).into_response()),
                None => Err(AppError::Auth(err)),
            };
        }
    };

    set_current_user(&session, &CurrentUser::from(&user)).await?;
    Ok(Redirect::to("/account?success=updated").into_response())
}

/// Display the customer's order history.
#[instrument(skip(state, page, current_user), fields(user_id = %current_user.id))]
pub async fn orders(
    State(state): State<AppState>,
    page: PageContext,
    RequireAuth(current_user): RequireAuth,
) -> Result<impl IntoResponse> {
    let orders = OrderRepository::new(state.pool())
        .list_for_user(current_user.id)
        .await?;

    Ok(AccountOrdersTemplate {
        page,
        orders: orders.iter().map(OrderView::from).collect(),
    })
}

/// Display one of the customer's orders. Other customers' orders are not
/// found.
#[instrument(skip(state, page, current_user), fields(user_id = %current_user.id))]
pub async fn order_detail(
    State(state): State<AppState>,
    page: PageContext,
    RequireAuth(current_user): RequireAuth,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse> {
    let order = OrderRepository::new(state.pool())
        .get(OrderId::new(id))
        .await?
        .filter(|order| can_view(order, current_user.id, false))
        .ok_or_else(|| AppError::NotFound("Pedido não encontrado".to_string()))?;

    Ok(AccountOrderTemplate {
        page,
        order: OrderView::from(&order),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use chrono::{TimeZone, Utc};
    use hortifruti_core::{OrderItemId, OrderStatus, PaymentMethod, Price, ProductId, UserId};

    fn order() -> Order {
        Order {
            id: OrderId::new(12),
            user_id: UserId::new(3),
            status: OrderStatus::Shipped,
            address: "Rua A, 1 - Centro, São Paulo - 01310-100".to_string(),
            zipcode: "01310-100".to_string(),
            payment_method: PaymentMethod::Cash,
            payment_details: "money (Troco para R$ 50.00)".to_string(),
            coupon: Some("FRUTAS10".to_string()),
            subtotal: Price::from_cents(3000),
            discount: Price::from_cents(300),
            delivery_fee: Price::from_cents(599),
            total: Price::from_cents(3299),
            notes: None,
            client_ref: None,
            created_at: Utc.with_ymd_and_hms(2025, 3, 14, 9, 30, 0).unwrap(),
            items: vec![OrderItem {
                id: OrderItemId::new(1),
                order_id: OrderId::new(12),
                product_id: Some(ProductId::new(2)),
                product_name: "Banana".to_string(),
                unit: "kg".to_string(),
                quantity: 6,
                price: Price::from_cents(500),
            }],
        }
    }

    #[test]
    fn test_order_view() {
        let view = OrderView::from(&order());
        assert_eq!(view.id, 12);
        assert_eq!(view.created_at, "14/03/2025 09:30");
        assert_eq!(view.status, "Enviado");
        assert_eq!(view.payment, "Dinheiro (Troco para R$ 50.00)");
        assert_eq!(view.discount.as_deref(), Some("R$ 3.00"));
        assert_eq!(view.item_count, 6);
        assert_eq!(view.items[0].line_price, "R$ 30.00");
    }

    #[test]
    fn test_order_view_without_change() {
        let mut order = order();
        order.payment_method = PaymentMethod::Pix;
        order.payment_details = "pix".to_string();
        order.discount = Price::ZERO;
        let view = OrderView::from(&order);
        assert_eq!(view.payment, "Pix");
        assert_eq!(view.discount, None);
    }

    #[test]
    fn test_profile_error_codes() {
        assert_eq!(
            profile_error_code(&AuthError::UserAlreadyExists),
            Some("email_taken")
        );
        assert_eq!(profile_error_code(&AuthError::PasswordHash), None);
        for code in [
            "email_taken",
            "email_invalid",
            "password_mismatch",
            "password_too_short",
            "current_password_required",
            "current_password_wrong",
            "missing",
        ] {
            assert!(error_message(code).is_some());
        }
    }

    #[test]
    fn test_wrong_current_password_is_shown_on_the_form() {
        let code = profile_error_code(&AuthError::WrongCurrentPassword).unwrap();
        assert_eq!(error_message(code), Some("Senha atual incorreta"));
        let code = profile_error_code(&AuthError::CurrentPasswordRequired).unwrap();
        assert_eq!(
            error_message(code),
            Some("Informe a senha atual para trocar a senha")
        );
    }

    #[tokio::test]
    async fn test_profile_form_reads_current_password() {
        use axum::extract::FromRequest;

        let request = axum::http::Request::builder()
            .method("POST")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(axum::body::Body::from(
                "name=Ana&email=ana%40example.com&password=senha-nova-1&current_password=senha-antiga",
            ))
            .unwrap();
        let Form(form) = Form::<ProfileForm>::from_request(request, &()).await.unwrap();
        assert_eq!(form.current_password, "senha-antiga");
        assert_eq!(form.password_confirm, "");
    }
}
