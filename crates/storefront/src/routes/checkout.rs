//! Checkout route handlers.
//!
//! Checkout requires a logged-in customer. The form carries a server-issued
//! `client_ref`, so submitting it twice places a single order.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;
use uuid::Uuid;

use hortifruti_core::cart::Cart;
use hortifruti_core::checkout::{CheckoutError, DeliveryAddress, PaymentChoice};
use hortifruti_core::db::{NewOrderItem, ProductRepository, RepositoryError};
use hortifruti_core::{PaymentMethod, Price, ProductId};

use crate::error::{AppError, Result, repository_message};
use crate::middleware::RequireAuth;
use crate::routes::PageContext;
use crate::routes::account::OrderView;
use crate::routes::cart::{CartView, load_cart, save_cart};
use crate::services::orders::{OrderError, OrderRequest, place_order};
use crate::state::AppState;

/// Payment method radio option.
#[derive(Clone)]
pub struct PaymentOption {
    pub value: &'static str,
    pub label: &'static str,
    pub checked: bool,
}

fn items_json(cart: &Cart) -> String {
    let items: Vec<serde_json::Value> = cart
        .items()
        .iter()
        .map(|item| {
            serde_json::json!({
                "product_id": item.product.id,
                "quantity": item.quantity,
            })
        })
        .collect();
    serde_json::Value::Array(items).to_string()
}

fn payment_options(selected: &str) -> Vec<PaymentOption> {
    PaymentMethod::ALL
        .into_iter()
        .map(|method| PaymentOption {
            value: method.as_str(),
            label: method.label(),
            checked: method.as_str() == selected,
        })
        .collect()
}

/// Checkout form fields.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckoutForm {
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub number: String,
    #[serde(default)]
    pub complement: String,
    #[serde(default)]
    pub neighborhood: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub zipcode: String,
    #[serde(default)]
    pub payment_method: String,
    #[serde(default)]
    pub change_for: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub client_ref: String,
}

impl CheckoutForm {
    fn blank() -> Self {
        Self {
            city: "São Paulo".to_string(),
            payment_method: PaymentMethod::Pix.as_str().to_string(),
            client_ref: Uuid::new_v4().to_string(),
            ..Self::default()
        }
    }

    /// Build the order request from the form and the cart.
    ///
    /// # Errors
    ///
    /// Returns the first invalid field as a `CheckoutError`.
    pub fn to_request(&self, cart: &Cart) -> std::result::Result<OrderRequest, CheckoutError> {
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let address = DeliveryAddress::new(
            &self.street,
            &self.number,
            Some(&self.complement),
            &self.neighborhood,
            &self.city,
            &self.zipcode,
        )?;

        let method: PaymentMethod = self
            .payment_method
            .parse()
            .map_err(|_| CheckoutError::MissingField("forma de pagamento"))?;
        let change_for = match self.change_for.trim() {
            "" => None,
            raw => Some(
                raw.parse::<Price>()
                    .map_err(|_| CheckoutError::InsufficientChange)?,
            ),
        };

        Ok(OrderRequest {
            items: cart
                .items()
                .iter()
                .map(|item| NewOrderItem {
                    product_id: item.product.id,
                    quantity: item.quantity,
                })
                .collect(),
            address,
            payment: PaymentChoice::new(method, change_for),
            coupon: cart.coupon(),
            notes: Some(self.notes.clone()),
            client_ref: Uuid::parse_str(self.client_ref.trim()).ok(),
        })
    }
}

/// Checkout page template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/form.html")]
pub struct CheckoutTemplate {
    pub page: PageContext,
    pub cart: CartView,
    pub form: CheckoutForm,
    pub payment_options: Vec<PaymentOption>,
    pub error: Option<String>,
    /// `[{product_id, quantity}]` for the offline order queue.
    pub items_json: String,
}

/// Order confirmation template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/success.html")]
pub struct CheckoutSuccessTemplate {
    pub page: PageContext,
    pub order: OrderView,
}

/// Refresh cart snapshots against the catalog and persist them.
async fn refreshed_cart(state: &AppState, session: &Session) -> Result<Cart> {
    let mut cart = load_cart(session).await;
    if !cart.is_empty() {
        let ids: Vec<ProductId> = cart.items().iter().map(|i| i.product.id).collect();
        let products = ProductRepository::new(state.pool()).get_many(&ids).await?;
        let dropped = cart.refresh_prices(&products);
        if !dropped.is_empty() {
            tracing::info!(?dropped, "unavailable products dropped at checkout");
        }
        save_cart(session, &cart).await?;
    }
    Ok(cart)
}

/// Display the checkout form.
#[instrument(skip(state, session, page, user), fields(user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    page: PageContext,
    RequireAuth(user): RequireAuth,
) -> Result<Response> {
    let cart = refreshed_cart(&state, &session).await?;
    if cart.is_empty() {
        return Ok(Redirect::to("/cart?error=empty").into_response());
    }

    let settings = state.catalog().settings(state.pool()).await?;
    let form = CheckoutForm::blank();

    Ok(CheckoutTemplate {
        page,
        cart: CartView::build(&cart, &settings.rules()),
        payment_options: payment_options(&form.payment_method),
        form,
        error: None,
        items_json: items_json(&cart),
    }
    .into_response())
}

/// Customer-facing text for an order that could not be placed, or `None`
/// when the failure is a server error.
fn order_error_message(err: &OrderError) -> Option<String> {
    match err {
        OrderError::Repository(
            RepositoryError::Database(_) | RepositoryError::DataCorruption(_),
        ) => None,
        OrderError::Repository(repo) => Some(repository_message(repo)),
        other => Some(other.to_string()),
    }
}

/// Place the order.
#[instrument(skip(state, session, page, user, form), fields(user_id = %user.id))]
pub async fn place(
    State(state): State<AppState>,
    session: Session,
    page: PageContext,
    RequireAuth(user): RequireAuth,
    Form(form): Form<CheckoutForm>,
) -> Result<Response> {
    let mut cart = refreshed_cart(&state, &session).await?;
    let settings = state.catalog().settings(state.pool()).await?;
    let rules = settings.rules();

    let render_error = |cart: &Cart, form: CheckoutForm, message: String| {
        CheckoutTemplate {
            page: page.clone(),
            cart: CartView::build(cart, &rules),
            payment_options: payment_options(&form.payment_method),
            form,
            error: Some(message),
            items_json: items_json(cart),
        }
        .into_response()
    };

    let request = match form.to_request(&cart) {
        Ok(request) => request,
        Err(CheckoutError::EmptyCart) => {
            return Ok(Redirect::to("/cart?error=empty").into_response());
        }
        Err(err) => return Ok(render_error(&cart, form, err.to_string())),
    };

    let placed = match place_order(state.pool(), &rules, user.id, request).await {
        Ok(placed) => placed,
        Err(err) => {
            return match order_error_message(&err) {
                Some(message) => {
                    tracing::info!(error = %err, "checkout rejected");
                    Ok(render_error(&cart, form, message))
                }
                None => Err(AppError::Internal(err.to_string())),
            };
        }
    };

    if placed.is_new() {
        state.catalog().invalidate();
    }
    cart.clear();
    save_cart(&session, &cart).await?;

    let order = placed.into_order();
    tracing::info!(order_id = %order.id, total = %order.total, "order placed");

    Ok(CheckoutSuccessTemplate {
        page: PageContext {
            cart_count: 0,
            ..page
        },
        order: OrderView::from(&order),
    }
    .into_response())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use hortifruti_core::cart::CartProduct;
    use hortifruti_core::checkout::Coupon;

    fn cart() -> Cart {
        let mut cart = Cart::new();
        cart.add(
            CartProduct {
                id: ProductId::new(7),
                name: "Cenoura".to_string(),
                unit: "kg".to_string(),
                unit_price: Price::from_cents(399),
                image: None,
                stock: 20,
            },
            6,
        );
        cart.apply_coupon(Coupon::Frutas10);
        cart
    }

    fn form() -> CheckoutForm {
        CheckoutForm {
            street: "Rua das Flores".to_string(),
            number: "45".to_string(),
            complement: String::new(),
            neighborhood: "Centro".to_string(),
            city: "São Paulo".to_string(),
            zipcode: "01310100".to_string(),
            payment_method: "money".to_string(),
            change_for: "50,00".to_string(),
            notes: "Tocar a campainha".to_string(),
            client_ref: "5f0c7d3e-2b1a-4c8e-9f4d-1a2b3c4d5e6f".to_string(),
        }
    }

    #[test]
    fn test_form_builds_request_from_cart() {
        let request = form().to_request(&cart()).unwrap();
        assert_eq!(request.items.len(), 1);
        assert_eq!(request.items[0].product_id, ProductId::new(7));
        assert_eq!(request.items[0].quantity, 6);
        assert_eq!(request.coupon, Some(Coupon::Frutas10));
        assert_eq!(request.address.zipcode.as_str(), "01310-100");
        assert_eq!(request.payment.method, PaymentMethod::Cash);
        assert_eq!(request.payment.change_for, Some(Price::from_cents(5000)));
        assert!(request.client_ref.is_some());
    }

    #[test]
    fn test_form_rejects_missing_address_field() {
        let mut form = form();
        form.neighborhood = "  ".to_string();
        assert_eq!(
            form.to_request(&cart()).unwrap_err(),
            CheckoutError::MissingField("bairro")
        );
    }

    #[test]
    fn test_form_rejects_unknown_payment_method() {
        let mut form = form();
        form.payment_method = "boleto".to_string();
        assert!(form.to_request(&cart()).is_err());
    }

    #[test]
    fn test_change_is_ignored_for_card_payments() {
        let mut form = form();
        form.payment_method = "credit_card".to_string();
        let request = form.to_request(&cart()).unwrap();
        assert_eq!(request.payment.change_for, None);
    }

    #[test]
    fn test_empty_cart_is_rejected() {
        assert_eq!(
            form().to_request(&Cart::new()).unwrap_err(),
            CheckoutError::EmptyCart
        );
    }

    #[test]
    fn test_items_json_for_offline_queue() {
        let json: serde_json::Value = serde_json::from_str(&items_json(&cart())).unwrap();
        assert_eq!(json[0]["product_id"], 7);
        assert_eq!(json[0]["quantity"], 6);
    }

    #[test]
    fn test_blank_form_has_fresh_client_ref() {
        let a = CheckoutForm::blank();
        let b = CheckoutForm::blank();
        assert_ne!(a.client_ref, b.client_ref);
        assert!(Uuid::parse_str(&a.client_ref).is_ok());
    }

    #[test]
    fn test_order_error_messages() {
        let stock = OrderError::Repository(RepositoryError::InsufficientStock {
            product: "Banana".to_string(),
            available: 1,
            requested: 3,
        });
        assert_eq!(
            order_error_message(&stock).as_deref(),
            Some("Estoque insuficiente para o produto Banana")
        );
        let db = OrderError::Repository(RepositoryError::DataCorruption("x".to_string()));
        assert_eq!(order_error_message(&db), None);
    }
}
