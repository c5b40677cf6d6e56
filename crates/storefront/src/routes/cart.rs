//! Cart route handlers.
//!
//! The cart lives in the session as a [`Cart`] value. Form posts redirect
//! back to `/cart` with a `?success=`/`?error=` code; requests sent by the
//! page script with an `HX-Request` header get the count badge fragment and
//! an `HX-Trigger: cart-updated` header instead.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use hortifruti_core::ProductId;
use hortifruti_core::cart::{Cart, CartItem, CartProduct};
use hortifruti_core::checkout::{Coupon, StoreRules};
use hortifruti_core::db::ProductRepository;

use crate::error::Result;
use crate::models::session_keys;
use crate::routes::PageContext;
use crate::routes::products::PLACEHOLDER_IMAGE;
use crate::state::AppState;

/// Cart item display data for templates.
#[derive(Clone)]
pub struct CartItemView {
    pub product_id: i32,
    pub name: String,
    pub unit: String,
    pub image: String,
    pub quantity: i32,
    pub price: String,
    pub line_price: String,
    pub exceeds_stock: bool,
    pub stock: i32,
}

impl From<&CartItem> for CartItemView {
    fn from(item: &CartItem) -> Self {
        Self {
            product_id: item.product.id.as_i32(),
            name: item.product.name.clone(),
            unit: item.product.unit.clone(),
            image: item
                .product
                .image
                .clone()
                .unwrap_or_else(|| PLACEHOLDER_IMAGE.to_string()),
            quantity: item.quantity,
            price: item.product.unit_price.to_string(),
            line_price: item.line_total().to_string(),
            exceeds_stock: item.exceeds_stock(),
            stock: item.product.stock,
        }
    }
}

/// Cart display data for templates.
#[derive(Clone)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub item_count: i32,
    pub subtotal: String,
    pub discount: Option<String>,
    pub delivery_fee: String,
    pub total: String,
    pub coupon_code: Option<String>,
    pub coupon_message: Option<String>,
    /// Amount still needed to reach the minimum order, when below it.
    pub missing_for_minimum: Option<String>,
    pub min_order_value: String,
}

impl CartView {
    #[must_use]
    pub fn build(cart: &Cart, rules: &StoreRules) -> Self {
        let quote = cart.quote(rules);
        let missing = quote.missing_for_minimum();

        Self {
            items: cart.items().iter().map(CartItemView::from).collect(),
            item_count: cart.item_count(),
            subtotal: quote.subtotal.to_string(),
            discount: (!quote.discount.is_zero()).then(|| quote.discount.to_string()),
            delivery_fee: quote.delivery_fee.to_string(),
            total: quote.total.to_string(),
            coupon_code: cart.coupon().map(|c| c.code().to_string()),
            coupon_message: cart.coupon().map(|c| c.message().to_string()),
            missing_for_minimum: (!cart.is_empty() && !missing.is_zero())
                .then(|| missing.to_string()),
            min_order_value: rules.min_order_value.to_string(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

// =============================================================================
// Session Helpers
// =============================================================================

/// Get the cart from the session, or an empty one.
pub async fn load_cart(session: &Session) -> Cart {
    session
        .get::<Cart>(session_keys::CART)
        .await
        .ok()
        .flatten()
        .unwrap_or_default()
}

/// Store the cart in the session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn save_cart(
    session: &Session,
    cart: &Cart,
) -> std::result::Result<(), tower_sessions::session::Error> {
    session.insert(session_keys::CART, cart).await
}

// =============================================================================
// Messages
// =============================================================================

/// Query parameters carrying a message code after a redirect.
#[derive(Debug, Default, Deserialize)]
pub struct MessageQuery {
    pub success: Option<String>,
    pub error: Option<String>,
    /// Product name for stock messages.
    pub product: Option<String>,
}

fn success_message(code: &str) -> Option<String> {
    let text = match code {
        "added" => "Produto adicionado ao carrinho",
        "updated" => "Carrinho atualizado",
        "removed" => "Produto removido do carrinho",
        "cleared" => "Carrinho esvaziado",
        "coupon_removed" => "Cupom removido",
        _ => return None,
    };
    Some(text.to_string())
}

fn error_message(code: &str, product: Option<&str>) -> Option<String> {
    let text = match code {
        "unavailable" => "Produto indisponível".to_string(),
        "stock" => match product {
            Some(name) => format!("Estoque insuficiente para o produto {name}"),
            None => "Estoque insuficiente".to_string(),
        },
        "not_in_cart" => "Produto não está no carrinho".to_string(),
        "coupon" => "Cupom inválido ou expirado".to_string(),
        "empty" => "O carrinho está vazio".to_string(),
        _ => return None,
    };
    Some(text)
}

// =============================================================================
// Forms
// =============================================================================

/// Add to cart form data.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub product_id: i32,
    pub quantity: Option<i32>,
}

/// Update cart form data.
#[derive(Debug, Deserialize)]
pub struct UpdateCartForm {
    pub product_id: i32,
    pub quantity: i32,
}

/// Form data naming a single product.
#[derive(Debug, Deserialize)]
pub struct ProductForm {
    pub product_id: i32,
}

/// Coupon form data.
#[derive(Debug, Deserialize)]
pub struct CouponForm {
    pub code: String,
}

// =============================================================================
// Templates
// =============================================================================

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub page: PageContext,
    pub cart: CartView,
    pub success: Option<String>,
    pub error: Option<String>,
    /// Products dropped because they are no longer sold.
    pub dropped: Vec<String>,
}

/// Cart count badge fragment template.
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_count.html")]
pub struct CartCountTemplate {
    pub count: i32,
}

fn is_fragment_request(headers: &HeaderMap) -> bool {
    headers.contains_key("HX-Request")
}

fn cart_redirect(query: &str) -> Response {
    Redirect::to(&format!("/cart?{query}")).into_response()
}

/// Badge fragment for script requests, redirect for plain form posts.
fn updated_response(headers: &HeaderMap, cart: &Cart, success: &str) -> Response {
    if is_fragment_request(headers) {
        (
            AppendHeaders([("HX-Trigger", "cart-updated")]),
            CartCountTemplate {
                count: cart.item_count(),
            },
        )
            .into_response()
    } else {
        cart_redirect(&format!("success={success}"))
    }
}

fn rejected_response(headers: &HeaderMap, code: &str, product: Option<&str>) -> Response {
    if is_fragment_request(headers) {
        let message = error_message(code, product).unwrap_or_default();
        (StatusCode::CONFLICT, message).into_response()
    } else {
        let mut query = format!("error={code}");
        if let Some(name) = product {
            query.push_str("&product=");
            query.push_str(&urlencoding::encode(name));
        }
        cart_redirect(&query)
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Display cart page.
///
/// Snapshots are refreshed against the catalog so prices shown here are the
/// prices checkout will charge.
#[instrument(skip(state, session, page))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    page: PageContext,
    Query(query): Query<MessageQuery>,
) -> Result<impl IntoResponse> {
    let mut cart = load_cart(&session).await;
    let mut dropped = Vec::new();

    if !cart.is_empty() {
        let ids: Vec<ProductId> = cart.items().iter().map(|i| i.product.id).collect();
        let products = ProductRepository::new(state.pool()).get_many(&ids).await?;
        dropped = cart.refresh_prices(&products);
        save_cart(&session, &cart).await?;
    }

    let settings = state.catalog().settings(state.pool()).await?;
    let page = PageContext {
        cart_count: cart.item_count(),
        ..page
    };

    Ok(CartShowTemplate {
        page,
        cart: CartView::build(&cart, &settings.rules()),
        success: query.success.as_deref().and_then(success_message),
        error: query
            .error
            .as_deref()
            .and_then(|code| error_message(code, query.product.as_deref())),
        dropped,
    })
}

/// Add a product to the cart.
///
/// The product must be on sale and in stock; the resulting quantity may not
/// exceed current stock.
#[instrument(skip(state, session, headers))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<AddToCartForm>,
) -> Result<Response> {
    let quantity = form.quantity.unwrap_or(1).max(1);
    let product = ProductRepository::new(state.pool())
        .get(ProductId::new(form.product_id))
        .await?;

    let Some(product) = product.filter(|p| p.is_purchasable()) else {
        return Ok(rejected_response(&headers, "unavailable", None));
    };

    let mut cart = load_cart(&session).await;
    let in_cart = cart.get(product.id).map_or(0, |item| item.quantity);
    if in_cart.saturating_add(quantity) > product.stock {
        return Ok(rejected_response(&headers, "stock", Some(&product.name)));
    }

    cart.add(CartProduct::from(&product), quantity);
    save_cart(&session, &cart).await?;
    tracing::debug!(product_id = %product.id, quantity, "added to cart");

    Ok(updated_response(&headers, &cart, "added"))
}

/// Set the quantity of a cart item. Zero or less removes it.
#[instrument(skip(session, headers))]
pub async fn update(
    session: Session,
    headers: HeaderMap,
    Form(form): Form<UpdateCartForm>,
) -> Result<Response> {
    let product_id = ProductId::new(form.product_id);
    let mut cart = load_cart(&session).await;

    if let Some(item) = cart.get(product_id)
        && form.quantity > item.product.stock
    {
        let name = item.product.name.clone();
        return Ok(rejected_response(&headers, "stock", Some(&name)));
    }

    if !cart.set_quantity(product_id, form.quantity) {
        return Ok(rejected_response(&headers, "not_in_cart", None));
    }
    save_cart(&session, &cart).await?;

    let code = if form.quantity <= 0 { "removed" } else { "updated" };
    Ok(updated_response(&headers, &cart, code))
}

/// Increase a cart item by one.
#[instrument(skip(session, headers))]
pub async fn increment(
    session: Session,
    headers: HeaderMap,
    Form(form): Form<ProductForm>,
) -> Result<Response> {
    let product_id = ProductId::new(form.product_id);
    let mut cart = load_cart(&session).await;

    if let Some(item) = cart.get(product_id)
        && item.quantity >= item.product.stock
    {
        let name = item.product.name.clone();
        return Ok(rejected_response(&headers, "stock", Some(&name)));
    }

    if !cart.increment(product_id) {
        return Ok(rejected_response(&headers, "not_in_cart", None));
    }
    save_cart(&session, &cart).await?;
    Ok(updated_response(&headers, &cart, "updated"))
}

/// Decrease a cart item by one, never below 1.
#[instrument(skip(session, headers))]
pub async fn decrement(
    session: Session,
    headers: HeaderMap,
    Form(form): Form<ProductForm>,
) -> Result<Response> {
    let mut cart = load_cart(&session).await;
    if !cart.decrement(ProductId::new(form.product_id)) {
        return Ok(rejected_response(&headers, "not_in_cart", None));
    }
    save_cart(&session, &cart).await?;
    Ok(updated_response(&headers, &cart, "updated"))
}

/// Remove a product from the cart.
#[instrument(skip(session, headers))]
pub async fn remove(
    session: Session,
    headers: HeaderMap,
    Form(form): Form<ProductForm>,
) -> Result<Response> {
    let mut cart = load_cart(&session).await;
    if cart.remove(ProductId::new(form.product_id)) {
        save_cart(&session, &cart).await?;
    }
    Ok(updated_response(&headers, &cart, "removed"))
}

/// Empty the cart.
#[instrument(skip(session, headers))]
pub async fn clear(session: Session, headers: HeaderMap) -> Result<Response> {
    let mut cart = load_cart(&session).await;
    cart.clear();
    save_cart(&session, &cart).await?;
    Ok(updated_response(&headers, &cart, "cleared"))
}

/// Apply a coupon code.
#[instrument(skip(session))]
pub async fn apply_coupon(session: Session, Form(form): Form<CouponForm>) -> Result<Response> {
    let mut cart = load_cart(&session).await;
    if cart.is_empty() {
        return Ok(cart_redirect("error=empty"));
    }

    let Some(coupon) = Coupon::lookup(&form.code) else {
        return Ok(cart_redirect("error=coupon"));
    };

    cart.apply_coupon(coupon);
    save_cart(&session, &cart).await?;
    tracing::debug!(coupon = %coupon, "coupon applied");
    Ok(Redirect::to("/cart").into_response())
}

/// Remove the applied coupon.
#[instrument(skip(session))]
pub async fn remove_coupon(session: Session) -> Result<Response> {
    let mut cart = load_cart(&session).await;
    cart.remove_coupon();
    save_cart(&session, &cart).await?;
    Ok(cart_redirect("success=coupon_removed"))
}

/// Get cart count badge.
#[instrument(skip(session))]
pub async fn count(session: Session) -> impl IntoResponse {
    CartCountTemplate {
        count: load_cart(&session).await.item_count(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use hortifruti_core::Price;

    fn cart_with(cents: i64, quantity: i32) -> Cart {
        let mut cart = Cart::new();
        cart.add(
            CartProduct {
                id: ProductId::new(1),
                name: "Maçã".to_string(),
                unit: "kg".to_string(),
                unit_price: Price::from_cents(cents),
                image: None,
                stock: 10,
            },
            quantity,
        );
        cart
    }

    #[test]
    fn test_view_below_minimum_shows_missing_amount() {
        let cart = cart_with(599, 2);
        let view = CartView::build(&cart, &StoreRules::default());
        assert_eq!(view.item_count, 2);
        assert_eq!(view.subtotal, Price::from_cents(1198).to_string());
        assert_eq!(
            view.missing_for_minimum,
            Some(Price::from_cents(802).to_string())
        );
        assert_eq!(view.discount, None);
    }

    #[test]
    fn test_view_with_free_delivery_coupon() {
        let mut cart = cart_with(599, 5);
        cart.apply_coupon(Coupon::Frete);
        let view = CartView::build(&cart, &StoreRules::default());
        assert_eq!(view.missing_for_minimum, None);
        assert_eq!(view.delivery_fee, Price::ZERO.to_string());
        assert_eq!(view.total, Price::from_cents(2995).to_string());
        assert_eq!(view.coupon_code.as_deref(), Some("FRETE"));
    }

    #[test]
    fn test_empty_view_has_no_minimum_warning() {
        let view = CartView::build(&Cart::new(), &StoreRules::default());
        assert!(view.is_empty());
        assert_eq!(view.missing_for_minimum, None);
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            error_message("stock", Some("Banana")).as_deref(),
            Some("Estoque insuficiente para o produto Banana")
        );
        assert_eq!(
            success_message("added").as_deref(),
            Some("Produto adicionado ao carrinho")
        );
        assert_eq!(error_message("bogus", None), None);
    }

    #[test]
    fn test_fragment_detection() {
        let mut headers = HeaderMap::new();
        assert!(!is_fragment_request(&headers));
        headers.insert("HX-Request", "true".parse().unwrap());
        assert!(is_fragment_request(&headers));
    }

    #[test]
    fn test_plain_form_post_redirects_to_cart() {
        let response = updated_response(&HeaderMap::new(), &Cart::new(), "cleared");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get("location").unwrap(),
            "/cart?success=cleared"
        );
    }
}
