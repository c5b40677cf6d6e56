//! Shopping cart kept in the visitor's session.
//!
//! The cart holds snapshots of products, not references, so rendering the
//! cart page never needs a database round-trip. Snapshots are refreshed
//! against the catalog before checkout with [`Cart::refresh_prices`].
//!
//! Invariants:
//! - every item has `quantity >= 1`
//! - a product appears at most once

use serde::{Deserialize, Serialize};

use crate::checkout::{Coupon, Quote, StoreRules};
use crate::models::Product;
use crate::types::{Price, ProductId};

/// What the cart remembers about a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartProduct {
    pub id: ProductId,
    pub name: String,
    pub unit: String,
    /// Price per unit after the product discount.
    pub unit_price: Price,
    pub image: Option<String>,
    /// Stock at snapshot time; shown, never reserved.
    pub stock: i32,
}

impl From<&Product> for CartProduct {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id,
            name: product.name.clone(),
            unit: product.unit.clone(),
            unit_price: product.unit_price(),
            image: product.image.clone(),
            stock: product.stock,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product: CartProduct,
    pub quantity: i32,
}

impl CartItem {
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.product.unit_price.times(self.quantity)
    }

    /// Whether the snapshot stock covers the requested quantity.
    #[must_use]
    pub const fn exceeds_stock(&self) -> bool {
        self.quantity > self.product.stock
    }
}

/// The session cart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    items: Vec<CartItem>,
    #[serde(default)]
    coupon: Option<Coupon>,
}

impl Cart {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    #[must_use]
    pub fn get(&self, product_id: ProductId) -> Option<&CartItem> {
        self.items.iter().find(|item| item.product.id == product_id)
    }

    /// Add `quantity` units. A product already in the cart has its quantity
    /// increased and its snapshot replaced. Quantities below 1 count as 1.
    pub fn add(&mut self, product: CartProduct, quantity: i32) {
        let quantity = quantity.max(1);
        if let Some(item) = self.item_mut(product.id) {
            item.quantity = item.quantity.saturating_add(quantity);
            item.product = product;
        } else {
            self.items.push(CartItem { product, quantity });
        }
    }

    /// Set the quantity of a product. Zero or negative removes it.
    ///
    /// Returns `false` when the product is not in the cart.
    pub fn set_quantity(&mut self, product_id: ProductId, quantity: i32) -> bool {
        if quantity <= 0 {
            return self.remove(product_id);
        }
        match self.item_mut(product_id) {
            Some(item) => {
                item.quantity = quantity;
                true
            }
            None => false,
        }
    }

    pub fn increment(&mut self, product_id: ProductId) -> bool {
        match self.item_mut(product_id) {
            Some(item) => {
                item.quantity = item.quantity.saturating_add(1);
                true
            }
            None => false,
        }
    }

    /// Decrease by one, stopping at 1. Use [`Cart::remove`] to drop the item.
    pub fn decrement(&mut self, product_id: ProductId) -> bool {
        match self.item_mut(product_id) {
            Some(item) => {
                item.quantity = (item.quantity - 1).max(1);
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, product_id: ProductId) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.product.id != product_id);
        self.items.len() != before
    }

    /// Empty the cart and forget the coupon.
    pub fn clear(&mut self) {
        self.items.clear();
        self.coupon = None;
    }

    /// Total units across all items.
    #[must_use]
    pub fn item_count(&self) -> i32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.items.iter().map(CartItem::line_total).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub const fn coupon(&self) -> Option<Coupon> {
        self.coupon
    }

    pub fn apply_coupon(&mut self, coupon: Coupon) {
        self.coupon = Some(coupon);
    }

    pub fn remove_coupon(&mut self) {
        self.coupon = None;
    }

    /// Quote the cart under the given store rules.
    #[must_use]
    pub fn quote(&self, rules: &StoreRules) -> Quote {
        Quote::compute(
            self.items
                .iter()
                .map(|item| (item.product.unit_price, item.quantity)),
            self.coupon,
            rules,
        )
    }

    /// Replace snapshots with current catalog data.
    ///
    /// Items whose product is missing from `catalog` or inactive are dropped.
    /// Returns the names of the dropped products.
    pub fn refresh_prices(&mut self, catalog: &[Product]) -> Vec<String> {
        let mut dropped = Vec::new();
        self.items.retain_mut(|item| {
            match catalog
                .iter()
                .find(|p| p.id == item.product.id && p.active)
            {
                Some(product) => {
                    item.product = CartProduct::from(product);
                    true
                }
                None => {
                    dropped.push(item.product.name.clone());
                    false
                }
            }
        });
        if !dropped.is_empty() {
            tracing::debug!(?dropped, "dropped unavailable products from cart");
        }
        dropped
    }

    fn item_mut(&mut self, product_id: ProductId) -> Option<&mut CartItem> {
        self.items
            .iter_mut()
            .find(|item| item.product.id == product_id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn snapshot(id: i32, cents: i64) -> CartProduct {
        CartProduct {
            id: ProductId::new(id),
            name: format!("Produto {id}"),
            unit: "kg".to_owned(),
            unit_price: Price::from_cents(cents),
            image: None,
            stock: 5,
        }
    }

    fn catalog_product(id: i32, cents: i64, active: bool) -> Product {
        Product {
            id: ProductId::new(id),
            name: format!("Produto {id}"),
            description: None,
            price: Price::from_cents(cents),
            image: None,
            stock: 5,
            category_id: None,
            unit: "kg".to_owned(),
            discount: 0,
            organic: false,
            featured: false,
            active,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_add_merges_same_product() {
        let mut cart = Cart::new();
        cart.add(snapshot(1, 599), 1);
        cart.add(snapshot(1, 599), 2);
        cart.add(snapshot(2, 499), 1);

        assert_eq!(cart.items().len(), 2);
        assert_eq!(cart.get(ProductId::new(1)).unwrap().quantity, 3);
        assert_eq!(cart.item_count(), 4);
    }

    #[test]
    fn test_add_never_stores_zero_quantity() {
        let mut cart = Cart::new();
        cart.add(snapshot(1, 599), 0);
        assert_eq!(cart.get(ProductId::new(1)).unwrap().quantity, 1);
    }

    #[test]
    fn test_set_quantity_zero_removes() {
        let mut cart = Cart::new();
        cart.add(snapshot(1, 599), 2);
        assert!(cart.set_quantity(ProductId::new(1), 5));
        assert_eq!(cart.item_count(), 5);

        assert!(cart.set_quantity(ProductId::new(1), 0));
        assert!(cart.is_empty());
        assert!(!cart.set_quantity(ProductId::new(1), 3));
    }

    #[test]
    fn test_decrement_stops_at_one() {
        let mut cart = Cart::new();
        cart.add(snapshot(1, 599), 2);
        cart.decrement(ProductId::new(1));
        cart.decrement(ProductId::new(1));
        cart.decrement(ProductId::new(1));
        assert_eq!(cart.get(ProductId::new(1)).unwrap().quantity, 1);

        cart.increment(ProductId::new(1));
        assert_eq!(cart.get(ProductId::new(1)).unwrap().quantity, 2);
    }

    #[test]
    fn test_subtotal() {
        let mut cart = Cart::new();
        cart.add(snapshot(1, 599), 2);
        cart.add(snapshot(2, 299), 3);
        assert_eq!(cart.subtotal(), Price::from_cents(2095));
    }

    #[test]
    fn test_clear_drops_coupon() {
        let mut cart = Cart::new();
        cart.add(snapshot(1, 599), 1);
        cart.apply_coupon(Coupon::Frete);
        cart.clear();
        assert!(cart.is_empty());
        assert_eq!(cart.coupon(), None);
    }

    #[test]
    fn test_quote_uses_coupon() {
        let mut cart = Cart::new();
        cart.add(snapshot(1, 1000), 3);
        cart.apply_coupon(Coupon::Frutas10);
        let quote = cart.quote(&StoreRules::default());
        assert_eq!(quote.discount, Price::from_cents(300));
        assert_eq!(quote.total, Price::from_cents(3000 - 300 + 599));
    }

    #[test]
    fn test_refresh_prices_updates_and_drops() {
        let mut cart = Cart::new();
        cart.add(snapshot(1, 599), 1);
        cart.add(snapshot(2, 499), 1);
        cart.add(snapshot(3, 299), 1);

        let catalog = vec![catalog_product(1, 699, true), catalog_product(2, 499, false)];
        let dropped = cart.refresh_prices(&catalog);

        assert_eq!(dropped, vec!["Produto 2".to_owned(), "Produto 3".to_owned()]);
        assert_eq!(cart.items().len(), 1);
        assert_eq!(
            cart.get(ProductId::new(1)).unwrap().product.unit_price,
            Price::from_cents(699)
        );
    }

    #[test]
    fn test_cart_survives_session_serialization() {
        let mut cart = Cart::new();
        cart.add(snapshot(1, 599), 2);
        cart.apply_coupon(Coupon::Novo20);
        let json = serde_json::to_value(&cart).unwrap();
        assert_eq!(json["coupon"], "NOVO20");
        let back: Cart = serde_json::from_value(json).unwrap();
        assert_eq!(back, cart);
    }
}
