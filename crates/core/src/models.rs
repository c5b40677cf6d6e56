//! Domain records shared by the storefront, admin and CLI.
//!
//! These are plain data: the repositories in [`crate::db`] build them from
//! database rows and the binaries turn them into views or JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::checkout::StoreRules;
use crate::types::{
    CategoryId, Email, OrderId, OrderItemId, OrderStatus, PaymentMethod, Price, ProductId, UserId,
};

/// A product category (Frutas, Verduras, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub description: Option<String>,
    pub image: Option<String>,
}

/// A product as sold in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    /// List price, before `discount`.
    pub price: Price,
    pub image: Option<String>,
    pub stock: i32,
    pub category_id: Option<CategoryId>,
    /// Selling unit, e.g. `kg` or `un`.
    pub unit: String,
    /// Percentage off the list price (0-100).
    pub discount: i32,
    pub organic: bool,
    pub featured: bool,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// Price actually charged per unit.
    #[must_use]
    pub fn unit_price(&self) -> Price {
        self.price.discounted_by(self.discount)
    }

    #[must_use]
    pub const fn has_discount(&self) -> bool {
        self.discount > 0
    }

    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.stock > 0
    }

    /// Whether customers can add the product to a cart.
    #[must_use]
    pub const fn is_purchasable(&self) -> bool {
        self.active && self.stock > 0
    }
}

/// A registered customer or staff member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: Email,
    pub phone: Option<String>,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

/// A customer with aggregate order numbers, for the admin customer list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomerSummary {
    pub user: User,
    pub order_count: i64,
    pub total_spent: Price,
    pub last_order_at: Option<DateTime<Utc>>,
}

/// One line of a placed order. Name and unit are copied from the product at
/// order time so history survives catalog edits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: Option<ProductId>,
    pub product_name: String,
    pub unit: String,
    pub quantity: i32,
    /// Unit price charged.
    pub price: Price,
}

impl OrderItem {
    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.price.times(self.quantity)
    }
}

/// A placed order with its items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub status: OrderStatus,
    /// Single-line delivery address.
    pub address: String,
    pub zipcode: String,
    pub payment_method: PaymentMethod,
    /// Payment description, e.g. `money (Troco para R$ 50.00)`.
    pub payment_details: String,
    pub coupon: Option<String>,
    pub subtotal: Price,
    pub discount: Price,
    pub delivery_fee: Price,
    pub total: Price,
    pub notes: Option<String>,
    /// Identifier generated by offline clients for idempotent sync.
    pub client_ref: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderItem>,
}

impl Order {
    /// Number of units across all items.
    #[must_use]
    pub fn item_count(&self) -> i32 {
        self.items.iter().map(|item| item.quantity).sum()
    }
}

/// Order row for list pages, without items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderSummary {
    pub id: OrderId,
    pub user_id: UserId,
    pub customer_name: String,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub total: Price,
    pub item_count: i64,
    pub created_at: DateTime<Utc>,
}

/// Store-wide settings edited from the admin panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSettings {
    pub store_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub delivery_fee: Price,
    pub min_order_value: Price,
    /// Displayed only; no distance is computed.
    pub max_delivery_distance_km: i32,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            store_name: "Hortifruti Delivery".to_owned(),
            email: "contato@hortifrutidelivery.com.br".to_owned(),
            phone: "(11) 99999-9999".to_owned(),
            address: "Rua das Frutas, 123 - São Paulo/SP".to_owned(),
            delivery_fee: Price::from_cents(599),
            min_order_value: Price::from_cents(2000),
            max_delivery_distance_km: 10,
        }
    }
}

impl StoreSettings {
    /// Checkout rules derived from these settings.
    #[must_use]
    pub fn rules(&self) -> StoreRules {
        StoreRules {
            delivery_fee: self.delivery_fee,
            min_order_value: self.min_order_value,
            ..StoreRules::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(price_cents: i64, discount: i32) -> Product {
        Product {
            id: ProductId::new(1),
            name: "Maçã".to_owned(),
            description: None,
            price: Price::from_cents(price_cents),
            image: None,
            stock: 10,
            category_id: Some(CategoryId::new(1)),
            unit: "kg".to_owned(),
            discount,
            organic: false,
            featured: true,
            active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_unit_price_applies_discount() {
        assert_eq!(product(1000, 0).unit_price(), Price::from_cents(1000));
        assert_eq!(product(1000, 10).unit_price(), Price::from_cents(900));
        assert!(product(1000, 10).has_discount());
    }

    #[test]
    fn test_inactive_or_empty_products_are_not_purchasable() {
        let mut p = product(599, 0);
        assert!(p.is_purchasable());
        p.stock = 0;
        assert!(!p.is_purchasable());
        p.stock = 3;
        p.active = false;
        assert!(!p.is_purchasable());
    }

    #[test]
    fn test_settings_defaults_feed_rules() {
        let settings = StoreSettings::default();
        let rules = settings.rules();
        assert_eq!(rules.delivery_fee, Price::from_cents(599));
        assert_eq!(rules.min_order_value, Price::from_cents(2000));
        assert!(!rules.unavailable_zipcodes.is_empty());
    }
}
