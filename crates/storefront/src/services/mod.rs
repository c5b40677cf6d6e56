//! Business logic services for storefront.
//!
//! - `auth` - Customer registration, login and profile updates
//! - `token` - JWT bearer tokens for the JSON API
//! - `catalog` - Cached reads for the home page and checkout rules
//! - `orders` - Order validation and placement

pub mod auth;
pub mod catalog;
pub mod orders;
pub mod token;
