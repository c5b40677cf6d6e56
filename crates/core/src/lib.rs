//! Hortifruti Delivery Core - Shared domain library.
//!
//! This crate provides the types and rules used across all Hortifruti components:
//! - `storefront` - Public grocery store with cart, checkout and PWA shell
//! - `admin` - Back-office for products, categories, orders and reports
//! - `cli` - Command-line tools for migrations, seeding and admin users
//!
//! # Architecture
//!
//! The default build contains only types and pure logic - no database I/O. Enabling the
//! `postgres` feature adds the [`db`] repository layer over the shared `shop`
//! schema, which both binaries use.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for ids, prices, emails and statuses
//! - [`cart`] - Session cart with the quantity invariants
//! - [`checkout`] - Delivery address, coupons and order quoting
//! - [`models`] - Products, categories, orders, users and store settings
//! - [`password`] - Argon2id hashing shared by every login surface
//! - [`db`] - `PostgreSQL` repositories (feature `postgres`)

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod checkout;
#[cfg(feature = "postgres")]
pub mod db;
pub mod models;
pub mod password;
pub mod types;

pub use types::*;
