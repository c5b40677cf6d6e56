//! Storefront-specific models. Domain records come from `hortifruti_core::models`.

pub mod session;

pub use session::{CurrentUser, keys as session_keys};
