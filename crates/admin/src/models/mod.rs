//! Admin-specific models. Domain records come from `hortifruti_core::models`.

pub mod session;

pub use session::{CurrentAdmin, keys as session_keys};
