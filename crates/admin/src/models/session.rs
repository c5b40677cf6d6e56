//! Session-related types for admin authentication.

use serde::{Deserialize, Serialize};

use hortifruti_core::models::User;
use hortifruti_core::{Email, UserId};

/// Session-stored staff identity.
///
/// Minimal data stored in the session to identify the logged-in admin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentAdmin {
    /// User ID in `shop.users` (an `is_admin` account).
    pub id: UserId,
    pub email: Email,
    /// Display name.
    pub name: String,
}

impl From<&User> for CurrentAdmin {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
        }
    }
}

/// Session keys for admin authentication data.
pub mod keys {
    /// Key for storing the current logged-in admin.
    pub const CURRENT_ADMIN: &str = "current_admin";
}
