//! Session-related types.

use serde::{Deserialize, Serialize};

use hortifruti_core::models::User;
use hortifruti_core::{Email, UserId};

/// Session-stored customer identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: UserId,
    /// Display name for the header greeting.
    pub name: String,
    pub email: Email,
    pub is_admin: bool,
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            is_admin: user.is_admin,
        }
    }
}

impl CurrentUser {
    /// First word of the name, for "Olá, Maria".
    #[must_use]
    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or(&self.name)
    }
}

/// Session keys.
pub mod keys {
    /// The logged-in customer ([`super::CurrentUser`]).
    pub const CURRENT_USER: &str = "current_user";

    /// The shopping cart (`hortifruti_core::cart::Cart`).
    pub const CART: &str = "cart";
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_first_name() {
        let user = CurrentUser {
            id: UserId::new(1),
            name: "Maria da Silva".to_string(),
            email: Email::parse("maria@example.com").unwrap(),
            is_admin: false,
        };
        assert_eq!(user.first_name(), "Maria");
    }
}
