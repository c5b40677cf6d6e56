//! Bearer tokens for the JSON API.
//!
//! HS256 JWTs carrying the user ID and staff flag, as issued by
//! `POST /api/users/login`.

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use hortifruti_core::UserId;
use hortifruti_core::models::User;

/// Longest accepted token lifetime (one year).
pub const MAX_EXPIRY_HOURS: i64 = 24 * 365;

/// Claims stored in an API token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User ID, as a string per RFC 7519.
    pub sub: String,
    pub is_admin: bool,
    /// Expiry (Unix seconds).
    pub exp: i64,
    /// Issued at (Unix seconds).
    pub iat: i64,
}

impl Claims {
    /// The user the token was issued to.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Invalid` if `sub` is not a user ID.
    pub fn user_id(&self) -> Result<UserId, TokenError> {
        self.sub
            .parse::<i32>()
            .map(UserId::new)
            .map_err(|_| TokenError::Invalid)
    }
}

/// Token errors. Display strings are returned to API clients.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Token não fornecido")]
    Missing,

    #[error("Token expirado")]
    Expired,

    #[error("Token inválido")]
    Invalid,

    #[error("token encoding failed: {0}")]
    Encode(String),
}

/// Issues and validates API tokens.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiry: Duration,
}

impl TokenService {
    /// Lifetimes beyond [`MAX_EXPIRY_HOURS`] either way are clamped.
    #[must_use]
    pub fn new(secret: &SecretString, expiry_hours: i64) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(bytes),
            decoding_key: DecodingKey::from_secret(bytes),
            expiry: Duration::hours(expiry_hours.clamp(-MAX_EXPIRY_HOURS, MAX_EXPIRY_HOURS)),
        }
    }

    /// Issue a token for `user`.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Encode` if signing fails.
    pub fn issue(&self, user: &User) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.to_string(),
            is_admin: user.is_admin,
            exp: (now + self.expiry).timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Encode(e.to_string()))
    }

    /// Validate a token and return its claims.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Expired` for expired tokens and
    /// `TokenError::Invalid` for anything else that fails validation.
    pub fn validate(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["sub", "exp"]);

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => {
                    tracing::debug!("token validation failed: {e}");
                    TokenError::Invalid
                }
            })
    }

    /// Extract the token from an `Authorization: Bearer <token>` value.
    #[must_use]
    pub fn from_header(header: &str) -> Option<&str> {
        header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use hortifruti_core::Email;

    fn service() -> TokenService {
        TokenService::new(&SecretString::from("k".repeat(16) + &"Z9".repeat(16)), 24)
    }

    fn user(is_admin: bool) -> User {
        User {
            id: UserId::new(7),
            name: "Maria".to_string(),
            email: Email::parse("maria@example.com").unwrap(),
            phone: None,
            is_admin,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_issue_then_validate() {
        let service = service();
        let token = service.issue(&user(true)).unwrap();
        let claims = service.validate(&token).unwrap();

        assert_eq!(claims.user_id().unwrap(), UserId::new(7));
        assert!(claims.is_admin);
        assert_eq!(claims.exp - claims.iat, 24 * 3600);
    }

    #[test]
    fn test_expired_token() {
        let service = TokenService::new(&SecretString::from("k".repeat(32)), -2);
        let token = service.issue(&user(false)).unwrap();
        assert!(matches!(service.validate(&token), Err(TokenError::Expired)));
    }

    #[test]
    fn test_huge_expiry_is_clamped() {
        let service = TokenService::new(&SecretString::from("k".repeat(32)), i64::MAX);
        let claims = service.validate(&service.issue(&user(false)).unwrap()).unwrap();
        assert_eq!(claims.exp - claims.iat, MAX_EXPIRY_HOURS * 3600);
    }

    #[test]
    fn test_token_signed_with_other_key_is_invalid() {
        let other = TokenService::new(&SecretString::from("q".repeat(32)), 24);
        let token = other.issue(&user(false)).unwrap();
        assert!(matches!(service().validate(&token), Err(TokenError::Invalid)));
    }

    #[test]
    fn test_garbage_is_invalid() {
        assert!(matches!(
            service().validate("not-a-token"),
            Err(TokenError::Invalid)
        ));
    }

    #[test]
    fn test_from_header() {
        assert_eq!(TokenService::from_header("Bearer abc"), Some("abc"));
        assert_eq!(TokenService::from_header("Bearer "), None);
        assert_eq!(TokenService::from_header("Basic abc"), None);
    }
}
