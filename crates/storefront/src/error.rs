//! Unified error handling with Sentry integration.
//!
//! HTML handlers return [`AppError`]; the JSON API returns [`ApiError`],
//! which renders `{"error": "..."}` bodies. Server errors are captured to
//! Sentry before responding and their details are never sent to clients.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use hortifruti_core::checkout::CheckoutError;
use hortifruti_core::db::RepositoryError;

use crate::services::auth::AuthError;
use crate::services::token::TokenError;

/// Application-level error type for HTML pages.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Checkout validation failed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Session store failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// User may not access the resource.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    const fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Database(RepositoryError::Database(_) | RepositoryError::DataCorruption(_))
                | Self::Session(_)
                | Self::Internal(_)
                | Self::Auth(AuthError::Repository(_) | AuthError::PasswordHash)
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = match &self {
            Self::Database(err) => match err {
                RepositoryError::NotFound => StatusCode::NOT_FOUND,
                RepositoryError::Conflict(_) | RepositoryError::InsufficientStock { .. } => {
                    StatusCode::CONFLICT
                }
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AuthError::UserAlreadyExists => StatusCode::CONFLICT,
                AuthError::WeakPassword(_)
                | AuthError::PasswordMismatch
                | AuthError::CurrentPasswordRequired
                | AuthError::WrongCurrentPassword
                | AuthError::InvalidEmail(_)
                | AuthError::MissingName => StatusCode::BAD_REQUEST,
                AuthError::UserNotFound => StatusCode::NOT_FOUND,
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Checkout(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Session(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = if status.is_server_error() {
            "Erro interno do servidor".to_string()
        } else {
            user_message(&self)
        };

        (status, message).into_response()
    }
}

/// Message shown to customers for a client-side error.
fn user_message(err: &AppError) -> String {
    match err {
        AppError::Database(RepositoryError::NotFound) => "Não encontrado".to_string(),
        AppError::Database(err) => repository_message(err),
        AppError::Auth(err) => err.to_string(),
        AppError::Checkout(err) => err.to_string(),
        AppError::NotFound(msg)
        | AppError::Unauthorized(msg)
        | AppError::Forbidden(msg)
        | AppError::BadRequest(msg) => msg.clone(),
        AppError::Session(_) | AppError::Internal(_) => "Erro interno do servidor".to_string(),
    }
}

/// Customer-facing text for conflicts raised by the repositories.
pub fn repository_message(err: &RepositoryError) -> String {
    match err {
        RepositoryError::InsufficientStock { product, .. } => {
            format!("Estoque insuficiente para o produto {product}")
        }
        RepositoryError::Conflict(msg) => msg.clone(),
        RepositoryError::NotFound => "Não encontrado".to_string(),
        RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => {
            "Erro interno do servidor".to_string()
        }
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

// =============================================================================
// JSON API errors
// =============================================================================

/// Error returned by `/api` handlers as `{"error": "..."}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    /// Logged and reported; the client only sees a generic message.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// "Dados incompletos"
    #[must_use]
    pub fn incomplete() -> Self {
        Self::BadRequest("Dados incompletos".to_string())
    }

    /// "Acesso negado"
    #[must_use]
    pub fn denied() -> Self {
        Self::Forbidden("Acesso negado".to_string())
    }

    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = if let Self::Internal(_) = &self {
            let event_id = sentry::capture_error(&self);
            tracing::error!(error = %self, sentry_event_id = %event_id, "API error");
            "Erro interno do servidor".to_string()
        } else {
            self.to_string()
        };

        (self.status(), Json(json!({ "error": message }))).into_response()
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => Self::NotFound("Não encontrado".to_string()),
            RepositoryError::Conflict(_) | RepositoryError::InsufficientStock { .. } => {
                Self::Conflict(repository_message(&err))
            }
            RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => {
                Self::Internal(err.to_string())
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => Self::Unauthorized(err.to_string()),
            AuthError::UserAlreadyExists => Self::Conflict(err.to_string()),
            AuthError::UserNotFound => Self::NotFound(err.to_string()),
            AuthError::WeakPassword(_)
            | AuthError::PasswordMismatch
            | AuthError::CurrentPasswordRequired
            | AuthError::WrongCurrentPassword
            | AuthError::InvalidEmail(_)
            | AuthError::MissingName => Self::BadRequest(err.to_string()),
            AuthError::Repository(_) | AuthError::PasswordHash => Self::Internal(err.to_string()),
        }
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Encode(_) => Self::Internal(err.to_string()),
            TokenError::Missing | TokenError::Expired | TokenError::Invalid => {
                Self::Unauthorized(err.to_string())
            }
        }
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use hortifruti_core::Price;

    fn app_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("produto 12".to_string());
        assert_eq!(err.to_string(), "Not found: produto 12");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            app_status(AppError::NotFound("x".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            app_status(AppError::Forbidden("x".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            app_status(AppError::Checkout(CheckoutError::EmptyCart)),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            app_status(AppError::Database(RepositoryError::NotFound)),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            app_status(AppError::Internal("boom".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_insufficient_stock_message() {
        let err = RepositoryError::InsufficientStock {
            product: "Banana".to_string(),
            available: 1,
            requested: 3,
        };
        assert_eq!(
            repository_message(&err),
            "Estoque insuficiente para o produto Banana"
        );
        assert!(matches!(ApiError::from(err), ApiError::Conflict(_)));
    }

    #[test]
    fn test_api_error_status() {
        assert_eq!(ApiError::incomplete().status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::denied().status(), StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::from(TokenError::Expired).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(AuthError::UserAlreadyExists).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(AuthError::WrongCurrentPassword).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(CheckoutError::BelowMinimum {
                min: Price::from_cents(2000)
            })
            .status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn test_api_error_body_hides_internal_details() {
        let response = ApiError::Internal("connection refused".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["error"], "Erro interno do servidor");
    }

    #[tokio::test]
    async fn test_api_error_body_shape() {
        let response = ApiError::denied().into_response();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value, json!({ "error": "Acesso negado" }));
    }
}
