//! Authentication extractors.
//!
//! HTML pages use the session (`RequireAuth`, `OptionalAuth`); the JSON API
//! uses bearer tokens (`ApiUser`), falling back to the session cookie.

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, header, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use hortifruti_core::UserId;

use crate::error::ApiError;
use crate::models::{CurrentUser, session_keys};
use crate::services::token::{TokenError, TokenService};
use crate::state::AppState;

/// Extractor that requires a logged-in customer.
///
/// HTML requests without a session are redirected to the login page with a
/// `next` parameter pointing back at the requested path.
///
/// ```rust,ignore
/// async fn protected_handler(RequireAuth(user): RequireAuth) -> impl IntoResponse {
///     format!("Olá, {}!", user.name)
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

/// Error returned when authentication is required but the customer is not logged in.
#[derive(Debug)]
pub enum AuthRejection {
    /// Redirect to the login page (HTML requests), remembering the path.
    RedirectToLogin(String),
    /// Unauthorized response (API requests).
    Unauthorized,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin(next) => {
                let target = format!("/auth/login?next={}", urlencoding::encode(&next));
                Redirect::to(&target).into_response()
            }
            Self::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
        }
    }
}

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<Session>()
            .ok_or(AuthRejection::Unauthorized)?;

        let user: CurrentUser = session
            .get(session_keys::CURRENT_USER)
            .await
            .ok()
            .flatten()
            .ok_or_else(|| {
                if parts.uri.path().starts_with("/api/") {
                    AuthRejection::Unauthorized
                } else {
                    AuthRejection::RedirectToLogin(parts.uri.path().to_string())
                }
            })?;

        Ok(Self(user))
    }
}

/// Extractor that optionally gets the current customer.
pub struct OptionalAuth(pub Option<CurrentUser>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = match parts.extensions.get::<Session>() {
            Some(session) => session
                .get::<CurrentUser>(session_keys::CURRENT_USER)
                .await
                .ok()
                .flatten(),
            None => None,
        };

        Ok(Self(user))
    }
}

/// Store the logged-in customer in the session.
///
/// The session ID is cycled first so a pre-login ID cannot be reused.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: &CurrentUser,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(session_keys::CURRENT_USER, user).await
}

/// Clear the current customer from the session (logout). The cart is kept.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session
        .remove::<CurrentUser>(session_keys::CURRENT_USER)
        .await?;
    Ok(())
}

// =============================================================================
// Bearer tokens
// =============================================================================

/// Identity carried by a valid `Authorization: Bearer` token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiUser {
    pub id: UserId,
    pub is_admin: bool,
}

impl ApiUser {
    /// Reject non-staff callers with 403 "Acesso negado".
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Forbidden` unless the token belongs to an admin.
    pub fn require_admin(self) -> Result<Self, ApiError> {
        if self.is_admin {
            Ok(self)
        } else {
            Err(ApiError::denied())
        }
    }
}

/// Validate the bearer token in `parts` with `tokens`.
///
/// # Errors
///
/// `TokenError::Missing` without a bearer header, otherwise the validation
/// error.
pub fn bearer_user(parts: &Parts, tokens: &TokenService) -> Result<ApiUser, TokenError> {
    let token = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(TokenService::from_header)
        .ok_or(TokenError::Missing)?;

    let claims = tokens.validate(token)?;
    Ok(ApiUser {
        id: claims.user_id()?,
        is_admin: claims.is_admin,
    })
}

/// Logged-in storefront customer, for API calls made by our own pages.
async fn session_user(parts: &Parts) -> Option<ApiUser> {
    let session = parts.extensions.get::<Session>()?;
    let user: CurrentUser = session
        .get(session_keys::CURRENT_USER)
        .await
        .ok()
        .flatten()?;
    Some(ApiUser {
        id: user.id,
        is_admin: user.is_admin,
    })
}

impl FromRequestParts<AppState> for ApiUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = match bearer_user(parts, state.tokens()) {
            Ok(user) => user,
            // The installed PWA posts its offline queue with the session cookie.
            Err(TokenError::Missing) => session_user(parts).await.ok_or(TokenError::Missing)?,
            Err(e) => return Err(e.into()),
        };
        sentry::configure_scope(|scope| {
            scope.set_user(Some(sentry::User {
                id: Some(user.id.to_string()),
                ..Default::default()
            }));
        });
        Ok(user)
    }
}
