//! Authentication route handlers.
//!
//! Login and registration forms post back here; failures redirect to the
//! form with an `?error=` code, keeping the `next` target.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{clear_sentry_user, set_sentry_user};
use crate::middleware::{clear_current_user, set_current_user};
use crate::models::CurrentUser;
use crate::routes::{PageContext, safe_redirect};
use crate::services::auth::{AuthError, AuthService, Registration};
use crate::state::AppState;

// =============================================================================
// Form Types
// =============================================================================

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    pub next: Option<String>,
}

/// Registration form data.
#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub password: String,
    pub password_confirm: String,
    pub next: Option<String>,
}

// =============================================================================
// Query Types
// =============================================================================

/// Query parameters for error/success display.
#[derive(Debug, Default, Deserialize)]
pub struct MessageQuery {
    pub error: Option<String>,
    pub success: Option<String>,
    pub next: Option<String>,
}

fn error_message(code: &str) -> Option<&'static str> {
    Some(match code {
        "credentials" => "Email ou senha incorretos",
        "session" => "Não foi possível iniciar a sessão. Tente novamente",
        "email_taken" => "Email já cadastrado",
        "email_invalid" => "Email inválido",
        "password_mismatch" => "As senhas não coincidem",
        "password_too_short" => "A senha deve ter pelo menos 8 caracteres",
        "missing" => "Preencha todos os campos obrigatórios",
        "failed" => "Não foi possível concluir o cadastro",
        _ => return None,
    })
}

fn success_message(code: &str) -> Option<&'static str> {
    Some(match code {
        "logged_out" => "Você saiu da sua conta",
        _ => return None,
    })
}

/// Error code for a failed registration.
const fn register_error_code(err: &AuthError) -> &'static str {
    match err {
        AuthError::UserAlreadyExists => "email_taken",
        AuthError::InvalidEmail(_) => "email_invalid",
        AuthError::PasswordMismatch => "password_mismatch",
        AuthError::WeakPassword(_) => "password_too_short",
        AuthError::MissingName => "missing",
        _ => "failed",
    }
}

fn with_next(path: &str, code: &str, next: Option<&str>) -> String {
    match next.filter(|n| !n.is_empty()) {
        Some(next) => format!("{path}?error={code}&next={}", urlencoding::encode(next)),
        None => format!("{path}?error={code}"),
    }
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub page: PageContext,
    pub error: Option<&'static str>,
    pub success: Option<&'static str>,
    pub next: String,
}

/// Register page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    pub page: PageContext,
    pub error: Option<&'static str>,
    pub next: String,
}

// =============================================================================
// Login Routes
// =============================================================================

/// Display the login page. Logged-in customers go straight to `next`.
pub async fn login_page(page: PageContext, Query(query): Query<MessageQuery>) -> Response {
    if page.user.is_some() {
        return Redirect::to(&safe_redirect(query.next.as_deref(), "/account")).into_response();
    }

    LoginTemplate {
        page,
        error: query.error.as_deref().and_then(error_message),
        success: query.success.as_deref().and_then(success_message),
        next: query.next.unwrap_or_default(),
    }
    .into_response()
}

/// Handle login form submission.
#[instrument(skip(state, session, form), fields(email = %form.email))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Response {
    let next = form.next.as_deref();

    let user = match AuthService::new(state.pool())
        .login(&form.email, &form.password)
        .await
    {
        Ok(user) => user,
        Err(AuthError::InvalidCredentials) => {
            tracing::warn!("Login failed: invalid credentials");
            return Redirect::to(&with_next("/auth/login", "credentials", next)).into_response();
        }
        Err(e) => {
            tracing::error!("Login failed: {e}");
            return Redirect::to(&with_next("/auth/login", "session", next)).into_response();
        }
    };

    if let Err(e) = set_current_user(&session, &CurrentUser::from(&user)).await {
        tracing::error!("Failed to set session: {e}");
        return Redirect::to(&with_next("/auth/login", "session", next)).into_response();
    }
    set_sentry_user(&user.id, Some(user.email.as_str()));
    tracing::info!(user_id = %user.id, "customer logged in");

    Redirect::to(&safe_redirect(next, "/")).into_response()
}

// =============================================================================
// Registration Routes
// =============================================================================

/// Display the registration page.
pub async fn register_page(page: PageContext, Query(query): Query<MessageQuery>) -> Response {
    if page.user.is_some() {
        return Redirect::to("/account").into_response();
    }

    RegisterTemplate {
        page,
        error: query.error.as_deref().and_then(error_message),
        next: query.next.unwrap_or_default(),
    }
    .into_response()
}

/// Handle registration form submission. The new customer is logged in.
#[instrument(skip(state, session, form), fields(email = %form.email))]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<RegisterForm>,
) -> Response {
    let next = form.next.as_deref();
    let registration = Registration {
        name: &form.name,
        email: &form.email,
        password: &form.password,
        password_confirm: Some(&form.password_confirm),
        phone: form.phone.as_deref(),
    };

    let user = match AuthService::new(state.pool()).register(&registration).await {
        Ok(user) => user,
        Err(e) => {
            tracing::warn!("Registration failed: {e}");
            return Redirect::to(&with_next("/auth/register", register_error_code(&e), next))
                .into_response();
        }
    };

    if let Err(e) = set_current_user(&session, &CurrentUser::from(&user)).await {
        tracing::error!("Failed to set session: {e}");
        return Redirect::to("/auth/login?error=session").into_response();
    }
    set_sentry_user(&user.id, Some(user.email.as_str()));

    Redirect::to(&safe_redirect(next, "/")).into_response()
}

// =============================================================================
// Logout Route
// =============================================================================

/// Handle logout. The cart stays in the session.
pub async fn logout(session: Session) -> Response {
    if let Err(e) = clear_current_user(&session).await {
        tracing::error!("Failed to clear session: {e}");
    }
    clear_sentry_user();

    Redirect::to("/auth/login?success=logged_out").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    use hortifruti_core::password::PasswordError;

    #[test]
    fn test_register_error_codes() {
        assert_eq!(
            register_error_code(&AuthError::UserAlreadyExists),
            "email_taken"
        );
        assert_eq!(
            register_error_code(&AuthError::PasswordMismatch),
            "password_mismatch"
        );
        assert_eq!(
            register_error_code(&AuthError::from(PasswordError::TooShort)),
            "password_too_short"
        );
        assert_eq!(register_error_code(&AuthError::PasswordHash), "failed");
    }

    #[test]
    fn test_every_register_code_has_a_message() {
        for code in [
            "email_taken",
            "email_invalid",
            "password_mismatch",
            "password_too_short",
            "missing",
            "failed",
        ] {
            assert!(error_message(code).is_some(), "{code}");
        }
    }

    #[test]
    fn test_with_next_keeps_target() {
        assert_eq!(
            with_next("/auth/login", "credentials", Some("/checkout")),
            "/auth/login?error=credentials&next=%2Fcheckout"
        );
        assert_eq!(
            with_next("/auth/login", "credentials", Some("")),
            "/auth/login?error=credentials"
        );
    }
}
