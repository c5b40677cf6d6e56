//! Authentication route handlers for admin.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{Result, set_sentry_user};
use crate::middleware::{OptionalAdminAuth, clear_current_admin, set_current_admin};
use crate::models::CurrentAdmin;
use crate::services::{AdminAuthError, AdminAuthService};
use crate::state::AppState;

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub email: String,
    pub error: Option<String>,
}

/// Login form fields.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// Build the auth router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/login", get(login_page).post(login))
        .route("/auth/logout", post(logout))
}

/// Render the login page, or go straight to the dashboard when logged in.
///
/// GET /auth/login
async fn login_page(OptionalAdminAuth(admin): OptionalAdminAuth) -> Response {
    if admin.is_some() {
        return Redirect::to("/").into_response();
    }
    LoginTemplate {
        email: String::new(),
        error: None,
    }
    .into_response()
}

/// Check credentials and start an admin session.
///
/// POST /auth/login
#[instrument(skip(state, session, form), fields(email = %form.email))]
async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    let auth = AdminAuthService::new(state.pool());

    match auth.login(&form.email, &form.password).await {
        Ok(user) => {
            let admin = CurrentAdmin::from(&user);
            set_current_admin(&session, &admin).await?;
            set_sentry_user(admin.id.as_i32(), Some(admin.email.as_str()));
            tracing::info!(user_id = %admin.id, "admin logged in");
            Ok(Redirect::to("/").into_response())
        }
        Err(err @ (AdminAuthError::InvalidCredentials | AdminAuthError::NotAdmin)) => {
            tracing::info!("admin login rejected");
            Ok((
                StatusCode::UNAUTHORIZED,
                LoginTemplate {
                    email: form.email,
                    error: Some(err.to_string()),
                },
            )
                .into_response())
        }
        Err(AdminAuthError::Repository(e)) => Err(e.into()),
        Err(AdminAuthError::PasswordHash) => Err(crate::error::AppError::Internal(
            "password hash verification failed".to_string(),
        )),
    }
}

/// Logout and clear session.
///
/// POST /auth/logout
async fn logout(session: Session) -> Result<Redirect> {
    clear_current_admin(&session).await?;
    crate::error::clear_sentry_user();
    Ok(Redirect::to("/auth/login"))
}
