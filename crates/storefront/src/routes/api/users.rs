//! User endpoints: registration, token login and profile.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use crate::error::ApiError;
use crate::middleware::ApiUser;
use crate::routes::api::{body, present};
use crate::services::auth::{AuthService, ProfileUpdate, Registration};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Profile changes; absent fields are kept.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password: Option<String>,
    pub current_password: Option<String>,
}

/// `POST /api/users/register`
#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let request = body(payload)?;
    let (Some(name), Some(email), Some(password)) = (
        present(request.name.as_deref()),
        present(request.email.as_deref()),
        request.password.as_deref().filter(|p| !p.is_empty()),
    ) else {
        return Err(ApiError::incomplete());
    };

    let user = AuthService::new(state.pool())
        .register(&Registration {
            name,
            email,
            password,
            password_confirm: None,
            phone: request.phone.as_deref(),
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Usuário cadastrado com sucesso",
            "user": user,
        })),
    ))
}

/// `POST /api/users/login` - returns a bearer token.
#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let request = body(payload)?;
    let (Some(email), Some(password)) = (
        present(request.email.as_deref()),
        request.password.as_deref().filter(|p| !p.is_empty()),
    ) else {
        return Err(ApiError::incomplete());
    };

    let user = AuthService::new(state.pool()).login(email, password).await?;
    let token = state.tokens().issue(&user)?;
    tracing::info!(user_id = %user.id, "API login");

    Ok(Json(json!({
        "message": "Login realizado com sucesso",
        "token": token,
        "user": user,
    })))
}

/// `GET /api/users/profile`
#[instrument(skip(state))]
pub async fn profile(
    State(state): State<AppState>,
    caller: ApiUser,
) -> Result<impl IntoResponse, ApiError> {
    let user = AuthService::new(state.pool()).user(caller.id).await?;
    Ok(Json(json!({ "user": user })))
}

/// `PUT /api/users/update`
#[instrument(skip(state, payload))]
pub async fn update(
    State(state): State<AppState>,
    caller: ApiUser,
    payload: Result<Json<UpdateRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let request = body(payload)?;
    let update = ProfileUpdate {
        name: request.name.as_deref(),
        email: request.email.as_deref(),
        phone: request.phone.as_deref(),
        password: request.password.as_deref(),
        password_confirm: None,
        current_password: request.current_password.as_deref(),
    };

    let user = AuthService::new(state.pool())
        .update_profile(caller.id, &update)
        .await?;

    Ok(Json(json!({
        "message": "Usuário atualizado com sucesso",
        "user": user,
    })))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_update_request_carries_current_password() {
        let request: UpdateRequest = serde_json::from_str(
            r#"{"password": "senha-nova-1", "current_password": "senha-antiga"}"#,
        )
        .unwrap();
        assert_eq!(request.password.as_deref(), Some("senha-nova-1"));
        assert_eq!(request.current_password.as_deref(), Some("senha-antiga"));
        assert_eq!(request.name, None);
    }
}
