//! Store settings routes.
//!
//! One settings row drives delivery fee and minimum order value at
//! checkout. The storefront picks up changes when its catalog cache expires.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use tracing::instrument;

use hortifruti_core::db::SettingsRepository;
use hortifruti_core::models::StoreSettings;
use hortifruti_core::{Email, Price};

use crate::error::Result;
use crate::middleware::RequireAdminAuth;
use crate::routes::{AdminUserView, FlashQuery, redirect_success};
use crate::state::AppState;

/// Settings form fields.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsForm {
    #[serde(default)]
    pub store_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub delivery_fee: String,
    #[serde(default)]
    pub min_order_value: String,
    #[serde(default)]
    pub max_delivery_distance_km: String,
}

impl From<&StoreSettings> for SettingsForm {
    fn from(settings: &StoreSettings) -> Self {
        Self {
            store_name: settings.store_name.clone(),
            email: settings.email.clone(),
            phone: settings.phone.clone(),
            address: settings.address.clone(),
            delivery_fee: settings.delivery_fee.plain(),
            min_order_value: settings.min_order_value.plain(),
            max_delivery_distance_km: settings.max_delivery_distance_km.to_string(),
        }
    }
}

impl SettingsForm {
    /// Validate into settings.
    ///
    /// # Errors
    ///
    /// Returns the message for the first invalid field.
    pub fn to_settings(&self) -> std::result::Result<StoreSettings, &'static str> {
        let store_name = self.store_name.trim();
        if store_name.is_empty() {
            return Err("Informe o nome da loja");
        }
        let email = Email::parse(&self.email).map_err(|_| "Email inválido")?;
        let delivery_fee: Price = self
            .delivery_fee
            .trim()
            .parse()
            .map_err(|_| "Taxa de entrega inválida")?;
        let min_order_value: Price = self
            .min_order_value
            .trim()
            .parse()
            .map_err(|_| "Pedido mínimo inválido")?;
        let max_delivery_distance_km = self
            .max_delivery_distance_km
            .trim()
            .parse::<i32>()
            .ok()
            .filter(|km| *km >= 0)
            .ok_or("Distância máxima inválida")?;

        Ok(StoreSettings {
            store_name: store_name.to_string(),
            email: email.into_inner(),
            phone: self.phone.trim().to_string(),
            address: self.address.trim().to_string(),
            delivery_fee,
            min_order_value,
            max_delivery_distance_km,
        })
    }
}

/// Settings page template.
#[derive(Template, WebTemplate)]
#[template(path = "settings.html")]
pub struct SettingsTemplate {
    pub admin_user: AdminUserView,
    pub current_path: String,
    pub form: SettingsForm,
    pub success_message: Option<String>,
    pub error_message: Option<String>,
}

/// Build the settings router.
pub fn router() -> Router<AppState> {
    Router::new().route("/settings", get(show).post(update))
}

#[instrument(skip(admin, state, flash))]
async fn show(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    Query(flash): Query<FlashQuery>,
) -> Result<SettingsTemplate> {
    let settings = SettingsRepository::new(state.pool()).get().await?;

    Ok(SettingsTemplate {
        admin_user: AdminUserView::from(&admin),
        current_path: "/settings".to_string(),
        form: SettingsForm::from(&settings),
        success_message: flash.success,
        error_message: flash.error,
    })
}

/// Save store settings.
///
/// POST /settings
#[instrument(skip(admin, state, form), fields(admin_id = %admin.id))]
async fn update(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    Form(form): Form<SettingsForm>,
) -> Result<Response> {
    let settings = match form.to_settings() {
        Ok(settings) => settings,
        Err(message) => {
            return Ok((
                StatusCode::UNPROCESSABLE_ENTITY,
                SettingsTemplate {
                    admin_user: AdminUserView::from(&admin),
                    current_path: "/settings".to_string(),
                    form,
                    success_message: None,
                    error_message: Some(message.to_string()),
                },
            )
                .into_response());
        }
    };

    SettingsRepository::new(state.pool())
        .update(&settings)
        .await?;
    tracing::info!(
        delivery_fee = %settings.delivery_fee,
        min_order_value = %settings.min_order_value,
        "store settings updated"
    );
    Ok(redirect_success("/settings", "Configurações salvas").into_response())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_round_trip_through_form() {
        let defaults = StoreSettings::default();
        let form = SettingsForm::from(&defaults);
        assert_eq!(form.delivery_fee, "5.99");
        assert_eq!(form.to_settings().unwrap(), defaults);
    }

    #[test]
    fn test_comma_decimal_fees() {
        let mut form = SettingsForm::from(&StoreSettings::default());
        form.delivery_fee = "7,50".to_string();
        form.min_order_value = "R$ 30,00".to_string();
        let settings = form.to_settings().unwrap();
        assert_eq!(settings.delivery_fee, Price::from_cents(750));
        assert_eq!(settings.min_order_value, Price::from_cents(3000));
    }

    #[test]
    fn test_invalid_fields() {
        let valid = SettingsForm::from(&StoreSettings::default());

        let mut form = valid.clone();
        form.store_name = " ".to_string();
        assert_eq!(form.to_settings().unwrap_err(), "Informe o nome da loja");

        let mut form = valid.clone();
        form.email = "contato".to_string();
        assert_eq!(form.to_settings().unwrap_err(), "Email inválido");

        let mut form = valid.clone();
        form.delivery_fee = "-1".to_string();
        assert_eq!(form.to_settings().unwrap_err(), "Taxa de entrega inválida");

        let mut form = valid;
        form.max_delivery_distance_km = "-3".to_string();
        assert_eq!(form.to_settings().unwrap_err(), "Distância máxima inválida");
    }
}
