//! Progressive web app shell: manifest, service worker and offline page.
//!
//! The service worker's cache name embeds the build-time asset hash, so a
//! deploy with changed CSS/JS drops the previous cache on activation.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Json, Router,
    http::header,
    response::IntoResponse,
    routing::get,
};
use serde_json::{Value, json};

use crate::routes::PageContext;
use crate::state::AppState;

/// Content hash of the static assets, set by `build.rs`.
pub const ASSET_HASH: &str = env!("ASSET_HASH");

/// Icon sizes shipped under `/static/icons/`.
pub const ICON_SIZES: [u32; 8] = [72, 96, 128, 144, 152, 192, 384, 512];

/// Theme color shared by the manifest and the layout.
pub const THEME_COLOR: &str = "#2e7d32";

/// Name of the service worker cache for this build.
#[must_use]
pub fn cache_name() -> String {
    format!("hortifruti-{ASSET_HASH}")
}

fn icon_path(size: u32) -> String {
    format!("/static/icons/icon-{size}x{size}.png")
}

/// URLs cached when the service worker installs.
#[must_use]
pub fn precache_urls() -> Vec<String> {
    let mut urls = vec![
        "/".to_string(),
        "/offline".to_string(),
        "/static/css/main.css".to_string(),
        "/static/js/app.js".to_string(),
        "/manifest.webmanifest".to_string(),
    ];
    urls.extend(ICON_SIZES.iter().map(|&size| icon_path(size)));
    urls
}

/// Build the web app manifest.
#[must_use]
pub fn manifest() -> Value {
    let icons: Vec<Value> = ICON_SIZES
        .iter()
        .map(|&size| {
            json!({
                "src": icon_path(size),
                "sizes": format!("{size}x{size}"),
                "type": "image/png",
                "purpose": "any maskable",
            })
        })
        .collect();

    json!({
        "name": "Hortifruti Delivery",
        "short_name": "Hortifruti",
        "description": "Frutas, verduras e legumes frescos entregues na sua casa",
        "start_url": "/",
        "scope": "/",
        "display": "standalone",
        "orientation": "portrait",
        "background_color": "#ffffff",
        "theme_color": THEME_COLOR,
        "lang": "pt-BR",
        "icons": icons,
    })
}

/// Service worker script template.
#[derive(Template)]
#[template(path = "pwa/service-worker.js", escape = "none")]
pub struct ServiceWorkerTemplate {
    pub cache_name: String,
    /// JSON array literal of precache URLs.
    pub precache: String,
}

/// Offline fallback page template.
#[derive(Template, WebTemplate)]
#[template(path = "pwa/offline.html")]
pub struct OfflineTemplate {
    pub page: PageContext,
}

/// `GET /manifest.webmanifest`
pub async fn manifest_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/manifest+json")],
        Json(manifest()),
    )
}

/// `GET /service-worker.js`
///
/// Served uncached so browsers pick up new builds on the next navigation.
pub async fn service_worker() -> impl IntoResponse {
    let template = ServiceWorkerTemplate {
        cache_name: cache_name(),
        precache: serde_json::to_string(&precache_urls()).unwrap_or_else(|_| "[]".to_string()),
    };

    match template.render() {
        Ok(body) => (
            [
                (header::CONTENT_TYPE, "application/javascript; charset=utf-8"),
                (header::CACHE_CONTROL, "no-cache"),
            ],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Failed to render service worker: {e}");
            axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// `GET /offline`
pub async fn offline(page: PageContext) -> impl IntoResponse {
    OfflineTemplate { page }
}

/// PWA shell routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/manifest.webmanifest", get(manifest_handler))
        .route("/service-worker.js", get(service_worker))
        .route("/offline", get(offline))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_lists_every_icon() {
        let manifest = manifest();
        assert_eq!(manifest["display"], "standalone");
        assert_eq!(manifest["start_url"], "/");
        let icons = manifest["icons"].as_array().unwrap();
        assert_eq!(icons.len(), ICON_SIZES.len());
        assert_eq!(icons[0]["src"], "/static/icons/icon-72x72.png");
        assert_eq!(icons[7]["sizes"], "512x512");
    }

    #[test]
    fn test_precache_urls() {
        let urls = precache_urls();
        assert!(urls.contains(&"/offline".to_string()));
        assert!(urls.contains(&"/static/js/app.js".to_string()));
        assert!(urls.contains(&"/static/icons/icon-512x512.png".to_string()));
    }

    #[test]
    fn test_cache_name_uses_asset_hash() {
        assert!(cache_name().starts_with("hortifruti-"));
        assert!(cache_name().ends_with(ASSET_HASH));
    }

    #[test]
    fn test_service_worker_renders_cache_name() {
        let body = ServiceWorkerTemplate {
            cache_name: "hortifruti-test".to_string(),
            precache: serde_json::to_string(&precache_urls()).unwrap(),
        }
        .render()
        .unwrap();
        assert!(body.contains("const CACHE_NAME = 'hortifruti-test';"));
        assert!(body.contains("\"/offline\""));
        assert!(body.contains("sync-orders"));
    }
}
