use std::{path::PathBuf, sync::Arc};

pub mod config;
pub mod photos;
pub mod settings;
pub mod startup_checks;
pub mod templating;


pub use config::Config;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub template_engine: Arc<templating::TemplateEngine>,
    pub settings: Arc<settings::SettingsManager>,
}

pub async fn create_app(config: Config, config_path: PathBuf, template_dir: PathBuf) -> Router {
    let template_engine = Arc::new(templating::TemplateEngine::new(template_dir));
    let settings = Arc::new(settings::SettingsManager::new(config, config_path));

    let app_state = AppState {
        template_engine,
        settings,
    };

    Router::new()
        .route("/", get(photos::gallery_page_handler))
        .route(
            "/upload",
            // The per-file cap from the live settings is enforced while reading parts.
            post(photos::upload_handler).layer(DefaultBodyLimit::disable()),
        )
        .route("/delete/{filename}", post(photos::delete_handler))
        .route("/uploads/{filename}", get(photos::serve_upload_handler))
        .route(
            "/settings",
            get(settings::settings_page_handler).post(settings::settings_form_handler),
        )
        .route("/api/images", get(photos::list_images_api_handler))
        .route(
            "/api/settings",
            get(settings::settings_api_get_handler).post(settings::settings_api_update_handler),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    let method = request.method();
                    let uri = request.uri();
                    let matched_path = request
                        .extensions()
                        .get::<axum::extract::MatchedPath>()
                        .map(|matched_path| matched_path.as_str());

                    tracing::info_span!(
                        "http_request",
                        method = %method,
                        uri = %uri,
                        matched_path,
                    )
                })
                .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
                    let method = request.method();
                    let uri = request.uri();
                    let user_agent = request
                        .headers()
                        .get("user-agent")
                        .and_then(|h| h.to_str().ok())
                        .unwrap_or("-");

                    tracing::info!(
                        target: "access_log",
                        method = %method,
                        path = %uri.path(),
                        query = ?uri.query(),
                        user_agent = %user_agent,
                        "request"
                    );
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     _span: &tracing::Span| {
                        let size = response
                            .headers()
                            .get("content-length")
                            .and_then(|h| h.to_str().ok())
                            .unwrap_or("-");

                        tracing::info!(
                            target: "access_log",
                            status = %response.status(),
                            size = %size,
                            latency_ms = %latency.as_millis(),
                            "response"
                        );
                    },
                ),
        )
        .with_state(app_state)
}
