use super::{RejectedField, SettingsForm, SettingsOutcome};
use crate::{AppState, config::Config};
use axum::{
    Form, Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::warn;

#[derive(Debug, Serialize)]
struct SettingsView {
    host: String,
    port: u16,
    debug: bool,
    upload_folder: String,
    max_file_size_mb: f64,
    allowed_extensions: String,
    batch_size: usize,
    max_width: u32,
    max_height: u32,
    auto_rotate: bool,
    optimize: bool,
    quality: u8,
}

impl From<&Config> for SettingsView {
    fn from(config: &Config) -> Self {
        Self {
            host: config.server.host.clone(),
            port: config.server.port,
            debug: config.server.debug,
            upload_folder: config.upload.folder.display().to_string(),
            max_file_size_mb: config.upload.max_file_size_mb,
            allowed_extensions: config
                .upload
                .allowed_extensions
                .iter()
                .cloned()
                .collect::<Vec<_>>()
                .join(", "),
            batch_size: config.upload.batch_size,
            max_width: config.image_processing.max_width,
            max_height: config.image_processing.max_height,
            auto_rotate: config.image_processing.auto_rotate,
            optimize: config.image_processing.optimize,
            quality: config.image_processing.quality,
        }
    }
}

pub async fn settings_page_handler(State(app_state): State<AppState>) -> Response {
    let config = app_state.settings.snapshot().await;
    render_settings(&app_state, &config, Vec::new(), Vec::new(), false).await
}

pub async fn settings_form_handler(
    State(app_state): State<AppState>,
    Form(form): Form<SettingsForm>,
) -> Response {
    let outcome = app_state.settings.apply_update(&form.into_update()).await;
    let rejected = outcome.rejected_fields();
    let saved = outcome.changed && outcome.warnings.is_empty();
    render_settings(&app_state, &outcome.config, rejected, outcome.warnings, saved).await
}

pub async fn settings_api_get_handler(State(app_state): State<AppState>) -> Json<Config> {
    Json(app_state.settings.snapshot().await)
}

pub async fn settings_api_update_handler(
    State(app_state): State<AppState>,
    Json(update): Json<Value>,
) -> Response {
    if !update.is_object() {
        warn!("Rejected settings update that is not a JSON object");
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Settings update must be a JSON object" })),
        )
            .into_response();
    }

    let outcome = app_state.settings.apply_update(&update).await;
    api_outcome(outcome).into_response()
}

fn api_outcome(outcome: SettingsOutcome) -> Json<Value> {
    let rejected = outcome.rejected_fields();
    Json(json!({
        "config": outcome.config,
        "changed": outcome.changed,
        "rejected": rejected,
        "warnings": outcome.warnings,
    }))
}

async fn render_settings(
    app_state: &AppState,
    config: &Config,
    rejected: Vec<RejectedField>,
    warnings: Vec<String>,
    saved: bool,
) -> Response {
    let view = SettingsView::from(config);
    let config_path = app_state.settings.path().display().to_string();
    let liquid_context = liquid::object!({
        "page_title": "Settings",
        "settings": view,
        "rejected": rejected,
        "warnings": warnings,
        "saved": saved,
        "config_path": config_path,
    });

    app_state
        .template_engine
        .render_page("settings.html.liquid", liquid_context)
        .await
}
