use super::{
    DeleteOutcome, FailedUpload, GalleryQuery, PhotoError, PhotoStore, SortDirective,
    StoredImage, UploadSummary, UploadedFile,
};
use crate::AppState;
use axum::{
    Json,
    extract::{Multipart, Path, Query, State, multipart::Field},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, error, info, warn};

#[derive(Debug, Serialize)]
struct GalleryEntry {
    filename: String,
    size: u64,
    size_display: String,
    width: u32,
    height: u32,
    modified: String,
}

impl From<&StoredImage> for GalleryEntry {
    fn from(image: &StoredImage) -> Self {
        Self {
            filename: image.filename.clone(),
            size: image.size,
            size_display: format_size(image.size),
            width: image.width,
            height: image.height,
            modified: image.modified.format("%Y-%m-%d %H:%M").to_string(),
        }
    }
}

pub async fn gallery_page_handler(
    State(app_state): State<AppState>,
    Query(query): Query<GalleryQuery>,
) -> Response {
    let config = app_state.settings.snapshot().await;
    let store = PhotoStore::from_config(&config);
    let directive = SortDirective::from_query(query.sort.as_deref(), query.order.as_deref());

    let images = match store.list_images(directive).await {
        Ok(images) => images,
        Err(e) => {
            error!("Failed to list upload folder: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to list images").into_response();
        }
    };

    let total_size: u64 = images.iter().map(|image| image.size).sum();
    let entries: Vec<GalleryEntry> = images.iter().map(GalleryEntry::from).collect();
    let allowed: Vec<String> = config.upload.allowed_extensions.iter().cloned().collect();
    let accept = allowed
        .iter()
        .map(|ext| format!(".{}", ext))
        .collect::<Vec<_>>()
        .join(",");

    let liquid_context = liquid::object!({
        "page_title": "Photos",
        "images": entries,
        "image_count": images.len(),
        "total_size": format_size(total_size),
        "sort": directive.key,
        "order": directive.order,
        "allowed_extensions": allowed.join(", "),
        "accept": accept,
        "max_file_size_mb": config.upload.max_file_size_mb,
        "batch_size": config.upload.batch_size,
        "max_width": config.image_processing.max_width,
        "max_height": config.image_processing.max_height,
    });

    app_state
        .template_engine
        .render_page("index.html.liquid", liquid_context)
        .await
}

pub async fn list_images_api_handler(
    State(app_state): State<AppState>,
    Query(query): Query<GalleryQuery>,
) -> Response {
    let config = app_state.settings.snapshot().await;
    let store = PhotoStore::from_config(&config);
    let directive = SortDirective::from_query(query.sort.as_deref(), query.order.as_deref());

    match store.list_images(directive).await {
        Ok(images) => Json(images).into_response(),
        Err(e) => {
            error!("Failed to list upload folder: {}", e);
            error_response(&e)
        }
    }
}

pub async fn upload_handler(State(app_state): State<AppState>, mut multipart: Multipart) -> Response {
    let config = app_state.settings.snapshot().await;
    let store = PhotoStore::from_config(&config);
    let limit = store.max_file_size_bytes();
    let batch_size = config.upload.batch_size.max(1);

    let mut summary = UploadSummary::default();
    // At most one batch of accepted parts is held in memory at a time.
    let mut batch: Vec<(String, Vec<u8>)> = Vec::with_capacity(batch_size);
    let mut batch_number = 0;

    loop {
        let mut field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                warn!("Malformed upload request: {}", e);
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": "Malformed upload request" })),
                )
                    .into_response();
            }
        };

        if !matches!(field.name(), Some("files") | Some("file")) {
            continue;
        }
        // Browsers send an empty part when no file was picked.
        let filename = match field.file_name() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => continue,
        };

        let (data, size) = match read_limited(&mut field, limit).await {
            Ok(read) => read,
            Err(e) => {
                warn!("Upload of {:?} was interrupted: {}", filename, e);
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": "Upload was interrupted" })),
                )
                    .into_response();
            }
        };

        match store.validate_upload(&filename, size) {
            Ok(()) => batch.push((filename, data)),
            Err(e) => {
                log_failure(&filename, &e);
                summary.failed.push(FailedUpload {
                    filename,
                    error: e.user_message(),
                });
            }
        }

        if batch.len() >= batch_size {
            batch_number += 1;
            let full = std::mem::replace(&mut batch, Vec::with_capacity(batch_size));
            process_batch(&store, full, batch_number, &mut summary).await;
        }
    }

    if !batch.is_empty() {
        batch_number += 1;
        process_batch(&store, batch, batch_number, &mut summary).await;
    }

    if summary.uploaded.is_empty() && summary.failed.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "No files selected" })),
        )
            .into_response();
    }

    info!(
        uploaded = summary.uploaded.len(),
        failed = summary.failed.len(),
        batches = batch_number,
        "Upload request finished"
    );

    let status = if summary.uploaded.is_empty() {
        StatusCode::UNPROCESSABLE_ENTITY
    } else {
        StatusCode::OK
    };
    (status, Json(summary)).into_response()
}

/// Runs one batch of validated uploads on the blocking pool and records each
/// result in `summary`, in upload order.
async fn process_batch(
    store: &PhotoStore,
    batch: Vec<(String, Vec<u8>)>,
    batch_number: usize,
    summary: &mut UploadSummary,
) {
    let names: Vec<String> = batch.iter().map(|(name, _)| name.clone()).collect();
    let worker_store = store.clone();
    debug!("Processing upload batch {} ({} files)", batch_number, names.len());

    let results = tokio::task::spawn_blocking(move || {
        batch
            .into_iter()
            .map(|(name, data)| {
                let result = worker_store.ingest(&name, &data);
                (name, result)
            })
            .collect::<Vec<_>>()
    })
    .await;

    match results {
        Ok(results) => {
            for (name, result) in results {
                match result {
                    Ok(stored) => summary.uploaded.push(UploadedFile {
                        original: name,
                        stored,
                    }),
                    Err(e) => {
                        log_failure(&name, &e);
                        summary.failed.push(FailedUpload {
                            filename: name,
                            error: e.user_message(),
                        });
                    }
                }
            }
        }
        Err(e) => {
            error!("Upload batch {} failed to complete: {}", batch_number, e);
            summary
                .failed
                .extend(names.into_iter().map(|filename| FailedUpload {
                    filename,
                    error: "Internal error while processing the file".to_string(),
                }));
        }
    }
}

pub async fn delete_handler(
    State(app_state): State<AppState>,
    Path(filename): Path<String>,
) -> Response {
    let config = app_state.settings.snapshot().await;
    let store = PhotoStore::from_config(&config);

    match store.delete_image(&filename).await {
        Ok(DeleteOutcome::Deleted) => Json(json!({
            "deleted": true,
            "message": format!("Deleted {}", filename),
        }))
        .into_response(),
        Ok(DeleteOutcome::AlreadyRemoved) => Json(json!({
            "deleted": true,
            "message": format!("{} was already removed", filename),
        }))
        .into_response(),
        Err(e) => {
            log_failure(&filename, &e);
            error_response(&e)
        }
    }
}

pub async fn serve_upload_handler(
    State(app_state): State<AppState>,
    Path(filename): Path<String>,
) -> Response {
    let config = app_state.settings.snapshot().await;
    PhotoStore::from_config(&config)
        .serve_image(&filename)
        .await
}

async fn read_limited(
    field: &mut Field<'_>,
    limit: u64,
) -> Result<(Vec<u8>, u64), axum::extract::multipart::MultipartError> {
    let mut data = Vec::new();
    let mut size: u64 = 0;

    // Keep counting past the limit so the error can report the real size,
    // but stop buffering.
    while let Some(chunk) = field.chunk().await? {
        size += chunk.len() as u64;
        if size <= limit {
            data.extend_from_slice(&chunk);
        } else if !data.is_empty() {
            data = Vec::new();
        }
    }

    Ok((data, size))
}

fn error_response(e: &PhotoError) -> Response {
    (e.status_code(), Json(json!({ "error": e.user_message() }))).into_response()
}

fn log_failure(filename: &str, e: &PhotoError) {
    match e {
        // Already logged under the security target where it was detected.
        PhotoError::PathEscape(_) => {}
        PhotoError::ImageEncode(_) | PhotoError::StorageWrite(_) | PhotoError::IoError(_) => {
            error!(file = %filename, "Photo request failed: {}", e)
        }
        PhotoError::NotFound(_) => info!(file = %filename, "{}", e),
        _ => warn!(file = %filename, "Photo request rejected: {}", e),
    }
}

fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    let value = bytes as f64;
    if value >= MB {
        format!("{:.1} MB", value / MB)
    } else if value >= KB {
        format!("{:.0} KB", value / KB)
    } else {
        format!("{} B", bytes)
    }
}
