use super::PhotoStore;
use axum::{
    body::Body,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use tokio_util::io::ReaderStream;
use tracing::{debug, error};

impl PhotoStore {
    pub async fn serve_image(&self, requested: &str) -> Response {
        let path = match self.resolve_existing(requested).await {
            Ok(path) => path,
            Err(e) => {
                debug!("Refusing to serve {:?}: {}", requested, e);
                return (e.status_code(), e.user_message()).into_response();
            }
        };

        let file = match tokio::fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) => {
                error!("Failed to open file: {:?}: {}", path, e);
                return (StatusCode::NOT_FOUND, "File not found").into_response();
            }
        };

        let content_type = mime_guess::from_path(&path)
            .first_or_octet_stream()
            .to_string();

        let stream = ReaderStream::new(file);

        (
            [
                (header::CONTENT_TYPE, content_type),
                (header::CACHE_CONTROL, "no-cache".to_string()),
            ],
            Body::from_stream(stream),
        )
            .into_response()
    }
}
