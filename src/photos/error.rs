use axum::http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PhotoError {
    #[error("Invalid filename: {0:?}")]
    InvalidFilename(String),

    #[error("File type '{extension}' is not allowed")]
    DisallowedExtension { extension: String },

    #[error("File is too large ({size} bytes, limit is {limit} bytes)")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("Could not decode image: {0}")]
    ImageDecode(#[source] image::ImageError),

    #[error("Could not encode image: {0}")]
    ImageEncode(#[source] image::ImageError),

    #[error("No encoder available for '{0}' files")]
    UnsupportedFormat(String),

    #[error("Failed to store image: {0}")]
    StorageWrite(#[source] std::io::Error),

    #[error("Path escapes the upload folder: {0:?}")]
    PathEscape(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl PhotoError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            PhotoError::InvalidFilename(_)
            | PhotoError::DisallowedExtension { .. }
            | PhotoError::UnsupportedFormat(_) => StatusCode::BAD_REQUEST,
            PhotoError::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            PhotoError::ImageDecode(_) => StatusCode::UNPROCESSABLE_ENTITY,
            PhotoError::PathEscape(_) => StatusCode::FORBIDDEN,
            PhotoError::NotFound(_) => StatusCode::NOT_FOUND,
            PhotoError::ImageEncode(_) | PhotoError::StorageWrite(_) | PhotoError::IoError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message shown to the person using the web UI. Internal details stay in the logs.
    pub fn user_message(&self) -> String {
        match self {
            PhotoError::InvalidFilename(_) => "Invalid filename".to_string(),
            PhotoError::DisallowedExtension { extension } if extension.is_empty() => {
                "Files without an extension are not allowed".to_string()
            }
            PhotoError::DisallowedExtension { extension } => {
                format!("File type '.{}' is not allowed", extension)
            }
            PhotoError::FileTooLarge { limit, .. } => format!(
                "File is too large (maximum is {:.1} MB)",
                *limit as f64 / super::BYTES_PER_MB as f64
            ),
            PhotoError::ImageDecode(_) => "File is not a readable image".to_string(),
            PhotoError::ImageEncode(_) => "The image could not be re-encoded".to_string(),
            PhotoError::UnsupportedFormat(extension) => {
                format!("Images cannot be saved as '.{}'", extension)
            }
            PhotoError::StorageWrite(_) | PhotoError::IoError(_) => {
                "The file could not be saved".to_string()
            }
            PhotoError::PathEscape(_) => "Access denied".to_string(),
            PhotoError::NotFound(name) => format!("File {} not found", name),
        }
    }
}
