// Photos module - upload pipeline, listing and deletion over the upload folder
mod delete;
mod error;
mod handlers;
mod image_processing;
mod ingest;
mod list;
mod persist;
mod sanitize;
mod serve;
mod types;
mod validate;

#[cfg(test)]
mod tests;

pub use error::PhotoError;
pub use handlers::{
    delete_handler, gallery_page_handler, list_images_api_handler, serve_upload_handler,
    upload_handler,
};
pub use image_processing::{apply_orientation, fit_within, process_image, read_orientation};
pub use sanitize::sanitize_filename;
pub use types::*;

use crate::config::{Config, ImageProcessingConfig, UploadConfig};
use std::path::Path;

pub(crate) const BYTES_PER_MB: u64 = 1_048_576;

/// View of the upload folder for one request, built from a configuration snapshot.
#[derive(Debug, Clone)]
pub struct PhotoStore {
    pub(crate) upload: UploadConfig,
    pub(crate) processing: ImageProcessingConfig,
}

impl PhotoStore {
    pub fn new(upload: UploadConfig, processing: ImageProcessingConfig) -> Self {
        Self { upload, processing }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.upload.clone(), config.image_processing.clone())
    }

    pub fn folder(&self) -> &Path {
        &self.upload.folder
    }

    pub(crate) fn is_allowed(&self, file_name: &str) -> bool {
        extension_of(file_name)
            .map(|ext| self.upload.allowed_extensions.contains(&ext))
            .unwrap_or(false)
    }
}

/// Lowercased portion after the final dot, if there is one.
pub(crate) fn extension_of(file_name: &str) -> Option<String> {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .filter(|ext| !ext.is_empty())
}
