use super::{PhotoError, PhotoStore, extension_of, persist, process_image, sanitize_filename};
use tracing::info;

impl PhotoStore {
    /// Run one upload through the whole pipeline and return the stored filename.
    ///
    /// Blocking: decoding and encoding are CPU bound, so async callers should
    /// use `spawn_blocking`.
    pub fn ingest(&self, original_name: &str, bytes: &[u8]) -> Result<String, PhotoError> {
        self.validate_upload(original_name, bytes.len() as u64)?;

        let safe_name = sanitize_filename(original_name)?;
        // Sanitizing can alter the extension, so check the name that will actually be stored.
        let extension = extension_of(&safe_name).unwrap_or_default();
        if !self.upload.allowed_extensions.contains(&extension) {
            return Err(PhotoError::DisallowedExtension { extension });
        }

        let encoded = process_image(bytes, &extension, &self.processing)?;
        let stored = persist::persist_unique(self.folder(), &safe_name, &encoded)?;

        info!(
            original = %original_name,
            stored = %stored,
            bytes = encoded.len(),
            "Stored upload"
        );
        Ok(stored)
    }
}
