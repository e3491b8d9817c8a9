use super::{BYTES_PER_MB, PhotoError, PhotoStore, extension_of};

impl PhotoStore {
    pub fn max_file_size_bytes(&self) -> u64 {
        (self.upload.max_file_size_mb * BYTES_PER_MB as f64).floor() as u64
    }

    /// Check the extension against the allow-list, then the size against the limit.
    pub fn validate_upload(&self, filename: &str, size: u64) -> Result<(), PhotoError> {
        let extension = extension_of(filename).unwrap_or_default();
        if !self.upload.allowed_extensions.contains(&extension) {
            return Err(PhotoError::DisallowedExtension { extension });
        }

        let limit = self.max_file_size_bytes();
        if size > limit {
            return Err(PhotoError::FileTooLarge { size, limit });
        }

        Ok(())
    }
}
