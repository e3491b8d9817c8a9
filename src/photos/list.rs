use super::{PhotoError, PhotoStore, SortDirective, StoredImage};
use chrono::{DateTime, Utc};
use std::path::Path;
use std::time::SystemTime;
use tracing::debug;

impl PhotoStore {
    /// Every stored image with its metadata, ordered by `directive`.
    ///
    /// Hidden files, directories and files with a non-allowed extension are
    /// skipped. A folder that does not exist yet lists as empty.
    pub async fn list_images(
        &self,
        directive: SortDirective,
    ) -> Result<Vec<StoredImage>, PhotoError> {
        let folder = self.folder();
        debug!("Scanning upload folder: {:?}", folder);

        let mut entries = match tokio::fs::read_dir(folder).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Upload folder {:?} does not exist yet", folder);
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut images = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name().to_string_lossy().to_string();

            if file_name.starts_with('.') || !self.is_allowed(&file_name) {
                continue;
            }

            let path = entry.path();
            let metadata = match tokio::fs::metadata(&path).await {
                Ok(metadata) => metadata,
                Err(e) => {
                    debug!("Skipping {:?}: {}", path, e);
                    continue;
                }
            };
            if !metadata.is_file() {
                continue;
            }

            let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            let (width, height) = read_dimensions(&path);

            images.push(StoredImage {
                filename: file_name,
                size: metadata.len(),
                width,
                height,
                modified: DateTime::<Utc>::from(modified),
            });
        }

        images.sort_by(|a, b| directive.compare(a, b));

        debug!(
            "Found {} images sorted by {:?} {:?}",
            images.len(),
            directive.key,
            directive.order
        );

        Ok(images)
    }
}

/// Read dimensions from the image header only; (0, 0) when the file is unreadable.
fn read_dimensions(path: &Path) -> (u32, u32) {
    let reader = match image::ImageReader::open(path).and_then(|reader| reader.with_guessed_format())
    {
        Ok(reader) => reader,
        Err(e) => {
            debug!("Cannot open {:?} for dimensions: {}", path, e);
            return (0, 0);
        }
    };

    match reader.into_dimensions() {
        Ok(dimensions) => dimensions,
        Err(e) => {
            debug!("Cannot read dimensions of {:?}: {}", path, e);
            (0, 0)
        }
    }
}
