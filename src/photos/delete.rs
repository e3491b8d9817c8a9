use super::{DeleteOutcome, PhotoError, PhotoStore};
use tracing::{error, info};

impl PhotoStore {
    pub async fn delete_image(&self, requested: &str) -> Result<DeleteOutcome, PhotoError> {
        let path = self.resolve_existing(requested).await?;

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                info!(file = %requested, "Deleted image");
                Ok(DeleteOutcome::Deleted)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(file = %requested, "Image was already removed");
                Ok(DeleteOutcome::AlreadyRemoved)
            }
            Err(e) => {
                error!("Failed to delete {:?}: {}", path, e);
                Err(e.into())
            }
        }
    }
}
