use crate::Config;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum StartupCheckError {
    #[error("Failed to create upload folder: {0}")]
    UploadFolderCreationFailed(#[from] std::io::Error),

    #[error("Upload folder is not writable: {0}")]
    UploadFolderNotWritable(String),

    #[error("Templates directory does not exist")]
    TemplatesDirectoryMissing,
}

impl StartupCheckError {
    /// Critical failures mean uploads cannot work at all and the server should not start.
    pub fn is_critical(&self) -> bool {
        !matches!(self, StartupCheckError::TemplatesDirectoryMissing)
    }
}

pub async fn perform_startup_checks(
    config: &Config,
    templates_dir: &Path,
) -> Result<(), Vec<StartupCheckError>> {
    let mut errors = Vec::new();

    info!("Performing startup checks...");

    let upload_dir = config.upload.folder.as_path();
    if !upload_dir.exists() {
        info!("Upload folder does not exist, creating: {:?}", upload_dir);
        if let Err(e) = tokio::fs::create_dir_all(upload_dir).await {
            error!("Failed to create upload folder {:?}: {}", upload_dir, e);
            errors.push(StartupCheckError::UploadFolderCreationFailed(e));
        } else {
            info!("Upload folder created successfully");
        }
    } else {
        info!("Upload folder exists: {:?}", upload_dir);
    }

    if upload_dir.is_dir() {
        let check_file = upload_dir.join(format!(".write-check-{}", uuid::Uuid::new_v4()));
        match tokio::fs::write(&check_file, b"").await {
            Ok(()) => {
                let _ = tokio::fs::remove_file(&check_file).await;
                info!("Upload folder is writable");
            }
            Err(e) => {
                error!("Upload folder {:?} is not writable: {}", upload_dir, e);
                errors.push(StartupCheckError::UploadFolderNotWritable(e.to_string()));
            }
        }
    } else if upload_dir.exists() {
        error!("Upload folder path is not a directory: {:?}", upload_dir);
        errors.push(StartupCheckError::UploadFolderNotWritable(format!(
            "{} is not a directory",
            upload_dir.display()
        )));
    }

    if !templates_dir.exists() {
        warn!("Templates directory does not exist: {:?}", templates_dir);
        warn!("This may cause issues with page rendering");
        errors.push(StartupCheckError::TemplatesDirectoryMissing);
    } else {
        info!("Templates directory exists: {:?}", templates_dir);
    }

    if errors.is_empty() {
        info!("All startup checks passed");
        Ok(())
    } else {
        error!("Startup checks failed with {} errors", errors.len());
        Err(errors)
    }
}
