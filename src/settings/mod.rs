pub mod form;
pub mod handlers;


pub use form::SettingsForm;
pub use handlers::*;

use crate::config::{Config, ConfigError, merge_value, save_config};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Owner of the live configuration. Request handlers read snapshots; only
/// [`SettingsManager::apply_update`] writes.
pub struct SettingsManager {
    config: RwLock<Config>,
    path: PathBuf,
}

#[derive(Debug)]
pub struct SettingsOutcome {
    pub config: Config,
    pub rejected: Vec<ConfigError>,
    pub warnings: Vec<String>,
    pub changed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RejectedField {
    pub field: String,
    pub reason: String,
}

impl SettingsOutcome {
    pub fn rejected_fields(&self) -> Vec<RejectedField> {
        self.rejected
            .iter()
            .map(|e| match e {
                ConfigError::InvalidField { field, reason } => RejectedField {
                    field: field.clone(),
                    reason: reason.clone(),
                },
                other => RejectedField {
                    field: String::new(),
                    reason: other.to_string(),
                },
            })
            .collect()
    }
}

impl SettingsManager {
    pub fn new(config: Config, path: PathBuf) -> Self {
        Self {
            config: RwLock::new(config),
            path,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn snapshot(&self) -> Config {
        self.config.read().await.clone()
    }

    /// Validate and apply a partial update shaped like the config file.
    ///
    /// Invalid fields are reported and skipped. When anything changed the merged
    /// config is written back to disk; a failed write leaves the in-memory update
    /// in place and is reported as a warning.
    pub async fn apply_update(&self, update: &Value) -> SettingsOutcome {
        let mut current = self.config.write().await;

        let mut candidate = current.clone();
        let rejected = merge_value(&mut candidate, update);
        for e in &rejected {
            warn!("Settings update: {}, keeping previous value", e);
        }

        let mut warnings = Vec::new();

        if candidate == *current {
            debug!("Settings update changed nothing");
            return SettingsOutcome {
                config: candidate,
                rejected,
                warnings,
                changed: false,
            };
        }

        if candidate.upload.folder != current.upload.folder {
            info!("Upload folder changed to {:?}", candidate.upload.folder);
            if let Err(e) = tokio::fs::create_dir_all(&candidate.upload.folder).await {
                warn!(
                    "Failed to create upload folder {:?}: {}",
                    candidate.upload.folder, e
                );
                warnings.push(format!(
                    "Upload folder {} could not be created: {}",
                    candidate.upload.folder.display(),
                    e
                ));
            }
        }

        if candidate.server != current.server {
            info!("Server settings changed; they take effect after a restart");
        }

        if let Err(e) = save_config(&self.path, &candidate).await {
            warn!("Failed to save settings to {:?}: {}", self.path, e);
            warnings.push(format!(
                "Settings are active but could not be saved to {}: {}",
                self.path.display(),
                e
            ));
        } else {
            info!("Settings saved to {:?}", self.path);
        }

        *current = candidate.clone();

        SettingsOutcome {
            config: candidate,
            rejected,
            warnings,
            changed: true,
        }
    }
}
