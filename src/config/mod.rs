// Configuration - typed settings, JSON file loading and write-back
mod error;
mod merge;


pub use error::ConfigError;
pub use merge::{apply_cli_overrides, merge_value};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const DEFAULT_CONFIG_PATH: &str = "config/config.json";

/// Section names in the JSON document, in the order they are written.
pub(crate) const SECTIONS: [&str; 3] = ["server", "upload", "image_processing"];

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub upload: UploadConfig,
    pub image_processing: ImageProcessingConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub debug: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct UploadConfig {
    pub folder: PathBuf,
    pub max_file_size_mb: f64,
    pub allowed_extensions: BTreeSet<String>,
    /// Number of files handed to one blocking worker when a request carries many uploads.
    pub batch_size: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ImageProcessingConfig {
    pub max_width: u32,
    pub max_height: u32,
    pub auto_rotate: bool,
    pub optimize: bool,
    pub quality: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 5001,
                debug: false,
            },
            upload: UploadConfig {
                folder: expand_home("~/Uploads"),
                max_file_size_mb: 16.0,
                allowed_extensions: ["png", "jpg", "jpeg", "gif", "webp"]
                    .into_iter()
                    .map(String::from)
                    .collect(),
                batch_size: 50,
            },
            image_processing: ImageProcessingConfig {
                max_width: 1920,
                max_height: 1080,
                auto_rotate: true,
                optimize: true,
                quality: 85,
            },
        }
    }
}

/// Values given on the command line. `None` (or `false` for flags) leaves the
/// file/default value in place.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub upload_folder: Option<PathBuf>,
    pub port: Option<u16>,
    pub host: Option<String>,
    pub debug: bool,
    pub max_file_size_mb: Option<f64>,
}

/// Result of loading: always a usable config, plus everything that was ignored along the way.
#[derive(Debug)]
pub struct LoadedConfig {
    pub config: Config,
    pub issues: Vec<ConfigError>,
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_home(raw: &str) -> PathBuf {
    if raw == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = raw.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(raw)
}

/// Merge defaults, the JSON file at `path` and the CLI overrides, in that order of precedence.
///
/// A missing file is created with the default contents. Unreadable or malformed
/// files and invalid fields are reported in `issues` and otherwise ignored.
pub fn load_config(path: Option<&Path>, cli: &CliOverrides) -> LoadedConfig {
    let mut config = Config::default();
    let mut issues = Vec::new();

    if let Some(path) = path {
        if path.exists() {
            match std::fs::read_to_string(path)
                .map_err(ConfigError::from)
                .and_then(|content| serde_json::from_str::<Value>(&content).map_err(ConfigError::from))
            {
                Ok(document) => {
                    info!("Configuration loaded from: {:?}", path);
                    issues.extend(merge_value(&mut config, &document));
                }
                Err(e) => {
                    warn!("Failed to read config file {:?}, using defaults: {}", path, e);
                    issues.push(e);
                }
            }
        } else {
            info!("Config file not found at {:?}, creating it with defaults", path);
            if let Err(e) = write_config_sync(path, &config) {
                warn!("Failed to create default config file {:?}: {}", path, e);
                issues.push(e);
            }
        }
    }

    issues.extend(apply_cli_overrides(&mut config, cli));

    for issue in &issues {
        if let ConfigError::InvalidField { .. } = issue {
            warn!("Configuration: {}, keeping previous value", issue);
        }
    }

    debug!("Effective configuration: {:?}", config);

    LoadedConfig { config, issues }
}

/// Render `config` as a JSON document, keeping every key of `existing` that the
/// typed config does not own (comments, manual additions, unknown sections).
pub fn render_document(existing: Option<&str>, config: &Config) -> Result<String, ConfigError> {
    let mut document = match existing.map(serde_json::from_str::<Value>) {
        Some(Ok(Value::Object(map))) => map,
        Some(Ok(_)) | Some(Err(_)) | None => serde_json::Map::new(),
    };

    let rendered = serde_json::to_value(config)?;

    for section in SECTIONS {
        let Some(Value::Object(fields)) = rendered.get(section) else {
            continue;
        };
        let entry = document
            .entry(section.to_string())
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(serde_json::Map::new());
        }
        if let Value::Object(target) = entry {
            for (key, value) in fields {
                target.insert(key.clone(), value.clone());
            }
        }
    }

    let mut output = serde_json::to_string_pretty(&Value::Object(document))?;
    output.push('\n');
    Ok(output)
}

/// Write `config` back to `path`, preserving keys the config does not own.
///
/// The file is written to a sibling temporary file first and renamed into place.
pub async fn save_config(path: &Path, config: &Config) -> Result<(), ConfigError> {
    let existing = match tokio::fs::read_to_string(path).await {
        Ok(content) => Some(content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => return Err(e.into()),
    };
    let output = render_document(existing.as_deref(), config)?;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }

    let temp_path = temporary_sibling(path);
    tokio::fs::write(&temp_path, output).await?;
    if let Err(e) = tokio::fs::rename(&temp_path, path).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(e.into());
    }

    debug!("Configuration written to {:?}", path);
    Ok(())
}

fn write_config_sync(path: &Path, config: &Config) -> Result<(), ConfigError> {
    let output = render_document(None, config)?;
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, output)?;
    Ok(())
}

fn temporary_sibling(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "config.json".to_string());
    path.with_file_name(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()))
}
