use super::{CliOverrides, Config, ConfigError, expand_home};
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::debug;

/// Apply every recognised, valid field of `document` to `config`.
///
/// Fields that fail validation leave the current value untouched and are
/// returned as errors. Keys starting with `_` are comments; unknown keys are ignored.
pub fn merge_value(config: &mut Config, document: &Value) -> Vec<ConfigError> {
    let mut errors = Vec::new();

    let Value::Object(root) = document else {
        errors.push(ConfigError::invalid("<root>", "expected a JSON object"));
        return errors;
    };

    for (section_name, section) in root {
        if section_name.starts_with('_') {
            continue;
        }
        if !super::SECTIONS.contains(&section_name.as_str()) {
            debug!("Ignoring unknown config section '{}'", section_name);
            continue;
        }
        let Value::Object(fields) = section else {
            errors.push(ConfigError::invalid(section_name.as_str(), "expected an object"));
            continue;
        };

        for (key, value) in fields {
            if key.starts_with('_') {
                continue;
            }
            let field = format!("{}.{}", section_name, key);
            let result = match section_name.as_str() {
                "server" => apply_server_field(config, key, value),
                "upload" => apply_upload_field(config, key, value),
                _ => apply_image_field(config, key, value),
            };
            match result {
                Ok(true) => {}
                Ok(false) => debug!("Ignoring unknown config key '{}'", field),
                Err(reason) => errors.push(ConfigError::invalid(field, reason)),
            }
        }
    }

    errors
}

/// Command-line values win over everything else, but still go through range checks.
pub fn apply_cli_overrides(config: &mut Config, cli: &CliOverrides) -> Vec<ConfigError> {
    let mut errors = Vec::new();

    if let Some(folder) = &cli.upload_folder {
        match folder.to_str() {
            Some(raw) => match parse_folder(&Value::from(raw)) {
                Ok(folder) => config.upload.folder = folder,
                Err(reason) => errors.push(ConfigError::invalid("--upload-folder", reason)),
            },
            None => config.upload.folder = folder.clone(),
        }
    }
    if let Some(port) = cli.port {
        match parse_port(&Value::from(port)) {
            Ok(port) => config.server.port = port,
            Err(reason) => errors.push(ConfigError::invalid("--port", reason)),
        }
    }
    if let Some(host) = &cli.host {
        match parse_host(&Value::from(host.as_str())) {
            Ok(host) => config.server.host = host,
            Err(reason) => errors.push(ConfigError::invalid("--host", reason)),
        }
    }
    if cli.debug {
        config.server.debug = true;
    }
    if let Some(size) = cli.max_file_size_mb {
        match parse_file_size(&Value::from(size)) {
            Ok(size) => config.upload.max_file_size_mb = size,
            Err(reason) => errors.push(ConfigError::invalid("--max-file-size", reason)),
        }
    }

    errors
}

fn apply_server_field(config: &mut Config, key: &str, value: &Value) -> Result<bool, String> {
    match key {
        "host" => config.server.host = parse_host(value)?,
        "port" => config.server.port = parse_port(value)?,
        "debug" => config.server.debug = parse_bool(value)?,
        _ => return Ok(false),
    }
    Ok(true)
}

fn apply_upload_field(config: &mut Config, key: &str, value: &Value) -> Result<bool, String> {
    match key {
        "folder" => config.upload.folder = parse_folder(value)?,
        "max_file_size_mb" => config.upload.max_file_size_mb = parse_file_size(value)?,
        "allowed_extensions" => {
            config.upload.allowed_extensions = parse_extensions(value)
                .map_err(|reason| format!("{}; list kept unchanged", reason))?
        }
        "batch_size" => config.upload.batch_size = parse_positive(value, usize::MAX as u64)? as usize,
        _ => return Ok(false),
    }
    Ok(true)
}

fn apply_image_field(config: &mut Config, key: &str, value: &Value) -> Result<bool, String> {
    let image = &mut config.image_processing;
    match key {
        "max_width" => image.max_width = parse_positive(value, u32::MAX as u64)? as u32,
        "max_height" => image.max_height = parse_positive(value, u32::MAX as u64)? as u32,
        "auto_rotate" => image.auto_rotate = parse_bool(value)?,
        "optimize" => image.optimize = parse_bool(value)?,
        "quality" => image.quality = parse_quality(value)?,
        _ => return Ok(false),
    }
    Ok(true)
}

fn parse_host(value: &Value) -> Result<String, String> {
    let host = value.as_str().ok_or("expected a string")?.trim();
    if host.is_empty() {
        return Err("must not be empty".to_string());
    }
    if host.chars().any(char::is_whitespace) {
        return Err("must not contain whitespace".to_string());
    }
    Ok(host.to_string())
}

fn parse_port(value: &Value) -> Result<u16, String> {
    let port = value.as_u64().ok_or("expected an integer")?;
    if (1..=65535).contains(&port) {
        Ok(port as u16)
    } else {
        Err(format!("{} is outside 1-65535", port))
    }
}

fn parse_bool(value: &Value) -> Result<bool, String> {
    value.as_bool().ok_or_else(|| "expected true or false".to_string())
}

fn parse_folder(value: &Value) -> Result<std::path::PathBuf, String> {
    let folder = value.as_str().ok_or("expected a string")?.trim();
    if folder.is_empty() {
        return Err("must not be empty".to_string());
    }
    Ok(expand_home(folder))
}

fn parse_file_size(value: &Value) -> Result<f64, String> {
    let size = value.as_f64().ok_or("expected a number")?;
    if size.is_finite() && size > 0.0 {
        Ok(size)
    } else {
        Err(format!("{} is not a positive number", size))
    }
}

fn parse_positive(value: &Value, max: u64) -> Result<u64, String> {
    let number = value.as_u64().ok_or("expected a positive integer")?;
    if number == 0 {
        Err("must be at least 1".to_string())
    } else if number > max {
        Err(format!("{} is too large", number))
    } else {
        Ok(number)
    }
}

fn parse_quality(value: &Value) -> Result<u8, String> {
    let quality = value.as_u64().ok_or("expected an integer")?;
    if (1..=100).contains(&quality) {
        Ok(quality as u8)
    } else {
        Err(format!("{} is outside 1-100", quality))
    }
}

fn parse_extensions(value: &Value) -> Result<BTreeSet<String>, String> {
    let items = value.as_array().ok_or("expected a list of strings")?;
    let mut extensions = BTreeSet::new();

    for item in items {
        let raw = item.as_str().ok_or("expected a list of strings")?;
        let extension = raw.trim().trim_start_matches('.').to_lowercase();
        if extension.is_empty() || !extension.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(format!("'{}' is not a valid extension", raw));
        }
        extensions.insert(extension);
    }

    if extensions.is_empty() {
        return Err("at least one extension is required".to_string());
    }
    Ok(extensions)
}
