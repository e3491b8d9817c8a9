use serde::Deserialize;
use serde_json::{Map, Value};

/// Fields posted by the settings page. Every field arrives as text; an empty
/// field leaves the current value unchanged.
#[derive(Debug, Default, Deserialize)]
pub struct SettingsForm {
    pub host: Option<String>,
    pub port: Option<String>,
    pub debug: Option<String>,
    pub upload_folder: Option<String>,
    pub max_file_size_mb: Option<String>,
    pub allowed_extensions: Option<String>,
    pub batch_size: Option<String>,
    pub max_width: Option<String>,
    pub max_height: Option<String>,
    pub auto_rotate: Option<String>,
    pub optimize: Option<String>,
    pub quality: Option<String>,
}

impl SettingsForm {
    /// Convert into the nested document accepted by the settings manager.
    ///
    /// Values that do not parse as the expected type are passed through as
    /// strings so validation reports them against the right field.
    pub fn into_update(self) -> Value {
        let mut server = Map::new();
        insert(&mut server, "host", self.host, text);
        insert(&mut server, "port", self.port, number);
        insert(&mut server, "debug", self.debug, boolean);

        let mut upload = Map::new();
        insert(&mut upload, "folder", self.upload_folder, text);
        insert(&mut upload, "max_file_size_mb", self.max_file_size_mb, number);
        insert(&mut upload, "allowed_extensions", self.allowed_extensions, list);
        insert(&mut upload, "batch_size", self.batch_size, number);

        let mut image_processing = Map::new();
        insert(&mut image_processing, "max_width", self.max_width, number);
        insert(&mut image_processing, "max_height", self.max_height, number);
        insert(&mut image_processing, "auto_rotate", self.auto_rotate, boolean);
        insert(&mut image_processing, "optimize", self.optimize, boolean);
        insert(&mut image_processing, "quality", self.quality, number);

        let mut document = Map::new();
        for (name, section) in [
            ("server", server),
            ("upload", upload),
            ("image_processing", image_processing),
        ] {
            if !section.is_empty() {
                document.insert(name.to_string(), Value::Object(section));
            }
        }
        Value::Object(document)
    }
}

fn insert(section: &mut Map<String, Value>, key: &str, raw: Option<String>, coerce: fn(&str) -> Value) {
    if let Some(raw) = raw {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            section.insert(key.to_string(), coerce(trimmed));
        }
    }
}

fn text(raw: &str) -> Value {
    Value::from(raw)
}

fn number(raw: &str) -> Value {
    if let Ok(n) = raw.parse::<u64>() {
        return Value::from(n);
    }
    match raw.parse::<f64>() {
        Ok(n) if n.is_finite() => Value::from(n),
        _ => Value::from(raw),
    }
}

fn boolean(raw: &str) -> Value {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "on" | "1" | "yes" => Value::Bool(true),
        "false" | "off" | "0" | "no" => Value::Bool(false),
        _ => Value::from(raw),
    }
}

fn list(raw: &str) -> Value {
    Value::Array(
        raw.split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(Value::from)
            .collect(),
    )
}
