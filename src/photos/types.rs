use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Serialize)]
pub struct StoredImage {
    pub filename: String,
    pub size: u64,
    pub width: u32,
    pub height: u32,
    pub modified: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Name,
    Date,
    Size,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SortDirective {
    pub key: SortKey,
    pub order: SortOrder,
}

impl SortDirective {
    pub fn new(key: SortKey, order: SortOrder) -> Self {
        Self { key, order }
    }

    /// Unrecognised values fall back to the default (name, ascending) per component.
    pub fn from_query(sort: Option<&str>, order: Option<&str>) -> Self {
        let key = match sort.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("date") => SortKey::Date,
            Some("size") => SortKey::Size,
            _ => SortKey::Name,
        };
        let order = match order.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("desc") => SortOrder::Desc,
            _ => SortOrder::Asc,
        };
        Self { key, order }
    }

    pub fn compare(&self, a: &StoredImage, b: &StoredImage) -> Ordering {
        let primary = match self.key {
            SortKey::Name => a.filename.to_lowercase().cmp(&b.filename.to_lowercase()),
            SortKey::Date => a.modified.cmp(&b.modified),
            SortKey::Size => a.size.cmp(&b.size),
        };
        let primary = match self.order {
            SortOrder::Asc => primary,
            SortOrder::Desc => primary.reverse(),
        };
        primary.then_with(|| a.filename.cmp(&b.filename))
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct GalleryQuery {
    pub sort: Option<String>,
    pub order: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// The file disappeared between resolution and removal.
    AlreadyRemoved,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct UploadSummary {
    pub uploaded: Vec<UploadedFile>,
    pub failed: Vec<FailedUpload>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadedFile {
    pub original: String,
    pub stored: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedUpload {
    pub filename: String,
    pub error: String,
}
