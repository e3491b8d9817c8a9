use super::{PhotoError, PhotoStore};
use std::path::PathBuf;
use tracing::warn;

pub(crate) const MAX_FILENAME_BYTES: usize = 255;
const MAX_EXTENSION_CHARS: usize = 16;

/// Reduce an untrusted filename to a single safe path component.
///
/// Only the last component of the input is kept (both `/` and `\` count as
/// separators). The result consists of `[A-Za-z0-9._-]`, never starts with a
/// dot, and fits in 255 bytes with its extension intact.
pub fn sanitize_filename(raw: &str) -> Result<String, PhotoError> {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or("");

    let (stem, extension) = match base.rsplit_once('.') {
        Some((stem, extension)) => (stem, Some(extension)),
        None => (base, None),
    };

    let stem = clean_stem(stem);
    let extension = extension
        .map(clean_extension)
        .filter(|extension| !extension.is_empty());

    if stem.is_empty() {
        return Err(PhotoError::InvalidFilename(raw.to_string()));
    }

    Ok(match extension {
        Some(extension) => {
            let budget = MAX_FILENAME_BYTES - extension.len() - 1;
            format!("{}.{}", truncate(&stem, budget), extension)
        }
        None => truncate(&stem, MAX_FILENAME_BYTES).to_string(),
    })
}

fn clean_stem(stem: &str) -> String {
    let cleaned: String = stem
        .chars()
        .filter_map(|c| {
            if c.is_whitespace() {
                Some('_')
            } else if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                Some(c)
            } else {
                None
            }
        })
        .collect();

    cleaned.trim_matches('.').to_string()
}

fn clean_extension(extension: &str) -> String {
    extension
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(MAX_EXTENSION_CHARS)
        .collect()
}

// Input is ASCII by construction, so byte and char boundaries coincide.
fn truncate(value: &str, max_bytes: usize) -> &str {
    if value.len() > max_bytes {
        &value[..max_bytes]
    } else {
        value
    }
}

impl PhotoStore {
    /// Resolve a requested name to an existing regular file directly inside the upload folder.
    ///
    /// Names with separators or parent references are refused outright. The
    /// candidate is canonicalised so a symlink pointing elsewhere is refused as well.
    pub(crate) async fn resolve_existing(&self, requested: &str) -> Result<PathBuf, PhotoError> {
        if requested.contains(['/', '\\', '\0']) || requested == "." || requested == ".." {
            warn!(target: "security", requested = %requested, "Rejected path traversal attempt");
            return Err(PhotoError::PathEscape(requested.to_string()));
        }

        let sanitized = sanitize_filename(requested)?;
        if sanitized != requested {
            return Err(PhotoError::InvalidFilename(requested.to_string()));
        }

        let candidate = self.folder().join(&sanitized);
        if let Err(e) = tokio::fs::symlink_metadata(&candidate).await {
            return Err(not_found_or_io(e, sanitized));
        }

        let canonical_folder = tokio::fs::canonicalize(self.folder()).await?;
        let canonical = tokio::fs::canonicalize(&candidate)
            .await
            .map_err(|e| not_found_or_io(e, sanitized.clone()))?;

        if canonical.parent() != Some(canonical_folder.as_path()) {
            warn!(
                target: "security",
                requested = %requested,
                resolved = %canonical.display(),
                "Rejected file resolving outside the upload folder"
            );
            return Err(PhotoError::PathEscape(requested.to_string()));
        }

        let metadata = tokio::fs::metadata(&canonical).await?;
        if !metadata.is_file() {
            return Err(PhotoError::NotFound(sanitized));
        }

        Ok(candidate)
    }
}

fn not_found_or_io(error: std::io::Error, name: String) -> PhotoError {
    if error.kind() == std::io::ErrorKind::NotFound {
        PhotoError::NotFound(name)
    } else {
        PhotoError::IoError(error)
    }
}
