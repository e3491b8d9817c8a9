use super::{PhotoError, sanitize::MAX_FILENAME_BYTES};
use std::fs::File;
use std::io::{ErrorKind, Write};
use std::path::Path;
use tracing::{debug, warn};

const MAX_NAME_ATTEMPTS: u32 = 10_000;

/// `name.ext` for attempt 0, `name-N.ext` afterwards.
///
/// The stem is shortened when needed so a suffixed name stays within the
/// filename length limit.
pub(crate) fn disambiguated_name(file_name: &str, attempt: u32) -> String {
    if attempt == 0 {
        return file_name.to_string();
    }
    let suffix = format!("-{}", attempt);
    let (stem, extension) = match file_name.rsplit_once('.') {
        Some((stem, extension)) => (stem, Some(extension)),
        None => (file_name, None),
    };

    let reserved = suffix.len() + extension.map(|ext| ext.len() + 1).unwrap_or(0);
    let stem = truncate_to_boundary(stem, MAX_FILENAME_BYTES.saturating_sub(reserved));

    match extension {
        Some(extension) => format!("{}{}.{}", stem, suffix, extension),
        None => format!("{}{}", stem, suffix),
    }
}

fn truncate_to_boundary(value: &str, max_bytes: usize) -> &str {
    if value.len() <= max_bytes {
        return value;
    }
    let mut end = max_bytes;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}

/// Store `data` under `file_name` in `folder`, picking the first free disambiguated name.
///
/// The bytes land in a hidden temporary file first; the final name is then
/// claimed with a hard link, which fails instead of replacing an existing file.
/// Nothing is ever visible under the final name until it is complete.
pub(crate) fn persist_unique(
    folder: &Path,
    file_name: &str,
    data: &[u8],
) -> Result<String, PhotoError> {
    std::fs::create_dir_all(folder).map_err(PhotoError::StorageWrite)?;

    let temp_path = folder.join(format!(".upload-{}.part", uuid::Uuid::new_v4()));
    let result = write_temp(&temp_path, data).and_then(|()| claim_name(folder, file_name, &temp_path));

    if let Err(e) = std::fs::remove_file(&temp_path)
        && e.kind() != ErrorKind::NotFound
    {
        warn!("Failed to remove temporary upload {:?}: {}", temp_path, e);
    }

    result
}

fn write_temp(path: &Path, data: &[u8]) -> Result<(), PhotoError> {
    let mut file = File::create_new(path).map_err(PhotoError::StorageWrite)?;
    file.write_all(data).map_err(PhotoError::StorageWrite)?;
    file.sync_all().map_err(PhotoError::StorageWrite)?;
    Ok(())
}

fn claim_name(folder: &Path, file_name: &str, temp_path: &Path) -> Result<String, PhotoError> {
    for attempt in 0..MAX_NAME_ATTEMPTS {
        let candidate_name = disambiguated_name(file_name, attempt);
        let candidate = folder.join(&candidate_name);

        match std::fs::hard_link(temp_path, &candidate) {
            Ok(()) => return Ok(candidate_name),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) if links_unsupported(&e) => {
                debug!("Hard link into {:?} failed ({}), falling back to rename", folder, e);
                return rename_into_free_name(folder, file_name, temp_path, attempt);
            }
            Err(e) => return Err(PhotoError::StorageWrite(e)),
        }
    }

    Err(no_free_name(file_name))
}

// FAT/exFAT and some network mounts refuse links with EPERM or ENOTSUP.
fn links_unsupported(error: &std::io::Error) -> bool {
    matches!(
        error.kind(),
        ErrorKind::Unsupported | ErrorKind::PermissionDenied
    )
}

// Check-then-rename: two writers racing for the same name can still collide here.
fn rename_into_free_name(
    folder: &Path,
    file_name: &str,
    temp_path: &Path,
    first_attempt: u32,
) -> Result<String, PhotoError> {
    for attempt in first_attempt..MAX_NAME_ATTEMPTS {
        let candidate_name = disambiguated_name(file_name, attempt);
        let candidate = folder.join(&candidate_name);

        match std::fs::symlink_metadata(&candidate) {
            Ok(_) => continue,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                std::fs::rename(temp_path, &candidate).map_err(PhotoError::StorageWrite)?;
                return Ok(candidate_name);
            }
            Err(e) => return Err(PhotoError::StorageWrite(e)),
        }
    }

    Err(no_free_name(file_name))
}

fn no_free_name(file_name: &str) -> PhotoError {
    PhotoError::StorageWrite(std::io::Error::new(
        ErrorKind::AlreadyExists,
        format!("no free name left for {}", file_name),
    ))
}
