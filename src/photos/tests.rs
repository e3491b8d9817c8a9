use super::*;
use chrono::{TimeZone, Utc};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::path::Path;
use tempfile::TempDir;

fn store_in(folder: &Path) -> PhotoStore {
    let mut config = Config::default();
    config.upload.folder = folder.to_path_buf();
    PhotoStore::from_config(&config)
}

fn encoded(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let image = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 7 % 256) as u8, (y * 13 % 256) as u8, ((x + y) % 256) as u8])
    });
    let mut out = Vec::new();
    DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut out), format)
        .unwrap();
    out
}

/// JPEG with an APP1 segment carrying a big-endian IFD0 holding only the orientation tag.
fn jpeg_with_orientation(width: u32, height: u32, orientation: u16) -> Vec<u8> {
    let jpeg = encoded(width, height, ImageFormat::Jpeg);
    assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);

    let mut tiff = Vec::new();
    tiff.extend_from_slice(b"MM\x00\x2A\x00\x00\x00\x08");
    tiff.extend_from_slice(&1u16.to_be_bytes());
    tiff.extend_from_slice(&0x0112u16.to_be_bytes());
    tiff.extend_from_slice(&3u16.to_be_bytes());
    tiff.extend_from_slice(&1u32.to_be_bytes());
    tiff.extend_from_slice(&orientation.to_be_bytes());
    tiff.extend_from_slice(&[0, 0]);
    tiff.extend_from_slice(&0u32.to_be_bytes());

    let mut payload = b"Exif\x00\x00".to_vec();
    payload.extend_from_slice(&tiff);

    let mut out = vec![0xFF, 0xD8, 0xFF, 0xE1];
    out.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
    out.extend_from_slice(&payload);
    out.extend_from_slice(&jpeg[2..]);
    out
}

fn stored(filename: &str, size: u64, minute: u32) -> StoredImage {
    StoredImage {
        filename: filename.to_string(),
        size,
        width: 1,
        height: 1,
        modified: Utc.with_ymd_and_hms(2024, 5, 1, 12, minute, 0).unwrap(),
    }
}

fn names(images: &[StoredImage]) -> Vec<&str> {
    images.iter().map(|image| image.filename.as_str()).collect()
}

#[test]
fn test_sanitize_keeps_safe_names() {
    assert_eq!(sanitize_filename("photo.jpg").unwrap(), "photo.jpg");
    assert_eq!(sanitize_filename("My Holiday 01.JPG").unwrap(), "My_Holiday_01.JPG");
    assert_eq!(sanitize_filename("C:\\Users\\me\\cat.png").unwrap(), "cat.png");
    assert_eq!(sanitize_filename("../../etc/passwd.jpg").unwrap(), "passwd.jpg");
    assert_eq!(sanitize_filename("..hidden.gif").unwrap(), "hidden.gif");
    assert_eq!(sanitize_filename("caf\u{e9}<>|.webp").unwrap(), "caf.webp");
}

#[test]
fn test_sanitize_rejects_empty_stems() {
    for raw in ["", "..", "...", "/", "../", ".jpg", "\u{1F600}.png"] {
        let result = sanitize_filename(raw);
        assert!(
            matches!(result, Err(PhotoError::InvalidFilename(_))),
            "{:?} gave {:?}",
            raw,
            result
        );
    }
}

#[test]
fn test_sanitize_caps_length_and_keeps_extension() {
    let raw = format!("{}.jpeg", "a".repeat(400));
    let sanitized = sanitize_filename(&raw).unwrap();

    assert_eq!(sanitized.len(), 255);
    assert!(sanitized.ends_with(".jpeg"));
}

#[test]
fn test_sanitized_names_never_escape_the_folder() {
    let pieces = ["..", "/", "\\", ".", "etc", "passwd.jpg", " ", "%2e", "~", "a.b"];
    let folder = Path::new("/srv/uploads");

    let mut checked = 0;
    for a in pieces {
        for b in pieces {
            for c in pieces {
                for d in pieces {
                    let raw = format!("{}{}{}{}", a, b, c, d);
                    let Ok(name) = sanitize_filename(&raw) else {
                        continue;
                    };
                    checked += 1;

                    assert!(!name.starts_with('.'), "{:?} -> {:?}", raw, name);
                    assert!(
                        name.chars()
                            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_')),
                        "{:?} -> {:?}",
                        raw,
                        name
                    );
                    assert_eq!(folder.join(&name).parent(), Some(folder), "{:?}", raw);
                }
            }
        }
    }
    assert!(checked > 0);
}

#[test]
fn test_validate_checks_extension_then_size() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = store_in(temp_dir.path());
    store.upload.max_file_size_mb = 1.0;

    assert!(store.validate_upload("PHOTO.JPG", 10).is_ok());
    assert!(store.validate_upload("exact.png", 1_048_576).is_ok());
    assert!(matches!(
        store.validate_upload("big.png", 1_048_577),
        Err(PhotoError::FileTooLarge { size: 1_048_577, limit: 1_048_576 })
    ));
    assert!(matches!(
        store.validate_upload("script.exe", 1),
        Err(PhotoError::DisallowedExtension { extension }) if extension == "exe"
    ));
    assert!(matches!(
        store.validate_upload("huge.exe", u64::MAX),
        Err(PhotoError::DisallowedExtension { .. })
    ));
    assert!(matches!(
        store.validate_upload("no_extension", 1),
        Err(PhotoError::DisallowedExtension { .. })
    ));
}

#[test]
fn test_orientation_matches_reference_mapping() {
    let (width, height) = (3u32, 2u32);
    let source = RgbImage::from_fn(width, height, |x, y| Rgb([x as u8, y as u8, 200]));

    // Where the source pixel (x, y) must end up for each orientation.
    let expected = |orientation: u16, x: u32, y: u32| -> (u32, u32) {
        match orientation {
            1 => (x, y),
            2 => (width - 1 - x, y),
            3 => (width - 1 - x, height - 1 - y),
            4 => (x, height - 1 - y),
            5 => (y, x),
            6 => (height - 1 - y, x),
            7 => (height - 1 - y, width - 1 - x),
            8 => (y, width - 1 - x),
            _ => unreachable!(),
        }
    };

    for orientation in 1..=8u16 {
        let rotated = apply_orientation(DynamicImage::ImageRgb8(source.clone()), orientation).to_rgb8();
        if orientation >= 5 {
            assert_eq!(rotated.dimensions(), (height, width), "orientation {}", orientation);
        } else {
            assert_eq!(rotated.dimensions(), (width, height), "orientation {}", orientation);
        }

        for y in 0..height {
            for x in 0..width {
                let (tx, ty) = expected(orientation, x, y);
                assert_eq!(
                    rotated.get_pixel(tx, ty),
                    source.get_pixel(x, y),
                    "orientation {} source ({}, {})",
                    orientation,
                    x,
                    y
                );
            }
        }
    }
}

#[test]
fn test_read_orientation_from_exif() {
    assert_eq!(read_orientation(&jpeg_with_orientation(8, 4, 6)), Some(6));
    assert_eq!(read_orientation(&encoded(8, 4, ImageFormat::Jpeg)), None);
    assert_eq!(read_orientation(b"not an image"), None);
}

#[test]
fn test_process_image_rotates_when_enabled() {
    let bytes = jpeg_with_orientation(40, 20, 6);
    let mut settings = Config::default().image_processing;

    let rotated = image::load_from_memory(&process_image(&bytes, "jpg", &settings).unwrap()).unwrap();
    assert_eq!((rotated.width(), rotated.height()), (20, 40));

    settings.auto_rotate = false;
    let untouched = image::load_from_memory(&process_image(&bytes, "jpg", &settings).unwrap()).unwrap();
    assert_eq!((untouched.width(), untouched.height()), (40, 20));
}

#[test]
fn test_process_image_bounds_output_and_uses_extension_format() {
    let mut settings = Config::default().image_processing;
    settings.max_width = 100;
    settings.max_height = 50;

    let output = process_image(&encoded(400, 100, ImageFormat::Png), "png", &settings).unwrap();

    assert_eq!(image::guess_format(&output).unwrap(), ImageFormat::Png);
    let decoded = image::load_from_memory(&output).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (100, 25));
}

#[test]
fn test_process_image_lower_quality_is_smaller() {
    let mut settings = Config::default().image_processing;
    let bytes = encoded(256, 256, ImageFormat::Png);

    settings.quality = 95;
    let high = process_image(&bytes, "jpg", &settings).unwrap();
    settings.quality = 10;
    let low = process_image(&bytes, "jpg", &settings).unwrap();

    assert!(low.len() < high.len());
}

#[test]
fn test_fit_within_respects_bounds_and_aspect() {
    assert_eq!(fit_within(4000, 3000, 1920, 1080), (1440, 1080));
    assert_eq!(fit_within(800, 600, 1920, 1080), (800, 600));
    assert_eq!(fit_within(5000, 10, 100, 100), (100, 1));

    for (width, height) in [(4000, 3000), (3000, 4000), (1921, 1080), (10_000, 7), (7, 10_000), (1234, 5678)] {
        let (new_width, new_height) = fit_within(width, height, 1920, 1080);
        assert!(new_width <= 1920 && new_height <= 1080, "{}x{}", width, height);
        assert!(new_width >= 1 && new_height >= 1);

        let expected_height = new_width as f64 * height as f64 / width as f64;
        let expected_width = new_height as f64 * width as f64 / height as f64;
        assert!(
            (expected_height - new_height as f64).abs() <= 1.0
                || (expected_width - new_width as f64).abs() <= 1.0,
            "{}x{} -> {}x{}",
            width,
            height,
            new_width,
            new_height
        );
    }
}

#[test]
fn test_disambiguated_names() {
    assert_eq!(persist::disambiguated_name("photo.jpg", 0), "photo.jpg");
    assert_eq!(persist::disambiguated_name("photo.jpg", 1), "photo-1.jpg");
    assert_eq!(persist::disambiguated_name("archive.tar.png", 2), "archive.tar-2.png");
    assert_eq!(persist::disambiguated_name("README", 3), "README-3");
}

#[test]
fn test_disambiguated_names_stay_within_length_limit() {
    let longest = format!("{}.jpg", "a".repeat(251));

    let renamed = persist::disambiguated_name(&longest, 1);
    assert!(renamed.len() <= 255);
    assert!(renamed.ends_with("-1.jpg"));

    let renamed = persist::disambiguated_name(&longest, 12345);
    assert!(renamed.len() <= 255);
    assert!(renamed.ends_with("-12345.jpg"));

    // Multi-byte characters are cut on a character boundary.
    let wide = format!("{}.png", "é".repeat(125));
    let renamed = persist::disambiguated_name(&wide, 7);
    assert!(renamed.len() <= 255);
    assert!(renamed.ends_with("-7.png"));
}

#[test]
fn test_repeated_longest_name_uploads_get_distinct_names() {
    let temp_dir = TempDir::new().unwrap();
    let store = store_in(temp_dir.path());
    let bytes = encoded(8, 8, ImageFormat::Jpeg);
    let name = format!("{}.jpg", "a".repeat(400));

    let first = store.ingest(&name, &bytes).unwrap();
    let second = store.ingest(&name, &bytes).unwrap();

    assert_ne!(first, second);
    assert!(first.len() <= 255);
    assert!(second.len() <= 255);
    assert!(second.ends_with("-1.jpg"));
    assert!(temp_dir.path().join(&first).is_file());
    assert!(temp_dir.path().join(&second).is_file());
}

#[test]
fn test_colliding_uploads_get_suffixes() {
    let temp_dir = TempDir::new().unwrap();
    let store = store_in(temp_dir.path());
    let bytes = encoded(16, 16, ImageFormat::Jpeg);

    assert_eq!(store.ingest("photo.jpg", &bytes).unwrap(), "photo.jpg");
    assert_eq!(store.ingest("photo.jpg", &bytes).unwrap(), "photo-1.jpg");
    assert_eq!(store.ingest("sub/photo.jpg", &bytes).unwrap(), "photo-2.jpg");

    let mut entries: Vec<String> = std::fs::read_dir(temp_dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    entries.sort();
    assert_eq!(entries, vec!["photo-1.jpg", "photo-2.jpg", "photo.jpg"]);
}

#[test]
fn test_concurrent_uploads_never_share_a_name() {
    let temp_dir = TempDir::new().unwrap();
    let bytes = encoded(16, 16, ImageFormat::Png);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = store_in(temp_dir.path());
            let bytes = bytes.clone();
            std::thread::spawn(move || store.ingest("same.png", &bytes).unwrap())
        })
        .collect();

    let mut stored: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    stored.sort();
    stored.dedup();
    assert_eq!(stored.len(), 8);
}

#[test]
fn test_undecodable_upload_leaves_nothing_behind() {
    let temp_dir = TempDir::new().unwrap();
    let store = store_in(temp_dir.path());

    let result = store.ingest("broken.jpg", b"definitely not a jpeg");

    assert!(matches!(result, Err(PhotoError::ImageDecode(_))));
    assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
}

#[test]
fn test_failed_persist_removes_temporary_file() {
    let temp_dir = TempDir::new().unwrap();
    let too_long = format!("{}.jpg", "b".repeat(300));

    let result = persist::persist_unique(temp_dir.path(), &too_long, b"data");

    assert!(matches!(result, Err(PhotoError::StorageWrite(_))));
    assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
}

#[cfg(unix)]
#[test]
fn test_read_only_folder_is_a_storage_error() {
    use std::os::unix::fs::PermissionsExt;

    let temp_dir = TempDir::new().unwrap();
    let folder = temp_dir.path().join("locked");
    std::fs::create_dir(&folder).unwrap();
    std::fs::set_permissions(&folder, std::fs::Permissions::from_mode(0o555)).unwrap();

    // Permission bits do not bind a privileged user.
    let writable = std::fs::File::create(folder.join("check")).is_ok();
    let result = store_in(&folder).ingest("photo.png", &encoded(8, 8, ImageFormat::Png));
    let leftovers = std::fs::read_dir(&folder).unwrap().count();
    std::fs::set_permissions(&folder, std::fs::Permissions::from_mode(0o755)).unwrap();
    if writable {
        return;
    }

    assert!(matches!(result, Err(PhotoError::StorageWrite(_))));
    assert_eq!(leftovers, 0);
}

#[test]
fn test_disallowed_upload_is_rejected_before_decoding() {
    let temp_dir = TempDir::new().unwrap();
    let store = store_in(temp_dir.path());

    let result = store.ingest("payload.svg", &encoded(4, 4, ImageFormat::Png));

    assert!(matches!(result, Err(PhotoError::DisallowedExtension { .. })));
}

#[test]
fn test_sort_directive_parsing_falls_back() {
    assert_eq!(SortDirective::from_query(None, None), SortDirective::default());
    assert_eq!(
        SortDirective::from_query(Some("SIZE"), Some("desc")),
        SortDirective::new(SortKey::Size, SortOrder::Desc)
    );
    assert_eq!(
        SortDirective::from_query(Some("colour"), Some("sideways")),
        SortDirective::new(SortKey::Name, SortOrder::Asc)
    );
}

#[test]
fn test_sort_orders_with_filename_tiebreak() {
    let mut images = vec![
        stored("c.jpg", 300, 1),
        stored("b.jpg", 100, 2),
        stored("A.jpg", 100, 2),
        stored("d.jpg", 200, 0),
    ];

    images.sort_by(|a, b| SortDirective::new(SortKey::Name, SortOrder::Asc).compare(a, b));
    assert_eq!(names(&images), vec!["A.jpg", "b.jpg", "c.jpg", "d.jpg"]);

    images.sort_by(|a, b| SortDirective::new(SortKey::Size, SortOrder::Desc).compare(a, b));
    assert_eq!(names(&images), vec!["c.jpg", "d.jpg", "A.jpg", "b.jpg"]);

    images.sort_by(|a, b| SortDirective::new(SortKey::Date, SortOrder::Asc).compare(a, b));
    assert_eq!(names(&images), vec!["d.jpg", "c.jpg", "A.jpg", "b.jpg"]);

    images.sort_by(|a, b| SortDirective::new(SortKey::Date, SortOrder::Desc).compare(a, b));
    assert_eq!(names(&images), vec!["A.jpg", "b.jpg", "c.jpg", "d.jpg"]);
}

#[tokio::test]
async fn test_listing_skips_hidden_and_disallowed_entries() {
    let temp_dir = TempDir::new().unwrap();
    let folder = temp_dir.path();
    std::fs::write(folder.join("b.jpg"), encoded(8, 6, ImageFormat::Jpeg)).unwrap();
    std::fs::write(folder.join("A.jpg"), encoded(4, 2, ImageFormat::Jpeg)).unwrap();
    std::fs::write(folder.join("c.jpg"), b"not really a jpeg").unwrap();
    std::fs::write(folder.join(".hidden.jpg"), b"x").unwrap();
    std::fs::write(folder.join(".upload-1234.part"), b"x").unwrap();
    std::fs::write(folder.join("notes.txt"), b"x").unwrap();
    std::fs::create_dir(folder.join("album.jpg")).unwrap();

    let images = store_in(folder)
        .list_images(SortDirective::default())
        .await
        .unwrap();

    assert_eq!(names(&images), vec!["A.jpg", "b.jpg", "c.jpg"]);
    assert_eq!((images[0].width, images[0].height), (4, 2));
    assert_eq!((images[1].width, images[1].height), (8, 6));
    assert_eq!((images[2].width, images[2].height), (0, 0));
    assert_eq!(images[2].size, 17);
}

#[tokio::test]
async fn test_listing_missing_folder_is_empty() {
    let temp_dir = TempDir::new().unwrap();
    let store = store_in(&temp_dir.path().join("not-yet"));

    let images = store.list_images(SortDirective::default()).await.unwrap();

    assert!(images.is_empty());
}

#[tokio::test]
async fn test_delete_removes_file() {
    let temp_dir = TempDir::new().unwrap();
    let store = store_in(temp_dir.path());
    std::fs::write(temp_dir.path().join("gone.png"), b"x").unwrap();

    assert_eq!(store.delete_image("gone.png").await.unwrap(), DeleteOutcome::Deleted);
    assert!(!temp_dir.path().join("gone.png").exists());
}

#[tokio::test]
async fn test_delete_missing_file_is_not_found() {
    let temp_dir = TempDir::new().unwrap();
    let store = store_in(temp_dir.path());

    let result = store.delete_image("missing.jpg").await;

    assert!(matches!(result, Err(PhotoError::NotFound(_))));
}

#[tokio::test]
async fn test_delete_rejects_traversal() {
    let temp_dir = TempDir::new().unwrap();
    let folder = temp_dir.path().join("uploads");
    std::fs::create_dir(&folder).unwrap();
    std::fs::write(temp_dir.path().join("secret.jpg"), b"x").unwrap();
    let store = store_in(&folder);

    for requested in ["../secret.jpg", "..", ".", "..\\secret.jpg", "/etc/passwd", "a/../../secret.jpg"] {
        let result = store.delete_image(requested).await;
        assert!(
            matches!(result, Err(PhotoError::PathEscape(_))),
            "{:?} gave {:?}",
            requested,
            result
        );
    }
    assert!(temp_dir.path().join("secret.jpg").exists());
}

#[tokio::test]
async fn test_delete_rejects_names_that_need_sanitizing() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join("with space.jpg"), b"x").unwrap();
    let store = store_in(temp_dir.path());

    let result = store.delete_image("with space.jpg").await;

    assert!(matches!(result, Err(PhotoError::InvalidFilename(_))));
    assert!(temp_dir.path().join("with space.jpg").exists());
}

#[cfg(unix)]
#[tokio::test]
async fn test_delete_rejects_symlink_out_of_folder() {
    let uploads = TempDir::new().unwrap();
    let outside = TempDir::new().unwrap();
    let target = outside.path().join("target.jpg");
    std::fs::write(&target, b"x").unwrap();
    std::os::unix::fs::symlink(&target, uploads.path().join("link.jpg")).unwrap();

    let result = store_in(uploads.path()).delete_image("link.jpg").await;

    assert!(matches!(result, Err(PhotoError::PathEscape(_))));
    assert!(target.exists());
}

#[test]
fn test_error_status_codes() {
    use axum::http::StatusCode;

    assert_eq!(PhotoError::InvalidFilename("x".into()).status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(
        PhotoError::FileTooLarge { size: 2, limit: 1 }.status_code(),
        StatusCode::PAYLOAD_TOO_LARGE
    );
    assert_eq!(PhotoError::PathEscape("x".into()).status_code(), StatusCode::FORBIDDEN);
    assert_eq!(PhotoError::NotFound("x".into()).status_code(), StatusCode::NOT_FOUND);
}
