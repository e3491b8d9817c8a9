// Image processing - decode, orient, bound and re-encode uploaded images
mod formats;
mod orientation;
mod resize;

pub use formats::OutputFormat;
pub use orientation::{apply_orientation, read_orientation};
pub use resize::fit_within;

use super::PhotoError;
use crate::config::ImageProcessingConfig;
use tracing::debug;

/// Turn uploaded bytes into the bytes that get stored.
///
/// The content is decoded regardless of the claimed extension, rotated upright
/// when `auto_rotate` is set, shrunk to fit the configured bounds and encoded in
/// the format named by `extension`.
pub fn process_image(
    bytes: &[u8],
    extension: &str,
    settings: &ImageProcessingConfig,
) -> Result<Vec<u8>, PhotoError> {
    let image = image::load_from_memory(bytes).map_err(PhotoError::ImageDecode)?;
    debug!(
        "Decoded upload: {}x{} {:?}",
        image.width(),
        image.height(),
        image.color()
    );

    let image = if settings.auto_rotate {
        match read_orientation(bytes) {
            Some(orientation) => {
                debug!("Applying EXIF orientation {}", orientation);
                apply_orientation(image, orientation)
            }
            None => image,
        }
    } else {
        image
    };

    let image = resize::downscale(image, settings.max_width, settings.max_height);

    let format = OutputFormat::from_extension(extension)
        .ok_or_else(|| PhotoError::UnsupportedFormat(extension.to_string()))?;

    formats::encode(&image, format, settings.quality, settings.optimize)
}
