use image::DynamicImage;
use rexif::{ExifTag, TagValue};
use tracing::trace;

/// EXIF orientation (1-8) embedded in `bytes`, if any.
pub fn read_orientation(bytes: &[u8]) -> Option<u16> {
    let (result, warnings) = rexif::parse_buffer_quiet(bytes);
    for warning in warnings {
        trace!("EXIF warning: {}", warning);
    }

    let exif = match result {
        Ok(exif) => exif,
        Err(e) => {
            trace!("No EXIF data in upload: {}", e);
            return None;
        }
    };

    exif.entries
        .iter()
        .find(|entry| entry.tag == ExifTag::Orientation)
        .and_then(|entry| match &entry.value {
            TagValue::U16(values) => values.first().copied(),
            TagValue::U8(values) => values.first().copied().map(u16::from),
            TagValue::U32(values) => values.first().and_then(|v| u16::try_from(*v).ok()),
            _ => None,
        })
        .filter(|orientation| (1..=8).contains(orientation))
}

/// Rotate/flip pixel data so that it matches the visual intent of `orientation`.
pub fn apply_orientation(image: DynamicImage, orientation: u16) -> DynamicImage {
    match orientation {
        2 => image.fliph(),
        3 => image.rotate180(),
        4 => image.flipv(),
        5 => image.rotate90().fliph(),
        6 => image.rotate90(),
        7 => image.rotate270().fliph(),
        8 => image.rotate270(),
        _ => image,
    }
}
