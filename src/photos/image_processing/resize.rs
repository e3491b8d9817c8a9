use image::{DynamicImage, imageops::FilterType};
use tracing::debug;

/// Largest size with the same aspect ratio that fits in `max_width` x `max_height`.
///
/// Images that already fit are returned unchanged; nothing is ever scaled up.
pub fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width <= max_width && height <= max_height {
        return (width, height);
    }

    let ratio = (max_width as f64 / width as f64).min(max_height as f64 / height as f64);
    let new_width = ((width as f64 * ratio).round() as u32).clamp(1, max_width.max(1));
    let new_height = ((height as f64 * ratio).round() as u32).clamp(1, max_height.max(1));

    (new_width, new_height)
}

pub(super) fn downscale(image: DynamicImage, max_width: u32, max_height: u32) -> DynamicImage {
    let (width, height) = (image.width(), image.height());
    let (new_width, new_height) = fit_within(width, height, max_width, max_height);

    if (new_width, new_height) == (width, height) {
        return image;
    }

    debug!(
        "Resizing {}x{} -> {}x{}",
        width, height, new_width, new_height
    );
    image.resize_exact(new_width, new_height, FilterType::Lanczos3)
}
