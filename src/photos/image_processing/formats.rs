use image::{
    DynamicImage, ExtendedColorType, ImageEncoder, ImageFormat,
    codecs::{
        jpeg::JpegEncoder,
        png::{CompressionType, FilterType as PngFilterType, PngEncoder},
    },
};
use std::io::Cursor;

use crate::photos::PhotoError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Jpeg,
    Png,
    WebP,
    Gif,
    Bmp,
    Tiff,
}

impl OutputFormat {
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(OutputFormat::Jpeg),
            "png" => Some(OutputFormat::Png),
            "webp" => Some(OutputFormat::WebP),
            "gif" => Some(OutputFormat::Gif),
            "bmp" => Some(OutputFormat::Bmp),
            "tif" | "tiff" => Some(OutputFormat::Tiff),
            _ => None,
        }
    }

    pub fn image_format(&self) -> ImageFormat {
        match self {
            OutputFormat::Jpeg => ImageFormat::Jpeg,
            OutputFormat::Png => ImageFormat::Png,
            OutputFormat::WebP => ImageFormat::WebP,
            OutputFormat::Gif => ImageFormat::Gif,
            OutputFormat::Bmp => ImageFormat::Bmp,
            OutputFormat::Tiff => ImageFormat::Tiff,
        }
    }
}

/// Encode `image` in memory. `quality` drives JPEG and WebP; `optimize` selects
/// the strongest PNG compression.
pub(super) fn encode(
    image: &DynamicImage,
    format: OutputFormat,
    quality: u8,
    optimize: bool,
) -> Result<Vec<u8>, PhotoError> {
    match format {
        OutputFormat::Jpeg => encode_jpeg(image, quality),
        OutputFormat::Png => encode_png(image, optimize),
        OutputFormat::WebP => Ok(encode_webp(image, quality)),
        OutputFormat::Gif | OutputFormat::Bmp | OutputFormat::Tiff => {
            // These encoders all accept RGBA8, which avoids per-format colour type checks.
            let rgba = DynamicImage::ImageRgba8(image.to_rgba8());
            let mut cursor = Cursor::new(Vec::new());
            rgba.write_to(&mut cursor, format.image_format())
                .map_err(PhotoError::ImageEncode)?;
            Ok(cursor.into_inner())
        }
    }
}

fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, PhotoError> {
    // JPEG doesn't support alpha channel, so convert to RGB
    let rgb_image = image.to_rgb8();
    let mut buffer = Vec::new();

    let encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
    encoder
        .write_image(
            &rgb_image,
            rgb_image.width(),
            rgb_image.height(),
            ExtendedColorType::Rgb8,
        )
        .map_err(PhotoError::ImageEncode)?;

    Ok(buffer)
}

fn encode_png(image: &DynamicImage, optimize: bool) -> Result<Vec<u8>, PhotoError> {
    let compression = if optimize {
        CompressionType::Best
    } else {
        CompressionType::Default
    };
    let mut buffer = Vec::new();

    let encoder = PngEncoder::new_with_quality(&mut buffer, compression, PngFilterType::Adaptive);
    image
        .write_with_encoder(encoder)
        .map_err(PhotoError::ImageEncode)?;

    Ok(buffer)
}

fn encode_webp(image: &DynamicImage, quality: u8) -> Vec<u8> {
    let quality = quality as f32;
    if image.color().has_alpha() {
        let rgba = image.to_rgba8();
        webp::Encoder::from_rgba(&rgba, rgba.width(), rgba.height())
            .encode(quality)
            .to_vec()
    } else {
        let rgb = image.to_rgb8();
        webp::Encoder::from_rgb(&rgb, rgb.width(), rgb.height())
            .encode(quality)
            .to_vec()
    }
}
