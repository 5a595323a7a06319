use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, Rgb, RgbImage};
use thiserror::Error;

pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;
pub const MAX_DIMENSION: u32 = 1920;
pub const JPEG_QUALITY: u8 = 90;
pub const ACCEPTED_MEDIA_TYPES: &[&str] = &["image/png", "image/jpeg", "image/jpg"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageError {
    #[error("Only PNG or JPG images are supported (got '{media_type}').")]
    UnsupportedFormat { media_type: String },
    #[error("File too large (max 10MB, got {size} bytes).")]
    FileTooLarge { size: u64 },
    #[error("Failed to process image: {0}")]
    Processing(String),
}

/// A user-selected file: declared media type plus raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedImage {
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl UploadedImage {
    pub fn new(media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            media_type: media_type.into(),
            bytes,
        }
    }

    /// Reads a file from disk, declaring its media type from the extension.
    /// Type and size are checked before the contents are read.
    pub fn from_path(path: &Path) -> Result<Self, ImageError> {
        let media_type = media_type_for_path(path);
        check_media_type(&media_type)?;
        let size = std::fs::metadata(path)
            .map_err(|err| ImageError::Processing(format!("{}: {err}", path.display())))?
            .len();
        check_size(size)?;
        let bytes = std::fs::read(path)
            .map_err(|err| ImageError::Processing(format!("{}: {err}", path.display())))?;
        Ok(Self::new(media_type, bytes))
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Downscaled JPEG ready for submission and inline preview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedImage {
    pub data_url: String,
    pub width: u32,
    pub height: u32,
    pub source_width: u32,
    pub source_height: u32,
}

/// Validates, decodes, shrinks to fit [`MAX_DIMENSION`] and re-encodes as JPEG.
pub fn prepare_image(upload: &UploadedImage) -> Result<PreparedImage, ImageError> {
    check_media_type(&upload.media_type)?;
    check_size(upload.size())?;

    let decoded = image::load_from_memory(&upload.bytes)
        .map_err(|err| ImageError::Processing(err.to_string()))?;
    let (source_width, source_height) = (decoded.width(), decoded.height());
    let (width, height) = scaled_dimensions(source_width, source_height, MAX_DIMENSION);

    let flattened = flatten_onto_white(&decoded);
    let resized = if (width, height) == (source_width, source_height) {
        flattened
    } else {
        DynamicImage::ImageRgb8(flattened)
            .resize_exact(width, height, FilterType::Triangle)
            .to_rgb8()
    };

    let mut bytes = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY);
    encoder
        .encode_image(&DynamicImage::ImageRgb8(resized))
        .map_err(|err| ImageError::Processing(err.to_string()))?;

    Ok(PreparedImage {
        data_url: format!("data:image/jpeg;base64,{}", BASE64.encode(bytes)),
        width,
        height,
        source_width,
        source_height,
    })
}

/// Uniform shrink so neither side exceeds `max_dim`; never enlarges.
pub fn scaled_dimensions(width: u32, height: u32, max_dim: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= max_dim {
        return (width, height);
    }
    let factor = f64::from(max_dim) / f64::from(longest);
    let scale = |side: u32| ((f64::from(side) * factor).round() as u32).max(1);
    (scale(width), scale(height))
}

pub fn media_type_for_path(path: &Path) -> String {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "heic" | "heif" => "image/heic",
        _ => "application/octet-stream",
    }
    .to_string()
}

fn check_media_type(media_type: &str) -> Result<(), ImageError> {
    let normalized = media_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    if ACCEPTED_MEDIA_TYPES.contains(&normalized.as_str()) {
        Ok(())
    } else {
        Err(ImageError::UnsupportedFormat {
            media_type: media_type.to_string(),
        })
    }
}

fn check_size(size: u64) -> Result<(), ImageError> {
    if size > MAX_UPLOAD_BYTES {
        return Err(ImageError::FileTooLarge { size });
    }
    Ok(())
}

// JPEG has no alpha channel.
fn flatten_onto_white(image: &DynamicImage) -> RgbImage {
    let rgba = image.to_rgba8();
    let mut flattened = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let alpha = u16::from(pixel[3]);
        let blend =
            |channel: u8| -> u8 { (((u16::from(channel) * alpha) + (255 * (255 - alpha))) / 255) as u8 };
        flattened.put_pixel(x, y, Rgb([blend(pixel[0]), blend(pixel[1]), blend(pixel[2])]));
    }
    flattened
}
