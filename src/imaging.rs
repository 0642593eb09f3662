//! Upload intake: size and type checks, decode check, metadata.

use image::{ColorType, GenericImageView, ImageFormat};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum UploadError {
    #[error("No image was uploaded")]
    Empty,

    #[error("Image is {size} bytes, the limit is {limit}")]
    TooLarge { size: usize, limit: usize },

    #[error("Uploaded file is not an image ({0})")]
    NotAnImage(String),

    #[error("Image could not be decoded: {0}")]
    Undecodable(String),
}

/// Properties of a decoded upload. Also the input of the fallback report
/// and the text proxy sent to text-only models.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    pub color_mode: String,
    pub format: String,
}

impl ImageMetadata {
    /// One-line description, e.g. `512x384 pixels, RGB, PNG`.
    pub fn describe(&self) -> String {
        format!(
            "{}x{} pixels, {}, {}",
            self.width, self.height, self.color_mode, self.format
        )
    }
}

/// A validated upload. `bytes` are kept as received.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub bytes: Vec<u8>,
    pub mime: String,
    pub metadata: ImageMetadata,
}

/// Validate an uploaded image and read its metadata.
///
/// The MIME type reported back is sniffed from the bytes; the declared
/// one only has to be some `image/*` type.
pub fn inspect_upload(
    bytes: Vec<u8>,
    declared_mime: Option<&str>,
    max_bytes: usize,
) -> Result<UploadedImage, UploadError> {
    if bytes.is_empty() {
        return Err(UploadError::Empty);
    }
    if bytes.len() > max_bytes {
        return Err(UploadError::TooLarge {
            size: bytes.len(),
            limit: max_bytes,
        });
    }
    if let Some(declared) = declared_mime {
        let declared = declared.trim().to_ascii_lowercase();
        if !declared.is_empty() && !declared.starts_with("image/") {
            return Err(UploadError::NotAnImage(declared));
        }
    }

    let format = image::guess_format(&bytes)
        .map_err(|_| UploadError::NotAnImage("unrecognized content".into()))?;
    let decoded = image::load_from_memory_with_format(&bytes, format)
        .map_err(|e| UploadError::Undecodable(e.to_string()))?;

    let (width, height) = decoded.dimensions();
    let metadata = ImageMetadata {
        width,
        height,
        color_mode: color_mode_name(decoded.color()).to_string(),
        format: format_name(format),
    };

    tracing::debug!(
        width,
        height,
        format = %metadata.format,
        size = bytes.len(),
        "Upload accepted"
    );

    Ok(UploadedImage {
        mime: mime_for(format),
        bytes,
        metadata,
    })
}

/// Conventional short names for pixel layouts.
pub fn color_mode_name(color: ColorType) -> &'static str {
    match color {
        ColorType::L8 => "L",
        ColorType::La8 => "LA",
        ColorType::Rgb8 => "RGB",
        ColorType::Rgba8 => "RGBA",
        ColorType::L16 => "I;16",
        ColorType::La16 => "LA;16",
        ColorType::Rgb16 => "RGB;16",
        ColorType::Rgba16 => "RGBA;16",
        ColorType::Bgr8 => "BGR",
        ColorType::Bgra8 => "BGRA",
        _ => "unknown",
    }
}

fn format_name(format: ImageFormat) -> String {
    format!("{format:?}").to_ascii_uppercase()
}

fn mime_for(format: ImageFormat) -> String {
    format
        .extensions_str()
        .first()
        .and_then(|ext| mime_guess::from_ext(ext).first_raw())
        .unwrap_or("application/octet-stream")
        .to_string()
}


#[cfg(test)]
mod tests {
    use super::test_images::*;
    use super::*;

    const LIMIT: usize = 1024 * 1024;

    #[test]
    fn png_metadata_extracted() {
        let upload = inspect_upload(png(64, 32), Some("image/png"), LIMIT).unwrap();
        assert_eq!(upload.mime, "image/png");
        assert_eq!(
            upload.metadata,
            ImageMetadata {
                width: 64,
                height: 32,
                color_mode: "RGB".into(),
                format: "PNG".into(),
            }
        );
        assert_eq!(upload.metadata.describe(), "64x32 pixels, RGB, PNG");
    }

    #[test]
    fn grayscale_color_mode() {
        let upload = inspect_upload(grayscale_png(8, 8), None, LIMIT).unwrap();
        assert_eq!(upload.metadata.color_mode, "L");
    }

    #[test]
    fn mime_sniffed_not_trusted_from_declaration() {
        let upload = inspect_upload(jpeg(16, 16), Some("image/png"), LIMIT).unwrap();
        assert_eq!(upload.mime, "image/jpeg");
        assert_eq!(upload.metadata.format, "JPEG");
    }

    #[test]
    fn empty_upload_rejected() {
        assert_eq!(inspect_upload(Vec::new(), None, LIMIT).unwrap_err(), UploadError::Empty);
    }

    #[test]
    fn oversize_upload_rejected() {
        let bytes = png(16, 16);
        let len = bytes.len();
        let err = inspect_upload(bytes, None, len - 1).unwrap_err();
        assert!(matches!(err, UploadError::TooLarge { size, .. } if size == len));
    }

    #[test]
    fn non_image_declaration_rejected() {
        let err = inspect_upload(png(4, 4), Some("application/pdf"), LIMIT).unwrap_err();
        assert!(matches!(err, UploadError::NotAnImage(_)));
    }

    #[test]
    fn text_bytes_rejected() {
        let err = inspect_upload(b"hello, not an image".to_vec(), Some("image/png"), LIMIT).unwrap_err();
        assert!(matches!(err, UploadError::NotAnImage(_)));
    }

    #[test]
    fn truncated_png_rejected() {
        let mut bytes = png(32, 32);
        bytes.truncate(40);
        let err = inspect_upload(bytes, Some("image/png"), LIMIT).unwrap_err();
        assert!(matches!(err, UploadError::Undecodable(_)));
    }
}
