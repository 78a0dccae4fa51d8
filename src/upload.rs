//! Upload validation: accepted image types and decoding.

use std::path::Path;

use image::{DynamicImage, ImageFormat};

use crate::error::UploadError;

/// File extensions the upload field accepts.
pub const ACCEPTED_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "webp"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    Bmp,
    Webp,
}

impl ImageKind {
    /// Parse a `Content-Type` value. Parameters after `;` are ignored.
    pub fn from_mime(content_type: &str) -> Result<Self, UploadError> {
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();
        match mime.as_str() {
            "image/jpeg" | "image/jpg" => Ok(ImageKind::Jpeg),
            "image/png" => Ok(ImageKind::Png),
            "image/bmp" | "image/x-ms-bmp" => Ok(ImageKind::Bmp),
            "image/webp" => Ok(ImageKind::Webp),
            "" => Err(UploadError::UnsupportedFileType("missing content type".into())),
            _ => Err(UploadError::UnsupportedFileType(mime)),
        }
    }

    pub fn from_extension(ext: &str) -> Result<Self, UploadError> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Ok(ImageKind::Jpeg),
            "png" => Ok(ImageKind::Png),
            "bmp" => Ok(ImageKind::Bmp),
            "webp" => Ok(ImageKind::Webp),
            other => Err(UploadError::UnsupportedFileType(format!(".{other}"))),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, UploadError> {
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .ok_or_else(|| {
                UploadError::UnsupportedFileType(format!("{} has no extension", path.display()))
            })?;
        Self::from_extension(ext)
    }

    fn format(self) -> ImageFormat {
        match self {
            ImageKind::Jpeg => ImageFormat::Jpeg,
            ImageKind::Png => ImageFormat::Png,
            ImageKind::Bmp => ImageFormat::Bmp,
            ImageKind::Webp => ImageFormat::WebP,
        }
    }
}

/// Decode uploaded bytes of a known kind.
pub fn decode_upload(bytes: &[u8], kind: ImageKind) -> Result<DynamicImage, UploadError> {
    if bytes.is_empty() {
        return Err(UploadError::Empty);
    }
    image::load_from_memory_with_format(bytes, kind.format())
        .map_err(|e| UploadError::Decode(e.to_string()))
}
