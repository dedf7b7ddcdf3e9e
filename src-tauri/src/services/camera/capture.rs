use crate::error::AppError;
use base64::Engine;
use image::DynamicImage;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq)]
pub struct CapturedPhoto {
    pub path: PathBuf,
    pub uri: String,
}

/// Decodes a base64 image payload, accepting an optional `data:` URL prefix.
pub fn decode_image(payload: &str) -> Result<DynamicImage, AppError> {
    let encoded = match payload.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => payload,
    };
    let bytes = base64::engine::general_purpose::STANDARD.decode(encoded.trim())?;
    image::load_from_memory(&bytes)
        .map_err(|e| AppError::new(format!("Failed to decode image: {}", e)))
}

pub fn file_uri(path: &Path) -> String {
    let path = path.to_string_lossy().replace('\\', "/");
    if path.starts_with('/') {
        format!("file://{}", path)
    } else {
        format!("file:///{}", path)
    }
}

/// Writes the photo to a fresh JPEG in `dir`. Earlier captures are left in place.
pub fn save_capture(dir: &Path, image: &DynamicImage) -> Result<CapturedPhoto, AppError> {
    std::fs::create_dir_all(dir).map_err(|e| {
        AppError::new(format!("Failed to create capture directory {}: {}", dir.display(), e))
    })?;

    let path = dir.join(format!("capture-{}.jpg", uuid::Uuid::new_v4()));
    image
        .to_rgb8()
        .save_with_format(&path, image::ImageFormat::Jpeg)
        .map_err(|e| AppError::new(format!("Failed to save capture {}: {}", path.display(), e)))?;

    let uri = file_uri(&path);
    Ok(CapturedPhoto { path, uri })
}
