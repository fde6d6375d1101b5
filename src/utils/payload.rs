use base64::{engine::general_purpose, Engine as _};
use image::ImageFormat;

use crate::error::AppError;

/// Raster formats accepted for image-to-3D input.
const ACCEPTED_IMAGE_FORMATS: &[ImageFormat] = &[
    ImageFormat::Png,
    ImageFormat::Jpeg,
    ImageFormat::Gif,
    ImageFormat::Bmp,
    ImageFormat::WebP,
];

/// Strips an optional `data:<mime>;base64,` prefix as browsers produce it.
fn strip_data_url(content: &str) -> &str {
    match content.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => content,
    }
}

pub fn decode_base64(content: &str) -> Option<Vec<u8>> {
    general_purpose::STANDARD
        .decode(strip_data_url(content.trim()))
        .ok()
}

pub fn encode_base64(bytes: &[u8]) -> String {
    general_purpose::STANDARD.encode(bytes)
}

/// Decodes a base64 image and checks its magic bytes. Returns the canonical base64 and
/// the detected format.
pub fn validate_image_payload(content: &str) -> Result<(String, ImageFormat), AppError> {
    let bytes = decode_base64(content)
        .ok_or_else(|| AppError::BadRequest("imageContent is not valid base64".to_string()))?;

    let format = image::guess_format(&bytes)
        .ok()
        .filter(|format| ACCEPTED_IMAGE_FORMATS.contains(format))
        .ok_or_else(|| {
            AppError::BadRequest(
                "imageContent must be a png, jpeg, gif, bmp or webp image".to_string(),
            )
        })?;

    Ok((encode_base64(&bytes), format))
}

pub fn validate_model_payload(content: &str) -> Result<String, AppError> {
    let bytes = decode_base64(content)
        .filter(|bytes| !bytes.is_empty())
        .ok_or_else(|| AppError::BadRequest("modelContent is not valid base64".to_string()))?;
    Ok(encode_base64(&bytes))
}
