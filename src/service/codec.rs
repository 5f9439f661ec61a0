use base64::{engine::general_purpose, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, DynamicImage};

use crate::common::{FaceAuthError, Result};

/// JPEG-compresses a frame and base64-encodes it for the request envelope.
pub fn encode_frame(frame: &DynamicImage, quality: u8) -> Result<String> {
    let rgb = frame.to_rgb8();
    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, quality.clamp(1, 100)).encode(
        rgb.as_raw(),
        rgb.width(),
        rgb.height(),
        ColorType::Rgb8,
    )?;
    Ok(general_purpose::STANDARD.encode(jpeg))
}

/// Inverse of [`encode_frame`], used by engine-side code and diagnostics.
pub fn decode_frame(frame_data: &str) -> Result<DynamicImage> {
    let bytes = general_purpose::STANDARD
        .decode(frame_data.trim())
        .map_err(|e| FaceAuthError::Transport(format!("Invalid frame encoding: {}", e)))?;
    Ok(image::load_from_memory(&bytes)?)
}
