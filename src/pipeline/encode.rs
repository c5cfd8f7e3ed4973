//! Image encoding: `DynamicImage` → PNG bytes, PNG bytes → base64.
//!
//! Pages are always sent as lossless PNG; charge numbers and dimensions on a
//! certificate are small print.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a rasterised page as PNG bytes.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    debug!(
        "Encoded {}x{} page → {} bytes PNG",
        img.width(),
        img.height(),
        buf.len()
    );
    Ok(buf)
}

/// Base64 text for embedding raster bytes in a JSON request body.
pub fn to_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}
