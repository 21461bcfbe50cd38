//! Image and buffer encoding for the exported asset.
//!
//! The backdrop texture is always stored as PNG: it is lossless, so the
//! paper under the extruded lines shows the same pixels the colors were
//! sampled from. Textual glTF additionally wraps every binary blob in a
//! base64 `data:` URI.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::RgbaImage;
use std::io::Cursor;
use tracing::debug;

/// Encode an RGBA buffer as PNG bytes.
pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    debug!("Encoded {}x{} image → {} bytes PNG", img.width(), img.height(), buf.len());
    Ok(buf)
}

/// `data:<media_type>;base64,<payload>`
pub fn data_uri(media_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", media_type, STANDARD.encode(bytes))
}

/// Inverse of [`data_uri`]. Returns `None` for anything but base64 data URIs.
pub fn decode_data_uri(uri: &str) -> Option<Vec<u8>> {
    let rest = uri.strip_prefix("data:")?;
    let (_, payload) = rest.split_once(";base64,")?;
    STANDARD.decode(payload).ok()
}
