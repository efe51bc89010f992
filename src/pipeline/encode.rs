//! Image encoding: `DynamicImage` → PNG bytes → base64 `ImageData`.
//!
//! Two consumers need encoded images. The PDF source re-encodes every
//! extracted image object as PNG so the fingerprint sees one canonical byte
//! form per pixel buffer, and the vision service wraps those bytes in a
//! base64 data payload for the multimodal request body.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode an image losslessly as PNG.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(buf)
}

/// Wrap an image as a base64 PNG attachment for the vision request.
///
/// The image is flattened to RGB first: palette, CMYK-derived and alpha
/// images extracted from PDFs are not accepted by every provider.
pub fn to_image_data(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let png = encode_png(&rgb)?;
    let b64 = STANDARD.encode(&png);
    debug!("Encoded image {}x{} → {} bytes base64", rgb.width(), rgb.height(), b64.len());

    Ok(ImageData::new(b64, "image/png"))
}
