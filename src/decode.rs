//! Decoding of uploaded payloads into RGB pixel buffers

use crate::error::OcrError;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use image::RgbImage;

const BASE64_MARKER: &str = ";base64,";

/// Decode raw image bytes (any format the image crate recognizes) into RGB
pub fn decode_bytes(bytes: &[u8]) -> Result<RgbImage, OcrError> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| OcrError::Decode(format!("Failed to load image: {}", e)))?;

    Ok(img.into_rgb8())
}

/// Decode a base64 image, optionally prefixed with a `<mime>;base64,` header
pub fn decode_base64(payload: &str) -> Result<RgbImage, OcrError> {
    let data = match payload.split_once(BASE64_MARKER) {
        Some((_, data)) => data,
        None => payload,
    };

    let bytes = BASE64_STANDARD
        .decode(data.trim())
        .map_err(|e| OcrError::Decode(format!("Invalid base64 payload: {}", e)))?;

    decode_bytes(&bytes)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, Rgb, Rgba, RgbaImage};
    use std::io::Cursor;

    /// Encode a small image in the given format for decoder input
    pub(crate) fn encoded_image(format: ImageFormat) -> Vec<u8> {
        let mut img = RgbaImage::new(4, 3);
        img.put_pixel(1, 1, Rgba([200, 10, 20, 128]));

        let mut bytes = Vec::new();
        let dynamic = match format {
            ImageFormat::Jpeg | ImageFormat::Bmp => DynamicImage::ImageRgb8(
                DynamicImage::ImageRgba8(img).to_rgb8(),
            ),
            _ => DynamicImage::ImageRgba8(img),
        };
        dynamic
            .write_to(&mut Cursor::new(&mut bytes), format)
            .unwrap();
        bytes
    }

    #[test]
    fn test_decode_png_with_alpha_to_rgb() {
        let img = decode_bytes(&encoded_image(ImageFormat::Png)).unwrap();
        assert_eq!(img.dimensions(), (4, 3));
        assert_eq!(img.get_pixel(1, 1), &Rgb([200, 10, 20]));
    }

    #[test]
    fn test_decode_jpeg() {
        let img = decode_bytes(&encoded_image(ImageFormat::Jpeg)).unwrap();
        assert_eq!(img.dimensions(), (4, 3));
    }

    #[test]
    fn test_decode_garbage_fails() {
        let result = decode_bytes(b"definitely not an image");
        assert!(matches!(result, Err(OcrError::Decode(_))));
    }

    #[test]
    fn test_decode_base64_without_header() {
        let payload = BASE64_STANDARD.encode(encoded_image(ImageFormat::Png));
        let img = decode_base64(&payload).unwrap();
        assert_eq!(img.dimensions(), (4, 3));
    }

    #[test]
    fn test_decode_base64_strips_data_url_header() {
        let payload = format!(
            "data:image/png;base64,{}",
            BASE64_STANDARD.encode(encoded_image(ImageFormat::Png))
        );
        let img = decode_base64(&payload).unwrap();
        assert_eq!(img.dimensions(), (4, 3));
    }

    #[test]
    fn test_decode_invalid_base64_fails() {
        let result = decode_base64("image/png;base64,@@@not-base64@@@");
        assert!(matches!(result, Err(OcrError::Decode(_))));
    }

    #[test]
    fn test_decode_valid_base64_of_non_image_fails() {
        let payload = BASE64_STANDARD.encode(b"hello world");
        assert!(matches!(decode_base64(&payload), Err(OcrError::Decode(_))));
    }
}
