//! Image encoding: resize and WebP re-encode of embedded images.
//!
//! Converters embed images as base64 data URIs; before an image leaves the
//! serializer it passes through [`transform_image`]:
//!
//! 1. resize when either edge exceeds `image_max_dimension` (Lanczos3,
//!    aspect ratio preserved, integer-truncated dimensions)
//! 2. re-encode as WebP when `image_use_webp` is set and the image is not
//!    already WebP
//! 3. base64-encode the final bytes
//!
//! Resize runs first so the encoder only ever sees final pixel dimensions.
//! WebP output is lossy at the fixed [`WEBP_QUALITY`].

use crate::config::ConversionConfig;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::imageops::FilterType;
use image::{DynamicImage, ImageError, ImageFormat, ImageReader};
use std::io::Cursor;
use tracing::{debug, warn};

pub const WEBP_MEDIA_TYPE: &str = "image/webp";

/// libwebp quality factor (0–100) for re-encoded images.
pub const WEBP_QUALITY: f32 = 80.0;

/// An image ready for a content block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub media_type: String,
    /// Base64 (standard alphabet, padded).
    pub data: String,
}

/// Apply the configured resize/recode steps to a base64 image payload.
///
/// Never fails: payloads that are not valid base64, or bytes that do not
/// decode as an image, are passed through with their declared media type.
pub fn transform_image(media_type: &str, payload_b64: &str, config: &ConversionConfig) -> EncodedImage {
    let bytes = match STANDARD.decode(payload_b64) {
        Ok(b) => b,
        Err(e) => {
            warn!("Embedded {} payload is not valid base64 ({}); passing through", media_type, e);
            return EncodedImage {
                media_type: media_type.to_string(),
                data: payload_b64.to_string(),
            };
        }
    };

    match transform_bytes(&bytes, media_type, config) {
        Ok(Some((new_type, out))) => {
            debug!(
                "Transformed {} ({} bytes) → {} ({} bytes)",
                media_type,
                bytes.len(),
                new_type,
                out.len()
            );
            EncodedImage {
                media_type: new_type,
                data: STANDARD.encode(&out),
            }
        }
        Ok(None) => EncodedImage {
            media_type: media_type.to_string(),
            data: STANDARD.encode(&bytes),
        },
        Err(e) => {
            warn!("Cannot decode embedded {} image ({}); passing through", media_type, e);
            EncodedImage {
                media_type: media_type.to_string(),
                data: STANDARD.encode(&bytes),
            }
        }
    }
}

/// `Ok(None)` when the image needs no change.
fn transform_bytes(
    bytes: &[u8],
    media_type: &str,
    config: &ConversionConfig,
) -> Result<Option<(String, Vec<u8>)>, ImageError> {
    let is_webp = media_type.eq_ignore_ascii_case(WEBP_MEDIA_TYPE);
    let want_webp = config.image_use_webp && !is_webp;
    let max = config.image_max_dimension;

    let (width, height) = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .into_dimensions()?;
    let needs_resize = max > 0 && (width > max || height > max);
    if !needs_resize && !want_webp {
        return Ok(None);
    }

    let mut img = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .decode()?;

    if needs_resize {
        let (w, h) = scaled_dimensions(width, height, max);
        debug!("Resizing {}x{} → {}x{}", width, height, w, h);
        img = img.resize_exact(w, h, FilterType::Lanczos3);
    }

    if want_webp {
        let rgb = img.to_rgb8();
        let out = webp::Encoder::from_rgb(rgb.as_raw(), rgb.width(), rgb.height())
            .encode(WEBP_QUALITY)
            .to_vec();
        return Ok(Some((WEBP_MEDIA_TYPE.to_string(), out)));
    }

    // Resize only: keep the original format where the encoder supports it.
    if let Some(format) = ImageFormat::from_mime_type(media_type) {
        let encodable = match format {
            ImageFormat::Jpeg => DynamicImage::ImageRgb8(img.to_rgb8()),
            _ => img.clone(),
        };
        if let Ok(out) = write_image(&encodable, format) {
            return Ok(Some((media_type.to_string(), out)));
        }
    }
    let out = write_image(&img, ImageFormat::Png)?;
    Ok(Some(("image/png".to_string(), out)))
}

/// Scale `(width, height)` so the longer edge fits `max`.
///
/// Both edges use the same ratio `min(max/width, max/height)`; results are
/// truncated and never below 1.
pub fn scaled_dimensions(width: u32, height: u32, max: u32) -> (u32, u32) {
    if max == 0 || (width <= max && height <= max) {
        return (width, height);
    }
    let ratio = f64::min(max as f64 / width as f64, max as f64 / height as f64);
    let w = ((width as f64 * ratio) as u32).max(1);
    let h = ((height as f64 * ratio) as u32).max(1);
    (w, h)
}

fn write_image(img: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>, ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), format)?;
    Ok(buf)
}

/// Encode a decoded image as base64 PNG.
///
/// PNG is lossless, so extracted figures keep their text crisp; the
/// serializer may still re-encode to WebP later.
pub fn encode_png(img: &DynamicImage) -> Result<String, ImageError> {
    let buf = write_image(img, ImageFormat::Png)?;
    let b64 = STANDARD.encode(&buf);
    debug!("Encoded image → {} bytes base64", b64.len());
    Ok(b64)
}

/// Base64-encode raw bytes for a data URI.
pub fn encode_bytes(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn png_b64(w: u32, h: u32) -> String {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([255, 0, 0, 255])));
        encode_png(&img).expect("encode should succeed")
    }

    fn dims(b64: &str) -> (u32, u32) {
        let bytes = STANDARD.decode(b64).unwrap();
        ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .unwrap()
            .into_dimensions()
            .unwrap()
    }

    fn config(webp: bool, max: u32) -> ConversionConfig {
        ConversionConfig::builder()
            .image_use_webp(webp)
            .image_max_dimension(max)
            .build()
            .unwrap()
    }

    #[test]
    fn encode_small_image() {
        let data = png_b64(10, 10);
        let decoded = STANDARD.decode(&data).expect("valid base64");
        assert!(decoded.starts_with(b"\x89PNG"));
    }

    #[test]
    fn resize_ratio_is_exact() {
        assert_eq!(scaled_dimensions(1000, 500, 500), (500, 250));
        assert_eq!(scaled_dimensions(500, 1000, 500), (250, 500));
        assert_eq!(scaled_dimensions(300, 200, 500), (300, 200));
        assert_eq!(scaled_dimensions(1000, 1, 10), (10, 1));
        assert_eq!(scaled_dimensions(1000, 500, 0), (1000, 500));
    }

    #[test]
    fn resize_keeps_format_without_webp() {
        let out = transform_image("image/png", &png_b64(1000, 500), &config(false, 500));
        assert_eq!(out.media_type, "image/png");
        assert_eq!(dims(&out.data), (500, 250));
    }

    #[test]
    fn png_is_recoded_as_webp() {
        let out = transform_image("image/png", &png_b64(20, 10), &config(true, 0));
        assert_eq!(out.media_type, WEBP_MEDIA_TYPE);
        let bytes = STANDARD.decode(&out.data).unwrap();
        assert_eq!(&bytes[..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WEBP");
        assert_eq!(dims(&out.data), (20, 10));
    }

    #[test]
    fn webp_output_is_lossy() {
        let out = transform_image("image/png", &png_b64(32, 32), &config(true, 0));
        let bytes = STANDARD.decode(&out.data).unwrap();
        assert_eq!(&bytes[12..16], b"VP8 ");
    }

    #[test]
    fn webp_within_bounds_is_byte_identical() {
        let webp = transform_image("image/png", &png_b64(16, 16), &config(true, 0));
        let again = transform_image(WEBP_MEDIA_TYPE, &webp.data, &config(true, 64));
        assert_eq!(again, webp);
    }

    #[test]
    fn no_op_config_returns_original() {
        let original = png_b64(8, 8);
        let out = transform_image("image/png", &original, &config(false, 0));
        assert_eq!(out.data, original);
        assert_eq!(out.media_type, "image/png");
    }

    #[test]
    fn undecodable_bytes_pass_through() {
        let out = transform_image("image/png", "AAAA", &config(true, 0));
        assert_eq!(out.media_type, "image/png");
        assert_eq!(out.data, "AAAA");
    }

    #[test]
    fn invalid_base64_passes_through() {
        let out = transform_image("image/jpeg", "not*base64", &config(true, 100));
        assert_eq!(out.data, "not*base64");
        assert_eq!(out.media_type, "image/jpeg");
    }
}
