//! Pure Rust transcoding backend.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG) | `image::load_from_memory` |
//! | Colour normalization | `DynamicImage::to_rgb8` |
//! | Encode → PNG | `image::codecs::png::PngEncoder` (adaptive filtering) |

use super::backend::{TileTranscoder, TranscodeError};
use super::format::TileFormat;
use super::params::PngCompression;
use image::DynamicImage;
use image::codecs::png::{FilterType as PngFilterType, PngEncoder};

/// Pure Rust backend producing PNG tiles.
///
/// See the [module docs](self) for the crate-to-operation mapping.
#[derive(Debug, Clone, Copy, Default)]
pub struct RustBackend {
    compression: PngCompression,
}

impl RustBackend {
    pub fn new(compression: PngCompression) -> Self {
        Self { compression }
    }
}

/// Bring a decoded image into a colour mode the PNG writer takes as-is.
///
/// RGB8 and RGBA8 pass through. Everything else (greyscale, greyscale with
/// alpha, 16-bit and float variants) becomes opaque RGB8, dropping any alpha.
pub(crate) fn normalize_color(img: DynamicImage) -> DynamicImage {
    match img {
        DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => img,
        other => DynamicImage::ImageRgb8(other.to_rgb8()),
    }
}

impl TileTranscoder for RustBackend {
    fn target_format(&self) -> TileFormat {
        TileFormat::Png
    }

    fn transcode(&self, blob: &[u8]) -> Result<Vec<u8>, TranscodeError> {
        let img = image::load_from_memory(blob).map_err(|e| TranscodeError::Decode(e.to_string()))?;
        let img = normalize_color(img);

        let mut out = Vec::new();
        let encoder = PngEncoder::new_with_quality(
            &mut out,
            self.compression.to_compression_type(),
            PngFilterType::Adaptive,
        );
        img.write_with_encoder(encoder)
            .map_err(|e| TranscodeError::Encode(e.to_string()))?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{gray_jpeg_tile, jpeg_tile, png_tile};
    use image::{GenericImageView, ImageFormat};

    #[test]
    fn jpeg_becomes_png() {
        let backend = RustBackend::default();
        let png = backend.transcode(&jpeg_tile(16, 16, [200, 40, 40])).unwrap();

        assert!(TileFormat::Png.matches(&png));
        let decoded = image::load_from_memory_with_format(&png, ImageFormat::Png).unwrap();
        assert_eq!(decoded.dimensions(), (16, 16));
        assert!(matches!(decoded, DynamicImage::ImageRgb8(_)));
    }

    #[test]
    fn colour_survives_within_jpeg_tolerance() {
        let backend = RustBackend::default();
        let png = backend.transcode(&jpeg_tile(8, 8, [10, 200, 90])).unwrap();
        let rgb = image::load_from_memory(&png).unwrap().to_rgb8();
        let px = rgb.get_pixel(4, 4).0;
        for (got, want) in px.iter().zip([10u8, 200, 90]) {
            assert!(got.abs_diff(want) <= 8, "pixel {px:?} too far from target");
        }
    }

    #[test]
    fn greyscale_jpeg_is_normalized_to_rgb() {
        let backend = RustBackend::default();
        let png = backend.transcode(&gray_jpeg_tile(8, 8, 128)).unwrap();
        let decoded = image::load_from_memory(&png).unwrap();
        assert!(matches!(decoded, DynamicImage::ImageRgb8(_)));
    }

    #[test]
    fn rgba_passes_through_normalization() {
        let img = DynamicImage::ImageRgba8(image::RgbaImage::new(2, 2));
        assert!(matches!(normalize_color(img), DynamicImage::ImageRgba8(_)));
    }

    #[test]
    fn alpha_in_unsupported_modes_is_dropped() {
        let img = DynamicImage::ImageLumaA8(image::GrayAlphaImage::from_pixel(
            2,
            2,
            image::LumaA([50, 0]),
        ));
        let normalized = normalize_color(img);
        let DynamicImage::ImageRgb8(rgb) = normalized else {
            panic!("expected RGB8");
        };
        assert_eq!(rgb.get_pixel(0, 0).0, [50, 50, 50]);
    }

    #[test]
    fn png_input_is_also_decodable() {
        let backend = RustBackend::new(PngCompression::Fast);
        let png = backend.transcode(&png_tile(4, 4)).unwrap();
        assert!(TileFormat::Png.matches(&png));
    }

    #[test]
    fn corrupt_payload_with_jpeg_signature_is_decode_error() {
        let backend = RustBackend::default();
        let err = backend
            .transcode(&[0xFF, 0xD8, 0xFF, 0x00, 0x01, 0x02])
            .unwrap_err();
        assert!(matches!(err, TranscodeError::Decode(_)));
    }

    #[test]
    fn best_compression_is_not_larger_than_fast() {
        let tile = jpeg_tile(64, 64, [120, 130, 140]);
        let best = RustBackend::new(PngCompression::Best).transcode(&tile).unwrap();
        let fast = RustBackend::new(PngCompression::Fast).transcode(&tile).unwrap();
        assert!(best.len() <= fast.len());
    }
}
