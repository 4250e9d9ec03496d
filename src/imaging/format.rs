//! Tile format detection by container signature.
//!
//! Classification looks only at the leading magic bytes of a blob. Nothing is
//! decoded here: a corrupt payload that carries a JPEG signature is still
//! eligible, and its failure surfaces later in the transcoder.

/// Raster encodings the converter reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TileFormat {
    Jpeg,
    Png,
}

impl TileFormat {
    /// Canonical name, as written to the `format` metadata key.
    pub fn name(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
        }
    }

    /// Human-readable label for output lines.
    pub fn label(self) -> &'static str {
        match self {
            Self::Jpeg => "JPEG",
            Self::Png => "PNG",
        }
    }

    /// Leading bytes that identify this format's container.
    pub fn signature(self) -> &'static [u8] {
        match self {
            // SOI marker followed by the first segment's 0xFF
            Self::Jpeg => &[0xFF, 0xD8, 0xFF],
            Self::Png => &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A],
        }
    }

    /// Whether `blob` starts with this format's signature.
    ///
    /// Blobs shorter than the signature never match.
    pub fn matches(self, blob: &[u8]) -> bool {
        blob.starts_with(self.signature())
    }
}

impl std::fmt::Display for TileFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Decides which tiles need re-encoding.
///
/// A tile is eligible when its blob carries the source format's signature.
/// The verdict is a pure function of the blob bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureClassifier {
    source: TileFormat,
}

impl SignatureClassifier {
    pub fn new(source: TileFormat) -> Self {
        Self { source }
    }

    pub fn needs_conversion(&self, blob: &[u8]) -> bool {
        self.source.matches(blob)
    }
}

impl Default for SignatureClassifier {
    fn default() -> Self {
        Self::new(TileFormat::Jpeg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0];

    #[test]
    fn jpeg_signature_is_eligible() {
        let classifier = SignatureClassifier::default();
        assert!(classifier.needs_conversion(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10]));
    }

    #[test]
    fn signature_alone_decides_even_for_garbage_tail() {
        let classifier = SignatureClassifier::default();
        let mut blob = vec![0xFF, 0xD8, 0xFF];
        blob.extend_from_slice(b"definitely not an image");
        assert!(classifier.needs_conversion(&blob));
    }

    #[test]
    fn bare_signature_is_eligible() {
        assert!(SignatureClassifier::default().needs_conversion(&[0xFF, 0xD8, 0xFF]));
    }

    #[test]
    fn short_blobs_are_not_eligible() {
        let classifier = SignatureClassifier::default();
        assert!(!classifier.needs_conversion(&[]));
        assert!(!classifier.needs_conversion(&[0xFF]));
        assert!(!classifier.needs_conversion(&[0xFF, 0xD8]));
    }

    #[test]
    fn png_is_not_eligible() {
        assert!(!SignatureClassifier::default().needs_conversion(PNG_HEADER));
    }

    #[test]
    fn near_miss_is_not_eligible() {
        assert!(!SignatureClassifier::default().needs_conversion(&[0xFF, 0xD8, 0xFE, 0x00]));
    }

    #[test]
    fn verdict_is_stable_across_calls() {
        let classifier = SignatureClassifier::default();
        for blob in [
            &[0xFF, 0xD8, 0xFF, 0x01][..],
            PNG_HEADER,
            &[][..],
            b"GIF89a",
        ] {
            assert_eq!(
                classifier.needs_conversion(blob),
                classifier.needs_conversion(blob)
            );
        }
    }

    #[test]
    fn png_classifier_targets_png_only() {
        let classifier = SignatureClassifier::new(TileFormat::Png);
        assert!(classifier.needs_conversion(PNG_HEADER));
        assert!(!classifier.needs_conversion(&[0xFF, 0xD8, 0xFF, 0xDB]));
    }

    #[test]
    fn canonical_names() {
        assert_eq!(TileFormat::Png.name(), "png");
        assert_eq!(TileFormat::Jpeg.name(), "jpg");
        assert_eq!(TileFormat::Jpeg.to_string(), "JPEG");
    }
}
