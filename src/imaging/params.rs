//! Parameter types for tile encoding.
//!
//! These describe *what* the encoder should do, not *how*. The
//! [`backend`](super::backend) receives them at construction so the batch
//! driver never has to know which codec library sits underneath.
//!
//! ## Types
//!
//! - [`PngCompression`] — zlib effort for the PNG encoder (default `best`).

use image::codecs::png::CompressionType;
use serde::{Deserialize, Serialize};

/// Compression effort used when writing PNG tiles.
///
/// `Best` trades encode time for the smallest output, which is the right
/// default for archives that are written once and served many times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PngCompression {
    #[default]
    Best,
    Default,
    Fast,
}

impl PngCompression {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Best => "best",
            Self::Default => "default",
            Self::Fast => "fast",
        }
    }

    pub(crate) fn to_compression_type(self) -> CompressionType {
        match self {
            Self::Best => CompressionType::Best,
            Self::Default => CompressionType::Default,
            Self::Fast => CompressionType::Fast,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_favors_size() {
        assert_eq!(PngCompression::default(), PngCompression::Best);
    }

    #[test]
    fn deserializes_lowercase_names() {
        #[derive(Deserialize)]
        struct Wrapper {
            compression: PngCompression,
        }
        let w: Wrapper = toml::from_str(r#"compression = "fast""#).unwrap();
        assert_eq!(w.compression, PngCompression::Fast);
        assert_eq!(w.compression.as_str(), "fast");
    }

    #[test]
    fn maps_onto_encoder_setting() {
        assert!(matches!(
            PngCompression::Best.to_compression_type(),
            CompressionType::Best
        ));
        assert!(matches!(
            PngCompression::Fast.to_compression_type(),
            CompressionType::Fast
        ));
    }
}
