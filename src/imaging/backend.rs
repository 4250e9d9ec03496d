//! Transcoder trait and shared error type.
//!
//! The [`TileTranscoder`] trait is the single operation the batch driver
//! needs from a codec: turn one eligible blob into one target-format blob.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate. Tests substitute a recording mock.

use super::format::TileFormat;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TranscodeError {
    #[error("Decode failed: {0}")]
    Decode(String),
    #[error("Encode failed: {0}")]
    Encode(String),
}

/// Trait for tile transcoding backends.
///
/// `Sync` so a single backend can serve every rayon worker in a window.
pub trait TileTranscoder: Sync {
    /// Encoding every transcoded blob ends up in.
    fn target_format(&self) -> TileFormat;

    /// Re-encode one tile blob into [`target_format`](Self::target_format).
    fn transcode(&self, blob: &[u8]) -> Result<Vec<u8>, TranscodeError>;
}
