//! Tile imaging — classification and transcoding, pure Rust.
//!
//! | Capability | Where |
//! |---|---|
//! | **Classify** | [`SignatureClassifier`]: magic-byte prefix check, no decoding |
//! | **Transcode** | [`TileTranscoder`] trait, [`RustBackend`] via the `image` crate |
//!
//! The two halves are independent: the batch driver asks the classifier
//! first and only hands eligible blobs to the transcoder, so either side can
//! be swapped (another source format, a mock backend) without touching the
//! other.

pub mod backend;
pub mod format;
mod params;
pub mod rust_backend;

pub use backend::{TileTranscoder, TranscodeError};
pub use format::{SignatureClassifier, TileFormat};
pub use params::PngCompression;
pub use rust_backend::RustBackend;
