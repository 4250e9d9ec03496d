//! # mbtiles-png
//!
//! Rewrites the JPEG tiles of an MBTiles archive as PNG. The source archive
//! is copied to a new output file first; only the copy is modified.
//!
//! Only archives using the normalized **map/images** layout are supported:
//! tile coordinates live in `map`, deduplicated payloads in `images`, joined
//! by `tile_id`. Coordinates, zoom levels, and every metadata key except
//! `format` pass through untouched.
//!
//! # Pipeline
//!
//! ```text
//! source.mbtiles ──backup──▶ output.mbtiles
//!                               │
//!                   schema gate (map + images present?)
//!                               │
//!                   id snapshot ─▶ windows of batch.size
//!                               │
//!          per window: classify ─▶ transcode ─▶ one transaction
//!                               │
//!                   metadata.format = "png"
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`archive`] | `TileStore` trait and the SQLite implementation |
//! | [`schema`] | Rejects archives without the `map` and `images` tables |
//! | [`imaging`] | Signature classification and the PNG transcoder |
//! | [`convert`] | The batch driver: windows, atomic commits, counters |
//! | [`output`] | Progress and summary line formatting |
//! | [`config`] | Optional TOML config layered over stock defaults |
//!
//! # Design Decisions
//!
//! ## Signature Sniffing, Not Metadata
//!
//! The `format` metadata entry is not trusted: archives assembled from mixed
//! sources often hold both JPEG and PNG tiles. Each blob is classified by its
//! first three bytes (`FF D8 FF`), so PNG tiles are left byte-identical and a
//! second run over the output converts nothing.
//!
//! ## One Transaction per Window
//!
//! Committing per tile would be slow; committing once at the end would lose
//! all work on failure. A window of `batch.size` tiles (default 2000) is the
//! unit of atomicity: after a crash every window is either fully rewritten
//! or untouched.
//!
//! ## Snapshot Iteration
//!
//! Windows are slices of a rowid list captured before the first write, not
//! `LIMIT/OFFSET` queries over a table that is being modified. Every row is
//! visited exactly once no matter how SQLite lays out the updated pages.

pub mod archive;
pub mod config;
pub mod convert;
pub mod imaging;
pub mod output;
pub mod schema;

#[cfg(test)]
pub(crate) mod test_helpers;
