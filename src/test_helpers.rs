//! Shared test utilities: fixture archives and generated tile blobs.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! let path = tmp.path().join("in.mbtiles");
//! create_archive(&path, &[jpeg_tile(8, 8, [255, 0, 0]), png_tile(8, 8)]);
//!
//! assert_eq!(format_values(&path), vec!["jpg"]);
//! ```

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};
use rusqlite::Connection;
use std::io::Cursor;
use std::path::Path;

// =========================================================================
// Tile blobs
// =========================================================================

/// A solid-colour RGB JPEG.
pub fn jpeg_tile(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(width, height, image::Rgb(rgb)));
    encode_jpeg(&img)
}

/// A solid greyscale JPEG (single channel).
pub fn gray_jpeg_tile(width: u32, height: u32, luma: u8) -> Vec<u8> {
    let img = DynamicImage::ImageLuma8(image::GrayImage::from_pixel(width, height, image::Luma([luma])));
    encode_jpeg(&img)
}

fn encode_jpeg(img: &DynamicImage) -> Vec<u8> {
    let mut buf = Vec::new();
    img.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, 90))
        .unwrap();
    buf
}

/// A small RGBA PNG.
pub fn png_tile(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
        width,
        height,
        image::Rgba([0, 128, 0, 200]),
    ));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

// =========================================================================
// Fixture archives
// =========================================================================

/// Create a map/images MBTiles file at `path` holding `tiles` at rowids 1..=n.
///
/// Metadata carries `format = jpg` and `name = fixture`. Any existing file
/// at `path` is replaced.
pub fn create_archive(path: &Path, tiles: &[Vec<u8>]) {
    if path.exists() {
        std::fs::remove_file(path).unwrap();
    }
    let conn = Connection::open(path).unwrap();
    conn.execute_batch(
        "CREATE TABLE map (zoom_level INTEGER, tile_column INTEGER, tile_row INTEGER, tile_id TEXT);
         CREATE TABLE images (tile_data BLOB, tile_id TEXT);
         CREATE TABLE metadata (name TEXT, value TEXT);
         CREATE UNIQUE INDEX map_index ON map (zoom_level, tile_column, tile_row);
         CREATE UNIQUE INDEX images_id ON images (tile_id);
         CREATE UNIQUE INDEX metadata_name ON metadata (name);
         CREATE VIEW tiles AS
             SELECT map.zoom_level AS zoom_level, map.tile_column AS tile_column,
                    map.tile_row AS tile_row, images.tile_data AS tile_data
             FROM map JOIN images ON images.tile_id = map.tile_id;
         INSERT INTO metadata (name, value) VALUES ('format', 'jpg');
         INSERT INTO metadata (name, value) VALUES ('name', 'fixture');",
    )
    .unwrap();

    for (i, data) in tiles.iter().enumerate() {
        let tile_id = format!("tile-{i}");
        conn.execute(
            "INSERT INTO images (rowid, tile_data, tile_id) VALUES (?1, ?2, ?3)",
            rusqlite::params![i as i64 + 1, data, tile_id],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO map (zoom_level, tile_column, tile_row, tile_id) VALUES (3, ?1, 0, ?2)",
            rusqlite::params![i as i64, tile_id],
        )
        .unwrap();
    }
}

/// All `(rowid, tile_data)` pairs in rowid order.
pub fn read_tile_data(path: &Path) -> Vec<(i64, Vec<u8>)> {
    let conn = Connection::open(path).unwrap();
    let mut stmt = conn
        .prepare("SELECT rowid, tile_data FROM images ORDER BY rowid")
        .unwrap();
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    rows
}

/// Every value stored under the `format` metadata key.
pub fn format_values(path: &Path) -> Vec<String> {
    let conn = Connection::open(path).unwrap();
    let mut stmt = conn
        .prepare("SELECT value FROM metadata WHERE name = 'format'")
        .unwrap();
    let values = stmt
        .query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    values
}
