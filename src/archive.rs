//! Tile archive access.
//!
//! The batch driver talks to storage only through the [`TileStore`] trait.
//! [`SqliteArchive`] is the production implementation over an MBTiles file
//! using the normalized `map` / `images` layout:
//!
//! ```text
//! map       (zoom_level, tile_column, tile_row, tile_id)   untouched
//! images    (tile_data, tile_id)                           tile_data rewritten
//! metadata  (name, value)                                  only `format` rewritten
//! ```
//!
//! ## Tile identity
//!
//! Rows in `images` are addressed by SQLite `rowid`. Updating `tile_data`
//! never moves a row, so a list of rowids captured before the first write
//! stays valid for the whole run and every row is visited exactly once, even
//! if two rows happen to share a `tile_id` value.
//!
//! ## Atomicity
//!
//! Each [`TileStore::commit_window`] call is one SQLite transaction. If any
//! statement fails the transaction is dropped, which rolls back every write
//! made for that window.

use rusqlite::{Connection, DatabaseName, OpenFlags, OptionalExtension, params};
use rusqlite::types::ValueRef;
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Table holding tile coordinates.
pub const MAP_TABLE: &str = "map";
/// Table holding tile payloads.
pub const IMAGES_TABLE: &str = "images";
/// Metadata key recording the archive's tile encoding.
pub const FORMAT_KEY: &str = "format";

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Source and output archive are the same file: {0}")]
    SamePath(PathBuf),
    #[error("Tile {0} disappeared during the run")]
    MissingTile(TileId),
}

/// Stable identity of one row in the `images` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TileId(pub i64);

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One tile payload together with its identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileRow {
    pub id: TileId,
    pub data: Vec<u8>,
}

/// Storage operations the batch driver needs.
pub trait TileStore {
    /// Names of all tables in the archive.
    fn table_names(&self) -> Result<BTreeSet<String>, ArchiveError>;

    /// Snapshot of every tile identity, in a stable order.
    fn tile_ids(&self) -> Result<Vec<TileId>, ArchiveError>;

    /// Read the payloads for `ids`, in the same order.
    fn read_tiles(&self, ids: &[TileId]) -> Result<Vec<TileRow>, ArchiveError>;

    /// Write all `replacements` as one atomic unit.
    fn commit_window(&mut self, replacements: &[TileRow]) -> Result<(), ArchiveError>;

    /// Replace the `format` metadata entry with `format` and make it durable.
    fn set_format(&mut self, format: &str) -> Result<(), ArchiveError>;
}

/// An MBTiles archive opened read-write.
#[derive(Debug)]
pub struct SqliteArchive {
    conn: Connection,
    path: PathBuf,
}

impl SqliteArchive {
    /// Open an existing archive for writing.
    pub fn open(path: &Path) -> Result<Self, ArchiveError> {
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_WRITE)?;
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    /// Copy `source` to `output` in full, then open `output` for writing.
    ///
    /// The source is opened read-only and closed before this returns. An
    /// existing `output` is overwritten.
    pub fn duplicate(source: &Path, output: &Path) -> Result<Self, ArchiveError> {
        if is_same_file(source, output) {
            return Err(ArchiveError::SamePath(output.to_path_buf()));
        }

        info!(source = %source.display(), output = %output.display(), "duplicating archive");
        let src = Connection::open_with_flags(
            source,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        src.backup(DatabaseName::Main, output, None)?;
        src.close().map_err(|(_, e)| e)?;

        Self::open(output)
    }

    /// Close the connection, surfacing any error SQLite reports on close.
    pub fn close(self) -> Result<(), ArchiveError> {
        debug!(path = %self.path.display(), "closing archive");
        self.conn.close().map_err(|(_, e)| ArchiveError::Sqlite(e))
    }
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

impl TileStore for SqliteArchive {
    fn table_names(&self) -> Result<BTreeSet<String>, ArchiveError> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table'")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok(names)
    }

    fn tile_ids(&self) -> Result<Vec<TileId>, ArchiveError> {
        let mut stmt = self
            .conn
            .prepare("SELECT rowid FROM images ORDER BY rowid")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, i64>(0).map(TileId))?
            .collect::<Result<Vec<_>, _>>()?;
        debug!(count = ids.len(), "captured tile id snapshot");
        Ok(ids)
    }

    fn read_tiles(&self, ids: &[TileId]) -> Result<Vec<TileRow>, ArchiveError> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT tile_data FROM images WHERE rowid = ?1")?;
        let mut rows = Vec::with_capacity(ids.len());
        for &id in ids {
            let data = stmt
                .query_row([id.0], |row| Ok(blob_bytes(row.get_ref(0)?)))
                .optional()?
                .ok_or(ArchiveError::MissingTile(id))?;
            rows.push(TileRow { id, data });
        }
        Ok(rows)
    }

    fn commit_window(&mut self, replacements: &[TileRow]) -> Result<(), ArchiveError> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached("UPDATE images SET tile_data = ?1 WHERE rowid = ?2")?;
            for row in replacements {
                if stmt.execute(params![row.data, row.id.0])? == 0 {
                    // Dropping `tx` rolls the window back.
                    return Err(ArchiveError::MissingTile(row.id));
                }
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn set_format(&mut self, format: &str) -> Result<(), ArchiveError> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "CREATE TABLE IF NOT EXISTS metadata (name TEXT, value TEXT)",
            [],
        )?;
        tx.execute("DELETE FROM metadata WHERE name = ?1", [FORMAT_KEY])?;
        tx.execute(
            "INSERT INTO metadata (name, value) VALUES (?1, ?2)",
            [FORMAT_KEY, format],
        )?;
        tx.commit()?;
        info!(format, "updated format metadata");
        Ok(())
    }
}

/// Payload bytes of a `tile_data` cell.
///
/// TEXT cells are taken as raw bytes; they need not be valid UTF-8. NULL and
/// numeric cells read as an empty blob.
fn blob_bytes(value: ValueRef<'_>) -> Vec<u8> {
    match value {
        ValueRef::Blob(b) | ValueRef::Text(b) => b.to_vec(),
        ValueRef::Null | ValueRef::Integer(_) | ValueRef::Real(_) => Vec::new(),
    }
}
