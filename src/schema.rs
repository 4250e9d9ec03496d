//! Archive schema gate.
//!
//! Only archives using the normalized `map` + `images` layout can be
//! rewritten in place. Flat archives that keep everything in a `tiles` table
//! are rejected before any row is touched.

use crate::archive::{ArchiveError, IMAGES_TABLE, MAP_TABLE, TileStore};
use thiserror::Error;

/// Tables an archive must expose.
pub const REQUIRED_TABLES: [&str; 2] = [MAP_TABLE, IMAGES_TABLE];

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("archive does not use the map/images schema (missing: {})", .missing.join(", "))]
    MissingTables { missing: Vec<String> },
    #[error(transparent)]
    Archive(#[from] ArchiveError),
}

/// Check that every table in [`REQUIRED_TABLES`] exists.
pub fn validate_schema(store: &impl TileStore) -> Result<(), SchemaError> {
    let tables = store.table_names()?;
    let missing: Vec<String> = REQUIRED_TABLES
        .iter()
        .filter(|t| !tables.contains(**t))
        .map(|t| t.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(SchemaError::MissingTables { missing })
    }
}
