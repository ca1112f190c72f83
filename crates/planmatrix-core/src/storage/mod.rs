//! Table store and archive log.
//!
//! The sync engine only sees the two traits here; the SQLite-backed
//! [`MatrixDb`] implements both. Row indices are 0-based data-row
//! positions; the header is not a row.

pub mod sqlite;

pub use sqlite::MatrixDb;

use std::path::PathBuf;

use crate::error::StoreError;
use crate::model::Row;

/// Rectangular table of rows under a named-column header.
pub trait TableStore {
    fn header(&self) -> Result<Vec<String>, StoreError>;

    /// All data rows, in table order.
    fn read_rows(&self) -> Result<Vec<Row>, StoreError>;

    /// Replace the entire data region with `rows`.
    fn overwrite_rows(&mut self, rows: &[Row]) -> Result<(), StoreError>;

    /// Insert rows at the end of the data region.
    fn append_rows(&mut self, rows: &[Row]) -> Result<(), StoreError>;

    /// Delete `count` contiguous rows starting at `start`. Rows below the
    /// range shift up.
    fn delete_range(&mut self, start: usize, count: usize) -> Result<(), StoreError>;
}

/// Append-only log of retired rows in the fixed archive column order.
pub trait ArchiveLog {
    fn append_archive(&mut self, entries: &[Row]) -> Result<(), StoreError>;

    /// All entries, oldest first.
    fn archive_rows(&self) -> Result<Vec<Row>, StoreError>;

    /// Blank one cell of one entry. Only the retire step may call this,
    /// and only for the event id column.
    fn blank_archive_cell(&mut self, entry: usize, column: usize) -> Result<(), StoreError>;
}

/// Returns `~/.config/planmatrix[-dev]/` based on PLANMATRIX_ENV.
///
/// Set PLANMATRIX_ENV=dev to use the development data directory.
///
/// # Errors
/// Returns an error if the home directory cannot be determined or if
/// creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, Box<dyn std::error::Error>> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("PLANMATRIX_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("planmatrix-dev")
    } else {
        base_dir.join("planmatrix")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
