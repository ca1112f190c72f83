//! SQLite-backed table store and archive log.
//!
//! The table mirrors the spreadsheet shape: one `rows` table keyed by
//! position with each row's cells as a JSON array, the header in its own
//! table, the archive as an append-only sequence, and a kv table for sync
//! bookkeeping.

use rusqlite::{params, Connection};

use super::{ArchiveLog, TableStore};
use crate::error::StoreError;
use crate::model::Row;
use crate::schema::default_header;

/// SQLite database holding the matrix and its archive.
pub struct MatrixDb {
    conn: Connection,
}

impl MatrixDb {
    /// Open the database at `~/.config/planmatrix/matrix.db`.
    ///
    /// Creates the file and schema if they don't exist; a fresh table gets
    /// the default header.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, StoreError> {
        let path = super::data_dir()
            .map_err(|e| StoreError::MigrationFailed(e.to_string()))?
            .join("matrix.db");
        Self::open_at(&path)
    }

    /// Open the database at an explicit path.
    pub fn open_at(path: &std::path::Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|source| StoreError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests).
    #[cfg(test)]
    pub fn open_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), StoreError> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS header (
                    pos  INTEGER PRIMARY KEY,
                    name TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS rows (
                    pos   INTEGER PRIMARY KEY,
                    cells TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS archive (
                    seq   INTEGER PRIMARY KEY AUTOINCREMENT,
                    cells TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS kv (
                    key   TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );",
            )
            .map_err(|e| StoreError::MigrationFailed(e.to_string()))?;

        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM header", [], |row| row.get(0))?;
        if count == 0 {
            self.write_header(&default_header())?;
        }
        Ok(())
    }

    fn write_header(&self, header: &[String]) -> Result<(), StoreError> {
        self.conn.execute("DELETE FROM header", [])?;
        let mut stmt = self
            .conn
            .prepare("INSERT INTO header (pos, name) VALUES (?1, ?2)")?;
        for (i, name) in header.iter().enumerate() {
            stmt.execute(params![i as i64, name])?;
        }
        Ok(())
    }

    /// Replace the header row. Intended for seeding non-default layouts.
    pub fn set_header(&mut self, header: &[String]) -> Result<(), StoreError> {
        self.write_header(header)
    }

    fn row_count(&self) -> Result<usize, StoreError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM rows", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut stmt = self.conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        match stmt.query_row(params![key], |row| row.get::<_, String>(0)) {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }
}

fn encode_row(row: &Row) -> Result<String, StoreError> {
    serde_json::to_string(row).map_err(|e| StoreError::CorruptRow(e.to_string()))
}

fn decode_row(cells: &str) -> Result<Row, StoreError> {
    serde_json::from_str(cells).map_err(|e| StoreError::CorruptRow(e.to_string()))
}

impl TableStore for MatrixDb {
    fn header(&self) -> Result<Vec<String>, StoreError> {
        let mut stmt = self.conn.prepare("SELECT name FROM header ORDER BY pos")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    fn read_rows(&self) -> Result<Vec<Row>, StoreError> {
        let mut stmt = self.conn.prepare("SELECT cells FROM rows ORDER BY pos")?;
        let encoded = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<String>, _>>()?;
        encoded.iter().map(|cells| decode_row(cells)).collect()
    }

    fn overwrite_rows(&mut self, rows: &[Row]) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM rows", [])?;
        {
            let mut stmt = tx.prepare("INSERT INTO rows (pos, cells) VALUES (?1, ?2)")?;
            for (i, row) in rows.iter().enumerate() {
                stmt.execute(params![i as i64, encode_row(row)?])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn append_rows(&mut self, rows: &[Row]) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        {
            let next: i64 =
                tx.query_row("SELECT COALESCE(MAX(pos) + 1, 0) FROM rows", [], |row| {
                    row.get(0)
                })?;
            let mut stmt = tx.prepare("INSERT INTO rows (pos, cells) VALUES (?1, ?2)")?;
            for (i, row) in rows.iter().enumerate() {
                stmt.execute(params![next + i as i64, encode_row(row)?])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn delete_range(&mut self, start: usize, count: usize) -> Result<(), StoreError> {
        if count == 0 {
            return Ok(());
        }
        let len = self.row_count()?;
        if start + count > len {
            return Err(StoreError::RangeOutOfBounds { start, count, len });
        }

        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM rows WHERE pos >= ?1 AND pos < ?1 + ?2",
            params![start as i64, count as i64],
        )?;
        // Shift via a negative detour so the PRIMARY KEY never collides
        // mid-update.
        tx.execute(
            "UPDATE rows SET pos = -(pos - ?2) WHERE pos >= ?1 + ?2",
            params![start as i64, count as i64],
        )?;
        tx.execute("UPDATE rows SET pos = -pos WHERE pos < 0", [])?;
        tx.commit()?;
        Ok(())
    }
}

impl ArchiveLog for MatrixDb {
    fn append_archive(&mut self, entries: &[Row]) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare("INSERT INTO archive (cells) VALUES (?1)")?;
            for entry in entries {
                stmt.execute(params![encode_row(entry)?])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn archive_rows(&self) -> Result<Vec<Row>, StoreError> {
        let mut stmt = self.conn.prepare("SELECT cells FROM archive ORDER BY seq")?;
        let encoded = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<String>, _>>()?;
        encoded.iter().map(|cells| decode_row(cells)).collect()
    }

    fn blank_archive_cell(&mut self, entry: usize, column: usize) -> Result<(), StoreError> {
        let (seq, cells): (i64, String) = self
            .conn
            .query_row(
                "SELECT seq, cells FROM archive ORDER BY seq LIMIT 1 OFFSET ?1",
                params![entry as i64],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(|_| StoreError::QueryFailed(format!("no archive entry {entry}")))?;

        let mut row = decode_row(&cells)?;
        if column < row.len() {
            row[column] = crate::model::CellValue::Empty;
        }
        self.conn.execute(
            "UPDATE archive SET cells = ?1 WHERE seq = ?2",
            params![encode_row(&row)?, seq],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CellValue;
    use crate::schema::Schema;

    fn text_row(width: usize, first: &str) -> Row {
        let mut row = vec![CellValue::Empty; width];
        row[0] = CellValue::Text(first.to_string());
        row
    }

    #[test]
    fn fresh_table_gets_default_header() {
        let db = MatrixDb::open_memory().unwrap();
        let header = db.header().unwrap();
        assert_eq!(header, default_header());
        assert!(Schema::resolve(&header).is_ok());
        assert!(db.read_rows().unwrap().is_empty());
    }

    #[test]
    fn open_at_persists_between_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("matrix.db");
        {
            let mut db = MatrixDb::open_at(&path).unwrap();
            db.append_rows(&[text_row(3, "a")]).unwrap();
        }
        let db = MatrixDb::open_at(&path).unwrap();
        let rows = db.read_rows().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][0], CellValue::Text("a".into()));
    }

    #[test]
    fn append_and_overwrite_round_trip() {
        let mut db = MatrixDb::open_memory().unwrap();
        db.append_rows(&[text_row(2, "a"), text_row(2, "b")]).unwrap();
        assert_eq!(db.read_rows().unwrap().len(), 2);

        db.overwrite_rows(&[text_row(2, "c")]).unwrap();
        let rows = db.read_rows().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][0], CellValue::Text("c".into()));
    }

    #[test]
    fn delete_range_shifts_following_rows_up() {
        let mut db = MatrixDb::open_memory().unwrap();
        let rows: Vec<Row> = ["a", "b", "c", "d", "e"]
            .iter()
            .map(|s| text_row(1, s))
            .collect();
        db.append_rows(&rows).unwrap();

        db.delete_range(1, 2).unwrap();
        let remaining: Vec<String> = db
            .read_rows()
            .unwrap()
            .iter()
            .map(|r| r[0].display())
            .collect();
        assert_eq!(remaining, vec!["a", "d", "e"]);

        // Appending lands after the shifted rows, not in a gap.
        db.append_rows(&[text_row(1, "f")]).unwrap();
        assert_eq!(db.read_rows().unwrap().len(), 4);
    }

    #[test]
    fn delete_range_out_of_bounds_errors() {
        let mut db = MatrixDb::open_memory().unwrap();
        db.append_rows(&[text_row(1, "a")]).unwrap();
        let err = db.delete_range(0, 2).unwrap_err();
        assert!(matches!(err, StoreError::RangeOutOfBounds { len: 1, .. }));
    }

    #[test]
    fn archive_is_append_only_and_ordered() {
        let mut db = MatrixDb::open_memory().unwrap();
        db.append_archive(&[text_row(2, "first")]).unwrap();
        db.append_archive(&[text_row(2, "second")]).unwrap();

        let entries = db.archive_rows().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0][0], CellValue::Text("first".into()));
        assert_eq!(entries[1][0], CellValue::Text("second".into()));
    }

    #[test]
    fn blank_archive_cell_clears_one_cell_only() {
        let mut db = MatrixDb::open_memory().unwrap();
        let mut entry = text_row(3, "kept");
        entry[2] = CellValue::Text("evt-1".into());
        db.append_archive(&[entry]).unwrap();

        db.blank_archive_cell(0, 2).unwrap();
        let entries = db.archive_rows().unwrap();
        assert_eq!(entries[0][0], CellValue::Text("kept".into()));
        assert_eq!(entries[0][2], CellValue::Empty);
    }

    #[test]
    fn kv_store() {
        let db = MatrixDb::open_memory().unwrap();
        assert!(db.kv_get("last_cycle_at").unwrap().is_none());
        db.kv_set("last_cycle_at", "2025-03-10T12:00:00Z").unwrap();
        assert_eq!(
            db.kv_get("last_cycle_at").unwrap().unwrap(),
            "2025-03-10T12:00:00Z"
        );
    }
}
