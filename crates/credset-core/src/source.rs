//! Read-only access to one input credible-set store

use crate::error::{Error, Result};
use crate::schema::{self, Record, TABLE_NAME};
use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// An open source store whose records are read in ascending `id` order
pub struct SourceReader {
    path: PathBuf,
    conn: Connection,
}

impl SourceReader {
    /// Open a source read-only. A missing file is an error, never created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::SourceNotFound(path.to_path_buf()));
        }
        debug!(path = %path.display(), "opening source");
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| Error::storage(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            conn,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of rows in the source table
    pub fn row_count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {TABLE_NAME}"), [], |row| {
                row.get(0)
            })
            .map_err(|e| Error::storage(&self.path, e))?;
        Ok(count as u64)
    }

    /// Stream every record, lowest `id` first, returning how many were seen.
    /// Stops at the first error from the callback.
    pub fn for_each_record<F>(&self, mut f: F) -> Result<u64>
    where
        F: FnMut(Record) -> Result<()>,
    {
        let mut stmt = self
            .conn
            .prepare(&schema::select_sql())
            .map_err(|e| Error::storage(&self.path, e))?;
        let mut rows = stmt.query([]).map_err(|e| Error::storage(&self.path, e))?;

        let mut seen = 0;
        while let Some(row) = rows.next().map_err(|e| Error::storage(&self.path, e))? {
            f(Record::from_row(row, &self.path)?)?;
            seen += 1;
        }
        Ok(seen)
    }

    /// Read every record into memory, lowest `id` first
    pub fn read_all(&self) -> Result<Vec<Record>> {
        let mut records = Vec::new();
        self.for_each_record(|record| {
            records.push(record);
            Ok(())
        })?;
        Ok(records)
    }

    /// Close the connection. Failures are logged, not returned, so they
    /// never mask an error already on its way to the caller.
    pub fn close(self) {
        let path = self.path;
        if let Err((_, e)) = self.conn.close() {
            warn!(path = %path.display(), error = %e, "failed to close source");
        }
    }
}
