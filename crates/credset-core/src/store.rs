//! Output store: table definition, load-time constraint and lookup indexes

use crate::error::{Error, Result};
use crate::schema::{self, IdentityKey, Record, Value, TABLE_NAME};
use rusqlite::{params_from_iter, Connection, Transaction};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Unique index over the identity key while sources are loaded.
/// [`StoreWriter::insert_new`] skips any key it already holds.
pub const LOAD_CONSTRAINT: &str = "uq_identity_key_tmp";

/// Secondary indexes built once, after the bulk load
pub const LOOKUP_INDEXES: [(&str, &str); 7] = [
    ("idx_molecular_trait_id", "molecular_trait_id"),
    ("idx_gene_name", "gene_name"),
    ("idx_credible_set", "credible_set"),
    ("idx_variant", "variant"),
    ("idx_rsid", "rsid"),
    ("idx_dataset", "study_label"),
    (
        "idx_for_plotting",
        "dataset_id, gene_id, molecular_trait_id, variant",
    ),
];

const SIDECAR_SUFFIXES: [&str; 3] = ["-wal", "-shm", "-journal"];

/// A freshly created store holding one `credible_set_table`
pub struct OutputStore {
    path: PathBuf,
    conn: Connection,
    wal: bool,
    constrained: bool,
}

impl OutputStore {
    /// Create an empty store at `path`.
    ///
    /// Anything already at `path`, including SQLite sidecar files, is removed
    /// first, so a failed run never leaves a stale artifact looking valid.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        remove_artifact(path)?;

        let conn = Connection::open(path).map_err(|e| Error::storage(path, e))?;
        conn.execute_batch(&schema::create_table_sql())
            .map_err(|e| Error::storage(path, e))?;
        debug!(path = %path.display(), "created output store");

        Ok(Self {
            path: path.to_path_buf(),
            conn,
            wal: false,
            constrained: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Switch to write-ahead logging with relaxed syncs for a bulk load
    pub fn tune_for_bulk_load(&mut self) -> Result<()> {
        let mode: String = self
            .conn
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
            .map_err(|e| Error::storage(&self.path, e))?;
        self.conn
            .pragma_update(None, "synchronous", "NORMAL")
            .map_err(|e| Error::storage(&self.path, e))?;
        self.wal = mode.eq_ignore_ascii_case("wal");
        Ok(())
    }

    /// Add the temporary unique index over the identity key
    pub fn add_load_constraint(&mut self) -> Result<()> {
        self.conn
            .execute_batch(&schema::identity_index_sql(LOAD_CONSTRAINT))
            .map_err(|e| Error::storage(&self.path, e))?;
        self.constrained = true;
        Ok(())
    }

    /// Start one atomic unit of inserts
    pub fn begin(&mut self) -> Result<StoreWriter<'_>> {
        let tx = self
            .conn
            .transaction()
            .map_err(|e| Error::storage(&self.path, e))?;
        Ok(StoreWriter {
            tx,
            path: &self.path,
            insert_new_sql: schema::insert_new_sql(),
            insert_with_id_sql: schema::insert_with_id_sql(),
        })
    }

    /// Drop the load constraint, if any, and build the lookup indexes
    pub fn build_indexes(&mut self) -> Result<()> {
        if self.constrained {
            self.conn
                .execute_batch(&format!("DROP INDEX {LOAD_CONSTRAINT}"))
                .map_err(|e| Error::storage(&self.path, e))?;
            self.constrained = false;
        }
        for (name, columns) in LOOKUP_INDEXES {
            info!(index = name, "building index");
            self.conn
                .execute_batch(&format!("CREATE INDEX {name} ON {TABLE_NAME}({columns})"))
                .map_err(|e| Error::storage(&self.path, e))?;
        }
        Ok(())
    }

    /// Number of rows currently in the table
    pub fn row_count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {TABLE_NAME}"), [], |row| {
                row.get(0)
            })
            .map_err(|e| Error::storage(&self.path, e))?;
        Ok(count as u64)
    }

    /// Names of the indexes defined on the table
    pub fn index_names(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT name FROM sqlite_master \
                 WHERE type = 'index' AND tbl_name = ?1 AND sql IS NOT NULL ORDER BY name",
            )
            .map_err(|e| Error::storage(&self.path, e))?;
        let names = stmt
            .query_map([TABLE_NAME], |row| row.get(0))
            .map_err(|e| Error::storage(&self.path, e))?
            .collect::<rusqlite::Result<Vec<String>>>()
            .map_err(|e| Error::storage(&self.path, e))?;
        Ok(names)
    }

    /// Close the store, folding any write-ahead log back into the main file
    /// so the artifact is a single self-contained database.
    pub fn close(self) -> Result<()> {
        let path = self.path;
        if self.wal {
            self.conn
                .pragma_update_and_check(None, "journal_mode", "DELETE", |row| {
                    row.get::<_, String>(0)
                })
                .map_err(|e| Error::storage(&path, e))?;
        }
        self.conn
            .close()
            .map_err(|(_, e)| Error::storage(&path, e))
    }
}

/// Inserts into an [`OutputStore`] inside one transaction.
/// Dropping the writer without [`StoreWriter::commit`] rolls back.
pub struct StoreWriter<'a> {
    tx: Transaction<'a>,
    path: &'a Path,
    insert_new_sql: String,
    insert_with_id_sql: String,
}

impl StoreWriter<'_> {
    /// Insert a key under a store-assigned `id`, returning that id.
    ///
    /// Returns `None` when the load constraint already holds an equal key.
    pub fn insert_new(&self, key: &IdentityKey) -> Result<Option<i64>> {
        let mut stmt = self
            .tx
            .prepare_cached(&self.insert_new_sql)
            .map_err(|e| Error::storage(self.path, e))?;
        let changed = stmt
            .execute(params_from_iter(key.values()))
            .map_err(|e| Error::storage(self.path, e))?;
        Ok((changed > 0).then(|| self.tx.last_insert_rowid()))
    }

    /// Insert a record keeping its original `id`
    pub fn insert_with_id(&self, record: &Record) -> Result<()> {
        let mut stmt = self
            .tx
            .prepare_cached(&self.insert_with_id_sql)
            .map_err(|e| Error::storage(self.path, e))?;
        let id = Value::Integer(record.id);
        stmt.execute(params_from_iter(
            std::iter::once(&id).chain(record.key.values()),
        ))
        .map_err(|e| Error::storage(self.path, e))?;
        Ok(())
    }

    pub fn commit(self) -> Result<()> {
        let path = self.path;
        self.tx.commit().map_err(|e| Error::storage(path, e))
    }
}

fn sidecar(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Remove a database file and its sidecars, if present
pub(crate) fn remove_artifact(path: &Path) -> Result<()> {
    let sidecars = SIDECAR_SUFFIXES.iter().map(|s| sidecar(path, s));
    for candidate in std::iter::once(path.to_path_buf()).chain(sidecars) {
        if candidate.exists() {
            debug!(path = %candidate.display(), "removing existing output");
            fs::remove_file(&candidate).map_err(|e| Error::FileWrite {
                path: candidate.clone(),
                source: e,
            })?;
        }
    }
    Ok(())
}
