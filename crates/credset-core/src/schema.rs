//! Credible-set record schema and identity key
//!
//! Every statement that touches `credible_set_table` is derived from
//! [`KEY_COLUMNS`], so the merge and extraction engines always agree on what
//! "the same association" means.

use crate::error::{Error, Result};
use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use std::path::Path;

/// Name of the table every source and output store carries
pub const TABLE_NAME: &str = "credible_set_table";

/// Name of the synthetic row id column
pub const ID_COLUMN: &str = "id";

/// Declared storage type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Integer,
    Real,
}

impl ColumnType {
    fn sql_type(self) -> &'static str {
        match self {
            ColumnType::Text => "TEXT",
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "FLOAT",
        }
    }
}

/// A column of the identity key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnType,
}

const fn col(name: &'static str, kind: ColumnType) -> Column {
    Column { name, kind }
}

/// Every attribute except `id`, in table order
pub static KEY_COLUMNS: [Column; 17] = [
    col("study_id", ColumnType::Text),
    col("study_label", ColumnType::Text),
    col("dataset_id", ColumnType::Text),
    col("molecular_trait_id", ColumnType::Text),
    col("gene_id", ColumnType::Text),
    col("gene_name", ColumnType::Text),
    col("variant", ColumnType::Text),
    col("rsid", ColumnType::Text),
    col("quantification_method", ColumnType::Text),
    col("credible_set", ColumnType::Text),
    col("credible_set_size", ColumnType::Integer),
    col("pip", ColumnType::Real),
    col("pvalue", ColumnType::Real),
    col("beta", ColumnType::Real),
    col("se", ColumnType::Real),
    col("dataset_label", ColumnType::Text),
    col("plot_variant", ColumnType::Text),
];

/// All column names including `id`, in table order
pub fn column_names() -> impl Iterator<Item = &'static str> {
    std::iter::once(ID_COLUMN).chain(KEY_COLUMNS.iter().map(|c| c.name))
}

/// `CREATE TABLE` statement for the credible-set table
pub fn create_table_sql() -> String {
    let columns: Vec<String> = KEY_COLUMNS
        .iter()
        .map(|c| format!("    {} {}", c.name, c.kind.sql_type()))
        .collect();
    format!(
        "CREATE TABLE {TABLE_NAME} (\n    {ID_COLUMN} INTEGER PRIMARY KEY NOT NULL,\n{}\n)",
        columns.join(",\n")
    )
}

/// `SELECT` over all columns, ordered by ascending `id`.
///
/// TEXT columns are cast in SQL so numbers read back exactly as a TEXT
/// column would store them.
pub fn select_sql() -> String {
    let columns: Vec<String> = std::iter::once(ID_COLUMN.to_string())
        .chain(KEY_COLUMNS.iter().map(|c| match c.kind {
            ColumnType::Text => format!("CAST({0} AS TEXT) AS {0}", c.name),
            _ => c.name.to_string(),
        }))
        .collect();
    format!(
        "SELECT {} FROM {TABLE_NAME} ORDER BY {ID_COLUMN}",
        columns.join(", ")
    )
}

fn insert_into(verb: &str, columns: Vec<&str>) -> String {
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
    format!(
        "{verb} INTO {TABLE_NAME} ({}) VALUES ({})",
        columns.join(", "),
        placeholders.join(", ")
    )
}

/// `INSERT` binding `id` first, then the key columns
pub fn insert_with_id_sql() -> String {
    insert_into("INSERT", column_names().collect())
}

/// `INSERT OR IGNORE` of the key columns under a store-assigned `id`;
/// a key already present in the store is skipped
pub fn insert_new_sql() -> String {
    insert_into(
        "INSERT OR IGNORE",
        KEY_COLUMNS.iter().map(|c| c.name).collect(),
    )
}

/// Unique index over the identity key.
///
/// Each column contributes `(col IS NULL, ifnull(col, 0))`; the null flag
/// keeps NULL apart from every real value without a sentinel.
pub fn identity_index_sql(index_name: &str) -> String {
    let parts: Vec<String> = KEY_COLUMNS
        .iter()
        .map(|c| format!("({0} IS NULL), ifnull({0}, 0)", c.name))
        .collect();
    format!(
        "CREATE UNIQUE INDEX {index_name} ON {TABLE_NAME}({})",
        parts.join(", ")
    )
}

/// A single typed attribute value
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl Value {
    /// Read one column of a row as the column's declared type would store it.
    ///
    /// Sources with loosely typed columns then produce the same key the
    /// output store holds after insertion.
    fn read(raw: ValueRef<'_>, column: &Column, path: &Path) -> Result<Self> {
        let mismatch = |found: &str| Error::Schema {
            path: path.to_path_buf(),
            column: column.name,
            found: found.to_string(),
        };
        let value = match raw {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(f) => Value::Real(f),
            ValueRef::Text(bytes) => std::str::from_utf8(bytes)
                .map(|s| Value::Text(s.to_string()))
                .map_err(|_| mismatch("non-UTF-8 text"))?,
            ValueRef::Blob(_) => return Err(mismatch("a blob")),
        };
        Ok(value.with_affinity(column.kind))
    }

    /// Apply SQLite column affinity for `kind`.
    /// Reals bound for TEXT columns are already cast by [`select_sql`].
    fn with_affinity(self, kind: ColumnType) -> Self {
        match (kind, self) {
            (ColumnType::Text, Value::Integer(i)) => Value::Text(i.to_string()),
            (ColumnType::Integer, Value::Real(f)) => Value::integral(f),
            (ColumnType::Integer, Value::Text(s)) => match parse_numeric(&s) {
                Some(Value::Real(f)) => Value::integral(f),
                Some(number) => number,
                None => Value::Text(s),
            },
            (ColumnType::Real, Value::Integer(i)) => Value::Real(i as f64),
            (ColumnType::Real, Value::Text(s)) => match parse_numeric(&s) {
                Some(Value::Integer(i)) => Value::Real(i as f64),
                Some(number) => number,
                None => Value::Text(s),
            },
            (_, value) => value,
        }
    }

    /// A real that is a whole number within `i64` range becomes an integer
    fn integral(f: f64) -> Self {
        const LIMIT: f64 = 9_223_372_036_854_775_808.0;
        if f.fract() == 0.0 && (-LIMIT..LIMIT).contains(&f) {
            Value::Integer(f as i64)
        } else {
            Value::Real(f)
        }
    }

    fn real_bits(f: f64) -> u64 {
        // -0.0 and 0.0 are one value
        if f == 0.0 {
            0
        } else {
            f.to_bits()
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Real(a), Value::Real(b)) => Value::real_bits(*a) == Value::real_bits(*b),
            (Value::Text(a), Value::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Integer(i) => i.hash(state),
            Value::Real(f) => Value::real_bits(*f).hash(state),
            Value::Text(s) => s.hash(state),
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::from(rusqlite::types::Null),
            Value::Integer(i) => ToSqlOutput::from(*i),
            Value::Real(f) => ToSqlOutput::from(*f),
            Value::Text(s) => ToSqlOutput::from(s.as_str()),
        })
    }
}

/// Parse text that looks like a decimal numeric literal.
/// Surrounding whitespace is ignored; anything else stays text.
fn parse_numeric(s: &str) -> Option<Value> {
    let s = s.trim();
    let looks_numeric = s.bytes().any(|b| b.is_ascii_digit())
        && s
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.' | b'e' | b'E'));
    if !looks_numeric {
        return None;
    }
    s.parse::<i64>()
        .map(Value::Integer)
        .or_else(|_| s.parse::<f64>().map(Value::Real))
        .ok()
        .filter(|v| !matches!(v, Value::Real(f) if !f.is_finite()))
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Integer(i) => write!(f, "{}", i),
            // Debug keeps exponents, so tiny p-values stay readable
            Value::Real(r) => write!(f, "{:?}", r),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

/// The 17 non-id attributes whose equality defines "same association"
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityKey(Vec<Value>);

impl IdentityKey {
    /// Build a key from values in [`KEY_COLUMNS`] order
    ///
    /// Returns `None` unless exactly one value per key column is given.
    pub fn new(values: Vec<Value>) -> Option<Self> {
        (values.len() == KEY_COLUMNS.len()).then_some(Self(values))
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }

    /// Get a value by column name
    pub fn get(&self, name: &str) -> Option<&Value> {
        KEY_COLUMNS
            .iter()
            .position(|c| c.name == name)
            .and_then(|i| self.0.get(i))
    }
}

/// One credible-set association row
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: i64,
    pub key: IdentityKey,
}

impl Record {
    pub fn new(id: i64, key: IdentityKey) -> Self {
        Self { id, key }
    }

    /// Decode a row produced by [`select_sql`]
    pub fn from_row(row: &Row<'_>, path: &Path) -> Result<Self> {
        let id: i64 = row.get(0).map_err(|e| Error::storage(path, e))?;
        let mut values = Vec::with_capacity(KEY_COLUMNS.len());
        for (i, column) in KEY_COLUMNS.iter().enumerate() {
            let raw = row.get_ref(i + 1).map_err(|e| Error::storage(path, e))?;
            values.push(Value::read(raw, column, path)?);
        }
        Ok(Self {
            id,
            key: IdentityKey(values),
        })
    }
}
