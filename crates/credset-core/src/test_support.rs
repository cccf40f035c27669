//! Fixtures shared by unit tests

use crate::schema::{self, IdentityKey, Record, Value, KEY_COLUMNS};
use rusqlite::{params_from_iter, Connection};
use std::path::Path;

/// A record whose key is fixed except for `gene_name` and `pip`
pub fn record(id: i64, gene_name: &str, pip: f64) -> Record {
    let values = KEY_COLUMNS
        .iter()
        .map(|c| match c.name {
            "gene_name" => Value::Text(gene_name.to_string()),
            "pip" => Value::Real(pip),
            "credible_set_size" => Value::Integer(3),
            "rsid" => Value::Null,
            name => Value::Text(format!("{name}-x")),
        })
        .collect();
    Record::new(id, IdentityKey::new(values).unwrap())
}

/// `record` with one column replaced
pub fn with_value(record: &Record, column: &str, value: Value) -> Record {
    let mut values = record.key.values().to_vec();
    let index = KEY_COLUMNS.iter().position(|c| c.name == column).unwrap();
    values[index] = value;
    Record::new(record.id, IdentityKey::new(values).unwrap())
}

/// Write a source store holding exactly `records`, ids preserved
pub fn write_source(path: &Path, records: &[Record]) {
    write_with_ddl(path, &schema::create_table_sql(), records);
}

/// Like [`write_source`], but no column declares a type, so every value
/// keeps the storage class it was bound with
pub fn write_untyped_source(path: &Path, records: &[Record]) {
    let columns: Vec<&str> = schema::column_names().collect();
    let ddl = format!(
        "CREATE TABLE {} ({})",
        schema::TABLE_NAME,
        columns.join(", ")
    );
    write_with_ddl(path, &ddl, records);
}

fn write_with_ddl(path: &Path, ddl: &str, records: &[Record]) {
    let mut conn = Connection::open(path).unwrap();
    conn.execute_batch(ddl).unwrap();
    let tx = conn.transaction().unwrap();
    {
        let mut stmt = tx.prepare(&schema::insert_with_id_sql()).unwrap();
        for record in records {
            let id = Value::Integer(record.id);
            stmt.execute(params_from_iter(
                std::iter::once(&id).chain(record.key.values()),
            ))
            .unwrap();
        }
    }
    tx.commit().unwrap();
}
