//! Export of a credible-set store to CSV or JSON for inspection

use crate::error::{Error, Result};
use crate::schema::{self, Record, KEY_COLUMNS};
use crate::source::SourceReader;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

/// Output format for [`export_store`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            _ => Err(Error::UnknownFormat(s.to_string())),
        }
    }
}

/// A record serialized as an object keyed by column name
struct RecordObject<'a>(&'a Record);

impl Serialize for RecordObject<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(KEY_COLUMNS.len() + 1))?;
        map.serialize_entry(schema::ID_COLUMN, &self.0.id)?;
        for (column, value) in KEY_COLUMNS.iter().zip(self.0.key.values()) {
            map.serialize_entry(column.name, value)?;
        }
        map.end()
    }
}

/// Export the table in `input`, ordered by `id`, returning rows written
pub fn export_store(
    input: &Path,
    output: &Path,
    format: ExportFormat,
    limit: Option<usize>,
) -> Result<u64> {
    let reader = SourceReader::open(input)?;
    let records = reader.read_all();
    reader.close();
    let mut records = records?;
    if let Some(limit) = limit {
        records.truncate(limit);
    }

    let file = File::create(output).map_err(|e| Error::FileWrite {
        path: output.to_path_buf(),
        source: e,
    })?;
    let mut writer = BufWriter::new(file);

    match format {
        ExportFormat::Csv => {
            let mut csv_writer = csv::Writer::from_writer(writer);
            csv_writer.write_record(schema::column_names())?;
            for record in &records {
                let mut fields = vec![record.id.to_string()];
                fields.extend(record.key.values().iter().map(|v| v.to_string()));
                csv_writer.write_record(&fields)?;
            }
            csv_writer.flush()?;
        }
        ExportFormat::Json => {
            let objects: Vec<RecordObject<'_>> = records.iter().map(RecordObject).collect();
            serde_json::to_writer_pretty(&mut writer, &objects)?;
            writeln!(writer)?;
            writer.flush()?;
        }
    }

    Ok(records.len() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{record, write_source};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_format_parse() {
        assert_eq!("csv".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!("JSON".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert!(matches!(
            "xml".parse::<ExportFormat>(),
            Err(Error::UnknownFormat(_))
        ));
    }

    #[test]
    fn test_export_csv() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src.sqlite");
        write_source(&src, &[record(2, "B", 1e-8), record(1, "A", 0.5)]);

        let out = dir.path().join("out.csv");
        let written = export_store(&src, &out, ExportFormat::Csv, None).unwrap();
        assert_eq!(written, 2);

        let text = fs::read_to_string(&out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("id,study_id,study_label"));
        assert!(lines[0].ends_with("dataset_label,plot_variant"));
        assert!(lines[1].starts_with("1,"));
        // rsid is NULL, rendered empty
        assert!(lines[1].contains(",variant-x,,quantification_method-x,"));
        assert!(lines[2].contains(",1e-8,"));
    }

    #[test]
    fn test_export_json_with_limit() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src.sqlite");
        write_source(
            &src,
            &[record(1, "A", 0.5), record(2, "B", 0.25), record(3, "C", 0.125)],
        );

        let out = dir.path().join("out.json");
        let written = export_store(&src, &out, ExportFormat::Json, Some(2)).unwrap();
        assert_eq!(written, 2);

        let parsed: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
        let rows = parsed.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["id"], 1);
        assert_eq!(rows[1]["gene_name"], "B");
        assert_eq!(rows[1]["pip"], 0.25);
        assert_eq!(rows[0]["credible_set_size"], 3);
        assert!(rows[0]["rsid"].is_null());
    }
}
