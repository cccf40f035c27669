//! Merge engine combining many sources into one deduplicated store
//!
//! Sources are processed strictly in the order given. Within a source, rows
//! are visited by ascending original `id`; the first row seen for an identity
//! key is kept under a new `id`, every later row with that key is dropped.
//! The store's unique identity index decides which keys are new, so memory
//! does not grow with the number of merged rows.

use crate::error::Result;
use crate::scanner::check_source;
use crate::source::SourceReader;
use crate::store::OutputStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Row counts for one merged source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCount {
    /// Source path
    pub path: PathBuf,
    /// Rows read from the source
    pub rows: u64,
    /// Rows that were new and landed in the output
    pub kept: u64,
}

/// Outcome of a merge run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeReport {
    /// Merged output store
    pub output: PathBuf,
    /// Per-source counts, in merge order
    pub sources: Vec<SourceCount>,
    pub total_input_rows: u64,
    /// Final row count of the output store
    pub merged_rows: u64,
    pub duplicate_rows_removed: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Merge `sources` into a fresh store at `output`
pub fn merge_sources<P: AsRef<Path>>(sources: &[P], output: &Path) -> Result<MergeReport> {
    let started_at = Utc::now();

    // Nothing is created unless every source is usable
    for source in sources {
        check_source(source.as_ref())?;
    }

    let mut store = OutputStore::create(output)?;
    store.tune_for_bulk_load()?;
    store.add_load_constraint()?;

    let mut counts = Vec::with_capacity(sources.len());
    for (i, source) in sources.iter().enumerate() {
        let source = source.as_ref();
        info!("[{}/{}] merging {}", i + 1, sources.len(), source.display());
        let count = merge_source(&mut store, source)?;
        info!(rows = count.rows, kept = count.kept, "source merged");
        counts.push(count);
    }

    info!("building lookup indexes");
    store.build_indexes()?;
    let merged_rows = store.row_count()?;
    store.close()?;

    let total_input_rows: u64 = counts.iter().map(|c| c.rows).sum();
    Ok(MergeReport {
        output: output.to_path_buf(),
        sources: counts,
        total_input_rows,
        merged_rows,
        duplicate_rows_removed: total_input_rows.saturating_sub(merged_rows),
        started_at,
        finished_at: Utc::now(),
    })
}

/// Copy one source's new rows as a single transaction.
/// The source is closed whether or not the copy succeeds.
fn merge_source(store: &mut OutputStore, path: &Path) -> Result<SourceCount> {
    let reader = SourceReader::open(path)?;
    let copied = copy_new_records(store, &reader);
    reader.close();
    let (rows, kept) = copied?;

    Ok(SourceCount {
        path: path.to_path_buf(),
        rows,
        kept,
    })
}

fn copy_new_records(store: &mut OutputStore, reader: &SourceReader) -> Result<(u64, u64)> {
    let writer = store.begin()?;
    let mut kept = 0;
    let rows = reader.for_each_record(|record| {
        if writer.insert_new(&record.key)?.is_some() {
            kept += 1;
        }
        Ok(())
    })?;
    writer.commit()?;
    Ok((rows, kept))
}
