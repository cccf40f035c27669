//! Duplicate extraction for auditing a single source
//!
//! Rows are grouped by identity key. Every group with two or more members
//! contributes its two lowest original ids to the output; singletons
//! contribute nothing. Original ids are preserved.

use crate::error::{Error, Result};
use crate::schema::{IdentityKey, Record};
use crate::source::SourceReader;
use crate::store::{remove_artifact, OutputStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Rows kept from each duplicated group
pub const KEEP_PER_GROUP: usize = 2;

/// Output written for one source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedSource {
    pub source: PathBuf,
    pub output: PathBuf,
    /// Rows written to `output`
    pub rows: u64,
}

/// Outcome of extracting duplicates from a list of sources
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionReport {
    pub output_dir: PathBuf,
    /// One entry per source, in processing order
    pub outputs: Vec<ExtractedSource>,
    pub total_rows: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Group {
    size: u64,
    lowest_ids: Vec<i64>,
}

impl Group {
    fn offer(&mut self, id: i64) {
        self.size += 1;
        self.lowest_ids.push(id);
        self.lowest_ids.sort_unstable();
        self.lowest_ids.truncate(KEEP_PER_GROUP);
    }
}

/// Groups records by identity key as they stream past.
///
/// The result depends only on ids, never on the order records are pushed.
#[derive(Debug, Default)]
pub struct DuplicateCollector {
    groups: HashMap<IdentityKey, Group>,
}

impl DuplicateCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: Record) {
        self.groups.entry(record.key).or_default().offer(record.id);
    }

    /// Number of distinct identity keys seen so far
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// The surviving rows of every duplicated group, ordered by `id`
    pub fn finish(self) -> Vec<Record> {
        let mut rows: Vec<Record> = self
            .groups
            .into_iter()
            .filter(|(_, group)| group.size > 1)
            .flat_map(|(key, group)| {
                group
                    .lowest_ids
                    .into_iter()
                    .map(move |id| Record::new(id, key.clone()))
            })
            .collect();
        rows.sort_unstable_by_key(|r| r.id);
        rows
    }
}

/// Output file name for the `index`-th source (1-based):
/// `NN_<grandparent>__<parent>__duplicates.sqlite`
pub fn output_name_for(source: &Path, index: usize) -> String {
    let name_of = |p: Option<&Path>| {
        p.and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "root".to_string())
    };
    let parent = source.parent();
    let parent_name = name_of(parent);
    let grandparent_name = name_of(parent.and_then(Path::parent));
    format!("{index:02}_{grandparent_name}__{parent_name}__duplicates.sqlite")
}

/// Write the duplicated rows of `source` to a fresh store at `output`,
/// returning the number of rows written.
///
/// The source is scanned in full before `output` is touched. If the scan
/// fails, any earlier file at `output` is removed and nothing is created.
pub fn extract_duplicates(source: &Path, output: &Path) -> Result<u64> {
    let rows = match scan_duplicates(source) {
        Ok(rows) => rows,
        Err(e) => {
            if let Err(cleanup) = remove_artifact(output) {
                warn!(
                    output = %output.display(),
                    error = %cleanup,
                    "could not remove old output"
                );
            }
            return Err(e);
        }
    };

    debug!(output = %output.display(), "preparing output");
    let mut store = OutputStore::create(output)?;
    let writer = store.begin()?;
    for record in &rows {
        writer.insert_with_id(record)?;
    }
    writer.commit()?;

    let written = store.row_count()?;
    store.close()?;
    info!(rows = written, "extracted duplicate rows");
    Ok(written)
}

fn scan_duplicates(source: &Path) -> Result<Vec<Record>> {
    let reader = SourceReader::open(source)?;
    info!("scanning {} for duplicate groups", source.display());
    let mut collector = DuplicateCollector::new();
    let scanned = reader.for_each_record(|record| {
        collector.push(record);
        Ok(())
    });
    reader.close();
    let scanned = scanned?;
    debug!(
        rows = scanned,
        groups = collector.group_count(),
        "source scanned"
    );
    Ok(collector.finish())
}

/// Extract duplicates from every source into `output_dir`, in order.
/// The first failing source aborts the run.
pub fn extract_all<P: AsRef<Path>>(sources: &[P], output_dir: &Path) -> Result<ExtractionReport> {
    let started_at = Utc::now();
    fs::create_dir_all(output_dir).map_err(|e| Error::FileWrite {
        path: output_dir.to_path_buf(),
        source: e,
    })?;

    let mut outputs = Vec::with_capacity(sources.len());
    for (i, source) in sources.iter().enumerate() {
        let source = source.as_ref();
        let index = i + 1;
        let output = output_dir.join(output_name_for(source, index));
        info!("[{}/{}] processing {}", index, sources.len(), source.display());

        let rows = extract_duplicates(source, &output)?;
        info!("[{}/{}] wrote {} (rows={})", index, sources.len(), output.display(), rows);
        outputs.push(ExtractedSource {
            source: source.to_path_buf(),
            output,
            rows,
        });
    }

    let total_rows = outputs.iter().map(|o| o.rows).sum();
    info!(total_rows, "duplicate extraction complete");
    Ok(ExtractionReport {
        output_dir: output_dir.to_path_buf(),
        outputs,
        total_rows,
        started_at,
        finished_at: Utc::now(),
    })
}
