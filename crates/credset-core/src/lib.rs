//! credset-core: Merge and audit credible-set SQLite tables
//!
//! This library provides functionality to:
//! - Discover `QTS*.sqlite` sources and read/write source lists
//! - Merge many sources into one store, dropping exact duplicates
//!   (first writer wins, new ids assigned)
//! - Extract the duplicated rows of a single source for auditing
//! - Export any store to CSV or JSON

pub mod duplicates;
pub mod error;
pub mod export;
pub mod merger;
pub mod scanner;
pub mod schema;
pub mod source;
pub mod store;

#[cfg(test)]
mod test_support;

pub use duplicates::{
    extract_all, extract_duplicates, output_name_for, DuplicateCollector, ExtractedSource,
    ExtractionReport,
};
pub use error::{Error, Result};
pub use export::{export_store, ExportFormat};
pub use merger::{merge_sources, MergeReport, SourceCount};
pub use scanner::{check_source, discover_sources, read_source_list, write_source_list};
pub use schema::{IdentityKey, Record, Value, KEY_COLUMNS};
pub use source::SourceReader;
pub use store::{OutputStore, StoreWriter};
