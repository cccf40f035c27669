//! Discovery of source stores and the newline-delimited source list

use crate::error::{Error, Result};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const SOURCE_PREFIX: &str = "QTS";
const SOURCE_EXTENSION: &str = ".sqlite";

/// Recursively find `QTS*.sqlite` files under `input_dir`.
///
/// Returns absolute paths, sorted.
pub fn discover_sources<P: AsRef<Path>>(input_dir: P) -> Result<Vec<PathBuf>> {
    let input_dir = input_dir.as_ref();
    if !input_dir.is_dir() {
        return Err(Error::InputDirMissing(input_dir.to_path_buf()));
    }

    let mut matched = Vec::new();
    for entry in WalkDir::new(input_dir).follow_links(true) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let is_source = entry.file_name().to_str().is_some_and(|name| {
            name.starts_with(SOURCE_PREFIX) && name.ends_with(SOURCE_EXTENSION)
        });
        if is_source {
            matched.push(fs::canonicalize(entry.path())?);
        }
    }

    matched.sort();
    Ok(matched)
}

/// Write one path per line, creating the parent directory if needed
pub fn write_source_list<P: AsRef<Path>>(paths: &[PathBuf], list_file: P) -> Result<()> {
    let list_file = list_file.as_ref();
    let write_err = |e: std::io::Error| Error::FileWrite {
        path: list_file.to_path_buf(),
        source: e,
    };

    if let Some(parent) = list_file.parent() {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    let mut writer = BufWriter::new(File::create(list_file).map_err(write_err)?);
    for path in paths {
        writeln!(writer, "{}", path.display()).map_err(write_err)?;
    }
    writer.flush().map_err(write_err)?;
    Ok(())
}

/// Check that `path` is an absolute path to an existing, non-empty file
pub fn check_source(path: &Path) -> Result<()> {
    if !path.is_absolute() {
        return Err(Error::RelativePath(path.to_path_buf()));
    }
    let metadata = match fs::metadata(path) {
        Ok(m) if m.is_file() => m,
        _ => return Err(Error::SourceNotFound(path.to_path_buf())),
    };
    if metadata.len() == 0 {
        return Err(Error::EmptySource(path.to_path_buf()));
    }
    Ok(())
}

/// Read the source list, validating every entry.
///
/// Blank lines are skipped. Each entry must be an absolute path to an
/// existing, non-empty file, and at least one entry must be present.
pub fn read_source_list<P: AsRef<Path>>(list_file: P) -> Result<Vec<PathBuf>> {
    let list_file = list_file.as_ref();
    if !list_file.is_file() {
        return Err(Error::InputListMissing(list_file.to_path_buf()));
    }

    let reader = BufReader::new(File::open(list_file)?);
    let mut paths = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let path = PathBuf::from(line);
        check_source(&path)?;
        paths.push(path);
    }

    if paths.is_empty() {
        return Err(Error::InputListEmpty(list_file.to_path_buf()));
    }
    Ok(paths)
}
