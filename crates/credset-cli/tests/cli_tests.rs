//! CLI integration tests for credset.

use assert_cmd::Command;
use credset_core::{IdentityKey, OutputStore, Record, SourceReader, Value, KEY_COLUMNS};
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Get a Command for the credset binary.
#[allow(deprecated)]
fn cmd() -> Command {
    Command::cargo_bin("credset").unwrap()
}

fn assoc(id: i64, gene: &str) -> Record {
    let values = KEY_COLUMNS
        .iter()
        .map(|c| match c.name {
            "gene_name" => Value::Text(gene.to_string()),
            "rsid" => Value::Null,
            "credible_set_size" => Value::Integer(1),
            "pip" | "pvalue" | "beta" | "se" => Value::Real(0.5),
            name => Value::Text(name.to_string()),
        })
        .collect();
    Record::new(id, IdentityKey::new(values).unwrap())
}

fn write_source(path: &Path, records: &[Record]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut store = OutputStore::create(path).unwrap();
    let writer = store.begin().unwrap();
    for record in records {
        writer.insert_with_id(record).unwrap();
    }
    writer.commit().unwrap();
    store.close().unwrap();
}

/// Two sources under `root/data`, sharing gene "B"
fn setup(root: &Path) -> std::path::PathBuf {
    let data = fs::canonicalize(root).unwrap().join("data");
    write_source(
        &data.join("study1/ds1/QTS000001.sqlite"),
        &[assoc(1, "A"), assoc(2, "B"), assoc(3, "B")],
    );
    write_source(
        &data.join("study2/ds2/QTS000002.sqlite"),
        &[assoc(1, "B"), assoc(2, "C")],
    );
    data
}

#[test]
fn test_help() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Merge and audit credible-set SQLite tables",
        ));
}

#[test]
fn test_version() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("credset"));
}

#[test]
fn test_discover_then_merge() {
    let temp = TempDir::new().unwrap();
    let data = setup(temp.path());
    let list = temp.path().join("lists/inputs.txt");

    cmd()
        .args(["discover", "--input-dir"])
        .arg(&data)
        .arg("--output-list")
        .arg(&list)
        .assert()
        .success()
        .stdout(predicate::str::contains("Matched files: 2"));

    let listed = fs::read_to_string(&list).unwrap();
    assert_eq!(listed.lines().count(), 2);

    let out = temp.path().join("out/merged.sqlite");
    cmd()
        .args(["merge", "--input-list"])
        .arg(&list)
        .arg("--output")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Total input rows: 5"))
        .stdout(predicate::str::contains("Merged rows: 3"))
        .stdout(predicate::str::contains("Duplicate rows removed: 2"));

    let merged = SourceReader::open(&out).unwrap();
    assert_eq!(merged.row_count().unwrap(), 3);
}

#[test]
fn test_merge_json_report() {
    let temp = TempDir::new().unwrap();
    let data = setup(temp.path());
    let list = temp.path().join("inputs.txt");
    fs::write(
        &list,
        format!(
            "{}\n{}\n",
            data.join("study2/ds2/QTS000002.sqlite").display(),
            data.join("study1/ds1/QTS000001.sqlite").display()
        ),
    )
    .unwrap();

    let out = temp.path().join("merged.sqlite");
    let assert = cmd()
        .args(["merge", "--json", "--input-list"])
        .arg(&list)
        .arg("--output")
        .arg(&out)
        .assert()
        .success();

    let report: serde_json::Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
    assert_eq!(report["merged_rows"], 3);
    assert_eq!(report["duplicate_rows_removed"], 2);
    assert_eq!(report["sources"][0]["rows"], 2);
    assert_eq!(report["sources"][0]["kept"], 2);
    assert_eq!(report["sources"][1]["kept"], 1);
}

#[test]
fn test_merge_missing_list_fails() {
    let temp = TempDir::new().unwrap();
    let out = temp.path().join("merged.sqlite");

    cmd()
        .args(["merge", "--input-list"])
        .arg(temp.path().join("absent.txt"))
        .arg("--output")
        .arg(&out)
        .assert()
        .failure()
        .stderr(predicate::str::contains("input list file does not exist"));

    assert!(!out.exists());
}

#[test]
fn test_merge_relative_entry_fails() {
    let temp = TempDir::new().unwrap();
    let list = temp.path().join("inputs.txt");
    fs::write(&list, "relative/QTS1.sqlite\n").unwrap();

    cmd()
        .args(["merge", "--input-list"])
        .arg(&list)
        .arg("--output")
        .arg(temp.path().join("merged.sqlite"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("expected absolute path"));
}

#[test]
fn test_extract_duplicates() {
    let temp = TempDir::new().unwrap();
    let data = setup(temp.path());
    let list = temp.path().join("inputs.txt");
    fs::write(
        &list,
        format!(
            "{}\n{}\n",
            data.join("study1/ds1/QTS000001.sqlite").display(),
            data.join("study2/ds2/QTS000002.sqlite").display()
        ),
    )
    .unwrap();

    let out_dir = temp.path().join("dups");
    cmd()
        .args(["extract-duplicates", "--input-list"])
        .arg(&list)
        .arg("--output-dir")
        .arg(&out_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Total duplicate rows written across outputs: 2",
        ));

    let first = SourceReader::open(out_dir.join("01_study1__ds1__duplicates.sqlite")).unwrap();
    let ids: Vec<i64> = first.read_all().unwrap().iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![2, 3]);

    let second = SourceReader::open(out_dir.join("02_study2__ds2__duplicates.sqlite")).unwrap();
    assert_eq!(second.row_count().unwrap(), 0);
}

#[test]
fn test_export_csv() {
    let temp = TempDir::new().unwrap();
    let data = setup(temp.path());
    let out = temp.path().join("rows.csv");

    cmd()
        .args(["export", "--input"])
        .arg(data.join("study1/ds1/QTS000001.sqlite"))
        .arg("--output")
        .arg(&out)
        .args(["--limit", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported 2 rows"));

    let text = fs::read_to_string(&out).unwrap();
    assert_eq!(text.lines().count(), 3);
    assert!(text.starts_with("id,study_id,"));
}

#[test]
fn test_export_unknown_format() {
    let temp = TempDir::new().unwrap();
    let data = setup(temp.path());

    cmd()
        .args(["export", "--format", "xml", "--input"])
        .arg(data.join("study1/ds1/QTS000001.sqlite"))
        .arg("--output")
        .arg(temp.path().join("rows.xml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown export format 'xml'"));
}
