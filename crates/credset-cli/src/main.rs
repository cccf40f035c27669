//! credset CLI
//!
//! Command-line tool for merging credible-set SQLite tables and auditing
//! their duplicate rows.

use clap::{Parser, Subcommand};
use credset_core::{
    discover_sources, export_store, extract_all, merge_sources, read_source_list,
    write_source_list, ExportFormat, ExtractionReport, MergeReport,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "credset")]
#[command(about = "Merge and audit credible-set SQLite tables", long_about = None)]
#[command(version)]
struct Cli {
    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recursively list QTS*.sqlite files into a list file
    Discover {
        /// Directory to scan
        #[arg(long)]
        input_dir: PathBuf,

        /// List file to write (one absolute path per line)
        #[arg(long)]
        output_list: PathBuf,
    },

    /// Merge the listed sources into one deduplicated SQLite file
    Merge {
        /// Text file with one absolute SQLite path per line
        #[arg(long)]
        input_list: PathBuf,

        /// Path to the merged output SQLite file
        #[arg(short, long)]
        output: PathBuf,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write the duplicated rows of each listed source to its own SQLite file
    ExtractDuplicates {
        /// Text file with one absolute SQLite path per line
        #[arg(long)]
        input_list: PathBuf,

        /// Directory for the per-source duplicate files
        #[arg(long)]
        output_dir: PathBuf,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Export a credible-set SQLite file to CSV or JSON
    Export {
        /// SQLite file to read
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Output format (csv or json)
        #[arg(long, default_value = "csv")]
        format: String,

        /// Maximum number of rows to export
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli.command) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(command: Commands) -> credset_core::Result<()> {
    match command {
        Commands::Discover {
            input_dir,
            output_list,
        } => cmd_discover(&input_dir, &output_list),
        Commands::Merge {
            input_list,
            output,
            json,
        } => cmd_merge(&input_list, &output, json),
        Commands::ExtractDuplicates {
            input_list,
            output_dir,
            json,
        } => cmd_extract(&input_list, &output_dir, json),
        Commands::Export {
            input,
            output,
            format,
            limit,
        } => cmd_export(&input, &output, &format, limit),
    }
}

fn cmd_discover(input_dir: &Path, output_list: &Path) -> credset_core::Result<()> {
    let matched = discover_sources(input_dir)?;
    write_source_list(&matched, output_list)?;

    println!("Input directory: {}", input_dir.display());
    println!("Matched files: {}", matched.len());
    println!("Wrote list file: {}", output_list.display());

    Ok(())
}

fn cmd_merge(input_list: &Path, output: &Path, json: bool) -> credset_core::Result<()> {
    let sources = read_source_list(input_list)?;
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let report = merge_sources(&sources, output)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_merge_report(&report);
    }

    Ok(())
}

fn print_merge_report(report: &MergeReport) {
    println!("Merged output: {}", report.output.display());
    println!("Input files: {}", report.sources.len());
    for source in &report.sources {
        println!(
            "  {} (rows={}, kept={})",
            source.path.display(),
            source.rows,
            source.kept
        );
    }
    println!("Total input rows: {}", report.total_input_rows);
    println!("Merged rows: {}", report.merged_rows);
    println!("Duplicate rows removed: {}", report.duplicate_rows_removed);
}

fn cmd_extract(input_list: &Path, output_dir: &Path, json: bool) -> credset_core::Result<()> {
    let sources = read_source_list(input_list)?;
    let report = extract_all(&sources, output_dir)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_extraction_report(&report);
    }

    Ok(())
}

fn print_extraction_report(report: &ExtractionReport) {
    println!("Output directory: {}", report.output_dir.display());
    let total = report.outputs.len();
    for (i, output) in report.outputs.iter().enumerate() {
        println!(
            "[{}/{}] {} -> {} (rows={})",
            i + 1,
            total,
            output.source.display(),
            output.output.display(),
            output.rows
        );
    }
    println!(
        "Total duplicate rows written across outputs: {}",
        report.total_rows
    );
}

fn cmd_export(
    input: &Path,
    output: &Path,
    format: &str,
    limit: Option<usize>,
) -> credset_core::Result<()> {
    let format: ExportFormat = format.parse()?;
    let written = export_store(input, output, format, limit)?;

    println!("Exported {} rows to {}", written, output.display());

    Ok(())
}
