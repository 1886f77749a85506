//! SplitScan Command-Line Scanner
//!
//! Loads a table fixture into an in-memory store and scans it split by
//! split, the way an execution host drives the scan engine.
//!
//! # Usage
//!
//! ```bash
//! # Scan every column of the fixture's table
//! splitscan --data orders.json
//!
//! # Pin a snapshot and parse a field with a pattern
//! splitscan --data orders.json \
//!     -P snapshot-timestamp=2021-05-01T00:00:00Z \
//!     -P timestamp-format.created_at=yyyy/MM/dd
//!
//! # Project columns 2 and 0, stop after 10 rows, print JSON
//! splitscan --data orders.json --project 2,0 --limit 10 -o json
//!
//! # Scan with four worker instances
//! splitscan --data orders.json --workers 4
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use splitscan_common::constants::{DATABASE_NAME_KEY, TABLE_NAME_KEY};
use splitscan_core::ScanEngine;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod fixture;
mod formatter;
mod scan;

use fixture::Fixture;
use formatter::OutputFormat;

/// SplitScan command-line scanner
#[derive(Parser, Debug)]
#[command(
    name = "splitscan",
    author = "SplitScan Team",
    version,
    about = "Scan a table fixture split by split",
    long_about = "Loads a JSON table fixture into an in-memory multi-version store and runs a\n\
                  bounded, splittable scan over it.\n\n\
                  Scan properties (database-name, table-name, snapshot-timestamp,\n\
                  timestamp-format.<field>) can be given with -P or a properties file."
)]
struct Args {
    /// Table fixture (JSON)
    #[arg(short = 'd', long, value_name = "FILE", env = "SPLITSCAN_DATA")]
    data: PathBuf,

    /// Scan property as key=value (repeatable)
    #[arg(short = 'P', long = "property", value_name = "KEY=VALUE", value_parser = parse_property)]
    properties: Vec<(String, String)>,

    /// JSON object of scan properties; -P flags override it
    #[arg(long, value_name = "FILE")]
    properties_file: Option<PathBuf>,

    /// Maximum number of rows
    #[arg(short = 'l', long)]
    limit: Option<u64>,

    /// Comma-separated column ordinals to project, e.g. 2,0
    #[arg(long, value_name = "ORDINALS", value_delimiter = ',')]
    project: Option<Vec<usize>>,

    /// Number of worker instances
    #[arg(short = 'w', long, default_value_t = 1)]
    workers: usize,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "table")]
    output: OutputFormat,

    /// Enable verbose logging
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "warn", env = "SPLITSCAN_LOG_LEVEL")]
    log_level: String,
}

fn main() -> ExitCode {
    let args = Args::parse();

    init_logging(&args);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(args: &Args) {
    let level = if args.verbose {
        "debug"
    } else {
        &args.log_level
    };

    let filter = EnvFilter::try_new(format!(
        "splitscan={level},splitscan_core={level},splitscan_store={level}"
    ))
    .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

fn run(args: &Args) -> Result<()> {
    let fixture = Fixture::from_file(&args.data)?;
    let properties = load_properties(args, &fixture)?;
    let store = fixture.into_store()?;

    let mut engine =
        ScanEngine::from_properties(store, properties).context("Failed to plan scan")?;
    if let Some(limit) = args.limit {
        engine.set_limit(limit)?;
    }
    if let Some(project) = &args.project {
        let fields: Vec<Vec<usize>> = project.iter().map(|&ordinal| vec![ordinal]).collect();
        engine.set_projected_fields(&fields)?;
    }
    info!(table = %engine.plan().table(), splits = engine.splits().len(), "Scan planned");

    let output = scan::run(&engine, args.workers)?;
    println!(
        "{}",
        formatter::format_rows(&output.fields, &output.rows, args.output)
    );
    engine.close();
    Ok(())
}

/// Merges the properties file, the fixture's table and the -P flags.
fn load_properties(args: &Args, fixture: &Fixture) -> Result<BTreeMap<String, String>> {
    let mut properties = match &args.properties_file {
        Some(path) => read_properties(path)?,
        None => BTreeMap::new(),
    };
    properties
        .entry(DATABASE_NAME_KEY.to_string())
        .or_insert_with(|| fixture.database.clone());
    properties
        .entry(TABLE_NAME_KEY.to_string())
        .or_insert_with(|| fixture.table.clone());
    properties.extend(args.properties.iter().cloned());
    Ok(properties)
}

fn read_properties(path: &Path) -> Result<BTreeMap<String, String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read properties {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse properties {}", path.display()))
}

fn parse_property(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got {:?}", s))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in {:?}", s));
    }
    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn fixture() -> Fixture {
        serde_json::from_str(
            r#"{
                "database": "shop",
                "table": "orders",
                "columns": [{ "name": "id", "type": "INT" }],
                "rows": [[1]]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_parse_property() {
        assert_eq!(
            parse_property("timestamp-format.created_at=yyyy/MM/dd").unwrap(),
            ("timestamp-format.created_at".to_string(), "yyyy/MM/dd".to_string())
        );
        assert_eq!(
            parse_property("a=b=c").unwrap(),
            ("a".to_string(), "b=c".to_string())
        );
        assert!(parse_property("novalue").is_err());
        assert!(parse_property("=x").is_err());
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "splitscan",
            "--data",
            "t.json",
            "-P",
            "snapshot-timestamp=2021-05-01T00:00:00Z",
            "--project",
            "2,0",
            "--limit",
            "5",
            "-o",
            "csv",
        ])
        .unwrap();
        assert_eq!(args.project, Some(vec![2, 0]));
        assert_eq!(args.limit, Some(5));
        assert_eq!(args.output, OutputFormat::Csv);
        assert_eq!(args.properties.len(), 1);
    }

    #[test]
    fn test_properties_precedence() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"{"table-name": "from_file", "snapshot-timestamp": "2021-05-01T00:00:00Z"}"#)
            .unwrap();

        let args = Args::try_parse_from([
            "splitscan",
            "--data",
            "t.json",
            "--properties-file",
            file.path().to_str().unwrap(),
            "-P",
            "snapshot-timestamp=2022-01-01T00:00:00Z",
        ])
        .unwrap();
        let properties = load_properties(&args, &fixture()).unwrap();

        assert_eq!(properties["database-name"], "shop");
        assert_eq!(properties["table-name"], "from_file");
        assert_eq!(properties["snapshot-timestamp"], "2022-01-01T00:00:00Z");
    }

    #[test]
    fn test_run_end_to_end() {
        let mut data = tempfile::NamedTempFile::new().unwrap();
        data.write_all(
            br#"{
                "database": "shop",
                "table": "orders",
                "rows_per_region": 1,
                "columns": [
                    { "name": "id", "type": "BIGINT" },
                    { "name": "day", "type": "DATE" }
                ],
                "rows": [[1, "2021-05-01"], [2, "2021-05-02"], [3, null]]
            }"#,
        )
        .unwrap();

        let args = Args::try_parse_from([
            "splitscan",
            "--data",
            data.path().to_str().unwrap(),
            "--project",
            "1,0",
            "--workers",
            "2",
            "-o",
            "json",
        ])
        .unwrap();
        assert!(run(&args).is_ok());

        let bad = Args::try_parse_from([
            "splitscan",
            "--data",
            data.path().to_str().unwrap(),
            "-P",
            "table-name=missing",
        ])
        .unwrap();
        let err = run(&bad).unwrap_err();
        assert!(format!("{:#}", err).contains("not found"));
    }
}
