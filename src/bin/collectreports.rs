//! Commandline utility to collect the measurements of many sessions into one report.
//!
//! Every session file matching the pattern is opened on its own volume and
//! one CSV row is appended per measured nodule.

use clap::Parser;
use glob::glob;
use log::{info, warn, LevelFilter};
use simple_logger::SimpleLogger;
use std::path::{Path, PathBuf};

use lesionaxes::report;
use lesionaxes::session::Session;

// use clap to create commandline interface
#[derive(Parser, Debug)]
#[command(author, about, version, long_about)]
struct Args {
    /// a glob pattern selecting the session files, e.g. "cases/*/lesion_session.json"
    #[arg(short, long)]
    pattern: String,

    /// the CSV report the rows are appended to
    #[arg(short, long, default_value = "lesion_report.csv")]
    out: PathBuf,

    /// keep going when a session cannot be opened
    #[arg(short, long)]
    keep_going: bool,
}

/// Collects the session paths matching `pattern`, sorted by path.
fn session_paths(pattern: &str) -> Vec<PathBuf> {
    let mut paths: Vec<_> = glob(pattern)
        .unwrap_or_else(|e| {
            eprintln!("Error! {}", e);
            std::process::exit(-2);
        })
        .filter_map(Result::ok)
        .collect();
    paths.sort();
    paths
}

fn collect(path: &Path) -> lesionaxes::Result<Vec<report::ReportRow>> {
    let session = Session::load(path)?;
    let (scene, volume) = session.open_scene(path)?;
    report::rows_for_volume(&scene, volume, None)
}

fn main() {
    let cli = Args::parse();
    SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .init()
        .unwrap_or_else(|e| {
            eprintln!("Error! {}", e);
            std::process::exit(-2);
        });

    let paths = session_paths(&cli.pattern);
    if paths.is_empty() {
        eprintln!("Error! Did not find any session files matching the pattern.");
        std::process::exit(-2);
    }

    let mut rows = Vec::new();
    for path in &paths {
        info!("Loading: {}", path.display());
        match collect(path) {
            Ok(mut session_rows) => rows.append(&mut session_rows),
            Err(e) if cli.keep_going => warn!("Skipping {}: {}", path.display(), e),
            Err(e) => {
                eprintln!("Error! {}: {}", path.display(), e);
                std::process::exit(-2);
            }
        }
    }

    report::append_rows(&cli.out, &rows).unwrap_or_else(|e| {
        eprintln!("Error! {}", e);
        std::process::exit(-2);
    });
    println!(
        "Saved {} nodule(s) from {} session(s) to {}",
        rows.len(),
        paths.len(),
        cli.out.display()
    );
}
