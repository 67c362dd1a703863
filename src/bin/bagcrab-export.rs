// BagCrab - GPL-3.0-or-later
// This file is part of BagCrab.
//
// Copyright (C) 2026 Daniel Freiermuth
//
// BagCrab is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// BagCrab is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with BagCrab.  If not, see <https://www.gnu.org/licenses/>.

use anyhow::{bail, Context};
use bagcrab::export::{write_events_tsv, write_journeys_tsv, write_json};
use bagcrab::{consolidate, AnalysisConfig, LogFileLoader, LogFormat};
use clap::Parser;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "bagcrab-export")]
#[command(author = "Daniel Freiermuth")]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ")"))]
#[command(about = "Write the journey and event tables of a set of logs to disk", long_about = None)]
struct Args {
    /// Log files to analyze
    #[arg(value_name = "FILE", required = true)]
    files: Vec<PathBuf>,

    /// Directory receiving journeys.* and events.*
    #[arg(long, value_name = "DIR")]
    out_dir: PathBuf,

    /// Write JSON instead of tab separated text
    #[arg(long)]
    json: bool,

    /// Read thresholds from this file instead of the user config
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Treat every file as this dialect (scanner, oms or plc)
    #[arg(long, value_name = "FORMAT")]
    format: Option<LogFormat>,
}

fn create(path: &Path) -> anyhow::Result<BufWriter<File>> {
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    Ok(BufWriter::new(file))
}

fn report_progress(percent: u8, message: &str) {
    tracing::debug!("{percent:>3}% {message}");
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = args
        .config
        .as_deref()
        .map_or_else(AnalysisConfig::load, AnalysisConfig::load_from);

    let report = LogFileLoader::new()
        .with_format(args.format)
        .load_files(&args.files, &report_progress);
    if report.loaded.is_empty() {
        bail!("None of the {} files could be loaded", args.files.len());
    }
    for failure in &report.failures {
        tracing::warn!("Not exported: {failure}");
    }

    let result = consolidate(report.events, &config.segmentation());
    let summaries = result.summaries();
    let rows = result.event_rows();

    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("Failed to create {}", args.out_dir.display()))?;
    let extension = if args.json { "json" } else { "tsv" };
    let journeys_path = args.out_dir.join(format!("journeys.{extension}"));
    let events_path = args.out_dir.join(format!("events.{extension}"));

    let mut journeys_out = create(&journeys_path)?;
    let mut events_out = create(&events_path)?;
    if args.json {
        write_json(&mut journeys_out, &summaries)?;
        write_json(&mut events_out, &rows)?;
    } else {
        write_journeys_tsv(&mut journeys_out, &summaries)?;
        write_events_tsv(&mut events_out, &rows)?;
    }
    journeys_out.flush()?;
    events_out.flush()?;

    tracing::info!(
        "Exported {} journeys to {} and {} events to {}",
        summaries.len(),
        journeys_path.display(),
        rows.len(),
        events_path.display()
    );
    Ok(())
}
