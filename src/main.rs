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
use bagcrab::export::{format_journey_table, write_events_tsv};
use bagcrab::journey::{EventRow, JourneySummary};
use bagcrab::{consolidate, AnalysisConfig, LogFileLoader, LogFormat};
use clap::Parser;
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "bagcrab")]
#[command(author = "Daniel Freiermuth")]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ")"))]
#[command(about = "Reconstruct bag journeys from scanner, OMS and PLC logs", long_about = None)]
struct Args {
    /// Log files to analyze
    #[arg(value_name = "FILE", required = true)]
    files: Vec<PathBuf>,

    /// Pause in seconds that ends a scanner/OMS journey
    #[arg(long, value_name = "SECS")]
    primary_gap: Option<u32>,

    /// Pause in seconds that ends a conveyor journey
    #[arg(long, value_name = "SECS")]
    plc_gap: Option<u32>,

    /// Read thresholds from this file instead of the user config
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Treat every file as this dialect (scanner, oms or plc)
    #[arg(long, value_name = "FORMAT")]
    format: Option<LogFormat>,

    /// Print JSON instead of a table
    #[arg(long)]
    json: bool,

    /// Also print the annotated event table
    #[arg(long)]
    events: bool,

    /// Fail if any file could not be loaded
    #[arg(long)]
    strict: bool,

    /// Store the effective thresholds in the user config
    #[arg(long)]
    save_config: bool,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    journeys: &'a [JourneySummary],
    #[serde(skip_serializing_if = "Option::is_none")]
    events: Option<Vec<EventRow<'a>>>,
}

fn report_progress(percent: u8, message: &str) {
    tracing::debug!("{percent:>3}% {message}");
}

fn main() -> anyhow::Result<()> {
    // Set RUST_LOG to override (e.g., RUST_LOG=debug)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    tracing::info!(
        "BagCrab starting up (version {}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH")
    );

    let config = args
        .config
        .as_deref()
        .map_or_else(AnalysisConfig::load, AnalysisConfig::load_from)
        .with_overrides(args.primary_gap, args.plc_gap);
    if args.save_config {
        config.save().map_err(anyhow::Error::msg)?;
    }

    let report = LogFileLoader::new()
        .with_format(args.format)
        .load_files(&args.files, &report_progress);
    for failure in &report.failures {
        eprintln!("warning: {failure}");
    }
    if args.strict && !report.is_complete() {
        bail!(
            "{} of {} files could not be loaded",
            report.failures.len(),
            args.files.len()
        );
    }

    let result = consolidate(report.events, &config.segmentation());
    let summaries = result.summaries();

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if args.json {
        let report = JsonReport {
            journeys: &summaries,
            events: args.events.then(|| result.event_rows()),
        };
        serde_json::to_writer_pretty(&mut out, &report).context("Failed to write JSON")?;
        writeln!(out)?;
    } else {
        out.write_all(format_journey_table(&summaries).as_bytes())
            .context("Failed to write journey table")?;
        if args.events {
            writeln!(out)?;
            write_events_tsv(&mut out, &result.event_rows())
                .context("Failed to write event table")?;
        }
    }
    out.flush()?;

    Ok(())
}
