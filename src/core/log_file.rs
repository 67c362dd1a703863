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

use crate::core::error::LoadError;
use crate::parser::{detect_format, LogFormat, Normalization, NormalizedEvent};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Progress reporting: percentage of the file processed and a status message.
///
/// Called from the thread that parses the file.
pub type ProgressCallback<'a> = dyn Fn(u8, &str) + Send + Sync + 'a;

/// Report progress (and check for cancellation) every this many lines
const PROGRESS_INTERVAL_LINES: usize = 500;

/// Events of all files that loaded, plus the reasons the others did not
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Events of every successfully loaded file, sorted by timestamp
    pub events: Vec<NormalizedEvent>,
    /// Files that loaded, with their event counts, in request order
    pub loaded: Vec<(PathBuf, usize)>,
    pub failures: Vec<LoadError>,
}

impl LoadReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Reads equipment log files and normalizes them into events.
///
/// A file either contributes all of its events or none: I/O errors,
/// unrecognized formats and cancellation discard the whole file.
#[derive(Debug, Default, Clone)]
pub struct LogFileLoader {
    format: Option<LogFormat>,
    cancel: Option<Arc<AtomicBool>>,
}

impl LogFileLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Force a dialect instead of detecting it per file
    #[must_use]
    pub const fn with_format(mut self, format: Option<LogFormat>) -> Self {
        self.format = format;
        self
    }

    /// Abort reading when the flag becomes `true`
    #[must_use]
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Load and normalize a single file
    pub fn load_file(
        &self,
        path: &Path,
        progress: &ProgressCallback<'_>,
    ) -> Result<Vec<NormalizedEvent>, LoadError> {
        profiling::scope!("LogFileLoader::load_file");
        let start_time = Instant::now();
        tracing::debug!("Starting to load {}", path.display());

        if self.is_cancelled() {
            return Err(LoadError::Cancelled {
                path: path.to_path_buf(),
            });
        }

        let buffer = std::fs::read(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(
            "Read {} bytes from {} in {:?}",
            buffer.len(),
            path.display(),
            start_time.elapsed()
        );

        let content = decode_permissive(&buffer);
        let format = match self.format {
            Some(format) => format,
            None => detect_format(path, &content).ok_or_else(|| LoadError::UnknownFormat {
                path: path.to_path_buf(),
            })?,
        };

        let device = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned());
        let mut normalization = Normalization::new(format, device);

        let total_bytes = content.len().max(1);
        let mut bytes_read = 0usize;
        progress(0, &format!("Loading {}...", path.display()));

        for line in content.lines() {
            bytes_read += line.len() + 1; // +1 for newline
            normalization.feed(line);

            if normalization.lines_seen() % PROGRESS_INTERVAL_LINES == 0 {
                if self.is_cancelled() {
                    tracing::info!("Cancelled loading {}", path.display());
                    return Err(LoadError::Cancelled {
                        path: path.to_path_buf(),
                    });
                }
                let percent = (bytes_read * 100 / total_bytes).min(99) as u8;
                progress(
                    percent,
                    &format!(
                        "Loading {}... ({} events)",
                        path.display(),
                        normalization.events_len()
                    ),
                );
            }
        }

        let lines_seen = normalization.lines_seen();
        let events = normalization.finish();
        progress(
            100,
            &format!("Loaded {} ({} events)", path.display(), events.len()),
        );
        tracing::info!(
            "Parsed {} events from {} lines of {} ({format}) in {:?}",
            events.len(),
            lines_seen,
            path.display(),
            start_time.elapsed()
        );
        Ok(events)
    }

    /// Load several files in parallel, one task per file.
    ///
    /// Events of all successful files are concatenated and sorted by timestamp.
    pub fn load_files(&self, paths: &[PathBuf], progress: &ProgressCallback<'_>) -> LoadReport {
        profiling::scope!("LogFileLoader::load_files");
        let results: Vec<_> = paths
            .par_iter()
            .map(|path| (path.clone(), self.load_file(path, progress)))
            .collect();

        let mut report = LoadReport::default();
        for (path, result) in results {
            match result {
                Ok(events) => {
                    report.loaded.push((path, events.len()));
                    report.events.extend(events);
                }
                Err(e) => {
                    tracing::warn!("Skipping file: {e}");
                    report.failures.push(e);
                }
            }
        }

        report.events.par_sort_by_key(|event| event.timestamp);
        report
    }
}

/// Decode bytes as UTF-8, dropping invalid sequences instead of failing
pub fn decode_permissive(bytes: &[u8]) -> String {
    let mut content = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        content.push_str(chunk.valid());
    }
    content
}
