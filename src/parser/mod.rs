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

pub mod event;
pub mod oms;
pub mod plc;
pub mod rules;
pub mod scanner;

pub use event::{Identifier, NormalizedEvent, Source};

use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// How many non-empty lines are sampled when the file name is inconclusive
const DETECTION_SAMPLE_LINES: usize = 200;

/// Translates the lines of one file into normalized events.
///
/// Implementations may keep running state, but only for the file they were
/// created for.
pub trait LineNormalizer: Send {
    /// `None` for noise, malformed lines and anything not part of a journey
    fn normalize_line(&mut self, raw: &str, line_number: usize) -> Option<NormalizedEvent>;
}

/// Log dialect of an equipment log file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogFormat {
    /// X-ray scanner log (`*.scn`)
    Scanner,
    /// Operations management system log (`*.oms`)
    Oms,
    /// Conveyor controller log (`*.plc`)
    Plc,
}

impl LogFormat {
    pub const ALL: [Self; 3] = [Self::Scanner, Self::Oms, Self::Plc];

    pub const fn source(self) -> Source {
        match self {
            Self::Scanner => Source::Scanner,
            Self::Oms => Source::Oms,
            Self::Plc => Source::Plc,
        }
    }

    const fn extension(self) -> &'static str {
        match self {
            Self::Scanner => "scn",
            Self::Oms => "oms",
            Self::Plc => "plc",
        }
    }

    const fn name_hint(self) -> &'static str {
        match self {
            Self::Scanner => "scanner",
            Self::Oms => "oms",
            Self::Plc => "plc",
        }
    }

    /// Identify the dialect from the file name convention alone
    pub fn from_path(path: &Path) -> Option<Self> {
        if let Some(ext) = path.extension().and_then(|ext| ext.to_str()) {
            if let Some(format) = Self::ALL
                .into_iter()
                .find(|format| ext.eq_ignore_ascii_case(format.extension()))
            {
                return Some(format);
            }
        }

        let name = path.file_name()?.to_string_lossy().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|format| name.contains(format.name_hint()))
    }

    /// Whether the line is a journey-relevant line of this dialect
    pub fn recognizes(self, line: &str) -> bool {
        match self {
            Self::Scanner => scanner::is_scanner_line(line),
            Self::Oms => oms::is_oms_line(line),
            Self::Plc => plc::is_plc_line(line),
        }
    }

    /// Fresh normalizer with empty per-file state
    pub fn normalizer(self, device: Option<String>) -> Box<dyn LineNormalizer> {
        match self {
            Self::Scanner => Box::new(scanner::ScannerNormalizer::new(device)),
            Self::Oms => Box::new(oms::OmsNormalizer::new(device)),
            Self::Plc => Box::new(plc::PlcNormalizer::new(device)),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name_hint())
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|format| s.eq_ignore_ascii_case(format.name_hint()))
            .ok_or_else(|| format!("unknown log format '{s}' (expected scanner, oms or plc)"))
    }
}

/// Detect the dialect of a file.
///
/// The file name convention wins. Otherwise the first lines are sampled and the
/// dialect that recognizes the most of them is chosen.
pub fn detect_format(path: &Path, content: &str) -> Option<LogFormat> {
    if let Some(format) = LogFormat::from_path(path) {
        tracing::debug!("Detected {format} format from file name {}", path.display());
        return Some(format);
    }

    let mut hits = [0usize; LogFormat::ALL.len()];
    for line in content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .take(DETECTION_SAMPLE_LINES)
    {
        for (count, format) in hits.iter_mut().zip(LogFormat::ALL) {
            if format.recognizes(line) {
                *count += 1;
            }
        }
    }

    let (best, count) = LogFormat::ALL
        .into_iter()
        .zip(hits)
        .max_by_key(|&(_, count)| count)?;

    if count == 0 {
        tracing::info!("No known dialect recognized in {}", path.display());
        return None;
    }
    tracing::info!(
        "Detected {best} format in {} from {count} sampled lines",
        path.display()
    );
    Some(best)
}

/// Per-file normalization run.
///
/// Feeds raw lines through a dialect normalizer and drops consecutive
/// duplicates of the same (timestamp, identifiers, text).
pub struct Normalization {
    normalizer: Box<dyn LineNormalizer>,
    events: Vec<NormalizedEvent>,
    line_number: usize,
    duplicates: usize,
}

impl Normalization {
    pub fn new(format: LogFormat, device: Option<String>) -> Self {
        Self {
            normalizer: format.normalizer(device),
            events: Vec::new(),
            line_number: 0,
            duplicates: 0,
        }
    }

    /// Process the next raw line of the file
    pub fn feed(&mut self, raw: &str) {
        self.line_number += 1;
        let raw = raw.trim_end_matches('\r');
        if raw.trim().is_empty() {
            return;
        }
        let Some(event) = self.normalizer.normalize_line(raw, self.line_number) else {
            return;
        };
        // Cannot be attributed to any journey
        if event.is_unattributed() {
            tracing::trace!("Dropping unattributed line {}: {raw}", self.line_number);
            return;
        }
        if self
            .events
            .last()
            .is_some_and(|last| last.dedup_key() == event.dedup_key())
        {
            self.duplicates += 1;
            return;
        }
        self.events.push(event);
    }

    pub const fn lines_seen(&self) -> usize {
        self.line_number
    }

    pub fn events_len(&self) -> usize {
        self.events.len()
    }

    pub fn finish(self) -> Vec<NormalizedEvent> {
        if self.duplicates > 0 {
            tracing::debug!(
                "Suppressed {} consecutive duplicate events",
                self.duplicates
            );
        }
        self.events
    }
}

/// Normalize a whole file's content in one go
pub fn parse_content(
    content: &str,
    format: LogFormat,
    device: Option<String>,
) -> Vec<NormalizedEvent> {
    let mut normalization = Normalization::new(format, device);
    for line in content.lines() {
        normalization.feed(line);
    }
    normalization.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            LogFormat::from_path(&PathBuf::from("/logs/lane1.PLC")),
            Some(LogFormat::Plc)
        );
        assert_eq!(
            LogFormat::from_path(&PathBuf::from("day.scn")),
            Some(LogFormat::Scanner)
        );
        assert_eq!(
            LogFormat::from_path(&PathBuf::from("OMS_2024-03-12.log")),
            Some(LogFormat::Oms)
        );
        assert_eq!(LogFormat::from_path(&PathBuf::from("export.log")), None);
    }

    #[test]
    fn test_detect_format_by_sampling() {
        let content = "\
some header
12.03.2024 10:00:06,120;Wanne 131 erkannt
12.03.2024 10:00:07,000;Motor ok
12.03.2024 10:00:08,000;Wanne 131 ausgeschleust
";
        assert_eq!(
            detect_format(&PathBuf::from("export.log"), content),
            Some(LogFormat::Plc)
        );
        assert_eq!(detect_format(&PathBuf::from("export.log"), "nothing"), None);
    }

    #[test]
    fn test_consecutive_duplicates_are_suppressed() {
        let content = "\
2024-03-12 10:00:01.000 [CT-01] BagCreated bag=1 iata=5
2024-03-12 10:00:01.000 [CT-01] BagCreated bag=1 iata=5
2024-03-12 10:00:02.000 [CT-01] ImageAcquired bag=1
2024-03-12 10:00:01.000 [CT-01] BagCreated bag=1 iata=5
";
        let events = parse_content(content, LogFormat::Scanner, None);
        // Only the directly repeated line is dropped
        assert_eq!(events.len(), 3);
        assert_eq!(events[1].line_number, 3);
    }

    #[test]
    fn test_line_numbers_count_skipped_lines() {
        let content = "\r\n\
2024-03-12 10:00:01.000 [CT-01] Heartbeat\r\n\
2024-03-12 10:00:01.000 [CT-01] BagCreated bag=1\r\n";
        let events = parse_content(content, LogFormat::Scanner, None);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].line_number, 3);
        assert!(!events[0].original_line.ends_with('\r'));
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("PLC".parse::<LogFormat>(), Ok(LogFormat::Plc));
        assert!("dlt".parse::<LogFormat>().is_err());
    }
}
