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

//! X-ray scanner log dialect.
//!
//! `2024-03-12 10:00:01.123 [CT-01] BagCreated bag=0123456 iata=131`

use super::event::{Identifier, NormalizedEvent, Source};
use super::rules::{group, identifier, Classified, Rule, RuleTable};
use super::LineNormalizer;
use chrono::NaiveDateTime;
use fancy_regex::Regex;
use std::sync::LazyLock;

static SCANNER_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<ts>\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}(?:\.\d{1,6})?)\s+\[(?P<device>[^\]]*)\]\s+(?P<body>.*)$",
    )
    .expect("valid regex literal")
});

const BAG: &str = r".*?\bbag=(?P<bag>\S*)";
const IATA: &str = r"(?:.*?\biata=(?P<iata>\S*))?";
const RESULT: &str = r".*?\bresult=(?P<result>\w+)";

static RULES: LazyLock<RuleTable> = LazyLock::new(|| {
    RuleTable::new(vec![
        Rule::new(&format!(r"^BagCreated\b{BAG}{IATA}"), |caps| {
            Some(Classified::new(
                identifier(caps, "bag"),
                identifier(caps, "iata"),
                format!(
                    "[Scanner] Gepäckstück {} angelegt",
                    identifier(caps, "bag")
                ),
            ))
        }),
        Rule::new(&format!(r"^ImageAcquired\b{BAG}{IATA}"), |caps| {
            Some(Classified::new(
                identifier(caps, "bag"),
                identifier(caps, "iata"),
                "[Scanner] Bild aufgenommen".to_string(),
            ))
        }),
        Rule::new(&format!(r"^MachineDecision\b{BAG}{RESULT}"), |caps| {
            Some(Classified::new(
                identifier(caps, "bag"),
                Identifier::Absent,
                format!(
                    "[Scanner] Maschinelle Entscheidung: {}",
                    group(caps, "result").to_ascii_uppercase()
                ),
            ))
        }),
        Rule::new(
            &format!(r"^OperatorDecision\b{BAG}.*?\buser=(?P<user>[^\s']+){RESULT}"),
            |caps| {
                Some(Classified::new(
                    identifier(caps, "bag"),
                    Identifier::Absent,
                    format!(
                        "[Scanner] Finale Operator-Entscheidung von '{}': **{}**",
                        group(caps, "user"),
                        group(caps, "result").to_ascii_uppercase()
                    ),
                ))
            },
        ),
        Rule::new(&format!(r"^BagExit\b{BAG}{IATA}"), |caps| {
            Some(Classified::new(
                identifier(caps, "bag"),
                identifier(caps, "iata"),
                "[Scanner] Gepäckstück verlässt Scanner".to_string(),
            ))
        }),
        Rule::new(&format!(r"^Timeout\b{BAG}"), |caps| {
            Some(Classified::new(
                identifier(caps, "bag"),
                Identifier::Absent,
                "[Scanner] Zeitüberschreitung bei Operator-Entscheidung".to_string(),
            ))
        }),
    ])
});

/// Check if a line is written in the scanner dialect and carries journey information
pub fn is_scanner_line(line: &str) -> bool {
    split_line(line).is_some_and(|(_, _, body)| RULES.recognizes(body))
}

fn split_line(line: &str) -> Option<(&str, &str, &str)> {
    let caps = SCANNER_LINE.captures(line).ok()??;
    Some((
        caps.name("ts")?.as_str(),
        caps.name("device")?.as_str(),
        caps.name("body")?.as_str(),
    ))
}

fn parse_scanner_timestamp(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").ok()
}

pub struct ScannerNormalizer {
    device: Option<String>,
}

impl ScannerNormalizer {
    pub const fn new(device: Option<String>) -> Self {
        Self { device }
    }
}

impl LineNormalizer for ScannerNormalizer {
    fn normalize_line(&mut self, raw: &str, line_number: usize) -> Option<NormalizedEvent> {
        let (ts, device, body) = split_line(raw)?;
        let timestamp = parse_scanner_timestamp(ts)?;
        let classified = RULES.classify(body)?;

        // The bracketed device name is more specific than the file name
        let device = if device.trim().is_empty() {
            self.device.clone()
        } else {
            Some(device.trim().to_string())
        };

        Some(
            NormalizedEvent::new(
                timestamp,
                classified.bag_id,
                classified.tray_id,
                classified.free_text,
                Source::Scanner,
                raw.to_string(),
                line_number,
            )
            .with_device(device),
        )
    }
}
