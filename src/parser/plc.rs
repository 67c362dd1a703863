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

//! PLC / conveyor controller log dialect.
//!
//! `12.03.2024 10:00:06,120;Wanne 131 erkannt`
//!
//! The controller only names the tray when it enters or leaves the tracked
//! section. Diverter commands in between are attributed to the tray whose
//! bracket was opened most recently and is still open.

use super::event::{Identifier, NormalizedEvent, Source};
use super::rules::{group, identifier, Classified, Rule, RuleTable};
use super::LineNormalizer;
use chrono::NaiveDateTime;
use fancy_regex::Regex;
use std::sync::LazyLock;

static PLC_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<ts>\d{2}\.\d{2}\.\d{4} \d{2}:\d{2}:\d{2}(?:,\d{1,6})?);(?P<body>.*)$")
        .expect("valid regex literal")
});

/// Effect of a line on the tray tracking bracket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bracket {
    Open,
    Close,
    Inside,
}

struct PlcLine {
    classified: Classified,
    bracket: Bracket,
}

impl PlcLine {
    const fn new(tray_id: Identifier, free_text: String, bracket: Bracket) -> Self {
        Self {
            classified: Classified::new(Identifier::Absent, tray_id, free_text),
            bracket,
        }
    }
}

static RULES: LazyLock<RuleTable<PlcLine>> = LazyLock::new(|| {
    RuleTable::new(vec![
        Rule::new(r"^Lesefehler\s+Wanne", |_| {
            Some(PlcLine::new(
                Identifier::Unread,
                "[PLC] Lesefehler Wannen-ID".to_string(),
                Bracket::Inside,
            ))
        }),
        Rule::new(r"^Wanne\s+(?P<tray>\S+)\s+erkannt", |caps| {
            Some(PlcLine::new(
                identifier(caps, "tray"),
                format!("[PLC] Wanne {} erkannt (Einlauf)", identifier(caps, "tray")),
                Bracket::Open,
            ))
        }),
        Rule::new(r"^Wanne\s+(?P<tray>\S+)\s+Position\s+(?P<pos>\S+)", |caps| {
            Some(PlcLine::new(
                identifier(caps, "tray"),
                format!(
                    "[PLC] Wanne {} an Position {}",
                    identifier(caps, "tray"),
                    group(caps, "pos")
                ),
                Bracket::Inside,
            ))
        }),
        Rule::new(r"^Wanne\s+(?P<tray>\S+)\s+ausgeschleust", |caps| {
            Some(PlcLine::new(
                identifier(caps, "tray"),
                format!("[PLC] Wanne {} ausgeschleust", identifier(caps, "tray")),
                Bracket::Close,
            ))
        }),
        Rule::new(
            r"(?i)^Weiche\s+(?P<gate>\w+)\s*:\s*(?P<cmd>CLEAR|REJECT)\b",
            |caps| {
                Some(PlcLine::new(
                    Identifier::Absent,
                    format!(
                        "[PLC] Weiche {}: {}",
                        group(caps, "gate"),
                        group(caps, "cmd").to_ascii_uppercase()
                    ),
                    Bracket::Inside,
                ))
            },
        ),
    ])
});

/// Check if a line is a PLC record carrying journey information
pub fn is_plc_line(line: &str) -> bool {
    split_line(line).is_some_and(|(_, body)| RULES.recognizes(body.trim()))
}

fn split_line(line: &str) -> Option<(&str, &str)> {
    let caps = PLC_LINE.captures(line).ok()??;
    Some((caps.name("ts")?.as_str(), caps.name("body")?.as_str()))
}

fn parse_plc_timestamp(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(&s.replace(',', "."), "%d.%m.%Y %H:%M:%S%.f").ok()
}

pub struct PlcNormalizer {
    device: Option<String>,
    /// Trays whose bracket is open, most recently opened last
    open_trays: Vec<String>,
}

impl PlcNormalizer {
    pub const fn new(device: Option<String>) -> Self {
        Self {
            device,
            open_trays: Vec::new(),
        }
    }

    /// Update the bracket state and fill in the tray for lines that do not name one.
    fn track(&mut self, line: &mut PlcLine) {
        let named = line.classified.tray_id.as_key().map(str::to_string);
        match (line.bracket, named) {
            (Bracket::Open, Some(tray)) => {
                self.open_trays.retain(|open| *open != tray);
                self.open_trays.push(tray);
            }
            (Bracket::Close, Some(tray)) => {
                self.open_trays.retain(|open| *open != tray);
            }
            (Bracket::Inside, None) if line.classified.tray_id == Identifier::Absent => {
                if let Some(current) = self.open_trays.last() {
                    line.classified.tray_id = Identifier::Known(current.clone());
                }
            }
            (Bracket::Open | Bracket::Close | Bracket::Inside, _) => {}
        }
    }
}

impl LineNormalizer for PlcNormalizer {
    fn normalize_line(&mut self, raw: &str, line_number: usize) -> Option<NormalizedEvent> {
        let (ts, body) = split_line(raw)?;
        let timestamp = parse_plc_timestamp(ts)?;
        let mut line = RULES.classify(body.trim())?;
        self.track(&mut line);

        Some(
            NormalizedEvent::new(
                timestamp,
                line.classified.bag_id,
                line.classified.tray_id,
                line.classified.free_text,
                Source::Plc,
                raw.to_string(),
                line_number,
            )
            .with_device(self.device.clone()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_content, LogFormat};

    fn run(lines: &[&str]) -> Vec<NormalizedEvent> {
        parse_content(&lines.join("\n"), LogFormat::Plc, Some("plc_1".to_string()))
    }

    fn tray(event: &NormalizedEvent) -> String {
        event.tray_id.to_string()
    }

    #[test]
    fn test_bracket_attributes_gate_commands() {
        let events = run(&[
            "12.03.2024 10:00:06,120;Wanne 131 erkannt",
            "12.03.2024 10:00:20,000;Weiche 3: REJECT",
            "12.03.2024 10:00:25,000;Wanne 131 ausgeschleust",
        ]);
        assert_eq!(events.len(), 3);
        assert_eq!(tray(&events[1]), "131");
        assert_eq!(events[1].free_text, "[PLC] Weiche 3: REJECT");
        assert_eq!(events[0].free_text, "[PLC] Wanne 131 erkannt (Einlauf)");
        assert_eq!(events[0].bag_id, Identifier::Absent);
    }

    #[test]
    fn test_most_recent_open_tray_wins() {
        let events = run(&[
            "12.03.2024 10:00:00,000;Wanne 131 erkannt",
            "12.03.2024 10:00:01,000;Wanne 200 erkannt",
            "12.03.2024 10:00:02,000;Weiche 1: CLEAR",
            "12.03.2024 10:00:03,000;Wanne 200 ausgeschleust",
            "12.03.2024 10:00:04,000;Weiche 2: reject",
        ]);
        assert_eq!(tray(&events[2]), "200");
        assert_eq!(tray(&events[4]), "131");
        assert_eq!(events[4].free_text, "[PLC] Weiche 2: REJECT");
    }

    #[test]
    fn test_unattributed_command_is_dropped() {
        let events = run(&["12.03.2024 10:00:02,000;Weiche 1: CLEAR"]);
        assert!(events.is_empty());
    }

    #[test]
    fn test_read_failure_is_kept_as_unread() {
        let events = run(&["12.03.2024 10:00:02,000;Lesefehler Wanne an Einlauf 2"]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].tray_id, Identifier::Unread);
        assert!(events[0].is_orphan());
    }

    #[test]
    fn test_timestamp_with_comma_fraction() {
        let events = run(&["12.03.2024 10:00:06,120;Wanne 131 Position 4"]);
        assert_eq!(
            events[0].timestamp.format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
            "2024-03-12 10:00:06.120"
        );
        assert_eq!(events[0].free_text, "[PLC] Wanne 131 an Position 4");
        assert_eq!(events[0].device.as_deref(), Some("plc_1"));
    }

    #[test]
    fn test_noise_is_skipped() {
        assert!(run(&["12.03.2024 10:00:06,120;Motor M3 Strom 2.1A"]).is_empty());
        assert!(!is_plc_line("12.03.2024 10:00:06,120;Motor M3 Strom 2.1A"));
        assert!(is_plc_line("12.03.2024 10:00:06,120;Wanne 9 erkannt"));
    }
}
