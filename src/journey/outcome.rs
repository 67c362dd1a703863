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

//! Final disposition of a journey.
//!
//! The outcome is a heuristic read from the free texts of the member events.
//! It follows a fixed precedence of event kinds and is not a verified
//! protocol: a journey whose logs are incomplete or worded unexpectedly may
//! be classified wrongly. Do not use it as a safety certification.

use crate::parser::NormalizedEvent;
use fancy_regex::Regex;
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::LazyLock;

/// Conveyor diverted the tray to the reject lane
pub const PLC_REJECT_MARKER: &str = "REJECT";
/// Command sent from the OMS to the conveyor
pub const FINAL_COMMAND_MARKER: &str = "Finaler Befehl";
/// Operator reviewed the image and decided
pub const OPERATOR_DECISION_MARKER: &str = "Finale Operator-Entscheidung";
/// Automatic threat detection result
pub const MACHINE_DECISION_MARKER: &str = "Maschinelle Entscheidung";

const CLEAR_KEYWORD: &str = "CLEAR";
const ALARM_KEYWORD: &str = "ALARM";

static OPERATOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"von '([^']+)'").expect("valid regex literal"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Outcome {
    #[default]
    Clear,
    Alarm,
    /// The conveyor rejected the tray, whatever anyone decided before
    PlcReject,
    /// Only the machine decision flagged the bag
    MachineAlarm,
}

impl Outcome {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Clear => "CLEAR",
            Self::Alarm => "ALARM",
            Self::PlcReject => "ALARM (PLC REJECT)",
            Self::MachineAlarm => "ALARM (Maschine)",
        }
    }

    pub const fn is_alarm(self) -> bool {
        !matches!(self, Self::Clear)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Outcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Outcome and responsible operator of one journey
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Resolution {
    pub outcome: Outcome,
    pub operator: Option<String>,
}

/// Resolve outcome and operator of a journey.
///
/// `events` must be in timestamp order.
pub fn resolve(events: &[&NormalizedEvent]) -> Resolution {
    Resolution {
        outcome: resolve_outcome(events),
        operator: extract_operator(events),
    }
}

/// Derive the final disposition, first matching rule wins:
///
/// 1. a conveyor event mentioning `REJECT` gives [`Outcome::PlcReject`]
/// 2. the last `Finaler Befehl` event decides between CLEAR and ALARM
/// 3. otherwise the last `Finale Operator-Entscheidung` event does
/// 4. any `Maschinelle Entscheidung` mentioning `ALARM` gives [`Outcome::MachineAlarm`]
/// 5. CLEAR
///
/// Rule 4 is coarser than 2 and 3: a later machine CLEAR does not cancel an
/// earlier machine ALARM.
pub fn resolve_outcome(events: &[&NormalizedEvent]) -> Outcome {
    if events
        .iter()
        .any(|e| e.source.is_conveyor() && e.free_text.contains(PLC_REJECT_MARKER))
    {
        return Outcome::PlcReject;
    }

    for marker in [FINAL_COMMAND_MARKER, OPERATOR_DECISION_MARKER] {
        if let Some(last) = events.iter().rev().find(|e| e.free_text.contains(marker)) {
            return if last.free_text.contains(CLEAR_KEYWORD) {
                Outcome::Clear
            } else {
                Outcome::Alarm
            };
        }
    }

    let machine_alarm = events
        .iter()
        .filter(|e| e.free_text.contains(MACHINE_DECISION_MARKER))
        .any(|e| e.free_text.contains(ALARM_KEYWORD));
    if machine_alarm {
        return Outcome::MachineAlarm;
    }

    Outcome::Clear
}

fn is_decision(text: &str) -> bool {
    [
        FINAL_COMMAND_MARKER,
        OPERATOR_DECISION_MARKER,
        MACHINE_DECISION_MARKER,
    ]
    .iter()
    .any(|marker| text.contains(marker))
}

/// The operator named last (`von '<name>'`) in any decision event
pub fn extract_operator(events: &[&NormalizedEvent]) -> Option<String> {
    events
        .iter()
        .copied()
        .filter(|e| is_decision(&e.free_text))
        .flat_map(|e| OPERATOR_RE.captures_iter(&e.free_text))
        .filter_map(|caps| {
            caps.inspect_err(|err| tracing::debug!("Operator regex failed: {err}"))
                .ok()
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string())
        })
        .last()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{Identifier, Source};
    use chrono::{NaiveDateTime, TimeDelta};

    fn events(texts: &[(Source, &str)]) -> Vec<NormalizedEvent> {
        let start = NaiveDateTime::parse_from_str("2024-03-12 10:00:00", "%Y-%m-%d %H:%M:%S")
            .expect("valid timestamp");
        texts
            .iter()
            .zip(0..)
            .map(|(&(source, text), secs)| {
                NormalizedEvent::new(
                    start + TimeDelta::seconds(secs),
                    Identifier::Known("B1".into()),
                    Identifier::Known("131".into()),
                    text.to_string(),
                    source,
                    String::new(),
                    1,
                )
            })
            .collect()
    }

    fn resolve_texts(texts: &[(Source, &str)]) -> Resolution {
        let owned = events(texts);
        let refs: Vec<_> = owned.iter().collect();
        resolve(&refs)
    }

    #[test]
    fn test_default_is_clear() {
        let res = resolve_texts(&[(Source::Scanner, "[Scanner] Gepäckstück X angelegt")]);
        assert_eq!(res.outcome, Outcome::Clear);
        assert_eq!(res.operator, None);
        assert_eq!(resolve_texts(&[]).outcome, Outcome::Clear);
    }

    #[test]
    fn test_plc_reject_beats_final_command() {
        let res = resolve_texts(&[
            (Source::Oms, "[OMS] Finaler Befehl an Förderanlage: CLEAR"),
            (Source::Plc, "[PLC] Weiche 3: REJECT"),
        ]);
        assert_eq!(res.outcome, Outcome::PlcReject);
    }

    #[test]
    fn test_reject_text_from_non_conveyor_is_ignored() {
        let res = resolve_texts(&[(Source::Oms, "[OMS] REJECT requested")]);
        assert_eq!(res.outcome, Outcome::Clear);
    }

    #[test]
    fn test_operator_decision_round_trip() {
        let res = resolve_texts(&[(
            Source::Scanner,
            "[Scanner] Finale Operator-Entscheidung von 'jsmith': **CLEAR**",
        )]);
        assert_eq!(res.operator.as_deref(), Some("jsmith"));
        assert_eq!(res.outcome, Outcome::Clear);
    }

    #[test]
    fn test_last_final_command_wins_over_operator() {
        let res = resolve_texts(&[
            (Source::Oms, "[OMS] Finaler Befehl an Förderanlage: CLEAR"),
            (
                Source::Oms,
                "[OMS] Finale Operator-Entscheidung von 'amiller': **CLEAR**",
            ),
            (
                Source::Oms,
                "[OMS] Finaler Befehl an Förderanlage: ALARM von 'bkoch'",
            ),
        ]);
        assert_eq!(res.outcome, Outcome::Alarm);
        assert_eq!(res.operator.as_deref(), Some("bkoch"));
    }

    #[test]
    fn test_machine_alarm_is_sticky() {
        let res = resolve_texts(&[
            (Source::Scanner, "[Scanner] Maschinelle Entscheidung: ALARM"),
            (Source::Scanner, "[Scanner] Maschinelle Entscheidung: CLEAR"),
        ]);
        assert_eq!(res.outcome, Outcome::MachineAlarm);
        assert!(res.outcome.is_alarm());

        let res = resolve_texts(&[(Source::Scanner, "[Scanner] Maschinelle Entscheidung: CLEAR")]);
        assert_eq!(res.outcome, Outcome::Clear);
    }

    #[test]
    fn test_operator_only_from_decision_events() {
        let res = resolve_texts(&[
            (
                Source::Oms,
                "[OMS] Finale Operator-Entscheidung von 'first': **ALARM**",
            ),
            (Source::Oms, "[OMS] Bild angezeigt für 'viewer' von 'viewer'"),
        ]);
        assert_eq!(res.operator.as_deref(), Some("first"));
        assert_eq!(res.outcome, Outcome::Alarm);
    }

    #[test]
    fn test_display() {
        assert_eq!(Outcome::PlcReject.to_string(), "ALARM (PLC REJECT)");
        assert_eq!(Outcome::MachineAlarm.to_string(), "ALARM (Maschine)");
    }
}
