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

//! Operations management system (OMS) log dialect.
//!
//! Lines are key/value records with an ISO timestamp in brackets:
//! `[2024-03-12T10:00:20.500] INFO BagID=0123456 IATA=131 Msg="FinalCommand" Cmd=CLEAR User=jsmith`

use super::event::{Identifier, NormalizedEvent, Source};
use super::rules::{whole, Classified, Rule, RuleTable};
use super::LineNormalizer;
use chrono::NaiveDateTime;
use fancy_regex::Regex;
use std::sync::LazyLock;

static OMS_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\[(?P<ts>\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(?:\.\d{1,6})?)\]\s+(?P<level>[A-Z]+)\s+(?P<body>.*)$",
    )
    .expect("valid regex literal")
});

static BAG_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bBagID=(?P<v>\S*)").expect("valid regex literal"));
static IATA_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bIATA=(?P<v>\S*)").expect("valid regex literal"));
static USER_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bUser=(?P<v>[^\s']+)").expect("valid regex literal"));
static RESULT_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bResult=(?P<v>\w+)").expect("valid regex literal"));
static CMD_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bCmd=(?P<v>\w+)").expect("valid regex literal"));

/// Value of a `Key=value` field in the record body
fn field<'a>(pattern: &Regex, body: &'a str) -> Option<&'a str> {
    let caps = pattern.captures(body).ok()??;
    let value = caps.name("v")?.as_str().trim_matches('"');
    (!value.is_empty()).then_some(value)
}

fn ids(body: &str) -> (Identifier, Identifier) {
    (
        Identifier::parse(field(&BAG_FIELD, body).unwrap_or_default()),
        Identifier::parse(field(&IATA_FIELD, body).unwrap_or_default()),
    )
}

static RULES: LazyLock<RuleTable> = LazyLock::new(|| {
    RuleTable::new(vec![
        Rule::new(r#"^.*\bMsg="BagRegistered".*$"#, |caps| {
            let (bag, tray) = ids(whole(caps));
            Some(Classified::new(
                bag,
                tray,
                "[OMS] Gepäckstück registriert".to_string(),
            ))
        }),
        Rule::new(r#"^.*\bMsg="ImageDisplayed".*$"#, |caps| {
            let body = whole(caps);
            let (bag, tray) = ids(body);
            let user = field(&USER_FIELD, body).unwrap_or("N/A");
            Some(Classified::new(
                bag,
                tray,
                format!("[OMS] Bild angezeigt für '{user}'"),
            ))
        }),
        Rule::new(r#"^.*\bMsg="OperatorDecision".*$"#, |caps| {
            let body = whole(caps);
            let (bag, tray) = ids(body);
            let user = field(&USER_FIELD, body)?;
            let result = field(&RESULT_FIELD, body)?.to_ascii_uppercase();
            Some(Classified::new(
                bag,
                tray,
                format!("[OMS] Finale Operator-Entscheidung von '{user}': **{result}**"),
            ))
        }),
        Rule::new(r#"^.*\bMsg="OperatorTimeout".*$"#, |caps| {
            let (bag, tray) = ids(whole(caps));
            Some(Classified::new(
                bag,
                tray,
                "[OMS] Keine Operator-Entscheidung (Timeout)".to_string(),
            ))
        }),
        Rule::new(r#"^.*\bMsg="FinalCommand".*$"#, |caps| {
            let body = whole(caps);
            let (bag, tray) = ids(body);
            let command = field(&CMD_FIELD, body)?.to_ascii_uppercase();
            let free_text = match field(&USER_FIELD, body) {
                Some(user) => {
                    format!("[OMS] Finaler Befehl an Förderanlage: {command} von '{user}'")
                }
                None => format!("[OMS] Finaler Befehl an Förderanlage: {command}"),
            };
            Some(Classified::new(bag, tray, free_text))
        }),
    ])
});

/// Check if a line is an OMS record carrying journey information
pub fn is_oms_line(line: &str) -> bool {
    split_line(line).is_some_and(|(_, body)| RULES.recognizes(body))
}

fn split_line(line: &str) -> Option<(&str, &str)> {
    let caps = OMS_LINE.captures(line).ok()??;
    Some((caps.name("ts")?.as_str(), caps.name("body")?.as_str()))
}

fn parse_oms_timestamp(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").ok()
}

pub struct OmsNormalizer {
    device: Option<String>,
}

impl OmsNormalizer {
    pub const fn new(device: Option<String>) -> Self {
        Self { device }
    }
}

impl LineNormalizer for OmsNormalizer {
    fn normalize_line(&mut self, raw: &str, line_number: usize) -> Option<NormalizedEvent> {
        let (ts, body) = split_line(raw)?;
        let timestamp = parse_oms_timestamp(ts)?;
        let classified = RULES.classify(body)?;
        Some(
            NormalizedEvent::new(
                timestamp,
                classified.bag_id,
                classified.tray_id,
                classified.free_text,
                Source::Oms,
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

    fn normalize(raw: &str) -> Option<NormalizedEvent> {
        OmsNormalizer::new(None).normalize_line(raw, 3)
    }

    #[test]
    fn test_final_command_with_user() {
        let event = normalize(
            r#"[2024-03-12T10:00:20.500] INFO BagID=0123456 IATA=131 Msg="FinalCommand" Cmd=clear User=jsmith"#,
        )
        .expect("should normalize");
        assert_eq!(event.bag_id, Identifier::Known("0123456".into()));
        assert_eq!(event.tray_id, Identifier::Known("131".into()));
        assert_eq!(
            event.free_text,
            "[OMS] Finaler Befehl an Förderanlage: CLEAR von 'jsmith'"
        );
        assert_eq!(event.line_number, 3);
        assert_eq!(event.source, Source::Oms);
    }

    #[test]
    fn test_final_command_without_user() {
        let event = normalize(
            r#"[2024-03-12T10:00:20] INFO BagID=N/A IATA=131 Msg="FinalCommand" Cmd=ALARM"#,
        )
        .expect("should normalize");
        assert_eq!(event.bag_id, Identifier::Absent);
        assert_eq!(event.free_text, "[OMS] Finaler Befehl an Förderanlage: ALARM");
    }

    #[test]
    fn test_operator_decision_requires_result() {
        assert!(normalize(
            r#"[2024-03-12T10:00:20.500] INFO BagID=1 Msg="OperatorDecision" User=jsmith"#
        )
        .is_none());

        let event = normalize(
            r#"[2024-03-12T10:00:20.500] INFO BagID=1 Msg="OperatorDecision" User=jsmith Result=Alarm"#,
        )
        .expect("should normalize");
        assert_eq!(
            event.free_text,
            "[OMS] Finale Operator-Entscheidung von 'jsmith': **ALARM**"
        );
    }

    #[test]
    fn test_missing_fields_are_absent() {
        let event = normalize(r#"[2024-03-12T10:00:20.500] INFO Msg="BagRegistered" IATA=NOREAD"#)
            .expect("should normalize");
        assert_eq!(event.bag_id, Identifier::Absent);
        assert_eq!(event.tray_id, Identifier::Unread);
    }

    #[test]
    fn test_records_without_identifiers_are_dropped() {
        let content = r#"[2024-03-12T10:00:20.500] INFO Msg="BagRegistered"
[2024-03-12T10:00:21.000] INFO Msg="BagRegistered" BagID=N/A IATA=NOREAD
"#;
        let events = crate::parser::parse_content(content, crate::parser::LogFormat::Oms, None);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].line_number, 2);
        assert_eq!(events[0].tray_id, Identifier::Unread);
    }

    #[test]
    fn test_unrelated_messages_are_skipped() {
        let raw = r#"[2024-03-12T10:00:20.500] DEBUG Msg="DbPoolStats" Active=3"#;
        assert!(normalize(raw).is_none());
        assert!(!is_oms_line(raw));
        assert!(is_oms_line(
            r#"[2024-03-12T10:00:20.500] INFO BagID=1 Msg="BagRegistered""#
        ));
    }
}
