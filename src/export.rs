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

//! Writers for the journey table and the annotated event table.

use crate::journey::{EventRow, JourneyKey, JourneySummary};
use serde::Serialize;
use std::borrow::Cow;
use std::io::{self, Write};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

pub const JOURNEY_COLUMNS: [&str; 7] = [
    "Timestamp",
    "Identifier",
    "BagID",
    "Source(s)",
    "Operator",
    "Outcome",
    "Device",
];

pub const EVENT_COLUMNS: [&str; 9] = [
    "Timestamp",
    "BagID",
    "TrayID",
    "Source",
    "Event",
    "Device",
    "Line",
    "JourneyKey",
    "Original",
];

/// Tabs and line breaks would break the table layout
fn clean(field: &str) -> Cow<'_, str> {
    if field.contains(['\t', '\n', '\r']) {
        Cow::Owned(field.replace(['\t', '\n', '\r'], " "))
    } else {
        Cow::Borrowed(field)
    }
}

fn write_row<W: Write>(out: &mut W, fields: &[&str]) -> io::Result<()> {
    let line: Vec<Cow<'_, str>> = fields.iter().map(|field| clean(field)).collect();
    writeln!(out, "{}", line.join("\t"))
}

fn journey_fields(summary: &JourneySummary) -> [String; 7] {
    [
        summary.timestamp.format(TIME_FORMAT).to_string(),
        summary.identifier.to_string(),
        summary.bag_id.to_string(),
        summary.sources.clone(),
        summary.operator.clone(),
        summary.outcome.to_string(),
        summary.device.clone().unwrap_or_default(),
    ]
}

/// Write the journey table as tab separated text with a header row
pub fn write_journeys_tsv<W: Write>(out: &mut W, journeys: &[JourneySummary]) -> io::Result<()> {
    write_row(out, &JOURNEY_COLUMNS)?;
    for summary in journeys {
        let fields = journey_fields(summary);
        write_row(out, &fields.each_ref().map(String::as_str))?;
    }
    Ok(())
}

/// Write the event table as tab separated text with a header row
pub fn write_events_tsv<W: Write>(out: &mut W, rows: &[EventRow<'_>]) -> io::Result<()> {
    write_row(out, &EVENT_COLUMNS)?;
    for row in rows {
        let event = row.event;
        let timestamp = event.timestamp.format(TIME_FORMAT).to_string();
        let bag_id = event.bag_id.to_string();
        let tray_id = event.tray_id.to_string();
        let line_number = event.line_number.to_string();
        write_row(
            out,
            &[
                timestamp.as_str(),
                bag_id.as_str(),
                tray_id.as_str(),
                event.source.label(),
                event.free_text.as_str(),
                event.device.as_deref().unwrap_or_default(),
                line_number.as_str(),
                row.journey_key.map_or("", JourneyKey::as_str),
                event.original_line.as_str(),
            ],
        )?;
    }
    Ok(())
}

/// Write any table as a pretty JSON array
pub fn write_json<W: Write, T: Serialize>(out: &mut W, rows: &[T]) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, rows)?;
    writeln!(out)
}

/// Render the journey table as aligned plain text for the terminal
pub fn format_journey_table(journeys: &[JourneySummary]) -> String {
    let rows: Vec<[String; 7]> = journeys.iter().map(journey_fields).collect();
    let mut widths = JOURNEY_COLUMNS.map(|column| column.chars().count());
    for row in &rows {
        for (width, field) in widths.iter_mut().zip(row) {
            *width = (*width).max(field.chars().count());
        }
    }

    let mut table = String::new();
    let mut push_line = |fields: &[&str]| {
        let cells: Vec<String> = fields
            .iter()
            .zip(widths)
            .map(|(field, width)| format!("{field:<width$}"))
            .collect();
        table.push_str(cells.join("  ").trim_end());
        table.push('\n');
    };

    push_line(&JOURNEY_COLUMNS);
    for row in &rows {
        push_line(&row.each_ref().map(String::as_str));
    }
    table
}
