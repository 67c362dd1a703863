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

//! Normalized event record shared by all dialects.

use chrono::NaiveDateTime;
use serde::{Serialize, Serializer};
use std::fmt;

/// An identifier as reported by one subsystem.
///
/// Subsystems regularly fail to read a tray label or simply do not know the
/// bag number. Those cases are explicit variants so they can never be used as
/// grouping keys by accident.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Identifier {
    /// A usable identifier value
    Known(String),
    /// The device tried to read the identifier and failed (`NO_READ`)
    Unread,
    /// The subsystem does not report this identifier at all (`N/A`)
    #[default]
    Absent,
}

impl Identifier {
    /// Interpret a raw identifier token from a log line.
    pub fn parse(raw: &str) -> Self {
        let token = raw.trim().trim_matches(|c| c == '"' || c == '\'');
        match token.to_ascii_uppercase().as_str() {
            "" | "N/A" | "NA" | "NONE" | "NULL" | "-" => Self::Absent,
            "NO_READ" | "NOREAD" | "NO-READ" | "?" | "??" | "???" | "????" => Self::Unread,
            _ => Self::Known(token.to_string()),
        }
    }

    /// The grouping key, if this identifier is usable as one.
    pub fn as_key(&self) -> Option<&str> {
        match self {
            Self::Known(value) => Some(value),
            Self::Unread | Self::Absent => None,
        }
    }

    pub const fn is_known(&self) -> bool {
        matches!(self, Self::Known(_))
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(value) => f.write_str(value),
            Self::Unread => f.write_str("NO_READ"),
            Self::Absent => f.write_str("N/A"),
        }
    }
}

impl Serialize for Identifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// The subsystem that wrote a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Source {
    Scanner,
    Oms,
    Plc,
    Bhs,
    Bms,
    Fsm,
    Dpp,
    Iqtk,
    Scs,
    Brava,
}

impl Source {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Scanner => "Scanner",
            Self::Oms => "OMS",
            Self::Plc => "PLC",
            Self::Bhs => "BHS",
            Self::Bms => "BMS",
            Self::Fsm => "FSM",
            Self::Dpp => "DPP",
            Self::Iqtk => "IQTK",
            Self::Scs => "SCS",
            Self::Brava => "BRAVA",
        }
    }

    /// Conveyor hardware is matched against the other sources, never grouped with them.
    pub const fn is_conveyor(self) -> bool {
        matches!(self, Self::Plc)
    }
}

impl Serialize for Source {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One meaningful log line, translated into the shared vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedEvent {
    /// Local wall-clock time as written by the device
    pub timestamp: NaiveDateTime,
    /// Logical bag number assigned by scanner/OMS
    pub bag_id: Identifier,
    /// Physical tray (IATA) number
    pub tray_id: Identifier,
    /// Human readable classification including decision markers
    pub free_text: String,
    pub source: Source,
    /// Raw line for drill-down, never parsed again
    pub original_line: String,
    /// 1-based line number in the source file
    pub line_number: usize,
    /// Device name, usually the stem of the log file
    pub device: Option<String>,
}

impl NormalizedEvent {
    pub const fn new(
        timestamp: NaiveDateTime,
        bag_id: Identifier,
        tray_id: Identifier,
        free_text: String,
        source: Source,
        original_line: String,
        line_number: usize,
    ) -> Self {
        Self {
            timestamp,
            bag_id,
            tray_id,
            free_text,
            source,
            original_line,
            line_number,
            device: None,
        }
    }

    #[must_use]
    pub fn with_device(mut self, device: Option<String>) -> Self {
        self.device = device;
        self
    }

    /// Whether neither identifier can be used for grouping.
    pub const fn is_orphan(&self) -> bool {
        !self.bag_id.is_known() && !self.tray_id.is_known()
    }

    /// Neither subsystem reported an identifier, not even a failed read.
    pub fn is_unattributed(&self) -> bool {
        self.bag_id == Identifier::Absent && self.tray_id == Identifier::Absent
    }

    /// Identity used to suppress consecutive duplicates within one file.
    pub(crate) fn dedup_key(&self) -> (NaiveDateTime, &Identifier, &Identifier, &str) {
        (
            self.timestamp,
            &self.bag_id,
            &self.tray_id,
            self.free_text.as_str(),
        )
    }
}
