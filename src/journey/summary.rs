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

use super::{Journey, JourneyKey, Outcome};
use crate::core::EventStore;
use crate::parser::{Identifier, NormalizedEvent, Source};
use chrono::NaiveDateTime;
use serde::Serialize;

/// Source label of conveyor journeys nobody claimed
pub const PLC_ONLY_LABEL: &str = "PLC (Allein)";
/// Operator column when no operator was found
pub const NO_OPERATOR: &str = "N/A";

/// One row of the journey table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JourneySummary {
    pub journey_key: JourneyKey,
    pub timestamp: NaiveDateTime,
    pub end: NaiveDateTime,
    pub identifier: Identifier,
    pub bag_id: Identifier,
    pub sources: String,
    pub operator: String,
    pub outcome: Outcome,
    /// Devices that contributed events, in order of appearance
    pub device: Option<String>,
    pub events: usize,
}

impl JourneySummary {
    pub fn new(journey: &Journey, store: &EventStore) -> Self {
        let sources = if journey.kind().is_plc_only() {
            PLC_ONLY_LABEL.to_string()
        } else {
            journey
                .sources()
                .iter()
                .copied()
                .map(Source::label)
                .collect::<Vec<_>>()
                .join(" + ")
        };

        let mut devices: Vec<&str> = Vec::new();
        for &id in journey.events() {
            if let Some(device) = store.get(id).device.as_deref() {
                if !devices.contains(&device) {
                    devices.push(device);
                }
            }
        }

        Self {
            journey_key: journey.key().clone(),
            timestamp: journey.start(),
            end: journey.end(store),
            identifier: journey.representative().clone(),
            bag_id: if journey.kind().is_plc_only() {
                Identifier::Absent
            } else {
                journey.bag_id(store)
            },
            sources,
            operator: journey.operator().unwrap_or(NO_OPERATOR).to_string(),
            outcome: journey.outcome(),
            device: (!devices.is_empty()).then(|| devices.join(", ")),
            events: journey.events().len(),
        }
    }
}

/// One row of the annotated event table
#[derive(Debug, Clone, Copy, Serialize)]
pub struct EventRow<'a> {
    pub journey_key: Option<&'a JourneyKey>,
    #[serde(flatten)]
    pub event: &'a NormalizedEvent,
}

/// All events in timestamp order with the journey they belong to
pub fn event_rows(store: &EventStore) -> Vec<EventRow<'_>> {
    store
        .annotated()
        .map(|(event, journey_key)| EventRow { journey_key, event })
        .collect()
}
