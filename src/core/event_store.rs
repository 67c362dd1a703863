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

//! Arena of normalized events for one analysis run.

use crate::journey::JourneyKey;
use crate::parser::NormalizedEvent;
use chrono::NaiveDateTime;
use rayon::prelude::*;
use serde::Serialize;

/// Index of an event in the store.
///
/// Events are stored in timestamp order, so comparing IDs compares time
/// (ties keep the order the events were loaded in).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct EventId(usize);

impl EventId {
    /// Position of the event in the time-sorted store
    pub const fn index(self) -> usize {
        self.0
    }
}

/// All events of a run, sorted by timestamp, plus the journey each one ended up in.
///
/// The journey annotation is written once per event after merging and never
/// changes afterwards.
#[derive(Debug, Default)]
pub struct EventStore {
    events: Vec<NormalizedEvent>,
    journey_keys: Vec<Option<JourneyKey>>,
}

impl EventStore {
    /// Take ownership of the events and sort them by timestamp.
    ///
    /// The sort is stable: events with equal timestamps keep their load order.
    pub fn from_events(mut events: Vec<NormalizedEvent>) -> Self {
        profiling::scope!("EventStore::from_events");
        events.par_sort_by_key(|event| event.timestamp);
        let journey_keys = vec![None; events.len()];
        Self {
            events,
            journey_keys,
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn get(&self, id: EventId) -> &NormalizedEvent {
        &self.events[id.0]
    }

    pub fn timestamp(&self, id: EventId) -> NaiveDateTime {
        self.events[id.0].timestamp
    }

    pub fn iter(&self) -> impl Iterator<Item = (EventId, &NormalizedEvent)> {
        self.events
            .iter()
            .enumerate()
            .map(|(idx, event)| (EventId(idx), event))
    }

    /// Record which journey owns an event.
    ///
    /// Returns `false` and leaves the annotation untouched if the event was
    /// already assigned to a different journey.
    pub fn assign_journey(&mut self, id: EventId, key: &JourneyKey) -> bool {
        match &self.journey_keys[id.0] {
            None => {
                self.journey_keys[id.0] = Some(key.clone());
                true
            }
            Some(existing) if existing == key => true,
            Some(existing) => {
                tracing::warn!(
                    "Event {} already belongs to journey {existing}, refusing {key}",
                    id.0
                );
                false
            }
        }
    }

    pub fn journey_key(&self, id: EventId) -> Option<&JourneyKey> {
        self.journey_keys[id.0].as_ref()
    }

    /// Events that were never assigned to a journey
    pub fn unassigned(&self) -> impl Iterator<Item = EventId> + '_ {
        self.journey_keys
            .iter()
            .enumerate()
            .filter(|(_, key)| key.is_none())
            .map(|(idx, _)| EventId(idx))
    }

    /// Events with their journey annotation, in timestamp order
    pub fn annotated(&self) -> impl Iterator<Item = (&NormalizedEvent, Option<&JourneyKey>)> {
        self.events
            .iter()
            .zip(self.journey_keys.iter().map(Option::as_ref))
    }
}
