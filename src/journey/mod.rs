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

//! Journey consolidation.
//!
//! Normalized events are grouped per identifier, cut into journeys at long
//! pauses, paired with the conveyor activity of the same tray and finally
//! given an outcome.

pub mod merge;
pub mod outcome;
pub mod segment;
pub mod summary;

pub use merge::{merge_plc, PlcJourneyQueue};
pub use outcome::{Outcome, Resolution};
pub use segment::{split_by_gap, IdentifierStreams};
pub use summary::{EventRow, JourneySummary};

use crate::core::{EventId, EventStore};
use crate::parser::{Identifier, NormalizedEvent, Source};
use chrono::{NaiveDateTime, TimeDelta};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::time::Instant;

const KEY_TIME_FORMAT: &str = "%Y%m%dT%H%M%S%.3f";

/// Stable identity of a journey.
///
/// Built from the journey kind, its identifier and its start time, so the
/// same input always yields the same keys.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct JourneyKey(String);

impl JourneyKey {
    pub const fn new(key: String) -> Self {
        Self(key)
    }

    fn segment(kind: JourneyKind, identifier: &str, start: NaiveDateTime) -> Self {
        Self(format!(
            "{}:{identifier}@{}",
            kind.prefix(),
            start.format(KEY_TIME_FORMAT)
        ))
    }

    /// Orphans share no identifier, so their position in the store keeps
    /// keys of simultaneous orphans apart.
    fn orphan(start: NaiveDateTime, row: EventId) -> Self {
        Self(format!(
            "{}@{}#{}",
            JourneyKind::Orphan.prefix(),
            start.format(KEY_TIME_FORMAT),
            row.index()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JourneyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which stream a journey was cut from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum JourneyKind {
    /// Scanner/OMS events sharing a bag number
    Bag,
    /// Scanner/OMS events without bag number, sharing a tray
    Tray,
    /// Conveyor events of one tray
    PlcTray,
    /// Conveyor events without tray, sharing a bag number
    PlcBag,
    /// A single event without usable identifier
    Orphan,
}

impl JourneyKind {
    const fn prefix(self) -> &'static str {
        match self {
            Self::Bag => "BAG",
            Self::Tray => "TRAY",
            Self::PlcTray => "PLC",
            Self::PlcBag => "PLCBAG",
            Self::Orphan => "ORPHAN",
        }
    }

    /// Conveyor activity that no scanner/OMS journey claimed (yet)
    pub const fn is_plc_only(self) -> bool {
        matches!(self, Self::PlcTray | Self::PlcBag)
    }
}

/// One reconstructed bag/tray life cycle.
///
/// Owns the IDs of its member events in timestamp order. Derived fields are
/// recomputed whenever membership changes.
#[derive(Debug, Clone)]
pub struct Journey {
    key: JourneyKey,
    kind: JourneyKind,
    representative: Identifier,
    events: Vec<EventId>,
    sources: BTreeSet<Source>,
    start: NaiveDateTime,
    resolution: Resolution,
}

impl Journey {
    /// Journey for one segment of an identifier stream, `None` for an empty segment
    pub fn from_segment(
        kind: JourneyKind,
        identifier: &str,
        events: Vec<EventId>,
        store: &EventStore,
    ) -> Option<Self> {
        let first = *events.iter().min()?;
        let start = store.timestamp(first);
        let mut journey = Self {
            key: JourneyKey::segment(kind, identifier, start),
            kind,
            representative: Identifier::Unread,
            events,
            sources: BTreeSet::new(),
            start,
            resolution: Resolution::default(),
        };
        journey.refresh(store);
        Some(journey)
    }

    /// Singleton journey for an event without usable identifier
    pub fn orphan(id: EventId, store: &EventStore) -> Self {
        let start = store.timestamp(id);
        let mut journey = Self {
            key: JourneyKey::orphan(start, id),
            kind: JourneyKind::Orphan,
            representative: Identifier::Unread,
            events: vec![id],
            sources: BTreeSet::new(),
            start,
            resolution: Resolution::default(),
        };
        journey.refresh(store);
        journey
    }

    /// Take over all events of `other`.
    ///
    /// The key stays the same; everything else is recomputed.
    pub fn absorb(&mut self, other: Self, store: &EventStore) {
        self.events.extend(other.events);
        self.refresh(store);
    }

    fn refresh(&mut self, store: &EventStore) {
        self.events.sort_unstable();
        self.events.dedup();
        if let Some(&first) = self.events.first() {
            self.start = store.timestamp(first);
        }

        let members: Vec<&NormalizedEvent> = self.events.iter().map(|&id| store.get(id)).collect();
        self.sources = members.iter().map(|e| e.source).collect();
        let bag = members.iter().map(|e| &e.bag_id).find(|id| id.is_known());
        let tray = members.iter().map(|e| &e.tray_id).find(|id| id.is_known());
        // Unclaimed conveyor journeys are named after their tray
        let representative = if self.kind.is_plc_only() {
            tray.or(bag)
        } else {
            bag.or(tray)
        };
        self.representative = representative.cloned().unwrap_or(Identifier::Unread);
        self.resolution = outcome::resolve(&members);
    }

    /// First known tray among the members, in time order
    pub fn representative_tray(&self, store: &EventStore) -> Option<String> {
        self.events
            .iter()
            .find_map(|&id| store.get(id).tray_id.as_key())
            .map(str::to_string)
    }

    /// First known bag number among the members, `N/A` if there is none
    pub fn bag_id(&self, store: &EventStore) -> Identifier {
        self.events
            .iter()
            .map(|&id| &store.get(id).bag_id)
            .find(|bag| bag.is_known())
            .cloned()
            .unwrap_or_default()
    }

    /// Timestamp of the last member event
    pub fn end(&self, store: &EventStore) -> NaiveDateTime {
        self.events
            .last()
            .map_or(self.start, |&id| store.timestamp(id))
    }

    pub const fn key(&self) -> &JourneyKey {
        &self.key
    }

    pub const fn kind(&self) -> JourneyKind {
        self.kind
    }

    pub const fn representative(&self) -> &Identifier {
        &self.representative
    }

    pub fn events(&self) -> &[EventId] {
        &self.events
    }

    pub const fn sources(&self) -> &BTreeSet<Source> {
        &self.sources
    }

    pub const fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub const fn outcome(&self) -> Outcome {
        self.resolution.outcome
    }

    pub fn operator(&self) -> Option<&str> {
        self.resolution.operator.as_deref()
    }
}

/// Pause thresholds that end a journey
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentationConfig {
    /// Scanner, OMS and other non-conveyor streams
    pub primary_gap: TimeDelta,
    /// Conveyor streams
    pub plc_gap: TimeDelta,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            primary_gap: TimeDelta::minutes(3),
            plc_gap: TimeDelta::minutes(5),
        }
    }
}

/// Result of one consolidation run: the events with their journey annotation
/// and the journeys ordered by start time
#[derive(Debug, Default)]
pub struct Consolidation {
    pub store: EventStore,
    pub journeys: Vec<Journey>,
}

impl Consolidation {
    pub fn is_empty(&self) -> bool {
        self.journeys.is_empty()
    }

    /// The journey table
    pub fn summaries(&self) -> Vec<JourneySummary> {
        self.journeys
            .iter()
            .map(|journey| JourneySummary::new(journey, &self.store))
            .collect()
    }

    /// The annotated event table
    pub fn event_rows(&self) -> Vec<EventRow<'_>> {
        summary::event_rows(&self.store)
    }
}

fn segment_stream(
    kind: JourneyKind,
    identifier: &str,
    ids: &[EventId],
    threshold: TimeDelta,
    store: &EventStore,
) -> Vec<Journey> {
    split_by_gap(ids, threshold, |id| store.timestamp(id))
        .into_iter()
        .filter_map(|segment| Journey::from_segment(kind, identifier, segment, store))
        .collect()
}

/// Group events into journeys.
///
/// Every event ends up in exactly one journey. Events without any usable
/// identifier become single-event journeys.
pub fn consolidate(events: Vec<NormalizedEvent>, config: &SegmentationConfig) -> Consolidation {
    profiling::scope!("consolidate");
    let start_time = Instant::now();
    let mut store = EventStore::from_events(events);
    let streams = IdentifierStreams::partition(&store);

    let mut primary = Vec::new();
    for (bag, ids) in &streams.by_bag {
        primary.extend(segment_stream(
            JourneyKind::Bag,
            bag,
            ids,
            config.primary_gap,
            &store,
        ));
    }
    for (tray, ids) in &streams.by_tray {
        primary.extend(segment_stream(
            JourneyKind::Tray,
            tray,
            ids,
            config.primary_gap,
            &store,
        ));
    }

    let mut queue = PlcJourneyQueue::new();
    for (tray, ids) in &streams.plc_by_tray {
        for journey in segment_stream(JourneyKind::PlcTray, tray, ids, config.plc_gap, &store) {
            queue.push_back(tray.clone(), journey);
        }
    }

    let mut journeys = merge_plc(primary, queue, &store);
    for (bag, ids) in &streams.plc_by_bag {
        journeys.extend(segment_stream(
            JourneyKind::PlcBag,
            bag,
            ids,
            config.plc_gap,
            &store,
        ));
    }
    journeys.extend(streams.orphans.iter().map(|&id| Journey::orphan(id, &store)));
    journeys.sort_by(|a, b| a.start().cmp(&b.start()).then_with(|| a.key().cmp(b.key())));

    for journey in &journeys {
        for &id in journey.events() {
            store.assign_journey(id, journey.key());
        }
    }
    let unassigned = store.unassigned().count();
    if unassigned > 0 {
        tracing::warn!("{unassigned} events did not end up in any journey");
    }

    let alarms = journeys.iter().filter(|j| j.outcome().is_alarm()).count();
    tracing::info!(
        "Consolidated {} events into {} journeys ({} orphans, {} alarms) in {:?}",
        store.len(),
        journeys.len(),
        streams.orphans.len(),
        alarms,
        start_time.elapsed()
    );
    Consolidation { store, journeys }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn event(time: &str, source: Source, bag: &str, tray: &str, text: &str) -> NormalizedEvent {
        NormalizedEvent::new(
            NaiveDateTime::parse_from_str(&format!("2024-03-12 {time}"), "%Y-%m-%d %H:%M:%S")
                .expect("valid timestamp"),
            Identifier::parse(bag),
            Identifier::parse(tray),
            text.to_string(),
            source,
            String::new(),
            1,
        )
    }

    fn run(events: Vec<NormalizedEvent>) -> Consolidation {
        consolidate(events, &SegmentationConfig::default())
    }

    #[test]
    fn test_empty_input() {
        let result = run(Vec::new());
        assert!(result.is_empty());
        assert!(result.summaries().is_empty());
        assert!(result.event_rows().is_empty());
    }

    #[test]
    fn test_fifo_pairing_end_to_end() {
        let result = run(vec![
            event("10:00:00", Source::Scanner, "J1", "131", "[Scanner] Gepäckstück J1 angelegt"),
            event("10:05:00", Source::Plc, "", "131", "[PLC] Wanne 131 erkannt (Einlauf)"),
            event("10:20:00", Source::Scanner, "J2", "131", "[Scanner] Gepäckstück J2 angelegt"),
            event("10:25:00", Source::Plc, "", "131", "[PLC] Weiche 2: REJECT"),
        ]);

        assert_eq!(result.journeys.len(), 2);
        let [j1, j2] = [&result.journeys[0], &result.journeys[1]];
        assert_eq!(j1.representative().to_string(), "J1");
        assert_eq!(j1.outcome(), Outcome::Clear);
        assert_eq!(j2.representative().to_string(), "J2");
        assert_eq!(j2.outcome(), Outcome::PlcReject);

        let annotated: Vec<_> = result
            .store
            .annotated()
            .map(|(_, key)| key.expect("every event is assigned").clone())
            .collect();
        assert_eq!(annotated[0], annotated[1]);
        assert_eq!(annotated[2], annotated[3]);
        assert_ne!(annotated[0], annotated[2]);
    }

    #[test]
    fn test_precedence_after_merge() {
        let result = run(vec![
            event(
                "10:00:00",
                Source::Oms,
                "B7",
                "131",
                "[OMS] Finaler Befehl an Förderanlage: CLEAR",
            ),
            event("10:01:00", Source::Plc, "", "131", "[PLC] Weiche 3: REJECT"),
        ]);
        assert_eq!(result.journeys.len(), 1);
        assert_eq!(result.journeys[0].outcome(), Outcome::PlcReject);
        assert_eq!(
            result.journeys[0].sources().iter().copied().collect::<Vec<_>>(),
            vec![Source::Oms, Source::Plc]
        );
    }

    #[test]
    fn test_orphans_get_distinct_keys() {
        let result = run(vec![
            event("10:00:00", Source::Scanner, "NO_READ", "N/A", "a"),
            event("10:00:00", Source::Plc, "", "????", "[PLC] Lesefehler Wannen-ID"),
        ]);
        assert_eq!(result.journeys.len(), 2);
        assert!(result
            .journeys
            .iter()
            .all(|j| j.kind() == JourneyKind::Orphan));
        assert_ne!(result.journeys[0].key(), result.journeys[1].key());
    }

    #[test]
    fn test_gap_splits_bag_stream() {
        let result = run(vec![
            event("10:00:00", Source::Scanner, "B1", "", "x"),
            event("10:03:00", Source::Scanner, "B1", "", "x"),
            event("10:06:01", Source::Scanner, "B1", "", "x"),
        ]);
        let sizes: Vec<_> = result.journeys.iter().map(|j| j.events().len()).collect();
        assert_eq!(sizes, vec![2, 1]);
    }

    #[test]
    fn test_standalone_plc_journeys() {
        let result = run(vec![
            event("10:00:00", Source::Plc, "", "555", "[PLC] Wanne 555 erkannt (Einlauf)"),
            event("10:00:30", Source::Plc, "B9", "", "[PLC] Weiche 1: CLEAR"),
        ]);
        assert_eq!(result.journeys.len(), 2);
        assert!(result.journeys.iter().all(|j| j.kind().is_plc_only()));
        let summary = result.summaries();
        assert_eq!(summary[0].sources, "PLC (Allein)");
        assert_eq!(summary[0].bag_id, Identifier::Absent);
        assert_eq!(summary[0].identifier.to_string(), "555");
    }

    #[test]
    fn test_standalone_plc_journey_named_after_tray() {
        let result = run(vec![event(
            "10:00:00",
            Source::Plc,
            "B9",
            "555",
            "[PLC] Wanne 555 erkannt (Einlauf)",
        )]);
        assert_eq!(result.journeys.len(), 1);
        assert_eq!(result.journeys[0].kind(), JourneyKind::PlcTray);
        assert_eq!(result.journeys[0].representative().to_string(), "555");

        let summaries = result.summaries();
        assert_eq!(summaries[0].sources, "PLC (Allein)");
        assert_eq!(summaries[0].identifier.to_string(), "555");
        assert_eq!(summaries[0].bag_id, Identifier::Absent);
    }

    #[test]
    fn test_conveyor_streams_tolerate_longer_pauses() {
        let result = run(vec![
            event("10:00:00", Source::Scanner, "B1", "", "[Scanner] Gepäckstück B1 angelegt"),
            event("10:04:00", Source::Scanner, "B1", "", "[Scanner] Gepäckstück B1 verlassen"),
            event("11:00:00", Source::Plc, "", "555", "[PLC] Wanne 555 erkannt (Einlauf)"),
            event("11:04:00", Source::Plc, "", "555", "[PLC] Wanne 555 ausgeschleust"),
        ]);

        let sizes = |ident: &str| -> Vec<usize> {
            result
                .journeys
                .iter()
                .filter(|j| j.representative().to_string() == ident)
                .map(|j| j.events().len())
                .collect()
        };
        assert_eq!(sizes("B1"), vec![1, 1]);
        assert_eq!(sizes("555"), vec![2]);
    }

    #[test]
    fn test_every_event_in_exactly_one_journey() {
        let result = run(vec![
            event("10:00:00", Source::Scanner, "B1", "131", "a"),
            event("10:00:10", Source::Oms, "B1", "131", "b"),
            event("10:00:20", Source::Oms, "", "131", "c"),
            event("10:00:30", Source::Plc, "", "131", "d"),
            event("10:00:40", Source::Plc, "", "NOREAD", "e"),
            event("10:30:00", Source::Plc, "", "131", "f"),
        ]);
        let mut seen = HashSet::new();
        for journey in &result.journeys {
            for id in journey.events() {
                assert!(seen.insert(*id), "event owned twice");
            }
        }
        assert_eq!(seen.len(), result.store.len());
        assert_eq!(result.store.unassigned().count(), 0);

        let keys: HashSet<_> = result.journeys.iter().map(Journey::key).collect();
        assert_eq!(keys.len(), result.journeys.len());
    }

    #[test]
    fn test_keys_are_deterministic() {
        let input = || {
            vec![
                event("10:00:00", Source::Scanner, "B1", "131", "a"),
                event("10:00:30", Source::Plc, "", "131", "b"),
            ]
        };
        let first: Vec<_> = run(input()).journeys.iter().map(|j| j.key().clone()).collect();
        let second: Vec<_> = run(input()).journeys.iter().map(|j| j.key().clone()).collect();
        assert_eq!(first, second);
        assert_eq!(first[0].as_str(), "BAG:B1@20240312T100000.000");
    }
}
