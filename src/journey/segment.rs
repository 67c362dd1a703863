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

//! Temporal segmentation of identifier streams.

use crate::core::{EventId, EventStore};
use chrono::{NaiveDateTime, TimeDelta};
use indexmap::IndexMap;

/// Split a time-ordered stream into segments.
///
/// A new segment starts wherever the gap to the previous item is strictly
/// larger than `threshold`. A gap of exactly `threshold` keeps the items
/// together.
pub fn split_by_gap<T: Copy>(
    items: &[T],
    threshold: TimeDelta,
    timestamp_of: impl Fn(T) -> NaiveDateTime,
) -> Vec<Vec<T>> {
    let mut segments: Vec<Vec<T>> = Vec::new();
    let mut previous: Option<NaiveDateTime> = None;

    for &item in items {
        let ts = timestamp_of(item);
        match (previous, segments.last_mut()) {
            (Some(prev), Some(current)) if ts - prev <= threshold => current.push(item),
            _ => segments.push(vec![item]),
        }
        previous = Some(ts);
    }

    segments
}

/// Events of a run grouped by the identifier that ties them together.
///
/// Streams keep the order in which identifiers first appear, and every
/// stream is ordered by time because the store is.
#[derive(Debug, Default)]
pub struct IdentifierStreams {
    /// Scanner/OMS/... events with a known bag number
    pub by_bag: IndexMap<String, Vec<EventId>>,
    /// Scanner/OMS/... events without a bag number but with a known tray
    pub by_tray: IndexMap<String, Vec<EventId>>,
    /// Conveyor events with a known tray
    pub plc_by_tray: IndexMap<String, Vec<EventId>>,
    /// Conveyor events without a tray but with a known bag number
    pub plc_by_bag: IndexMap<String, Vec<EventId>>,
    /// Events without any usable identifier
    pub orphans: Vec<EventId>,
}

impl IdentifierStreams {
    pub fn partition(store: &EventStore) -> Self {
        profiling::scope!("IdentifierStreams::partition");
        let mut streams = Self::default();

        for (id, event) in store.iter() {
            // Conveyor hardware knows trays first, everything else knows bags first
            let (preferred, fallback, preferred_streams, fallback_streams) =
                if event.source.is_conveyor() {
                    (
                        &event.tray_id,
                        &event.bag_id,
                        &mut streams.plc_by_tray,
                        &mut streams.plc_by_bag,
                    )
                } else {
                    (
                        &event.bag_id,
                        &event.tray_id,
                        &mut streams.by_bag,
                        &mut streams.by_tray,
                    )
                };

            if let Some(key) = preferred.as_key() {
                preferred_streams.entry(key.to_string()).or_default().push(id);
            } else if let Some(key) = fallback.as_key() {
                fallback_streams.entry(key.to_string()).or_default().push(id);
            } else {
                streams.orphans.push(id);
            }
        }

        tracing::debug!(
            "Partitioned {} events into {} bag, {} tray, {} PLC tray and {} PLC bag streams ({} orphans)",
            store.len(),
            streams.by_bag.len(),
            streams.by_tray.len(),
            streams.plc_by_tray.len(),
            streams.plc_by_bag.len(),
            streams.orphans.len()
        );
        streams
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{Identifier, NormalizedEvent, Source};

    fn at(secs: i64) -> NaiveDateTime {
        NaiveDateTime::parse_from_str("2024-03-12 10:00:00", "%Y-%m-%d %H:%M:%S")
            .expect("valid timestamp")
            + TimeDelta::seconds(secs)
    }

    fn split(secs: &[i64], threshold: i64) -> Vec<Vec<i64>> {
        split_by_gap(secs, TimeDelta::seconds(threshold), at)
    }

    #[test]
    fn test_empty_and_single() {
        assert!(split(&[], 180).is_empty());
        assert_eq!(split(&[42], 180), vec![vec![42]]);
    }

    #[test]
    fn test_gap_equal_to_threshold_does_not_split() {
        assert_eq!(split(&[0, 180, 360], 180), vec![vec![0, 180, 360]]);
        assert_eq!(split(&[0, 181], 180), vec![vec![0], vec![181]]);
    }

    #[test]
    fn test_gap_invariant() {
        let stream = [0, 10, 200, 250, 1000, 1001, 1300, 1480];
        let threshold = 180;
        let segments = split(&stream, threshold);

        assert_eq!(segments.concat(), stream.to_vec());
        for segment in &segments {
            assert!(segment.windows(2).all(|w| w[1] - w[0] <= threshold));
        }
        for pair in segments.windows(2) {
            let last = *pair[0].last().expect("segments are non-empty");
            assert!(pair[1][0] - last > threshold);
        }
    }

    #[test]
    fn test_resegmenting_is_idempotent() {
        let stream = [0, 60, 500, 520, 900, 1100, 1280];
        for segment in split(&stream, 180) {
            assert_eq!(split(&segment, 180), vec![segment.clone()]);
        }
    }

    fn event(source: Source, bag: Identifier, tray: Identifier) -> NormalizedEvent {
        NormalizedEvent::new(at(0), bag, tray, String::new(), source, String::new(), 1)
    }

    #[test]
    fn test_partition_by_identifier_preference() {
        let known = |s: &str| Identifier::Known(s.to_string());
        let store = EventStore::from_events(vec![
            event(Source::Scanner, known("B1"), known("131")),
            event(Source::Oms, Identifier::Absent, known("131")),
            event(Source::Plc, known("B1"), known("131")),
            event(Source::Plc, known("B2"), Identifier::Unread),
            event(Source::Plc, Identifier::Absent, Identifier::Unread),
            event(Source::Scanner, Identifier::Unread, Identifier::Absent),
        ]);
        let streams = IdentifierStreams::partition(&store);

        assert_eq!(streams.by_bag["B1"].len(), 1);
        assert_eq!(streams.by_tray["131"].len(), 1);
        assert_eq!(streams.plc_by_tray["131"].len(), 1);
        assert_eq!(streams.plc_by_bag["B2"].len(), 1);
        assert_eq!(streams.orphans.len(), 2);
    }
}
