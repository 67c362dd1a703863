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

//! Pairing of scanner/OMS journeys with conveyor journeys.

use super::Journey;
use crate::core::{EventStore, QueueMap};

/// Unclaimed conveyor journeys per tray, oldest first
pub type PlcJourneyQueue = QueueMap<String, Journey>;

/// Attach conveyor journeys to the primary journeys of the same tray.
///
/// Primary journeys are visited by start time. Each one claims the oldest
/// still unclaimed conveyor journey of its representative tray, so two passes
/// of a recycled tray are paired in order. Primary journeys without a known
/// tray never claim anything.
///
/// Returns the primary journeys followed by every conveyor journey nobody
/// claimed, which stay standalone.
pub fn merge_plc(
    mut primary: Vec<Journey>,
    mut queue: PlcJourneyQueue,
    store: &EventStore,
) -> Vec<Journey> {
    profiling::scope!("merge_plc");
    primary.sort_by(|a, b| a.start().cmp(&b.start()).then_with(|| a.key().cmp(b.key())));

    let mut claimed = 0usize;
    for journey in &mut primary {
        let Some(tray) = journey.representative_tray(store) else {
            continue;
        };
        if let Some(plc) = queue.pop_front(tray.as_str()) {
            tracing::trace!("Journey {} claims conveyor journey {}", journey.key(), plc.key());
            journey.absorb(plc, store);
            claimed += 1;
        }
    }

    let leftovers = queue.len();
    tracing::debug!(
        "Merged {claimed} conveyor journeys into {} primary journeys, {leftovers} stay standalone",
        primary.len()
    );

    primary.extend(queue.into_remaining().map(|(_, journey)| journey));
    primary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journey::JourneyKind;
    use crate::parser::{Identifier, NormalizedEvent, Source};
    use chrono::NaiveDateTime;

    fn event(time: &str, source: Source, bag: &str, tray: &str) -> NormalizedEvent {
        NormalizedEvent::new(
            NaiveDateTime::parse_from_str(&format!("2024-03-12 {time}"), "%Y-%m-%d %H:%M:%S")
                .expect("valid timestamp"),
            Identifier::parse(bag),
            Identifier::parse(tray),
            format!("{source} event"),
            source,
            String::new(),
            1,
        )
    }

    /// Build one journey per event
    fn journeys(store: &EventStore, kind: JourneyKind) -> Vec<(String, Journey)> {
        store
            .iter()
            .filter(|(_, e)| e.source.is_conveyor() == (kind == JourneyKind::PlcTray))
            .filter_map(|(id, e)| {
                let ident = match kind {
                    JourneyKind::PlcTray => e.tray_id.as_key()?,
                    _ => e.bag_id.as_key()?,
                };
                Journey::from_segment(kind, ident, vec![id], store)
                    .map(|journey| (e.tray_id.to_string(), journey))
            })
            .collect()
    }

    #[test]
    fn test_fifo_pairing_of_recycled_tray() {
        let store = EventStore::from_events(vec![
            event("10:00:00", Source::Scanner, "J1", "131"),
            event("10:05:00", Source::Plc, "", "131"),
            event("10:20:00", Source::Scanner, "J2", "131"),
            event("10:25:00", Source::Plc, "", "131"),
        ]);

        let primary = journeys(&store, JourneyKind::Bag)
            .into_iter()
            .map(|(_, j)| j)
            .collect();
        let mut queue = PlcJourneyQueue::new();
        for (tray, journey) in journeys(&store, JourneyKind::PlcTray) {
            queue.push_back(tray, journey);
        }

        let merged = merge_plc(primary, queue, &store);
        assert_eq!(merged.len(), 2);

        let first = &merged[0];
        assert_eq!(first.representative().to_string(), "J1");
        let times: Vec<_> = first
            .events()
            .iter()
            .map(|&id| store.timestamp(id).format("%H:%M").to_string())
            .collect();
        assert_eq!(times, vec!["10:00", "10:05"]);

        let second = &merged[1];
        assert_eq!(second.representative().to_string(), "J2");
        assert_eq!(
            store.timestamp(second.events()[1]).format("%H:%M").to_string(),
            "10:25"
        );
        assert!(second.sources().contains(&Source::Plc));
    }

    #[test]
    fn test_unclaimed_and_trayless() {
        let store = EventStore::from_events(vec![
            event("10:00:00", Source::Scanner, "J1", "N/A"),
            event("10:01:00", Source::Plc, "", "131"),
            event("10:02:00", Source::Plc, "", "200"),
        ]);
        let primary = journeys(&store, JourneyKind::Bag)
            .into_iter()
            .map(|(_, j)| j)
            .collect();
        let mut queue = PlcJourneyQueue::new();
        for (tray, journey) in journeys(&store, JourneyKind::PlcTray) {
            queue.push_back(tray, journey);
        }

        let merged = merge_plc(primary, queue, &store);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].events().len(), 1);
        assert_eq!(merged[1].kind(), JourneyKind::PlcTray);
        assert_eq!(merged[2].kind(), JourneyKind::PlcTray);
        // Merge exclusivity: every event is owned exactly once
        let mut owned: Vec<_> = merged.iter().flat_map(|j| j.events().to_vec()).collect();
        owned.sort();
        owned.dedup();
        assert_eq!(owned.len(), store.len());
    }
}
