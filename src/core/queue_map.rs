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

//! One FIFO queue per key.

use indexmap::IndexMap;
use std::borrow::Borrow;
use std::collections::VecDeque;
use std::hash::Hash;

/// A set of FIFO queues addressed by key.
///
/// Values pushed under the same key are popped in push order. Keys remember
/// when they were first used, so draining the leftovers is deterministic and
/// independent of hashing.
///
/// # Example
///
/// ```ignore
/// let mut queues = QueueMap::new();
/// queues.push_back("131", "first pass");
/// queues.push_back("131", "second pass");
///
/// assert_eq!(queues.pop_front("131"), Some("first pass"));
/// assert_eq!(queues.pop_front("131"), Some("second pass"));
/// assert_eq!(queues.pop_front("131"), None);
/// ```
#[derive(Debug)]
pub struct QueueMap<K, V> {
    queues: IndexMap<K, VecDeque<V>>,
}

impl<K: Hash + Eq, V> QueueMap<K, V> {
    /// Create a new empty `QueueMap`.
    pub fn new() -> Self {
        Self {
            queues: IndexMap::new(),
        }
    }

    /// Append a value to the queue of `key`.
    pub fn push_back(&mut self, key: K, value: V) {
        self.queues.entry(key).or_default().push_back(value);
    }

    /// Remove and return the oldest value queued under `key`.
    pub fn pop_front<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.queues.get_mut(key)?.pop_front()
    }

    /// Number of values still queued under all keys.
    pub fn len(&self) -> usize {
        self.queues.values().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.values().all(VecDeque::is_empty)
    }

    /// Consume the map, yielding every unclaimed value.
    ///
    /// Keys come in order of first use, values per key in FIFO order.
    pub fn into_remaining(self) -> impl Iterator<Item = (K, V)>
    where
        K: Clone,
    {
        self.queues
            .into_iter()
            .flat_map(|(key, queue)| queue.into_iter().map(move |value| (key.clone(), value)))
    }
}

impl<K: Hash + Eq, V> Default for QueueMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
