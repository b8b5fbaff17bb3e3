//! TTL Index
//!
//! A binary min-heap of pending expirations, ordered by deadline, stored in a
//! plain `Vec`. Alongside it sits a `HashMap` from key to the entry's current
//! slot in that `Vec`. Every swap inside the heap updates both slots' map
//! entries, which gives:
//!
//! | operation        | cost       |
//! |------------------|------------|
//! | `peek`           | O(1)       |
//! | `get`            | O(1)       |
//! | `insert`         | O(log n)   |
//! | `remove(key)`    | O(log n)   |
//! | `pop`            | O(log n)   |
//!
//! There is at most one entry per key; inserting an existing key first
//! removes the old entry.

use std::collections::HashMap;
use tokio::time::Instant;

/// One key's pending expiration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerEntry {
    pub key: String,
    pub expires_at: Instant,
}

/// Min-heap of [`TimerEntry`] keyed by deadline, with O(1) lookup by key.
#[derive(Debug, Default)]
pub struct TtlIndex {
    heap: Vec<TimerEntry>,
    positions: HashMap<String, usize>,
}

impl TtlIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// The entry with the earliest deadline.
    pub fn peek(&self) -> Option<&TimerEntry> {
        self.heap.first()
    }

    /// The deadline scheduled for `key`, if any.
    pub fn get(&self, key: &str) -> Option<Instant> {
        self.positions.get(key).map(|&pos| self.heap[pos].expires_at)
    }

    /// Schedules `key` to expire at `expires_at`, replacing any previous
    /// deadline for it. Returns the replaced deadline.
    pub fn insert(&mut self, key: String, expires_at: Instant) -> Option<Instant> {
        let previous = self.remove(&key);

        let pos = self.heap.len();
        self.positions.insert(key.clone(), pos);
        self.heap.push(TimerEntry { key, expires_at });
        self.sift_up(pos);

        previous
    }

    /// Drops the entry for `key`. Returns its deadline if it had one.
    pub fn remove(&mut self, key: &str) -> Option<Instant> {
        let pos = self.positions.remove(key)?;
        self.remove_at(pos).map(|entry| entry.expires_at)
    }

    /// Removes and returns the entry with the earliest deadline.
    pub fn pop(&mut self) -> Option<TimerEntry> {
        let entry = self.remove_at(0)?;
        self.positions.remove(&entry.key);
        Some(entry)
    }

    /// Removes every entry whose deadline is at or before `now`, earliest
    /// first.
    pub fn pop_expired(&mut self, now: Instant) -> Vec<TimerEntry> {
        let mut expired = Vec::new();
        while self.peek().is_some_and(|entry| entry.expires_at <= now) {
            if let Some(entry) = self.pop() {
                expired.push(entry);
            }
        }
        expired
    }

    pub fn clear(&mut self) {
        self.heap.clear();
        self.positions.clear();
    }

    /// Removes the entry at heap slot `pos` and restores heap order.
    /// The caller is responsible for the removed key's map entry.
    fn remove_at(&mut self, pos: usize) -> Option<TimerEntry> {
        let last = self.heap.len().checked_sub(1)?;
        self.swap(pos, last);
        let entry = self.heap.pop()?;

        if pos < self.heap.len() {
            // The element moved into `pos` came from the bottom of the heap;
            // it may belong above or below its new slot.
            if !self.sift_up(pos) {
                self.sift_down(pos);
            }
        }
        Some(entry)
    }

    /// Moves the entry at `pos` towards the root. Returns whether it moved.
    fn sift_up(&mut self, mut pos: usize) -> bool {
        let start = pos;
        while pos > 0 {
            let parent = (pos - 1) / 2;
            if self.heap[pos].expires_at >= self.heap[parent].expires_at {
                break;
            }
            self.swap(pos, parent);
            pos = parent;
        }
        pos != start
    }

    fn sift_down(&mut self, mut pos: usize) {
        let len = self.heap.len();
        loop {
            let left = 2 * pos + 1;
            let right = left + 1;
            let mut smallest = pos;

            if left < len && self.heap[left].expires_at < self.heap[smallest].expires_at {
                smallest = left;
            }
            if right < len && self.heap[right].expires_at < self.heap[smallest].expires_at {
                smallest = right;
            }
            if smallest == pos {
                return;
            }
            self.swap(pos, smallest);
            pos = smallest;
        }
    }

    fn swap(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        self.heap.swap(a, b);
        for pos in [a, b] {
            if let Some(slot) = self.positions.get_mut(&self.heap[pos].key) {
                *slot = pos;
            }
        }
    }

    /// Checks that the heap is ordered and that the key map and the heap
    /// describe exactly the same set of entries.
    #[cfg(test)]
    fn is_consistent(&self) -> bool {
        if self.heap.len() != self.positions.len() {
            return false;
        }
        let ordered = (1..self.heap.len())
            .all(|pos| self.heap[(pos - 1) / 2].expires_at <= self.heap[pos].expires_at);
        let mapped = self
            .heap
            .iter()
            .enumerate()
            .all(|(pos, entry)| self.positions.get(&entry.key) == Some(&pos));
        ordered && mapped
    }
}
