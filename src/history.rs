use std::collections::VecDeque;

use log::trace;
use time::OffsetDateTime;

pub const DEFAULT_HISTORY_CAPACITY: usize = 10;

// History entry
//------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Entry<T> {
    pub id: u64,
    pub input: String,
    pub item: T,
    pub timestamp: OffsetDateTime,
}

// Bounded history of generated or scanned symbols
//------------------------------------------------------------------------------

/// Ring buffer of the most recent entries. Pushing into a full history evicts the oldest entry.
/// Ids increase monotonically and are never reused, even after eviction or `clear`.
#[derive(Debug, Clone)]
pub struct History<T> {
    entries: VecDeque<Entry<T>>, // Oldest at the front
    capacity: usize,
    next_id: u64,
}

impl<T> Default for History<T> {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }
}

impl<T> History<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// A capacity of 0 is clamped to 1
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { entries: VecDeque::with_capacity(capacity), capacity, next_id: 0 }
    }

    pub fn push(&mut self, input: impl Into<String>, item: T) -> u64 {
        if self.entries.len() == self.capacity {
            if let Some(old) = self.entries.pop_front() {
                trace!("History full, evicting entry {}", old.id);
            }
        }

        let id = self.next_id;
        self.next_id += 1;
        let entry = Entry { id, input: input.into(), item, timestamp: OffsetDateTime::now_utc() };
        self.entries.push_back(entry);
        id
    }

    pub fn get(&self, id: u64) -> Option<&Entry<T>> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn remove(&mut self, id: u64) -> Option<Entry<T>> {
        let idx = self.entries.iter().position(|e| e.id == id)?;
        self.entries.remove(idx)
    }

    pub fn latest(&self) -> Option<&Entry<T>> {
        self.entries.back()
    }

    /// Newest first
    pub fn iter(&self) -> impl Iterator<Item = &Entry<T>> {
        self.entries.iter().rev()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod history_tests {
    use test_case::test_case;

    use super::{History, DEFAULT_HISTORY_CAPACITY};

    #[test]
    fn test_default_capacity() {
        let history = History::<()>::new();
        assert_eq!(history.capacity(), DEFAULT_HISTORY_CAPACITY);
        assert!(history.is_empty());
        assert!(history.latest().is_none());
    }

    #[test_case(0, 1)]
    #[test_case(1, 1)]
    #[test_case(25, 25)]
    fn test_with_capacity(requested: usize, exp: usize) {
        assert_eq!(History::<u8>::with_capacity(requested).capacity(), exp);
    }

    #[test]
    fn test_push_and_evict() {
        let mut history = History::new();
        let ids = (0..12)
            .map(|i| history.push(format!("https://example.com/{i}"), i))
            .collect::<Vec<_>>();

        assert_eq!(ids, (0..12).collect::<Vec<u64>>());
        assert_eq!(history.len(), 10);

        // Two oldest entries are gone
        assert!(history.get(0).is_none());
        assert!(history.get(1).is_none());
        assert_eq!(history.get(2).map(|e| e.item), Some(2));

        let items = history.iter().map(|e| e.item).collect::<Vec<_>>();
        assert_eq!(items, (2..12).rev().collect::<Vec<_>>());
        assert_eq!(history.latest().map(|e| e.input.as_str()), Some("https://example.com/11"));
    }

    #[test]
    fn test_remove() {
        let mut history = History::with_capacity(3);
        let a = history.push("a", 'a');
        let b = history.push("b", 'b');
        let c = history.push("c", 'c');

        assert_eq!(history.remove(b).map(|e| e.item), Some('b'));
        assert!(history.remove(b).is_none());
        assert_eq!(history.iter().map(|e| e.id).collect::<Vec<_>>(), [c, a]);

        // Freed slot is reused without evicting
        let d = history.push("d", 'd');
        assert_eq!(history.len(), 3);
        assert!(history.get(a).is_some());
        assert!(d > c);
    }

    #[test]
    fn test_clear_keeps_ids_increasing() {
        let mut history = History::with_capacity(2);
        history.push("x", 1);
        let last = history.push("y", 2);
        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.push("z", 3), last + 1);
    }

    #[test]
    fn test_timestamps_ordered() {
        let mut history = History::new();
        history.push("first", ());
        history.push("second", ());
        let stamps = history.iter().map(|e| e.timestamp).collect::<Vec<_>>();
        assert!(stamps[0] >= stamps[1]);
    }
}
