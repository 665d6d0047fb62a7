//! Dedup Window - Bounded recency structure for duplicate suppression.

use std::collections::{HashSet, VecDeque};

/// Bounded ordered collection of recently seen dedup keys.
///
/// `seen` is a combined check-and-insert: callers must serialize access
/// (the ingestion entry point holds it behind a mutex).
pub struct DedupWindow {
    capacity: usize,
    order: VecDeque<String>,
    members: HashSet<String>,
}

impl DedupWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity),
            members: HashSet::with_capacity(capacity),
        }
    }

    /// Check-and-insert.
    ///
    /// Returns `true` and leaves state unchanged if the key is already
    /// present; otherwise inserts it (evicting the oldest entry once at
    /// capacity) and returns `false`. Membership test is O(1) amortized.
    pub fn seen(&mut self, key: &str) -> bool {
        if self.capacity == 0 {
            // Zero-capacity window remembers nothing
            return false;
        }
        if self.members.contains(key) {
            return true;
        }
        if self.order.len() == self.capacity
            && let Some(oldest) = self.order.pop_front()
        {
            self.members.remove(&oldest);
        }
        self.order.push_back(key.to_string());
        self.members.insert(key.to_string());
        false
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
