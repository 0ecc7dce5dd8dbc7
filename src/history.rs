use std::collections::VecDeque;

use crate::color::Color;
use crate::config::DEFAULT_RECENT_CAPACITY;

/// Recently selected colors, oldest first, unique by hex form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecentColors {
    capacity: usize,
    entries: VecDeque<Color>,
}

impl Default for RecentColors {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_RECENT_CAPACITY)
    }
}

impl RecentColors {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity + 1),
        }
    }

    /// Remember a selection. Colors already present (same hex) are left where
    /// they are; otherwise the color is appended and the oldest entry evicted
    /// once the capacity is exceeded. Returns whether the history changed.
    pub fn record(&mut self, color: Color) -> bool {
        let hex = color.to_hex();
        if self.entries.iter().any(|c| c.to_hex() == hex) {
            return false;
        }
        self.entries.push_back(color);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
        true
    }

    /// Entries from oldest to newest.
    pub fn list(&self) -> impl ExactSizeIterator<Item = Color> + '_ {
        self.entries.iter().copied()
    }

    pub fn get(&self, index: usize) -> Option<Color> {
        self.entries.get(index).copied()
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
}
