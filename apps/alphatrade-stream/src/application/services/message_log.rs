//! Bounded log of status broadcasts.
//!
//! Market status and exchange messages are kept for later retrieval. The log
//! is a ring buffer: once full, the oldest entry is evicted.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

/// Default number of retained entries.
pub const DEFAULT_MESSAGE_LOG_CAPACITY: usize = 1_000;

/// Append-only ring buffer with eviction.
#[derive(Debug)]
pub struct MessageLog<T> {
    capacity: usize,
    entries: Mutex<VecDeque<T>>,
    evicted: AtomicU64,
}

impl<T: Clone> MessageLog<T> {
    /// Create a log retaining at most `capacity` entries (minimum 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(1_024))),
            evicted: AtomicU64::new(0),
        }
    }

    /// Append an entry, evicting the oldest one when full.
    pub fn push(&self, entry: T) {
        let mut entries = self.entries.lock();
        if entries.len() == self.capacity {
            entries.pop_front();
            self.evicted.fetch_add(1, Ordering::Relaxed);
        }
        entries.push_back(entry);
    }

    /// Copy of the retained entries, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<T> {
        self.entries.lock().iter().cloned().collect()
    }

    /// Most recent entry.
    #[must_use]
    pub fn latest(&self) -> Option<T> {
        self.entries.lock().back().cloned()
    }

    /// Number of retained entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Check if the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Maximum number of retained entries.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of entries evicted so far.
    #[must_use]
    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }
}

impl<T: Clone> Default for MessageLog<T> {
    fn default() -> Self {
        Self::new(DEFAULT_MESSAGE_LOG_CAPACITY)
    }
}
