//! Bounded, time-ordered sample history
//!
//! One writer (the poll loop) pushes; any number of readers take snapshots.
//! A single mutex guards the deque, so a reader sees either the state before
//! a push (and its eviction) or the state after it, never a mix.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::types::Sample;

/// Number of samples kept by default.
pub const DEFAULT_CAPACITY: usize = 500;

/// Shared handle to the sample history.
pub type SampleHistory = Arc<RollingBuffer<Sample>>;

/// Fixed-capacity FIFO buffer; the oldest entry is evicted on overflow.
#[derive(Debug)]
pub struct RollingBuffer<T> {
    items: Mutex<VecDeque<T>>,
    capacity: usize,
}

impl<T: Clone> RollingBuffer<T> {
    /// Create an empty buffer. A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { items: Mutex::new(VecDeque::with_capacity(capacity)), capacity }
    }

    /// Create a shareable buffer.
    pub fn shared(capacity: usize) -> Arc<Self> {
        Arc::new(Self::new(capacity))
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        // A panic while holding the lock cannot leave the deque half-updated:
        // every mutation is a single VecDeque call.
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an item, evicting the oldest one first when full.
    pub fn push(&self, item: T) {
        let mut items = self.lock();
        if items.len() == self.capacity {
            items.pop_front();
        }
        items.push_back(item);
    }

    /// Append several items, applying the eviction rule to each.
    pub fn extend<I: IntoIterator<Item = T>>(&self, iter: I) {
        let mut items = self.lock();
        for item in iter {
            if items.len() == self.capacity {
                items.pop_front();
            }
            items.push_back(item);
        }
    }

    /// Copy of the current contents, oldest first.
    pub fn snapshot(&self) -> Vec<T> {
        self.lock().iter().cloned().collect()
    }

    /// Most recent item, if any.
    pub fn latest(&self) -> Option<T> {
        self.lock().back().cloned()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl<T: Clone> Default for RollingBuffer<T> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
