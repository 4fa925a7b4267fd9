//! Ring Buffer Implementation

use crate::RingBufferError;

/// Fixed-capacity ring buffer, single writer
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    /// Pre-allocated storage, grows until `capacity` then wraps
    storage: Vec<T>,
    /// Capacity of the buffer
    capacity: usize,
    /// Index of the next write once the buffer has wrapped
    head: usize,
}

impl<T> RingBuffer<T> {
    /// Create a new ring buffer holding at most `capacity` items
    pub fn new(capacity: usize) -> Result<Self, RingBufferError> {
        if capacity == 0 {
            return Err(RingBufferError::ZeroCapacity);
        }
        Ok(Self {
            storage: Vec::with_capacity(capacity),
            capacity,
            head: 0,
        })
    }

    /// Push an item, returning the evicted oldest item when full
    pub fn push(&mut self, item: T) -> Option<T> {
        if self.storage.len() < self.capacity {
            self.storage.push(item);
            return None;
        }
        let evicted = std::mem::replace(&mut self.storage[self.head], item);
        self.head = (self.head + 1) % self.capacity;
        Some(evicted)
    }

    /// Number of items currently held
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// Iterate in arrival order (oldest first)
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        let (wrapped, fresh) = self.storage.split_at(self.head);
        fresh.iter().chain(wrapped.iter())
    }

    /// Drop all items, keeping the allocation
    pub fn clear(&mut self) {
        self.storage.clear();
        self.head = 0;
    }
}

impl<T: Clone> RingBuffer<T> {
    /// Copy contents in arrival order
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }
}
