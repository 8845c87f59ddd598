//! Fixed-capacity ring window

use crate::sample::Sample;

/// Slots reserved up front; larger rings grow as they fill
const PREALLOCATED: usize = 4096;

/// Circular buffer of the last `capacity` samples
///
/// `index` always points at the next slot to overwrite. Until the buffer
/// wraps for the first time it equals `buffer.len()`; afterwards the oldest
/// sample sits at `index` and chronological order is
/// `buffer[index..] ++ buffer[..index]`.
#[derive(Debug, Clone)]
pub struct RingWindow {
    buffer: Vec<Sample>,
    capacity: usize,
    index: usize,
    pushed: u64,
}

impl RingWindow {
    /// A zero capacity is bumped to one so every push has a slot
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buffer: Vec::with_capacity(capacity.min(PREALLOCATED)),
            capacity,
            index: 0,
            pushed: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Store a sample, overwriting the oldest once full
    pub fn push(&mut self, sample: Sample) {
        if self.buffer.len() < self.capacity {
            self.buffer.push(sample);
        } else {
            self.buffer[self.index] = sample;
        }
        self.index = (self.index + 1) % self.capacity;
        self.pushed += 1;
    }

    pub fn has_wrapped(&self) -> bool {
        self.pushed > self.capacity as u64
    }

    pub fn snapshot(&self) -> Vec<Sample> {
        if self.buffer.len() < self.capacity {
            return self.buffer.clone();
        }
        let mut out = Vec::with_capacity(self.capacity);
        out.extend_from_slice(&self.buffer[self.index..]);
        out.extend_from_slice(&self.buffer[..self.index]);
        out
    }

    pub fn newest(&self) -> Option<&Sample> {
        if self.buffer.is_empty() {
            return None;
        }
        let idx = self.index.checked_sub(1).unwrap_or(self.capacity - 1);
        self.buffer.get(idx)
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn total_pushed(&self) -> u64 {
        self.pushed
    }
}
