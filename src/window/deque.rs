//! Timestamp-cutoff deque window

use crate::sample::Sample;
use std::collections::VecDeque;

/// Samples whose timestamps fall within `horizon_s` of the latest "now"
///
/// Timestamps are kept non-decreasing: a sample stamped earlier than the
/// current newest one is re-stamped to the newest timestamp on push.
#[derive(Debug, Clone)]
pub struct DequeWindow {
    samples: VecDeque<Sample>,
    horizon_s: f64,
    pushed: u64,
}

impl DequeWindow {
    pub fn new(horizon_s: f64) -> Self {
        Self {
            samples: VecDeque::new(),
            horizon_s,
            pushed: 0,
        }
    }

    pub fn horizon_s(&self) -> f64 {
        self.horizon_s
    }

    /// Append a sample, then evict relative to its timestamp
    pub fn push(&mut self, sample: Sample) {
        let sample = match self.samples.back() {
            Some(last) if sample.timestamp() < last.timestamp() => {
                log::debug!(
                    "out-of-order sample at {:.6}s clamped to {:.6}s",
                    sample.timestamp(),
                    last.timestamp()
                );
                Sample::new(last.timestamp(), sample.shared_values())
            }
            _ => sample,
        };
        let now = sample.timestamp();
        self.samples.push_back(sample);
        self.pushed += 1;
        self.evict(now);
    }

    /// Remove every leading sample with `timestamp < now - horizon`
    pub fn evict(&mut self, now: f64) {
        let cutoff = now - self.horizon_s;
        while self
            .samples
            .front()
            .is_some_and(|oldest| oldest.timestamp() < cutoff)
        {
            self.samples.pop_front();
        }
    }

    pub fn snapshot(&self) -> Vec<Sample> {
        self.samples.iter().cloned().collect()
    }

    pub fn newest(&self) -> Option<&Sample> {
        self.samples.back()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn total_pushed(&self) -> u64 {
        self.pushed
    }
}
