//! Sliding windows over the sample stream
//!
//! A window holds the most recent samples within some horizon and hands out
//! chronologically ordered snapshots (oldest first). Two eviction policies are
//! provided:
//! - `RingWindow`: fixed capacity, the oldest sample is overwritten on
//!   overflow. Suited to sources with a regular cadence.
//! - `DequeWindow`: variable length, samples older than `now - horizon` are
//!   dropped. Suited to sources whose arrival times are irregular.
//!
//! Windows are plain single-owner containers; `WindowSet` supplies the lock
//! that makes them safe to share between the acquisition loop and readers.

mod deque;
mod ring;

pub use deque::DequeWindow;
pub use ring::RingWindow;

use crate::sample::Sample;

/// Chronological copy of a window's contents, oldest first
///
/// Cloning the samples shares their magnitude buffers, so a snapshot costs
/// one reference-count bump per sample regardless of the bin count.
pub type Snapshot = Vec<Sample>;

/// Eviction policy of a window
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Eviction {
    /// Keep at most this many samples
    Capacity(usize),
    /// Keep samples no older than this many seconds
    Horizon(f64),
}

#[derive(Debug, Clone)]
pub enum SlidingWindow {
    Ring(RingWindow),
    Deque(DequeWindow),
}

impl SlidingWindow {
    pub fn new(eviction: Eviction) -> Self {
        match eviction {
            Eviction::Capacity(capacity) => SlidingWindow::Ring(RingWindow::new(capacity)),
            Eviction::Horizon(horizon_s) => SlidingWindow::Deque(DequeWindow::new(horizon_s)),
        }
    }

    pub fn eviction(&self) -> Eviction {
        match self {
            SlidingWindow::Ring(w) => Eviction::Capacity(w.capacity()),
            SlidingWindow::Deque(w) => Eviction::Horizon(w.horizon_s()),
        }
    }

    pub fn push(&mut self, sample: Sample) {
        match self {
            SlidingWindow::Ring(w) => w.push(sample),
            SlidingWindow::Deque(w) => w.push(sample),
        }
    }

    /// Drop samples that have aged out as of `now`
    ///
    /// Ring windows evict by capacity only, so this is a no-op for them.
    pub fn evict(&mut self, now: f64) {
        if let SlidingWindow::Deque(w) = self {
            w.evict(now);
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        match self {
            SlidingWindow::Ring(w) => w.snapshot(),
            SlidingWindow::Deque(w) => w.snapshot(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            SlidingWindow::Ring(w) => w.len(),
            SlidingWindow::Deque(w) => w.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Samples pushed since creation, evicted ones included
    pub fn total_pushed(&self) -> u64 {
        match self {
            SlidingWindow::Ring(w) => w.total_pushed(),
            SlidingWindow::Deque(w) => w.total_pushed(),
        }
    }

    pub fn newest(&self) -> Option<&Sample> {
        match self {
            SlidingWindow::Ring(w) => w.newest(),
            SlidingWindow::Deque(w) => w.newest(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(t: f64) -> Sample {
        Sample::new(t, vec![t as f32; 4])
    }

    #[test]
    fn test_policy_selects_variant() {
        assert!(matches!(
            SlidingWindow::new(Eviction::Capacity(3)),
            SlidingWindow::Ring(_)
        ));
        assert!(matches!(
            SlidingWindow::new(Eviction::Horizon(3.0)),
            SlidingWindow::Deque(_)
        ));
        assert_eq!(
            SlidingWindow::new(Eviction::Horizon(2.5)).eviction(),
            Eviction::Horizon(2.5)
        );
    }

    #[test]
    fn test_empty_window_snapshot_is_empty() {
        for eviction in [Eviction::Capacity(4), Eviction::Horizon(4.0)] {
            let window = SlidingWindow::new(eviction);
            assert!(window.is_empty());
            assert!(window.snapshot().is_empty());
            assert!(window.newest().is_none());
        }
    }

    #[test]
    fn test_evict_is_noop_for_ring() {
        let mut window = SlidingWindow::new(Eviction::Capacity(4));
        window.push(sample(0.0));
        window.push(sample(1.0));
        window.evict(1000.0);
        assert_eq!(window.len(), 2);
    }

    #[test]
    fn test_end_to_end_ten_second_window() {
        // N=4, horizon=10s, interval=1s
        let mut ring = SlidingWindow::new(Eviction::Capacity(10));
        let mut deque = SlidingWindow::new(Eviction::Horizon(10.0));

        for t in 0..10 {
            ring.push(sample(t as f64));
            deque.push(sample(t as f64));
        }
        for window in [&ring, &deque] {
            let snap = window.snapshot();
            assert_eq!(snap.len(), 10);
            assert_eq!(snap[0].timestamp(), 0.0);
            assert_eq!(snap[9].timestamp(), 9.0);
        }

        ring.push(sample(10.0));
        let snap = ring.snapshot();
        assert_eq!(snap.len(), 10);
        assert_eq!(snap[0].timestamp(), 1.0);
        assert_eq!(snap[9].timestamp(), 10.0);

        // The deque keeps t=0 while it sits exactly on the horizon boundary
        deque.push(sample(10.0));
        assert_eq!(deque.snapshot()[0].timestamp(), 0.0);
        deque.evict(10.5);
        let snap = deque.snapshot();
        assert_eq!(snap.len(), 10);
        assert_eq!(snap[0].timestamp(), 1.0);
    }
}
