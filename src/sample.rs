//! Timestamped spectral sample vectors

use std::sync::Arc;
use std::time::Instant;

/// One measurement of `N` spectral magnitudes
///
/// The magnitudes are shared, so cloning a sample (and therefore copying a
/// window snapshot) only bumps a reference count.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    timestamp: f64,
    values: Arc<[f32]>,
}

impl Sample {
    pub fn new(timestamp: f64, values: impl Into<Arc<[f32]>>) -> Self {
        Self {
            timestamp,
            values: values.into(),
        }
    }

    /// Capture time in session-clock seconds
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn shared_values(&self) -> Arc<[f32]> {
        Arc::clone(&self.values)
    }

    pub fn bin_count(&self) -> usize {
        self.values.len()
    }
}

/// Monotonic seconds since the session started
#[derive(Debug, Clone, Copy)]
pub struct SessionClock {
    origin: Instant,
}

impl SessionClock {
    pub fn start() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    pub fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

impl Default for SessionClock {
    fn default() -> Self {
        Self::start()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_shares_values() {
        let sample = Sample::new(1.5, vec![1.0, 2.0, 3.0]);
        let copy = sample.clone();
        assert!(Arc::ptr_eq(&sample.shared_values(), &copy.shared_values()));
        assert_eq!(copy.bin_count(), 3);
        assert_eq!(copy.timestamp(), 1.5);
    }

    #[test]
    fn test_clock_is_monotonic() {
        let clock = SessionClock::start();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
        assert!(a >= 0.0);
    }
}
