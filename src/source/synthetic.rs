//! Random spectra at a fixed cadence

use crate::sample::{Sample, SessionClock};
use crate::state::SessionState;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;

/// Upper bound (exclusive) of generated magnitudes
const MAX_MAGNITUDE: f32 = 100.0;

pub struct SyntheticSource {
    bin_count: usize,
    interval: Duration,
    rng: StdRng,
    state: Arc<SessionState>,
    clock: SessionClock,
}

impl SyntheticSource {
    pub fn new(
        bin_count: usize,
        interval: Duration,
        state: Arc<SessionState>,
        clock: SessionClock,
    ) -> Self {
        Self::with_rng(bin_count, interval, state, clock, StdRng::from_entropy())
    }

    /// Deterministic source for tests
    pub fn seeded(
        bin_count: usize,
        interval: Duration,
        state: Arc<SessionState>,
        clock: SessionClock,
        seed: u64,
    ) -> Self {
        Self::with_rng(bin_count, interval, state, clock, StdRng::seed_from_u64(seed))
    }

    fn with_rng(
        bin_count: usize,
        interval: Duration,
        state: Arc<SessionState>,
        clock: SessionClock,
        rng: StdRng,
    ) -> Self {
        Self {
            bin_count,
            interval,
            rng,
            state,
            clock,
        }
    }

    /// Sleep one interval, then emit `bin_count` values in `[0, 100)`
    pub async fn produce(&mut self) -> Option<Sample> {
        let state = Arc::clone(&self.state);
        tokio::select! {
            _ = state.wait_stopped() => return None,
            _ = tokio::time::sleep(self.interval) => {}
        }
        if !state.wait_until_running().await {
            return None;
        }

        let values: Vec<f32> = (0..self.bin_count)
            .map(|_| self.rng.gen_range(0.0..MAX_MAGNITUDE))
            .collect();
        Some(Sample::new(self.clock.now(), values))
    }
}
