//! Statistics over window snapshots

use crate::config::FrequencyAxis;
use crate::sample::Sample;

/// Column-wise arithmetic mean of every sample in the snapshot
///
/// Returns `None` for an empty snapshot. Samples shorter than the first one
/// contribute only to the bins they have.
pub fn mean_spectrum(snapshot: &[Sample]) -> Option<Vec<f64>> {
    let bins = snapshot.first()?.bin_count();
    let mut sums = vec![0.0f64; bins];
    let mut counts = vec![0u32; bins];

    for sample in snapshot {
        for (bin, &value) in sample.values().iter().take(bins).enumerate() {
            sums[bin] += value as f64;
            counts[bin] += 1;
        }
    }

    Some(
        sums.into_iter()
            .zip(counts)
            .map(|(sum, count)| if count == 0 { f64::NAN } else { sum / count as f64 })
            .collect(),
    )
}

/// Index of the largest value, first one on ties; NaN never wins
pub fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        match best {
            Some((_, current)) if v <= current => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Frequency of the bin with the largest mean magnitude
///
/// `None` when the snapshot is empty (the window is not ready yet) or when
/// every mean is NaN.
pub fn peak_frequency(snapshot: &[Sample], axis: &FrequencyAxis) -> Option<f64> {
    let mean = mean_spectrum(snapshot)?;
    let bin = argmax(&mean)?;
    axis.get(bin)
}
