//! Resampling of irregular snapshots onto a uniform time grid
//!
//! Socket records are stamped when they are extracted, so their spacing
//! jitters with network chunking and backpressure. For display and export the
//! window is laid onto `M` evenly spaced grid points covering `[-W, 0]`
//! seconds relative to "now". Each sample lands on the first grid point at or
//! after its relative time (a left-sided binary search); when several samples
//! land on the same point the latest one wins, and points nobody lands on
//! stay missing (NaN in the exported matrix).
//!
//! The mapping is deliberately lossy and many-to-one: it is a view for
//! plotting, not a resampler that preserves every measurement.

use crate::config::{MAX_GRID_POINTS, steps};
use crate::sample::Sample;
use std::sync::Arc;

/// Uniform grid description: `points` times evenly spaced over `[-span, 0]`
#[derive(Debug, Clone, PartialEq)]
pub struct GridAligner {
    times: Vec<f64>,
}

impl GridAligner {
    /// Grid of `W / Δ` points over `[-W, 0]`, both endpoints included
    ///
    /// The point count is capped at [`MAX_GRID_POINTS`].
    pub fn new(span_s: f64, step_s: f64) -> Self {
        let points = steps(span_s, step_s).map_or(MAX_GRID_POINTS, |n| n.min(MAX_GRID_POINTS));
        Self::with_points(span_s, points)
    }

    pub fn with_points(span_s: f64, points: usize) -> Self {
        let points = points.max(1);
        let times = if points == 1 {
            vec![-span_s]
        } else {
            let step = span_s / (points - 1) as f64;
            (0..points)
                .map(|i| if i == points - 1 { 0.0 } else { -span_s + i as f64 * step })
                .collect()
        };
        Self { times }
    }

    /// Grid times in seconds relative to "now", ascending
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn points(&self) -> usize {
        self.times.len()
    }

    /// Grid index for a relative time, `None` if it falls past the last point
    pub fn cell_for(&self, relative_s: f64) -> Option<usize> {
        let idx = self.times.partition_point(|&g| g < relative_s);
        (idx < self.times.len()).then_some(idx)
    }

    /// Map a snapshot onto the grid with `now` as the zero point
    pub fn align(&self, snapshot: &[Sample], now: f64, bin_count: usize) -> AlignedGrid {
        let mut cells: Vec<Option<Arc<[f32]>>> = vec![None; self.times.len()];
        for sample in snapshot {
            if let Some(idx) = self.cell_for(sample.timestamp() - now) {
                cells[idx] = Some(sample.shared_values());
            }
        }
        AlignedGrid {
            times: self.times.clone(),
            bin_count,
            cells,
        }
    }
}

/// A snapshot laid onto a uniform grid; `None` cells are gaps
#[derive(Debug, Clone)]
pub struct AlignedGrid {
    times: Vec<f64>,
    bin_count: usize,
    cells: Vec<Option<Arc<[f32]>>>,
}

impl AlignedGrid {
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn cell(&self, idx: usize) -> Option<&[f32]> {
        self.cells.get(idx).and_then(|c| c.as_deref())
    }

    pub fn is_missing(&self, idx: usize) -> bool {
        self.cell(idx).is_none()
    }

    pub fn missing_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_none()).count()
    }

    /// Row-major `time × frequency` matrix with NaN in missing rows
    pub fn to_matrix(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.cells.len() * self.bin_count);
        for cell in &self.cells {
            match cell {
                Some(values) => {
                    out.extend(values.iter().copied().take(self.bin_count));
                    out.extend(std::iter::repeat_n(
                        f32::NAN,
                        self.bin_count.saturating_sub(values.len()),
                    ));
                }
                None => out.extend(std::iter::repeat_n(f32::NAN, self.bin_count)),
            }
        }
        out
    }
}

/// Row-major `time × frequency` matrix of a snapshot, in snapshot order
///
/// Rows shorter than `bin_count` are padded with NaN.
pub fn chronological_matrix(snapshot: &[Sample], bin_count: usize) -> Vec<f32> {
    let mut out = Vec::with_capacity(snapshot.len() * bin_count);
    for sample in snapshot {
        let values = sample.values();
        out.extend(values.iter().copied().take(bin_count));
        out.extend(std::iter::repeat_n(
            f32::NAN,
            bin_count.saturating_sub(values.len()),
        ));
    }
    out
}

/// Sample times relative to `reference`, in snapshot order
pub fn relative_times(snapshot: &[Sample], reference: f64) -> Vec<f64> {
    snapshot.iter().map(|s| s.timestamp() - reference).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_spans_window() {
        let grid = GridAligner::new(10.0, 0.05);
        assert_eq!(grid.points(), 200);
        assert_eq!(grid.times()[0], -10.0);
        assert_eq!(grid.times()[199], 0.0);
        assert!(grid.times().windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_grid_size_is_capped() {
        assert_eq!(GridAligner::new(1e300, 0.001).points(), MAX_GRID_POINTS);
        assert_eq!(GridAligner::new(1.0, 0.0).points(), MAX_GRID_POINTS);
    }

    #[test]
    fn test_cell_for_is_left_sided() {
        let grid = GridAligner::with_points(4.0, 5); // -4 -3 -2 -1 0
        assert_eq!(grid.cell_for(-3.0), Some(1));
        assert_eq!(grid.cell_for(-2.5), Some(2));
        assert_eq!(grid.cell_for(-9.0), Some(0));
        assert_eq!(grid.cell_for(0.0), Some(4));
        assert_eq!(grid.cell_for(0.1), None);
    }

    #[test]
    fn test_dense_aligned_input_fills_every_cell() {
        let grid = GridAligner::new(10.0, 0.5);
        let snapshot: Vec<Sample> = grid
            .times()
            .iter()
            .enumerate()
            .map(|(i, &t)| Sample::new(t, vec![i as f32; 3]))
            .collect();

        let aligned = grid.align(&snapshot, 0.0, 3);
        assert_eq!(aligned.missing_count(), 0);
        for i in 0..grid.points() {
            assert_eq!(aligned.cell(i), Some(&[i as f32; 3][..]));
        }
    }

    #[test]
    fn test_gap_produces_missing_cells() {
        let grid = GridAligner::new(10.0, 0.05);
        let snapshot: Vec<Sample> = (0..=500)
            .map(|k| -10.0 + k as f64 * 0.02)
            .filter(|&t| !(t > -7.0 && t < -2.0))
            .map(|t| Sample::new(t, vec![1.0, 2.0]))
            .collect();

        let aligned = grid.align(&snapshot, 0.0, 2);
        for (i, &g) in grid.times().iter().enumerate() {
            if (-6.9..=-2.1).contains(&g) {
                assert!(aligned.is_missing(i), "cell at {g} should be missing");
            } else if g < -7.1 || g > -1.9 {
                assert!(!aligned.is_missing(i), "cell at {g} should be filled");
            }
        }
        assert!(aligned.missing_count() >= 90);

        let matrix = aligned.to_matrix();
        assert_eq!(matrix.len(), grid.points() * 2);
        let gap_row = grid.cell_for(-4.5).unwrap();
        assert!(matrix[gap_row * 2].is_nan());
        assert!(matrix[gap_row * 2 + 1].is_nan());
    }

    #[test]
    fn test_last_write_wins_on_collision() {
        let grid = GridAligner::with_points(4.0, 5);
        let snapshot = vec![
            Sample::new(97.4, vec![1.0]),
            Sample::new(97.8, vec![2.0]),
        ];
        // both map to -2.0 relative to now = 100
        let aligned = grid.align(&snapshot, 100.0, 1);
        assert_eq!(aligned.cell(2), Some(&[2.0][..]));
        assert_eq!(aligned.missing_count(), 4);
    }

    #[test]
    fn test_samples_after_now_are_dropped() {
        let grid = GridAligner::with_points(4.0, 5);
        let aligned = grid.align(&[Sample::new(10.5, vec![1.0])], 10.0, 1);
        assert_eq!(aligned.missing_count(), 5);
    }

    #[test]
    fn test_chronological_matrix_pads_short_rows() {
        let snapshot = vec![
            Sample::new(0.0, vec![1.0, 2.0]),
            Sample::new(1.0, vec![3.0]),
        ];
        let matrix = chronological_matrix(&snapshot, 2);
        assert_eq!(&matrix[..3], &[1.0, 2.0, 3.0]);
        assert!(matrix[3].is_nan());
        assert_eq!(relative_times(&snapshot, 1.0), vec![-1.0, 0.0]);
    }
}
