//! Run summaries and small helpers for working with collected draws.

use crate::nuts::SampleRecord;
use ndarray::{Array1, Array2};
use num_traits::Float;
use std::fmt;

/// Diagnostic counters for one chain run.
///
/// Divergences and max-depth cutoffs are recoverable events, surfaced
/// here rather than as errors; `mean_accept` averages the acceptance
/// statistic over the post-warm-up iterations only.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RunStats<T> {
    pub n_divergent: usize,
    pub n_max_depth: usize,
    pub mean_accept: T,
    pub epsilon: T,
}

impl<T: Float> fmt::Display for RunStats<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "p(accept)≈{:.3}, epsilon={:.4e}, divergent={}, max-depth hits={}",
            self.mean_accept.to_f64().unwrap_or(f64::NAN),
            self.epsilon.to_f64().unwrap_or(f64::NAN),
            self.n_divergent,
            self.n_max_depth,
        )
    }
}

/// Stacks the recorded positions into an `[n_records, dim]` matrix for
/// downstream analysis.
pub fn positions_matrix<T: Float>(records: &[SampleRecord<T>]) -> Array2<T> {
    let n = records.len();
    let dim = records.first().map_or(0, |r| r.position.len());
    let flat: Vec<T> = records.iter().flat_map(|r| r.position.iter().copied()).collect();
    Array2::from_shape_vec((n, dim), flat).expect("records share one dimension")
}

/// The recorded log-densities as a vector.
pub fn logp_vector<T: Float>(records: &[SampleRecord<T>]) -> Array1<T> {
    records.iter().map(|r| r.logp).collect()
}

/// Empirical quantile with linear interpolation. Sorts its input.
pub fn quantile<T: Float>(values: &mut [T], q: f64) -> T {
    assert!(!values.is_empty(), "quantile of empty slice");
    assert!((0.0..=1.0).contains(&q), "q must lie in [0, 1]");
    values.sort_unstable_by(|a, b| a.partial_cmp(b).expect("no NaN in quantile input"));

    let pos = q * (values.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = T::from(pos - lo as f64).unwrap();
    values[lo] + (values[hi] - values[lo]) * frac
}
