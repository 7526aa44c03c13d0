//! Scalar feature library
//!
//! Every feature has a kernel that works on one window (or one spectrum row)
//! as a plain slice, plus a batch form that applies the kernel to each row
//! independently and stacks the results in input order. Per-row failures
//! stay per-row: a degenerate window yields an `Err` in its own slot.

mod amplitude;
mod spectral;
mod tonality;

pub use amplitude::{
    dsar, dsar_windows, kurtosis, kurtosis_kernel, rsam, rsam_kernel, rsem, rsem_kernel,
};
pub use spectral::{
    band_ratio, band_ratio_kernel, centroid_frequency, centroid_frequency_kernel,
    centroid_frequency_normalized, centroid_frequency_normalized_kernel, dominant_frequency,
    dominant_frequency_kernel, median_rank_frequency, median_rank_frequency_kernel,
};
pub use tonality::{tonality, tonality_kernel};

use chrono::{DateTime, Utc};
use crotalus_core::CrotalusResult;
use ndarray::ArrayView2;

/// Per-window values with their window start times
#[derive(Debug, Clone, PartialEq)]
pub struct Windowed<T> {
    pub timestamps: Vec<DateTime<Utc>>,
    pub values: Vec<CrotalusResult<T>>,
}

/// Apply `kernel` to every row of `windows`
pub(crate) fn map_rows<R>(windows: ArrayView2<'_, f64>, kernel: impl Fn(&[f64]) -> R) -> Vec<R> {
    windows
        .rows()
        .into_iter()
        .map(|row| match row.as_slice() {
            Some(slice) => kernel(slice),
            None => kernel(&row.to_vec()),
        })
        .collect()
}

/// Median of `values`, averaging the two middle elements for even lengths
///
/// NaN for an empty slice.
pub(crate) fn median(values: &[f64]) -> f64 {
    let n = values.len();
    if n == 0 {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        0.5 * (sorted[n / 2 - 1] + sorted[n / 2])
    }
}
