//! Frequency band layouts and spectral band aggregation

use crate::config::{LinearBandParams, OctaveBandParams};
use crate::spectrum::Spectrum;
use crotalus_core::{CrotalusError, CrotalusResult};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Slack for band counts so `ceil` does not round up on representation
/// error, e.g. `(0.7 - 0.4) / 0.1`
const COUNT_EPSILON: f64 = 1e-9;

/// Upper limit on the number of bands one layout may produce
pub const MAX_BANDS: usize = 1_000_000;

/// One frequency band
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub lower: f64,
    pub center: f64,
    pub upper: f64,
}

/// Ordered, non-empty set of bands with `lower < center < upper`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandSet {
    lower: Vec<f64>,
    center: Vec<f64>,
    upper: Vec<f64>,
}

impl BandSet {
    pub fn new(lower: Vec<f64>, center: Vec<f64>, upper: Vec<f64>) -> CrotalusResult<Self> {
        if lower.is_empty() || lower.len() != center.len() || lower.len() != upper.len() {
            return Err(CrotalusError::config(
                "bands",
                "lower, center and upper must be non-empty and of equal length",
            ));
        }
        let ordered = lower
            .iter()
            .zip(&center)
            .zip(&upper)
            .all(|((l, c), u)| l < c && c < u);
        let increasing = center.windows(2).all(|w| w[0] < w[1]);
        if !ordered || !increasing {
            return Err(CrotalusError::config("bands", "bands must be ordered and increasing"));
        }
        Ok(Self { lower, center, upper })
    }

    pub fn len(&self) -> usize {
        self.center.len()
    }

    pub fn is_empty(&self) -> bool {
        self.center.is_empty()
    }

    pub fn lower(&self) -> &[f64] {
        &self.lower
    }

    pub fn center(&self) -> &[f64] {
        &self.center
    }

    pub fn upper(&self) -> &[f64] {
        &self.upper
    }

    pub fn iter(&self) -> impl Iterator<Item = Band> + '_ {
        self.lower
            .iter()
            .zip(&self.center)
            .zip(&self.upper)
            .map(|((&lower, &center), &upper)| Band { lower, center, upper })
    }
}

/// Contiguous fixed-width bands starting at `f_lower`
///
/// `ceil((f_upper - f_lower) / f_delta)` bands; the last one may extend past
/// `f_upper`.
pub fn linear_bands(f_lower: f64, f_upper: f64, f_delta: f64) -> CrotalusResult<BandSet> {
    if !(f_delta > 0.0) || !f_delta.is_finite() {
        return Err(CrotalusError::config("f_delta", "must be positive"));
    }
    if !(f_lower >= 0.0 && f_lower < f_upper) || !f_upper.is_finite() {
        return Err(CrotalusError::config("f_lower", "need 0 <= f_lower < f_upper"));
    }

    let count = band_count("f_delta", (f_upper - f_lower) / f_delta)?;
    let lower: Vec<f64> = (0..count).map(|i| f_lower + i as f64 * f_delta).collect();
    let upper = lower.iter().map(|l| l + f_delta).collect();
    let center = lower.iter().map(|l| l + 0.5 * f_delta).collect();
    BandSet::new(lower, center, upper)
}

/// Fractional-octave bands with centers `f_lower * 2^(i * fraction)`
pub fn octave_bands(fraction: f64, f_lower: f64, f_upper: f64) -> CrotalusResult<BandSet> {
    if !(fraction > 0.0) || !fraction.is_finite() {
        return Err(CrotalusError::config("fraction", "must be positive"));
    }
    if !(f_lower > 0.0 && f_lower < f_upper) || !f_upper.is_finite() {
        return Err(CrotalusError::config("f_lower", "need 0 < f_lower < f_upper"));
    }

    let count = band_count("fraction", (f_upper / f_lower).log2() / fraction)?;
    let half = 2f64.powf(fraction / 2.0);
    let center: Vec<f64> = (0..count)
        .map(|i| f_lower * 2f64.powf(i as f64 * fraction))
        .collect();
    let lower = center.iter().map(|c| c / half).collect();
    let upper = center.iter().map(|c| c * half).collect();
    BandSet::new(lower, center, upper)
}

fn band_count(parameter: &str, span: f64) -> CrotalusResult<usize> {
    let count = (span - COUNT_EPSILON).ceil();
    if !(count <= MAX_BANDS as f64) {
        return Err(CrotalusError::config(
            parameter,
            format!("layout needs {} bands, at most {} allowed", count, MAX_BANDS),
        ));
    }
    Ok(count.max(0.0) as usize)
}

impl LinearBandParams {
    pub fn bands(&self) -> CrotalusResult<BandSet> {
        linear_bands(self.f_lower, self.f_upper, self.f_delta)
    }
}

impl OctaveBandParams {
    pub fn bands(&self) -> CrotalusResult<BandSet> {
        octave_bands(self.fraction, self.f_lower, self.f_upper)
    }
}

/// Index of the frequency closest to `target`; ties resolve to the lower bin
pub(crate) fn nearest_bin(frequencies: &[f64], target: f64) -> usize {
    let mut best = 0;
    let mut best_distance = f64::INFINITY;
    for (i, &f) in frequencies.iter().enumerate() {
        let distance = (f - target).abs();
        if distance < best_distance {
            best = i;
            best_distance = distance;
        }
    }
    best
}

/// Mean amplitude per band over one spectrum row
///
/// Each edge snaps to its nearest bin and the range is inclusive on both
/// ends, so every band covers at least one bin.
pub fn aggregate_row(frequencies: &[f64], amplitude: &[f64], bands: &BandSet) -> Vec<f64> {
    bands
        .iter()
        .map(|band| {
            let lo = nearest_bin(frequencies, band.lower);
            let hi = nearest_bin(frequencies, band.upper).max(lo);
            let slice = &amplitude[lo..=hi];
            slice.iter().sum::<f64>() / slice.len() as f64
        })
        .collect()
}

/// Band means for every row of a spectrum, shaped `[n_rows, n_bands]`
pub fn aggregate(spectrum: &Spectrum, bands: &BandSet) -> Array2<f64> {
    let mut out = Array2::zeros((spectrum.n_rows(), bands.len()));
    for (mut dst, row) in out.rows_mut().into_iter().zip(spectrum.rows()) {
        for (d, v) in dst.iter_mut().zip(aggregate_row(spectrum.frequencies(), row, bands)) {
            *d = v;
        }
    }
    out
}

/// Spectral amplitude on linear and octave bands in one pass
#[derive(Debug, Clone, PartialEq)]
pub struct Ssam {
    pub linear: Array2<f64>,
    pub octave: Array2<f64>,
}

pub fn ssam(spectrum: &Spectrum, linear: &BandSet, octave: &BandSet) -> Ssam {
    Ssam {
        linear: aggregate(spectrum, linear),
        octave: aggregate(spectrum, octave),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: &[f64], b: &[f64], tol: f64) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() < tol)
    }

    #[test]
    fn test_linear_bands() {
        let bands = linear_bands(0.0, 10.0, 2.0).unwrap();
        assert_eq!(bands.len(), 5);
        assert_eq!(bands.lower(), &[0.0, 2.0, 4.0, 6.0, 8.0]);
        assert_eq!(bands.upper(), &[2.0, 4.0, 6.0, 8.0, 10.0]);
        assert_eq!(bands.center(), &[1.0, 3.0, 5.0, 7.0, 9.0]);
    }

    #[test]
    fn test_linear_band_count_rounding() {
        assert_eq!(linear_bands(0.4, 0.7, 0.1).unwrap().len(), 3);
        assert_eq!(linear_bands(0.0, 9.0, 2.0).unwrap().len(), 5);
    }

    #[test]
    fn test_octave_bands() {
        let bands = octave_bands(1.0, 1.0, 8.0).unwrap();
        assert_eq!(bands.len(), 3);
        assert!(close(bands.center(), &[1.0, 2.0, 4.0], 1e-12));
        assert!(close(bands.lower(), &[0.70710678, 1.41421356, 2.82842712], 1e-6));
        assert!(close(bands.upper(), &[1.41421356, 2.82842712, 5.65685425], 1e-6));
    }

    #[test]
    fn test_third_octave_widening() {
        let bands = octave_bands(1.0 / 3.0, 0.1, 10.0).unwrap();
        assert_eq!(bands.len(), 20);
        let widths: Vec<f64> = bands.iter().map(|b| b.upper - b.lower).collect();
        assert!(widths.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_band_validation() {
        assert!(linear_bands(0.0, 10.0, 0.0).is_err());
        assert!(linear_bands(5.0, 1.0, 1.0).is_err());
        assert!(octave_bands(1.0, 0.0, 8.0).is_err());
        assert!(octave_bands(-1.0, 1.0, 8.0).is_err());
        assert!(BandSet::new(vec![2.0], vec![1.0], vec![3.0]).is_err());
    }

    #[test]
    fn test_band_count_limit() {
        match linear_bands(0.0, 10.0, 1e-300) {
            Err(CrotalusError::InvalidConfiguration { parameter, .. }) => assert_eq!(parameter, "f_delta"),
            other => panic!("unexpected {:?}", other),
        }
        match octave_bands(1e-300, 1.0, 8.0) {
            Err(CrotalusError::InvalidConfiguration { parameter, .. }) => assert_eq!(parameter, "fraction"),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(linear_bands(0.0, 1e6, 1.0).unwrap().len(), MAX_BANDS);
        assert!(linear_bands(0.0, 1e6 + 1.0, 1.0).is_err());
    }

    #[test]
    fn test_aggregate_full_band_is_mean() {
        let freqs: Vec<f64> = (0..11).map(|i| i as f64).collect();
        let amp = vec![1.0, 3.0, 2.0, 5.0, 4.0, 0.0, 7.0, 1.0, 2.0, 9.0, 6.0];
        let spectrum = Spectrum::single(freqs, amp.clone()).unwrap();
        let bands = linear_bands(0.0, 10.0, 10.0).unwrap();
        let out = aggregate(&spectrum, &bands);
        let mean = amp.iter().sum::<f64>() / amp.len() as f64;
        assert_eq!(out.dim(), (1, 1));
        assert!((out[[0, 0]] - mean).abs() < 1e-12);
    }

    #[test]
    fn test_aggregate_upper_edge_inclusive() {
        let freqs: Vec<f64> = (0..5).map(|i| i as f64).collect();
        let spectrum = Spectrum::single(freqs, vec![0.0, 2.0, 4.0, 6.0, 8.0]).unwrap();
        let bands = linear_bands(1.0, 3.0, 2.0).unwrap();
        // Bins 1..=3
        assert_eq!(aggregate(&spectrum, &bands)[[0, 0]], 4.0);
    }

    #[test]
    fn test_ssam_batch_matches_rows() {
        let freqs: Vec<f64> = (0..9).map(|i| i as f64 * 0.5).collect();
        let values: Vec<f64> = (0..27).map(|i| (i % 7) as f64).collect();
        let spectrum = Spectrum::new(freqs.clone(), values, 3).unwrap();
        let linear = linear_bands(0.0, 4.0, 1.0).unwrap();
        let octave = octave_bands(0.5, 0.5, 4.0).unwrap();
        let out = ssam(&spectrum, &linear, &octave);

        assert_eq!(out.linear.dim(), (3, 4));
        assert_eq!(out.octave.dim(), (3, octave.len()));
        for (r, row) in spectrum.rows().enumerate() {
            let single = Spectrum::single(freqs.clone(), row.to_vec()).unwrap();
            let expected = aggregate(&single, &linear);
            assert_eq!(out.linear.row(r), expected.row(0));
        }
    }
}
