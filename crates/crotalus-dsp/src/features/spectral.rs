//! Spectral-shape measures

use crate::bands::nearest_bin;
use crate::spectrum::Spectrum;
use crotalus_core::{CrotalusError, CrotalusResult};

fn check_shape(frequencies: &[f64], amplitude: &[f64]) -> CrotalusResult<()> {
    if frequencies.is_empty() || frequencies.len() != amplitude.len() {
        return Err(CrotalusError::series(format!(
            "{} frequencies for {} amplitudes",
            frequencies.len(),
            amplitude.len()
        )));
    }
    Ok(())
}

fn per_row<F>(spectrum: &Spectrum, kernel: F) -> Vec<CrotalusResult<f64>>
where
    F: Fn(&[f64], &[f64]) -> CrotalusResult<f64>,
{
    spectrum
        .rows()
        .map(|row| kernel(spectrum.frequencies(), row))
        .collect()
}

/// Mean frequency of the `top_k` largest bins
///
/// Selection is a partial sort; the order among the selected bins does not
/// matter for the mean.
pub fn dominant_frequency_kernel(frequencies: &[f64], amplitude: &[f64], top_k: usize) -> CrotalusResult<f64> {
    check_shape(frequencies, amplitude)?;
    if top_k == 0 || top_k > amplitude.len() {
        return Err(CrotalusError::config(
            "top_k",
            format!("must lie in [1, {}], got {}", amplitude.len(), top_k),
        ));
    }

    let mut index: Vec<usize> = (0..amplitude.len()).collect();
    index.select_nth_unstable_by(top_k - 1, |&a, &b| amplitude[b].total_cmp(&amplitude[a]));
    let sum: f64 = index[..top_k].iter().map(|&i| frequencies[i]).sum();
    Ok(sum / top_k as f64)
}

/// Frequency of the middle-ranked bin when bins are sorted by amplitude
pub fn median_rank_frequency_kernel(frequencies: &[f64], amplitude: &[f64]) -> CrotalusResult<f64> {
    check_shape(frequencies, amplitude)?;
    let mut index: Vec<usize> = (0..amplitude.len()).collect();
    // Stable, so equal amplitudes keep frequency order
    index.sort_by(|&a, &b| amplitude[a].total_cmp(&amplitude[b]));
    Ok(frequencies[index[amplitude.len() / 2]])
}

/// Amplitude-weighted mean frequency `Σ(f·S) / Σ(S)`
pub fn centroid_frequency_kernel(frequencies: &[f64], amplitude: &[f64]) -> CrotalusResult<f64> {
    check_shape(frequencies, amplitude)?;
    let (weighted, total) = frequencies
        .iter()
        .zip(amplitude)
        .fold((0.0, 0.0), |(w, t), (&f, &s)| (w + f * s, t + s));
    if total == 0.0 {
        return Err(CrotalusError::DegenerateWindow { reason: "spectrum has no energy" });
    }
    Ok(weighted / total)
}

/// Centroid with amplitudes first scaled by their maximum, then
/// renormalized to unit sum
///
/// Agrees with [`centroid_frequency_kernel`] up to rounding; kept as a
/// separately named measure for continuity with existing catalogues.
pub fn centroid_frequency_normalized_kernel(frequencies: &[f64], amplitude: &[f64]) -> CrotalusResult<f64> {
    check_shape(frequencies, amplitude)?;
    let peak = amplitude.iter().fold(0.0_f64, |m, &s| m.max(s));
    if peak == 0.0 {
        return Err(CrotalusError::DegenerateWindow { reason: "spectrum has no energy" });
    }
    let scaled: Vec<f64> = amplitude.iter().map(|s| s / peak).collect();
    let total: f64 = scaled.iter().sum();
    Ok(frequencies
        .iter()
        .zip(&scaled)
        .map(|(f, s)| f * (s / total))
        .sum())
}

/// `ln(Σ S[upper band] / Σ S[lower band])` over half-open bin ranges
///
/// Band edges snap to the nearest bin; a band whose edges snap to the same
/// bin is empty.
pub fn band_ratio_kernel(
    frequencies: &[f64],
    amplitude: &[f64],
    lower_band: [f64; 2],
    upper_band: [f64; 2],
) -> CrotalusResult<f64> {
    check_shape(frequencies, amplitude)?;
    let band_sum = |[low, high]: [f64; 2]| -> CrotalusResult<f64> {
        let lo = nearest_bin(frequencies, low);
        let hi = nearest_bin(frequencies, high);
        if hi <= lo {
            return Err(CrotalusError::EmptyBand { low, high });
        }
        Ok(amplitude[lo..hi].iter().sum())
    };

    let lower = band_sum(lower_band)?;
    let upper = band_sum(upper_band)?;
    if lower == 0.0 || upper == 0.0 {
        return Err(CrotalusError::DegenerateWindow { reason: "band has no energy" });
    }
    Ok((upper / lower).ln())
}

/// Dominant frequency of every spectrum row
pub fn dominant_frequency(spectrum: &Spectrum, top_k: usize) -> Vec<CrotalusResult<f64>> {
    per_row(spectrum, |f, s| dominant_frequency_kernel(f, s, top_k))
}

pub fn median_rank_frequency(spectrum: &Spectrum) -> Vec<CrotalusResult<f64>> {
    per_row(spectrum, median_rank_frequency_kernel)
}

pub fn centroid_frequency(spectrum: &Spectrum) -> Vec<CrotalusResult<f64>> {
    per_row(spectrum, centroid_frequency_kernel)
}

pub fn centroid_frequency_normalized(spectrum: &Spectrum) -> Vec<CrotalusResult<f64>> {
    per_row(spectrum, centroid_frequency_normalized_kernel)
}

pub fn band_ratio(spectrum: &Spectrum, lower_band: [f64; 2], upper_band: [f64; 2]) -> Vec<CrotalusResult<f64>> {
    per_row(spectrum, |f, s| band_ratio_kernel(f, s, lower_band, upper_band))
}
