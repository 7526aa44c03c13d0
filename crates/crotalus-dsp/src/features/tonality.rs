//! Peak-picking tonality score

use super::median;
use crate::config::MAX_COUNT;
use crate::spectrum::Spectrum;
use crotalus_core::{CrotalusError, CrotalusResult};

/// Sum of `1 / median(local window)` over the strongest isolated peaks
///
/// Bins are visited in descending amplitude order (ties by ascending bin).
/// A candidate is skipped when it lies strictly within `bin_width / 2` of a
/// peak that was already accepted; picking stops after `top_k` peaks or
/// when candidates run out, in which case the partial sum is returned.
///
/// For each accepted bin `i` the local window spans
/// `[trunc(i - w/2), trunc(i + w/2))`, clipped to the spectrum. Positions
/// that fall off either end are filled with the median of the clipped span;
/// any other unused slot stays zero. The window is scaled by its maximum
/// before its median is taken.
pub fn tonality_kernel(amplitude: &[f64], top_k: usize, bin_width: usize) -> CrotalusResult<f64> {
    if !(2..=MAX_COUNT).contains(&bin_width) {
        return Err(CrotalusError::config(
            "bin_width",
            format!("must lie in [2, {}] bins, got {}", MAX_COUNT, bin_width),
        ));
    }

    let n = amplitude.len() as i64;
    let half = bin_width as f64 / 2.0;
    let mut order: Vec<usize> = (0..amplitude.len()).collect();
    order.sort_by(|&a, &b| amplitude[b].total_cmp(&amplitude[a]));

    let mut accepted: Vec<usize> = Vec::with_capacity(top_k.min(amplitude.len()));
    let mut local = vec![0.0; bin_width];
    let mut score = 0.0;

    for idx in order {
        let x = idx as f64;
        let suppressed = accepted
            .iter()
            .any(|&peak| x < peak as f64 + half && x > peak as f64 - half);
        if suppressed {
            continue;
        }
        if accepted.len() >= top_k {
            break;
        }

        let mut left = (x - half).trunc() as i64;
        let mut right = (x + half).trunc() as i64;
        let (mut left_pad, mut right_pad) = (0, 0);
        if left < 0 {
            left_pad = (-left) as usize;
            left = 0;
        }
        if right >= n {
            right_pad = (right - n + 1) as usize;
            right = n - 1;
        }

        let span = &amplitude[left as usize..right as usize];
        if span.is_empty() {
            return Err(CrotalusError::DegenerateWindow {
                reason: "spectrum too short for the tonality window",
            });
        }

        local.fill(0.0);
        local[left_pad..left_pad + span.len()].copy_from_slice(span);
        if left_pad > 0 || right_pad > 0 {
            let fill = median(span);
            local[..left_pad].fill(fill);
            local[bin_width - right_pad..].fill(fill);
        }

        let peak = local.iter().fold(0.0_f64, |m, &v| m.max(v));
        if peak <= 0.0 {
            return Err(CrotalusError::DegenerateWindow {
                reason: "no energy around tonality peak",
            });
        }
        for v in local.iter_mut() {
            *v /= peak;
        }
        score += 1.0 / median(&local);
        accepted.push(idx);
    }

    Ok(score)
}

/// Tonality of every spectrum row
pub fn tonality(spectrum: &Spectrum, top_k: usize, bin_width: usize) -> Vec<CrotalusResult<f64>> {
    spectrum
        .rows()
        .map(|row| tonality_kernel(row, top_k, bin_width))
        .collect()
}
