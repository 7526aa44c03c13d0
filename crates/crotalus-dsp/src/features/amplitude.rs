//! Time-domain amplitude and energy measures

use super::{map_rows, median, Windowed};
use crate::config::DsarParams;
use crate::filters::{apply_bandpass, apply_highpass};
use crate::preprocess::{detrend, integrate};
use crotalus_core::{CrotalusError, CrotalusResult, MultiSeries, Series, WindowSet, Windower};
use ndarray::ArrayView2;
use num_traits::Float;

fn length<T: Float>(n: usize) -> T {
    T::from(n).unwrap_or_else(T::infinity)
}

/// Real-time seismic amplitude: mean absolute value
pub fn rsam_kernel<T: Float>(samples: &[T]) -> T {
    if samples.is_empty() {
        return T::nan();
    }
    samples.iter().fold(T::zero(), |acc, &x| acc + x.abs()) / length(samples.len())
}

/// Real-time seismic energy: root mean square
pub fn rsem_kernel<T: Float>(samples: &[T]) -> T {
    if samples.is_empty() {
        return T::nan();
    }
    let sum_sq = samples.iter().fold(T::zero(), |acc, &x| acc + x * x);
    (sum_sq / length(samples.len())).sqrt()
}

/// Pearson kurtosis `m4 / m2^2` with biased central moments (3 for a
/// Gaussian)
pub fn kurtosis_kernel<T: Float>(samples: &[T]) -> CrotalusResult<T> {
    if samples.is_empty() {
        return Err(CrotalusError::DegenerateWindow { reason: "empty window" });
    }
    let n: T = length(samples.len());
    let mean = samples.iter().fold(T::zero(), |acc, &x| acc + x) / n;
    let (m2, m4) = samples.iter().fold((T::zero(), T::zero()), |(m2, m4), &x| {
        let d2 = (x - mean) * (x - mean);
        (m2 + d2, m4 + d2 * d2)
    });
    let (m2, m4) = (m2 / n, m4 / n);
    if m2 == T::zero() {
        return Err(CrotalusError::DegenerateWindow { reason: "zero variance" });
    }
    Ok(m4 / (m2 * m2))
}

/// RSAM for every window row
pub fn rsam(windows: ArrayView2<'_, f64>) -> Vec<f64> {
    map_rows(windows, rsam_kernel::<f64>)
}

/// RSEM for every window row
pub fn rsem(windows: ArrayView2<'_, f64>) -> Vec<f64> {
    map_rows(windows, rsem_kernel::<f64>)
}

/// Kurtosis for every window row
pub fn kurtosis(windows: ArrayView2<'_, f64>) -> Vec<CrotalusResult<f64>> {
    map_rows(windows, kurtosis_kernel::<f64>)
}

/// Per-window `median(|low band|) / median(|high band|)` over a jointly
/// windowed two-component set (low first, high second)
pub fn dsar_windows(windows: &WindowSet) -> CrotalusResult<Vec<CrotalusResult<f64>>> {
    if windows.n_components() != 2 {
        return Err(CrotalusError::series(format!(
            "band amplitude ratio needs 2 components, got {}",
            windows.n_components()
        )));
    }
    let abs_median = |row: &[f64]| median(&row.iter().map(|x| x.abs()).collect::<Vec<_>>());
    let low = map_rows(windows.component(0)?, abs_median);
    let high = map_rows(windows.component(1)?, abs_median);

    Ok(low
        .into_iter()
        .zip(high)
        .map(|(lf, hf)| {
            if hf == 0.0 {
                Err(CrotalusError::DegenerateWindow {
                    reason: "high band has zero median amplitude",
                })
            } else {
                Ok(lf / hf)
            }
        })
        .collect())
}

/// Displacement seismic amplitude ratio of a velocity trace
///
/// The trace is integrated to displacement, detrended and high-passed, then
/// split into low- and high-band copies that are windowed together.
pub fn dsar(series: &Series, params: &DsarParams, windower: &dyn Windower) -> CrotalusResult<Windowed<f64>> {
    let mut displacement = series.clone();
    integrate(&mut displacement);
    detrend(&mut displacement);
    apply_highpass(&mut displacement, params.highpass, params.highpass_order)?;

    let mut low = displacement.clone();
    apply_bandpass(&mut low, params.lf_band[0], params.lf_band[1], params.order)?;
    let mut high = displacement;
    apply_bandpass(&mut high, params.hf_band[0], params.hf_band[1], params.order)?;

    let bands = MultiSeries::new(vec![("lf".to_string(), low), ("hf".to_string(), high)])?;
    let windows = windower.window_multi(&bands, params.window.window_length, params.window.overlap)?;

    Ok(Windowed {
        timestamps: windows.timestamps().to_vec(),
        values: dsar_windows(&windows)?,
    })
}
