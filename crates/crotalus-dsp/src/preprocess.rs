//! Preprocessing chain
//!
//! merge → response removal → linear detrend → decimation → scaling →
//! bandpass. Every step mutates the working series in place; callers that
//! need the raw trace keep their own copy.

use crate::config::PreprocessParams;
use crate::filters::{apply_bandpass, apply_filter, FilterConfig};
use crate::response::{ResponseProvider, Sensitivity};
use crotalus_core::{ChannelId, CrotalusError, CrotalusResult, Series, Traces};
use std::collections::BTreeMap;
use tracing::instrument;

/// Largest factor handled by a single anti-alias stage
pub const MAX_DECIMATION_FACTOR: usize = 16;

/// Order of the anti-alias lowpass used by [`decimate`]
const ANTI_ALIAS_ORDER: usize = 8;

/// Remove the least-squares line from `samples`
pub fn detrend_linear(samples: &mut [f64]) {
    let n = samples.len();
    if n == 0 {
        return;
    }
    if n == 1 {
        samples[0] = 0.0;
        return;
    }

    let x_mean = (n - 1) as f64 / 2.0;
    let y_mean = samples.iter().sum::<f64>() / n as f64;
    let (mut sxy, mut sxx) = (0.0, 0.0);
    for (i, &y) in samples.iter().enumerate() {
        let dx = i as f64 - x_mean;
        sxy += dx * (y - y_mean);
        sxx += dx * dx;
    }
    let slope = sxy / sxx;
    for (i, y) in samples.iter_mut().enumerate() {
        *y -= y_mean + slope * (i as f64 - x_mean);
    }
}

/// Detrend a series or every member of a collection
pub fn detrend<T: Traces + ?Sized>(target: &mut T) {
    for series in target.traces_mut() {
        detrend_linear(series.samples_mut());
    }
}

/// Cumulative trapezoidal integration; the first sample becomes zero
pub fn integrate(series: &mut Series) {
    let dt = series.delta();
    let samples = series.samples_mut();
    let mut previous = samples[0];
    let mut total = 0.0;
    samples[0] = 0.0;
    for sample in samples.iter_mut().skip(1) {
        let current = *sample;
        total += 0.5 * (previous + current) * dt;
        previous = current;
        *sample = total;
    }
}

/// Anti-alias lowpass then keep every `factor`-th sample
///
/// The lowpass corner sits at 0.8 × the new Nyquist frequency.
pub fn decimate(series: &mut Series, factor: usize) -> CrotalusResult<()> {
    if factor == 0 {
        return Err(CrotalusError::InvalidDecimation {
            factor: 0.0,
            reason: "must be a positive integer",
        });
    }
    if factor == 1 {
        return Ok(());
    }
    if factor > MAX_DECIMATION_FACTOR {
        return Err(CrotalusError::InvalidDecimation {
            factor: factor as f64,
            reason: "anti-alias filter is unstable above a factor of 16",
        });
    }

    let new_rate = series.sampling_rate() / factor as f64;
    let cutoff = 0.8 * new_rate / 2.0;
    apply_filter(series, FilterConfig::lowpass(cutoff, ANTI_ALIAS_ORDER))?;

    let kept: Vec<f64> = series.samples().iter().step_by(factor).copied().collect();
    series.replace(kept, new_rate)
}

/// Divide by the channel sensitivity valid at the series start
pub fn remove_sensitivity(series: &mut Series, response: &dyn ResponseProvider) -> CrotalusResult<Sensitivity> {
    let sensitivity = response.instrument_scale(&series.channel, series.start_time())?;
    for sample in series.samples_mut() {
        *sample /= sensitivity.value;
    }
    Ok(sensitivity)
}

/// Join segments per channel, returning one series per channel ordered by id
pub fn merge_by_channel(segments: Vec<Series>) -> CrotalusResult<Vec<Series>> {
    let mut groups: BTreeMap<ChannelId, Vec<Series>> = BTreeMap::new();
    for segment in segments {
        groups.entry(segment.channel.clone()).or_default().push(segment);
    }
    groups.into_values().map(Series::merge).collect()
}

/// Run steps 2-6 of the chain on an already merged series
#[instrument(level = "debug", skip_all, fields(channel = %series.channel))]
pub fn preprocess_series(
    series: &mut Series,
    params: &PreprocessParams,
    response: &dyn ResponseProvider,
) -> CrotalusResult<Sensitivity> {
    params.validate()?;

    let sensitivity = remove_sensitivity(series, response)?;
    detrend(series);
    if params.decimation_factor != 1 {
        decimate(series, params.decimation_factor)?;
    }
    for sample in series.samples_mut() {
        *sample *= params.scale;
    }
    apply_bandpass(series, params.freq_min, params.freq_max, params.order)?;

    tracing::debug!(
        samples = series.len(),
        sampling_rate = series.sampling_rate(),
        unit = %sensitivity.input_unit,
        "preprocessed series"
    );
    Ok(sensitivity)
}

/// Preprocess a series or every member of a collection in place
pub fn preprocess<T: Traces + ?Sized>(
    target: &mut T,
    params: &PreprocessParams,
    response: &dyn ResponseProvider,
) -> CrotalusResult<Vec<Sensitivity>> {
    target
        .traces_mut()
        .iter_mut()
        .map(|series| preprocess_series(series, params, response))
        .collect()
}

/// Full chain from raw segments of one channel to a band-limited series
pub fn preprocess_segments(
    segments: Vec<Series>,
    params: &PreprocessParams,
    response: &dyn ResponseProvider,
) -> CrotalusResult<(Series, Sensitivity)> {
    let mut series = Series::merge(segments)?;
    let sensitivity = preprocess_series(&mut series, params, response)?;
    Ok((series, sensitivity))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::{StaticInventory, UnitResponse};
    use chrono::{DateTime, TimeZone, Utc};
    use crotalus_core::seconds;
    use std::f64::consts::PI;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 5, 10, 12, 0, 0).unwrap()
    }

    fn channel() -> ChannelId {
        ChannelId::new("OV", "VTUN", "", "HHZ")
    }

    fn series(samples: Vec<f64>, rate: f64) -> Series {
        Series::new(channel(), samples, rate, t0()).unwrap()
    }

    fn params() -> PreprocessParams {
        PreprocessParams {
            decimation_factor: 1,
            freq_min: 1.0,
            freq_max: 10.0,
            order: 4,
            scale: 1.0,
        }
    }

    #[test]
    fn test_detrend_removes_line() {
        let mut samples: Vec<f64> = (0..100).map(|i| 3.0 + 0.25 * i as f64).collect();
        detrend_linear(&mut samples);
        assert!(samples.iter().all(|x| x.abs() < 1e-10));
    }

    #[test]
    fn test_detrend_keeps_oscillation() {
        let mut samples: Vec<f64> = (0..1000)
            .map(|i| (2.0 * PI * i as f64 / 100.0).sin() + 0.01 * i as f64)
            .collect();
        detrend_linear(&mut samples);
        let mean = samples.iter().sum::<f64>() / samples.len() as f64;
        assert!(mean.abs() < 1e-10);
        let peak = samples.iter().fold(0.0_f64, |m, x| m.max(x.abs()));
        assert!((peak - 1.0).abs() < 0.15);
    }

    #[test]
    fn test_integrate_constant() {
        let mut s = series(vec![2.0; 11], 10.0);
        integrate(&mut s);
        assert_eq!(s.samples()[0], 0.0);
        assert!((s.samples()[10] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_decimate_rate_and_length() {
        let mut s = series((0..1001).map(|i| (i as f64 * 0.01).sin()).collect(), 100.0);
        decimate(&mut s, 4).unwrap();
        assert_eq!(s.sampling_rate(), 25.0);
        assert_eq!(s.len(), 251);
    }

    #[test]
    fn test_decimate_rejects_factors() {
        let mut s = series(vec![0.0; 100], 100.0);
        assert!(matches!(decimate(&mut s, 0), Err(CrotalusError::InvalidDecimation { .. })));
        assert!(matches!(decimate(&mut s, 17), Err(CrotalusError::InvalidDecimation { .. })));
        decimate(&mut s, 1).unwrap();
        assert_eq!(s.len(), 100);
    }

    #[test]
    fn test_sensitivity_removed_before_scaling() {
        let inventory = StaticInventory::new()
            .with_channel(channel(), Sensitivity::new(2.0, "M/S").unwrap());
        let mut s = series(vec![4.0; 10], 100.0);
        let sensitivity = remove_sensitivity(&mut s, &inventory).unwrap();
        assert_eq!(sensitivity.input_unit, "M/S");
        assert!(s.samples().iter().all(|&x| x == 2.0));
    }

    #[test]
    fn test_missing_calibration_aborts() {
        let mut s = series(vec![1.0; 1000], 100.0);
        let result = preprocess_series(&mut s, &params(), &StaticInventory::new());
        assert!(matches!(result, Err(CrotalusError::MissingCalibration { .. })));
    }

    #[test]
    fn test_preprocess_segments_end_to_end() {
        let rate = 100.0;
        let signal: Vec<f64> = (0..6000)
            .map(|i| 5.0 + (2.0 * PI * 4.0 * i as f64 / rate).sin())
            .collect();
        let first = Series::new(channel(), signal[..3000].to_vec(), rate, t0()).unwrap();
        let second = Series::new(channel(), signal[3000..].to_vec(), rate, t0() + seconds(30.0)).unwrap();

        let mut p = params();
        p.decimation_factor = 2;
        p.scale = 2.0;
        let (out, sensitivity) = preprocess_segments(vec![second, first], &p, &UnitResponse).unwrap();

        assert_eq!(sensitivity.value, 1.0);
        assert_eq!(out.sampling_rate(), 50.0);
        assert_eq!(out.len(), 3000);
        let tail = &out.samples()[1500..];
        let rms = (tail.iter().map(|x| x * x).sum::<f64>() / tail.len() as f64).sqrt();
        // 4 Hz sits in the passband; amplitude doubled by the scale
        assert!((rms - 2.0 / 2.0_f64.sqrt()).abs() < 0.05, "rms = {}", rms);
    }

    #[test]
    fn test_preprocess_collection() {
        let mut traces = vec![series(vec![1.0; 500], 100.0), series(vec![2.0; 500], 100.0)];
        let sensitivities = preprocess(&mut traces, &params(), &UnitResponse).unwrap();
        assert_eq!(sensitivities.len(), 2);
        // Constant input is removed entirely by the detrend
        assert!(traces.iter().all(|s| s.samples().iter().all(|x| x.abs() < 1e-9)));
    }

    #[test]
    fn test_merge_by_channel() {
        let other = ChannelId::new("OV", "VTUN", "", "HHE");
        let a = series(vec![1.0; 10], 10.0);
        let b = Series::new(channel(), vec![2.0; 10], 10.0, t0() + seconds(1.0)).unwrap();
        let c = Series::new(other.clone(), vec![3.0; 5], 10.0, t0()).unwrap();
        let merged = merge_by_channel(vec![b, c, a]).unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].channel, other);
        assert_eq!(merged[1].len(), 20);
    }
}
