//! Butterworth filters for seismic traces
//!
//! Designs follow the classic analog-prototype route: Butterworth poles on
//! the unit circle, a lowpass/highpass/bandpass frequency transform, then the
//! bilinear transform with pre-warped edges. The digital filter is factored
//! into second-order sections and applied causally (single forward pass,
//! zero initial state), so filtered output carries the usual phase delay.

use crotalus_core::{CrotalusError, CrotalusResult, Traces};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Sampling frequency used for the normalized bilinear transform
const BILINEAR_FS: f64 = 2.0;

/// Highest prototype order a design accepts
pub const MAX_ORDER: usize = 32;

/// Frequency band selected by a Butterworth design
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FilterBand {
    /// Pass below `cutoff` (Hz)
    Lowpass { cutoff: f64 },
    /// Pass above `cutoff` (Hz)
    Highpass { cutoff: f64 },
    /// Pass between `low` and `high` (Hz)
    Bandpass { low: f64, high: f64 },
}

/// Filter configuration parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    pub band: FilterBand,
    /// Prototype order; a bandpass of order N has 2N poles
    pub order: usize,
}

impl FilterConfig {
    /// Create lowpass filter configuration
    pub fn lowpass(cutoff: f64, order: usize) -> Self {
        Self {
            band: FilterBand::Lowpass { cutoff },
            order,
        }
    }

    /// Create highpass filter configuration
    pub fn highpass(cutoff: f64, order: usize) -> Self {
        Self {
            band: FilterBand::Highpass { cutoff },
            order,
        }
    }

    /// Create bandpass filter configuration
    pub fn bandpass(low: f64, high: f64, order: usize) -> Self {
        Self {
            band: FilterBand::Bandpass { low, high },
            order,
        }
    }
}

/// Single biquad section (2nd order, transposed direct form II)
#[derive(Debug, Clone, PartialEq)]
struct BiquadSection {
    // y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2] - a1*y[n-1] - a2*y[n-2]
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
    z1: f64,
    z2: f64,
}

impl BiquadSection {
    fn new(b: [f64; 3], a: [f64; 2]) -> Self {
        Self {
            b0: b[0],
            b1: b[1],
            b2: b[2],
            a1: a[0],
            a2: a[1],
            z1: 0.0,
            z2: 0.0,
        }
    }

    #[inline]
    fn process_sample(&mut self, input: f64) -> f64 {
        let output = self.b0 * input + self.z1;
        self.z1 = self.b1 * input - self.a1 * output + self.z2;
        self.z2 = self.b2 * input - self.a2 * output;
        output
    }

    fn reset(&mut self) {
        self.z1 = 0.0;
        self.z2 = 0.0;
    }

    /// Stability triangle for a second-order denominator
    fn is_stable(&self) -> bool {
        self.a2.abs() < 1.0 && self.a1.abs() < 1.0 + self.a2
    }

    fn response(&self, z1: Complex64) -> Complex64 {
        let z2 = z1 * z1;
        let num = Complex64::new(self.b0, 0.0) + z1 * self.b1 + z2 * self.b2;
        let den = Complex64::new(1.0, 0.0) + z1 * self.a1 + z2 * self.a2;
        num / den
    }
}

/// Zeros, poles and gain of a filter
#[derive(Debug, Clone)]
struct Zpk {
    zeros: Vec<Complex64>,
    poles: Vec<Complex64>,
    gain: f64,
}

/// Butterworth IIR filter realized as a cascade of biquad sections
#[derive(Debug, Clone)]
pub struct ButterworthFilter {
    config: FilterConfig,
    sampling_rate: f64,
    sections: Vec<BiquadSection>,
}

impl ButterworthFilter {
    /// Design a filter for the given sampling rate
    ///
    /// Edges must satisfy `0 < low < high < nyquist` (a lowpass or highpass
    /// cutoff must lie strictly inside `(0, nyquist)`).
    pub fn design(config: FilterConfig, sampling_rate: f64) -> CrotalusResult<Self> {
        if config.order == 0 || config.order > MAX_ORDER {
            return Err(CrotalusError::config(
                "order",
                format!("filter order must lie in [1, {}], got {}", MAX_ORDER, config.order),
            ));
        }
        if !sampling_rate.is_finite() || sampling_rate <= 0.0 {
            return Err(CrotalusError::series("sampling rate must be positive"));
        }

        let nyquist = 0.5 * sampling_rate;
        let prototype = analog_prototype(config.order);
        let analog = match config.band {
            FilterBand::Lowpass { cutoff } => {
                if !(cutoff > 0.0 && cutoff < nyquist) {
                    return Err(CrotalusError::InvalidBand {
                        low: 0.0,
                        high: cutoff,
                        nyquist,
                    });
                }
                to_lowpass(&prototype, prewarp(cutoff / nyquist))
            }
            FilterBand::Highpass { cutoff } => {
                if !(cutoff > 0.0 && cutoff < nyquist) {
                    return Err(CrotalusError::InvalidBand {
                        low: cutoff,
                        high: nyquist,
                        nyquist,
                    });
                }
                to_highpass(&prototype, prewarp(cutoff / nyquist))
            }
            FilterBand::Bandpass { low, high } => {
                if !(low > 0.0 && low < high && high < nyquist) {
                    return Err(CrotalusError::InvalidBand { low, high, nyquist });
                }
                to_bandpass(
                    &prototype,
                    prewarp(low / nyquist),
                    prewarp(high / nyquist),
                )
            }
        };

        let sections = into_sections(&bilinear(&analog));
        tracing::trace!(
            order = config.order,
            sections = sections.len(),
            sampling_rate,
            "designed butterworth filter"
        );

        Ok(Self {
            config,
            sampling_rate,
            sections,
        })
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    pub fn sampling_rate(&self) -> f64 {
        self.sampling_rate
    }

    /// Number of second-order sections in the cascade
    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    /// True when every section has its poles inside the unit circle
    pub fn is_stable(&self) -> bool {
        self.sections.iter().all(BiquadSection::is_stable)
    }

    /// Magnitude response at `frequency` (Hz)
    pub fn gain_at(&self, frequency: f64) -> f64 {
        let omega = 2.0 * PI * frequency / self.sampling_rate;
        let z1 = Complex64::from_polar(1.0, -omega);
        self.sections
            .iter()
            .fold(Complex64::new(1.0, 0.0), |acc, s| acc * s.response(z1))
            .norm()
    }

    /// Filter `samples` in place starting from a zero state
    pub fn filter_in_place(&self, samples: &mut [f64]) {
        let mut sections = self.sections.clone();
        for section in &mut sections {
            section.reset();
        }
        for sample in samples.iter_mut() {
            *sample = sections
                .iter_mut()
                .fold(*sample, |x, section| section.process_sample(x));
        }
    }
}

/// Apply a Butterworth design to every series of `target`
///
/// All designs are validated before any samples are touched, so an invalid
/// band leaves the target unchanged.
pub fn apply_filter<T: Traces + ?Sized>(target: &mut T, config: FilterConfig) -> CrotalusResult<()> {
    let filters = target
        .traces()
        .iter()
        .map(|series| ButterworthFilter::design(config, series.sampling_rate()))
        .collect::<CrotalusResult<Vec<_>>>()?;

    for (series, filter) in target.traces_mut().iter_mut().zip(&filters) {
        filter.filter_in_place(series.samples_mut());
    }
    Ok(())
}

/// Band-limit a series or every member of a collection in place
pub fn apply_bandpass<T: Traces + ?Sized>(
    target: &mut T,
    freq_min: f64,
    freq_max: f64,
    order: usize,
) -> CrotalusResult<()> {
    apply_filter(target, FilterConfig::bandpass(freq_min, freq_max, order))
}

pub fn apply_highpass<T: Traces + ?Sized>(target: &mut T, cutoff: f64, order: usize) -> CrotalusResult<()> {
    apply_filter(target, FilterConfig::highpass(cutoff, order))
}

pub fn apply_lowpass<T: Traces + ?Sized>(target: &mut T, cutoff: f64, order: usize) -> CrotalusResult<()> {
    apply_filter(target, FilterConfig::lowpass(cutoff, order))
}

/// Normalized analog Butterworth poles, unity gain, no zeros
fn analog_prototype(order: usize) -> Vec<Complex64> {
    let n = order as f64;
    (0..order)
        .map(|i| {
            let m = -n + 1.0 + 2.0 * i as f64;
            -Complex64::from_polar(1.0, PI * m / (2.0 * n))
        })
        .collect()
}

/// Analog edge (rad/s) for a digital edge given as a fraction of Nyquist
fn prewarp(normalized: f64) -> f64 {
    2.0 * BILINEAR_FS * (PI * normalized / BILINEAR_FS).tan()
}

fn to_lowpass(prototype: &[Complex64], wo: f64) -> Zpk {
    Zpk {
        zeros: Vec::new(),
        poles: prototype.iter().map(|p| p * wo).collect(),
        gain: wo.powi(prototype.len() as i32),
    }
}

fn to_highpass(prototype: &[Complex64], wo: f64) -> Zpk {
    let product = prototype
        .iter()
        .fold(Complex64::new(1.0, 0.0), |acc, p| acc * -p);
    Zpk {
        zeros: vec![Complex64::new(0.0, 0.0); prototype.len()],
        poles: prototype.iter().map(|p| Complex64::new(wo, 0.0) / p).collect(),
        gain: (Complex64::new(1.0, 0.0) / product).re,
    }
}

fn to_bandpass(prototype: &[Complex64], wl: f64, wh: f64) -> Zpk {
    let bw = wh - wl;
    let wo2 = wl * wh;
    let mut poles = Vec::with_capacity(2 * prototype.len());
    let scaled: Vec<Complex64> = prototype.iter().map(|p| p * (bw / 2.0)).collect();
    for p in &scaled {
        poles.push(p + (p * p - wo2).sqrt());
    }
    for p in &scaled {
        poles.push(p - (p * p - wo2).sqrt());
    }
    Zpk {
        zeros: vec![Complex64::new(0.0, 0.0); prototype.len()],
        poles,
        gain: bw.powi(prototype.len() as i32),
    }
}

fn bilinear(analog: &Zpk) -> Zpk {
    let fs2 = Complex64::new(2.0 * BILINEAR_FS, 0.0);
    let one = Complex64::new(1.0, 0.0);
    let degree = analog.poles.len() - analog.zeros.len();

    let mut zeros: Vec<Complex64> = analog.zeros.iter().map(|z| (fs2 + z) / (fs2 - z)).collect();
    // Zeros at infinity land on Nyquist
    zeros.extend(std::iter::repeat(Complex64::new(-1.0, 0.0)).take(degree));
    let poles = analog.poles.iter().map(|p| (fs2 + p) / (fs2 - p)).collect();

    let num = analog.zeros.iter().fold(one, |acc, z| acc * (fs2 - z));
    let den = analog.poles.iter().fold(one, |acc, p| acc * (fs2 - p));

    Zpk {
        zeros,
        poles,
        gain: analog.gain * (num / den).re,
    }
}

/// Real quadratic factors `[c1, c2]` of `1 + c1 z^-1 + c2 z^-2`
fn quadratic_factors(roots: &[Complex64]) -> Vec<[f64; 2]> {
    let mut factors = Vec::new();
    let mut reals = Vec::new();
    for root in roots {
        if root.im.abs() <= 1e-10 * root.norm().max(1.0) {
            reals.push(root.re);
        } else if root.im > 0.0 {
            factors.push([-2.0 * root.re, root.norm_sqr()]);
        }
    }

    // Pair outermost real roots so +1/-1 zeros share a section
    reals.sort_by(|a, b| a.total_cmp(b));
    let (mut lo, mut hi) = (0, reals.len());
    while hi - lo >= 2 {
        let (a, b) = (reals[lo], reals[hi - 1]);
        factors.push([-(a + b), a * b]);
        lo += 1;
        hi -= 1;
    }
    if hi - lo == 1 {
        factors.push([-reals[lo], 0.0]);
    }
    factors
}

fn into_sections(digital: &Zpk) -> Vec<BiquadSection> {
    let zero_factors = quadratic_factors(&digital.zeros);
    let pole_factors = quadratic_factors(&digital.poles);
    let count = zero_factors.len().max(pole_factors.len());

    (0..count)
        .map(|i| {
            let [b1, b2] = zero_factors.get(i).copied().unwrap_or([0.0, 0.0]);
            let a = pole_factors.get(i).copied().unwrap_or([0.0, 0.0]);
            let g = if i == 0 { digital.gain } else { 1.0 };
            BiquadSection::new([g, g * b1, g * b2], a)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use crotalus_core::{MultiSeries, Series};
    use std::f64::consts::FRAC_1_SQRT_2;

    fn sine(freq: f64, rate: f64, seconds: f64) -> Series {
        let n = (rate * seconds) as usize;
        let samples = (0..n)
            .map(|i| (2.0 * PI * freq * i as f64 / rate).sin())
            .collect();
        Series::from_samples(samples, rate, Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap()).unwrap()
    }

    fn tail_rms(samples: &[f64]) -> f64 {
        let tail = &samples[samples.len() / 2..];
        (tail.iter().map(|x| x * x).sum::<f64>() / tail.len() as f64).sqrt()
    }

    #[test]
    fn test_bandpass_edges_at_half_power() {
        for order in 1..=6 {
            let filter = ButterworthFilter::design(FilterConfig::bandpass(1.0, 10.0, order), 100.0).unwrap();
            assert_eq!(filter.section_count(), order);
            assert!(filter.is_stable());
            assert!((filter.gain_at(1.0) - FRAC_1_SQRT_2).abs() < 1e-9);
            assert!((filter.gain_at(10.0) - FRAC_1_SQRT_2).abs() < 1e-9);
        }
    }

    #[test]
    fn test_bandpass_passband_and_stopband() {
        let filter = ButterworthFilter::design(FilterConfig::bandpass(1.0, 10.0, 4), 100.0).unwrap();
        assert!(filter.gain_at(4.0) > 0.99);
        assert!(filter.gain_at(40.0) < 1e-3);
        assert!(filter.gain_at(0.05) < 1e-3);
    }

    #[test]
    fn test_lowpass_and_highpass_responses() {
        let low = ButterworthFilter::design(FilterConfig::lowpass(5.0, 5), 100.0).unwrap();
        assert_eq!(low.section_count(), 3);
        assert!(low.is_stable());
        assert!((low.gain_at(0.0) - 1.0).abs() < 1e-9);
        assert!((low.gain_at(5.0) - FRAC_1_SQRT_2).abs() < 1e-9);
        assert!(low.gain_at(30.0) < 1e-3);

        let high = ButterworthFilter::design(FilterConfig::highpass(0.5, 4), 100.0).unwrap();
        assert!(high.is_stable());
        assert!((high.gain_at(50.0) - 1.0).abs() < 1e-9);
        assert!((high.gain_at(0.5) - FRAC_1_SQRT_2).abs() < 1e-9);
        assert!(high.gain_at(0.0) < 1e-12);
    }

    #[test]
    fn test_time_domain_passband() {
        let mut series = sine(4.0, 100.0, 60.0);
        apply_bandpass(&mut series, 1.0, 10.0, 4).unwrap();
        let rms = tail_rms(series.samples());
        assert!((rms - FRAC_1_SQRT_2).abs() < 0.02 * FRAC_1_SQRT_2, "rms = {}", rms);
    }

    #[test]
    fn test_time_domain_stopband() {
        let mut series = sine(40.0, 100.0, 60.0);
        apply_bandpass(&mut series, 1.0, 10.0, 4).unwrap();
        assert!(tail_rms(series.samples()) < 0.01);
    }

    #[test]
    fn test_invalid_bands() {
        let nyquist_violation = ButterworthFilter::design(FilterConfig::bandpass(1.0, 60.0, 4), 100.0);
        assert!(matches!(nyquist_violation, Err(CrotalusError::InvalidBand { nyquist, .. }) if nyquist == 50.0));
        assert!(ButterworthFilter::design(FilterConfig::bandpass(10.0, 1.0, 4), 100.0).is_err());
        assert!(ButterworthFilter::design(FilterConfig::bandpass(0.0, 10.0, 4), 100.0).is_err());
        assert!(ButterworthFilter::design(FilterConfig::bandpass(f64::NAN, 10.0, 4), 100.0).is_err());
        assert!(ButterworthFilter::design(FilterConfig::lowpass(50.0, 4), 100.0).is_err());
        assert!(ButterworthFilter::design(FilterConfig::bandpass(1.0, 10.0, 0), 100.0).is_err());
    }

    #[test]
    fn test_order_limit() {
        assert!(ButterworthFilter::design(FilterConfig::lowpass(10.0, MAX_ORDER), 100.0).is_ok());
        for order in [MAX_ORDER + 1, usize::MAX] {
            assert!(matches!(
                ButterworthFilter::design(FilterConfig::highpass(1.0, order), 100.0),
                Err(CrotalusError::InvalidConfiguration { .. })
            ));
        }
    }

    #[test]
    fn test_collection_left_untouched_on_error() {
        let a = sine(4.0, 100.0, 2.0);
        let b = sine(4.0, 100.0, 2.0);
        let mut ms = MultiSeries::new(vec![("a".into(), a.clone()), ("b".into(), b)]).unwrap();
        assert!(apply_bandpass(&mut ms, 1.0, 80.0, 4).is_err());
        assert_eq!(ms.members()[0], a);

        apply_bandpass(&mut ms, 1.0, 10.0, 4).unwrap();
        assert_eq!(ms.members()[0].samples(), ms.members()[1].samples());
        assert_ne!(ms.members()[0].samples(), a.samples());
    }

    #[test]
    fn test_filter_is_causal() {
        let filter = ButterworthFilter::design(FilterConfig::bandpass(1.0, 10.0, 4), 100.0).unwrap();
        let mut impulse = vec![0.0; 64];
        impulse[10] = 1.0;
        filter.filter_in_place(&mut impulse);
        assert!(impulse[..10].iter().all(|&x| x == 0.0));
        assert!(impulse[10] != 0.0);
    }
}
