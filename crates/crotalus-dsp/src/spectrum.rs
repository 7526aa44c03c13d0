//! Tapered magnitude spectra and spectrograms
//!
//! Each window is multiplied by a Tukey (tapered cosine) window and passed
//! through a one-sided real FFT; the magnitude of every bin is kept.

use crotalus_core::{CrotalusError, CrotalusResult, WindowSet};
use ndarray::{Array2, ArrayView2};
use realfft::num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};
use std::f64::consts::PI;
use std::sync::Arc;

/// Magnitude spectrum of one or more windows sharing a frequency axis
///
/// A single spectrum is a spectrogram with one row, so every consumer has a
/// single code path.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    frequencies: Vec<f64>,
    /// Row-major `[n_rows, n_bins]`
    values: Vec<f64>,
    n_rows: usize,
}

impl Spectrum {
    /// Validate and build a spectrum from row-major amplitudes
    ///
    /// Frequencies must be non-negative and strictly increasing; amplitudes
    /// must be finite and non-negative.
    pub fn new(frequencies: Vec<f64>, values: Vec<f64>, n_rows: usize) -> CrotalusResult<Self> {
        if frequencies.is_empty() {
            return Err(CrotalusError::series("spectrum has no frequency bins"));
        }
        if frequencies[0] < 0.0 || frequencies.windows(2).any(|w| !(w[1] > w[0])) {
            return Err(CrotalusError::series("frequencies must be non-negative and strictly increasing"));
        }
        if values.len() != n_rows * frequencies.len() {
            return Err(CrotalusError::series(format!(
                "{} amplitudes for {} rows of {} bins",
                values.len(),
                n_rows,
                frequencies.len()
            )));
        }
        if values.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(CrotalusError::series("amplitudes must be finite and non-negative"));
        }
        Ok(Self {
            frequencies,
            values,
            n_rows,
        })
    }

    /// Single-window spectrum
    pub fn single(frequencies: Vec<f64>, amplitude: Vec<f64>) -> CrotalusResult<Self> {
        Self::new(frequencies, amplitude, 1)
    }

    /// Spectrogram from a `[n_rows, n_bins]` array
    pub fn from_array(frequencies: Vec<f64>, amplitude: ArrayView2<'_, f64>) -> CrotalusResult<Self> {
        if amplitude.ncols() != frequencies.len() {
            return Err(CrotalusError::series(format!(
                "{} amplitude columns for {} frequencies",
                amplitude.ncols(),
                frequencies.len()
            )));
        }
        let n_rows = amplitude.nrows();
        Self::new(frequencies, amplitude.iter().copied().collect(), n_rows)
    }

    pub fn frequencies(&self) -> &[f64] {
        &self.frequencies
    }

    pub fn n_bins(&self) -> usize {
        self.frequencies.len()
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn row(&self, index: usize) -> Option<&[f64]> {
        let n = self.n_bins();
        self.values.get(index * n..(index + 1) * n)
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> + '_ {
        self.values.chunks_exact(self.n_bins())
    }

    /// Amplitudes as a `[n_rows, n_bins]` array
    pub fn to_array(&self) -> Array2<f64> {
        let n = self.n_bins();
        Array2::from_shape_fn((self.n_rows, n), |(r, c)| self.values[r * n + c])
    }
}

/// Sample frequencies of a one-sided FFT of `n` samples
pub fn rfft_frequencies(n: usize, sampling_rate: f64) -> Vec<f64> {
    (0..=n / 2).map(|k| k as f64 * sampling_rate / n as f64).collect()
}

/// Symmetric Tukey window; `alpha = 0` is rectangular, `alpha = 1` is Hann
pub fn tukey(n: usize, alpha: f64) -> Vec<f64> {
    if n == 0 {
        return Vec::new();
    }
    if n == 1 {
        return vec![1.0];
    }

    let m = (n - 1) as f64;
    if alpha <= 0.0 {
        return vec![1.0; n];
    }
    if alpha >= 1.0 {
        return (0..n).map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / m).cos()).collect();
    }

    let width = (alpha * m / 2.0).floor() as usize;
    (0..n)
        .map(|i| {
            let x = i as f64;
            if i <= width {
                0.5 * (1.0 + (PI * (-1.0 + 2.0 * x / alpha / m)).cos())
            } else if i < n - width - 1 {
                1.0
            } else {
                0.5 * (1.0 + (PI * (-2.0 / alpha + 1.0 + 2.0 * x / alpha / m)).cos())
            }
        })
        .collect()
}

/// Planned real FFT with a precomputed taper and scratch buffers
pub struct SpectralTransform {
    fft: Arc<dyn RealToComplex<f64>>,
    window: Vec<f64>,
    sampling_rate: f64,
    input: Vec<f64>,
    output: Vec<Complex<f64>>,
    scratch: Vec<Complex<f64>>,
}

impl SpectralTransform {
    /// Plan a transform for windows of `window_len` samples
    pub fn new(window_len: usize, sampling_rate: f64, taper: f64) -> CrotalusResult<Self> {
        if window_len < 2 {
            return Err(CrotalusError::series("a spectrum needs at least two samples"));
        }
        if !sampling_rate.is_finite() || sampling_rate <= 0.0 {
            return Err(CrotalusError::series("sampling rate must be positive"));
        }
        if !(0.0..=1.0).contains(&taper) {
            return Err(CrotalusError::config("taper", format!("must lie in [0, 1], got {}", taper)));
        }

        let mut planner = RealFftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(window_len);
        let input = fft.make_input_vec();
        let output = fft.make_output_vec();
        let scratch = fft.make_scratch_vec();

        Ok(Self {
            fft,
            window: tukey(window_len, taper),
            sampling_rate,
            input,
            output,
            scratch,
        })
    }

    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    pub fn frequencies(&self) -> Vec<f64> {
        rfft_frequencies(self.window.len(), self.sampling_rate)
    }

    /// Append the magnitude spectrum of `samples` to `out`
    fn magnitude_into<'a, I>(&mut self, samples: I, out: &mut Vec<f64>) -> CrotalusResult<()>
    where
        I: IntoIterator<Item = &'a f64>,
    {
        let mut filled = 0;
        for ((dst, &x), &w) in self.input.iter_mut().zip(samples).zip(&self.window) {
            *dst = x * w;
            filled += 1;
        }
        if filled != self.window.len() {
            return Err(CrotalusError::series(format!(
                "expected {} samples, got {}",
                self.window.len(),
                filled
            )));
        }

        self.fft
            .process_with_scratch(&mut self.input, &mut self.output, &mut self.scratch)
            .map_err(|e| CrotalusError::series(e.to_string()))?;
        out.extend(self.output.iter().map(|c| c.norm()));
        Ok(())
    }

    /// Spectrum of a single window
    pub fn spectrum(&mut self, samples: &[f64]) -> CrotalusResult<Spectrum> {
        if samples.len() != self.window.len() {
            return Err(CrotalusError::series(format!(
                "expected {} samples, got {}",
                self.window.len(),
                samples.len()
            )));
        }
        let mut values = Vec::with_capacity(self.window.len() / 2 + 1);
        self.magnitude_into(samples, &mut values)?;
        Spectrum::single(self.frequencies(), values)
    }

    /// Spectrogram of `[n_windows, window_len]` samples, one row per window
    pub fn spectrogram(&mut self, windows: ArrayView2<'_, f64>) -> CrotalusResult<Spectrum> {
        if windows.ncols() != self.window.len() {
            return Err(CrotalusError::series(format!(
                "expected windows of {} samples, got {}",
                self.window.len(),
                windows.ncols()
            )));
        }
        let n_bins = self.window.len() / 2 + 1;
        let mut values = Vec::with_capacity(windows.nrows() * n_bins);
        for row in windows.rows() {
            self.magnitude_into(row.iter(), &mut values)?;
        }
        Spectrum::new(self.frequencies(), values, windows.nrows())
    }
}

/// Tapered magnitude spectrum of one window
pub fn spectrum(samples: &[f64], sampling_rate: f64, taper: f64) -> CrotalusResult<Spectrum> {
    SpectralTransform::new(samples.len(), sampling_rate, taper)?.spectrum(samples)
}

/// Spectrogram of one component of a window set, rows aligned with
/// `windows.timestamps()`
pub fn spectrogram(windows: &WindowSet, component: usize, taper: f64) -> CrotalusResult<Spectrum> {
    let data = windows.component(component)?;
    let mut transform = SpectralTransform::new(windows.window_len(), windows.sampling_rate(), taper)?;
    let result = transform.spectrogram(data)?;
    tracing::debug!(
        rows = result.n_rows(),
        bins = result.n_bins(),
        "computed spectrogram"
    );
    Ok(result)
}
