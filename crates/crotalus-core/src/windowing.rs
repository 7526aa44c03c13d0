//! Window sets and the windowing collaborator
//!
//! The extraction engine consumes windows through the [`Windower`] trait so a
//! deployment can plug in its own segmentation. [`SlidingWindower`] is the
//! stock implementation: fixed-length, optionally overlapping, full windows
//! only.

use crate::error::{CrotalusError, CrotalusResult};
use crate::series::{MultiSeries, Series};
use chrono::{DateTime, Utc};
use ndarray::{Array3, ArrayView2, Axis};

/// Time-aligned windows cut from one or more components
///
/// `data` is shaped `[n_components, n_windows, window_len]`.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSet {
    timestamps: Vec<DateTime<Utc>>,
    data: Array3<f64>,
    sampling_rate: f64,
}

impl WindowSet {
    pub fn new(
        timestamps: Vec<DateTime<Utc>>,
        data: Array3<f64>,
        sampling_rate: f64,
    ) -> CrotalusResult<Self> {
        if timestamps.len() != data.len_of(Axis(1)) {
            return Err(CrotalusError::series(format!(
                "{} timestamps for {} windows",
                timestamps.len(),
                data.len_of(Axis(1))
            )));
        }
        if !sampling_rate.is_finite() || sampling_rate <= 0.0 {
            return Err(CrotalusError::series("window set sampling rate must be positive"));
        }
        Ok(WindowSet {
            timestamps,
            data,
            sampling_rate,
        })
    }

    /// Window start times
    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    pub fn data(&self) -> &Array3<f64> {
        &self.data
    }

    pub fn n_components(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    pub fn n_windows(&self) -> usize {
        self.data.len_of(Axis(1))
    }

    /// Samples per window
    pub fn window_len(&self) -> usize {
        self.data.len_of(Axis(2))
    }

    pub fn sampling_rate(&self) -> f64 {
        self.sampling_rate
    }

    pub fn is_empty(&self) -> bool {
        self.n_windows() == 0
    }

    /// `[n_windows, window_len]` view of one component
    pub fn component(&self, index: usize) -> CrotalusResult<ArrayView2<'_, f64>> {
        if index >= self.n_components() {
            return Err(CrotalusError::series(format!(
                "component index {} out of bounds (0-{})",
                index,
                self.n_components().saturating_sub(1)
            )));
        }
        Ok(self.data.index_axis(Axis(0), index))
    }
}

/// Slices aligned series into fixed-length windows
pub trait Windower: Send + Sync {
    /// Window every component of `components` with identical boundaries
    fn window(
        &self,
        components: &[&Series],
        window_length: f64,
        overlap: f64,
    ) -> CrotalusResult<WindowSet>;

    /// Window a single series
    fn window_series(
        &self,
        series: &Series,
        window_length: f64,
        overlap: f64,
    ) -> CrotalusResult<WindowSet> {
        self.window(&[series], window_length, overlap)
    }

    /// Window every member of a collection jointly
    fn window_multi(
        &self,
        series: &MultiSeries,
        window_length: f64,
        overlap: f64,
    ) -> CrotalusResult<WindowSet> {
        let refs: Vec<&Series> = series.members().iter().collect();
        self.window(&refs, window_length, overlap)
    }
}

/// Fixed-length sliding windows starting at the first sample
///
/// `n = round(window_length * sampling_rate)` samples per window and
/// `step = max(1, floor(n * (1 - overlap)))`. Trailing samples that do not
/// fill a window are dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct SlidingWindower;

impl SlidingWindower {
    /// Samples per window and hop size for the given parameters
    pub fn geometry(
        sampling_rate: f64,
        window_length: f64,
        overlap: f64,
    ) -> CrotalusResult<(usize, usize)> {
        if !window_length.is_finite() || window_length <= 0.0 {
            return Err(CrotalusError::config(
                "window_length",
                format!("must be positive, got {}", window_length),
            ));
        }
        if !(0.0..1.0).contains(&overlap) {
            return Err(CrotalusError::config(
                "overlap",
                format!("must lie in [0, 1), got {}", overlap),
            ));
        }

        // Window arrays are bounded by isize::MAX elements
        let samples = (window_length * sampling_rate).round();
        if !(samples < isize::MAX as f64) {
            return Err(CrotalusError::config(
                "window_length",
                format!("{} s at {} Hz is too many samples for one window", window_length, sampling_rate),
            ));
        }
        let window_len = samples as usize;
        if window_len == 0 {
            return Err(CrotalusError::config(
                "window_length",
                format!("{} s is shorter than one sample at {} Hz", window_length, sampling_rate),
            ));
        }
        let step = ((window_len as f64 * (1.0 - overlap)).floor() as usize).max(1);
        Ok((window_len, step))
    }
}

impl Windower for SlidingWindower {
    fn window(
        &self,
        components: &[&Series],
        window_length: f64,
        overlap: f64,
    ) -> CrotalusResult<WindowSet> {
        let reference = components
            .first()
            .ok_or_else(|| CrotalusError::series("nothing to window"))?;
        for other in &components[1..] {
            if other.sampling_rate() != reference.sampling_rate()
                || other.start_time() != reference.start_time()
                || other.len() != reference.len()
            {
                return Err(CrotalusError::series("components are not aligned"));
            }
        }

        let (window_len, step) =
            Self::geometry(reference.sampling_rate(), window_length, overlap)?;
        if components.len().checked_mul(window_len).map_or(true, |n| n > isize::MAX as usize) {
            return Err(CrotalusError::config(
                "window_length",
                format!("{} components of {} samples exceed the window array limit", components.len(), window_len),
            ));
        }
        let n_windows = if reference.len() >= window_len {
            (reference.len() - window_len) / step + 1
        } else {
            0
        };

        let mut data = Array3::<f64>::zeros((components.len(), n_windows, window_len));
        for (c, series) in components.iter().enumerate() {
            let samples = series.samples();
            for w in 0..n_windows {
                let start = w * step;
                for (dst, &src) in data
                    .slice_mut(ndarray::s![c, w, ..])
                    .iter_mut()
                    .zip(&samples[start..start + window_len])
                {
                    *dst = src;
                }
            }
        }

        let timestamps = (0..n_windows)
            .map(|w| reference.time_at(w * step))
            .collect();

        tracing::debug!(
            n_windows,
            window_len,
            step,
            components = components.len(),
            "windowed series"
        );

        WindowSet::new(timestamps, data, reference.sampling_rate())
    }
}
