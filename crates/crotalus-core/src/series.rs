//! Series: core container for uniformly sampled seismic traces

use crate::channel::ChannelId;
use crate::error::{CrotalusError, CrotalusResult};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Uniformly sampled ground-motion trace
///
/// Invariants: at least one sample, finite positive sampling rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    /// Stream the samples were recorded on
    pub channel: ChannelId,
    samples: Vec<f64>,
    sampling_rate: f64,
    start_time: DateTime<Utc>,
}

impl Series {
    /// Create a new series, validating its invariants
    pub fn new(
        channel: ChannelId,
        samples: Vec<f64>,
        sampling_rate: f64,
        start_time: DateTime<Utc>,
    ) -> CrotalusResult<Self> {
        validate_rate(sampling_rate)?;
        if samples.is_empty() {
            return Err(CrotalusError::series("series must contain at least one sample"));
        }

        Ok(Series {
            channel,
            samples,
            sampling_rate,
            start_time,
        })
    }

    /// Series on an anonymous channel
    pub fn from_samples(
        samples: Vec<f64>,
        sampling_rate: f64,
        start_time: DateTime<Utc>,
    ) -> CrotalusResult<Self> {
        Self::new(ChannelId::default(), samples, sampling_rate, start_time)
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    /// Mutable access for in-place transforms; the length cannot change
    pub fn samples_mut(&mut self) -> &mut [f64] {
        &mut self.samples
    }

    pub fn into_samples(self) -> Vec<f64> {
        self.samples
    }

    /// Replace samples and sampling rate together (decimation, resampling)
    pub fn replace(&mut self, samples: Vec<f64>, sampling_rate: f64) -> CrotalusResult<()> {
        validate_rate(sampling_rate)?;
        if samples.is_empty() {
            return Err(CrotalusError::series("replacement leaves the series empty"));
        }
        self.samples = samples;
        self.sampling_rate = sampling_rate;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Always false for a validated series
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn sampling_rate(&self) -> f64 {
        self.sampling_rate
    }

    /// Sampling interval in seconds
    pub fn delta(&self) -> f64 {
        1.0 / self.sampling_rate
    }

    pub fn nyquist(&self) -> f64 {
        0.5 * self.sampling_rate
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    /// Time of the sample at `index`
    pub fn time_at(&self, index: usize) -> DateTime<Utc> {
        self.start_time + seconds(index as f64 / self.sampling_rate)
    }

    /// Time of the last sample
    pub fn end_time(&self) -> DateTime<Utc> {
        self.time_at(self.samples.len() - 1)
    }

    /// Duration covered by the samples in seconds
    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sampling_rate
    }

    /// Merge contiguous segments of one stream into a single series
    ///
    /// Segments are ordered by start time. Each one must begin exactly one
    /// sample interval after the previous ends (half-sample tolerance) and
    /// share its sampling rate; gaps and overlaps are rejected.
    pub fn merge(mut segments: Vec<Series>) -> CrotalusResult<Series> {
        if segments.is_empty() {
            return Err(CrotalusError::series("no segments to merge"));
        }
        segments.sort_by_key(|s| s.start_time);

        let mut iter = segments.into_iter();
        let mut merged = match iter.next() {
            Some(first) => first,
            None => return Err(CrotalusError::series("no segments to merge")),
        };

        for segment in iter {
            if segment.channel != merged.channel {
                return Err(CrotalusError::series(format!(
                    "cannot merge {} into {}",
                    segment.channel, merged.channel
                )));
            }
            if (segment.sampling_rate - merged.sampling_rate).abs() > f64::EPSILON * merged.sampling_rate {
                return Err(CrotalusError::series(format!(
                    "sampling rate mismatch: {} Hz vs {} Hz",
                    segment.sampling_rate, merged.sampling_rate
                )));
            }

            let expected = merged.time_at(merged.len());
            let offset = (segment.start_time - expected)
                .num_nanoseconds()
                .map(|ns| ns as f64 * 1e-9)
                .unwrap_or(f64::INFINITY);
            if offset.abs() > 0.5 * merged.delta() {
                return Err(CrotalusError::Gap {
                    expected,
                    found: segment.start_time,
                });
            }

            merged.samples.extend_from_slice(&segment.samples);
        }

        Ok(merged)
    }
}

/// Collection of series sharing one time base, windowed jointly
#[derive(Debug, Clone, PartialEq)]
pub struct MultiSeries {
    names: Vec<String>,
    members: Vec<Series>,
}

impl MultiSeries {
    /// Build a collection; all members must share sampling rate, start time
    /// and length
    pub fn new(members: Vec<(String, Series)>) -> CrotalusResult<Self> {
        let (names, members): (Vec<String>, Vec<Series>) = members.into_iter().unzip();
        if members.is_empty() {
            return Err(CrotalusError::series("collection must contain at least one series"));
        }

        let reference = &members[0];
        for (name, member) in names.iter().zip(&members).skip(1) {
            if member.sampling_rate != reference.sampling_rate
                || member.start_time != reference.start_time
                || member.len() != reference.len()
            {
                return Err(CrotalusError::series(format!(
                    "component '{}' is not aligned with '{}'",
                    name, names[0]
                )));
            }
        }

        Ok(MultiSeries { names, members })
    }

    pub fn single(name: &str, series: Series) -> Self {
        MultiSeries {
            names: vec![name.to_string()],
            members: vec![series],
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn members(&self) -> &[Series] {
        &self.members
    }

    pub fn members_mut(&mut self) -> &mut [Series] {
        &mut self.members
    }

    pub fn get(&self, name: &str) -> Option<&Series> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|idx| &self.members[idx])
    }

    pub fn sampling_rate(&self) -> f64 {
        self.members[0].sampling_rate
    }
}

/// Anything that exposes one or more series for in-place transforms
///
/// A single [`Series`] behaves as a collection of one, so stage functions
/// have a single code path for traces and trace collections.
pub trait Traces {
    fn traces(&self) -> &[Series];
    fn traces_mut(&mut self) -> &mut [Series];
}

impl Traces for Series {
    fn traces(&self) -> &[Series] {
        std::slice::from_ref(self)
    }

    fn traces_mut(&mut self) -> &mut [Series] {
        std::slice::from_mut(self)
    }
}

impl Traces for MultiSeries {
    fn traces(&self) -> &[Series] {
        &self.members
    }

    fn traces_mut(&mut self) -> &mut [Series] {
        &mut self.members
    }
}

impl Traces for [Series] {
    fn traces(&self) -> &[Series] {
        self
    }

    fn traces_mut(&mut self) -> &mut [Series] {
        self
    }
}

impl Traces for Vec<Series> {
    fn traces(&self) -> &[Series] {
        self
    }

    fn traces_mut(&mut self) -> &mut [Series] {
        self
    }
}

fn validate_rate(sampling_rate: f64) -> CrotalusResult<()> {
    if !sampling_rate.is_finite() || sampling_rate <= 0.0 {
        return Err(CrotalusError::series(format!(
            "sampling rate must be finite and positive, got {}",
            sampling_rate
        )));
    }
    Ok(())
}

/// Fractional seconds as a chrono duration (nanosecond resolution)
pub fn seconds(secs: f64) -> Duration {
    Duration::nanoseconds((secs * 1e9).round() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 9, 19, 14, 0, 0).unwrap()
    }

    #[test]
    fn test_series_creation() {
        let series = Series::from_samples(vec![0.0; 1000], 100.0, t0()).unwrap();
        assert_eq!(series.len(), 1000);
        assert_eq!(series.nyquist(), 50.0);
        assert!((series.duration() - 10.0).abs() < 1e-12);
        assert_eq!(series.end_time(), t0() + seconds(9.99));
    }

    #[test]
    fn test_series_invariants() {
        assert!(Series::from_samples(vec![], 100.0, t0()).is_err());
        assert!(Series::from_samples(vec![1.0], 0.0, t0()).is_err());
        assert!(Series::from_samples(vec![1.0], f64::NAN, t0()).is_err());
        assert!(Series::from_samples(vec![1.0], -5.0, t0()).is_err());
    }

    #[test]
    fn test_merge_contiguous() {
        let a = Series::from_samples(vec![1.0, 2.0], 10.0, t0()).unwrap();
        let b = Series::from_samples(vec![3.0, 4.0], 10.0, t0() + seconds(0.2)).unwrap();
        // Out of order on purpose
        let merged = Series::merge(vec![b, a]).unwrap();
        assert_eq!(merged.samples(), &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(merged.start_time(), t0());
    }

    #[test]
    fn test_merge_rejects_gap_and_overlap() {
        let a = Series::from_samples(vec![1.0, 2.0], 10.0, t0()).unwrap();
        let gap = Series::from_samples(vec![3.0], 10.0, t0() + seconds(0.5)).unwrap();
        let overlap = Series::from_samples(vec![3.0], 10.0, t0() + seconds(0.1)).unwrap();

        match Series::merge(vec![a.clone(), gap]) {
            Err(CrotalusError::Gap { expected, .. }) => assert_eq!(expected, t0() + seconds(0.2)),
            other => panic!("expected gap error, got {:?}", other),
        }
        assert!(matches!(
            Series::merge(vec![a, overlap]),
            Err(CrotalusError::Gap { .. })
        ));
    }

    #[test]
    fn test_merge_rejects_rate_mismatch() {
        let a = Series::from_samples(vec![1.0, 2.0], 10.0, t0()).unwrap();
        let b = Series::from_samples(vec![3.0], 20.0, t0() + seconds(0.2)).unwrap();
        assert!(matches!(
            Series::merge(vec![a, b]),
            Err(CrotalusError::InvalidSeries { .. })
        ));
    }

    #[test]
    fn test_multiseries_alignment() {
        let a = Series::from_samples(vec![0.0; 10], 10.0, t0()).unwrap();
        let b = Series::from_samples(vec![1.0; 10], 10.0, t0()).unwrap();
        let c = Series::from_samples(vec![1.0; 9], 10.0, t0()).unwrap();

        let ms = MultiSeries::new(vec![("lf".into(), a.clone()), ("hf".into(), b)]).unwrap();
        assert_eq!(ms.len(), 2);
        assert_eq!(ms.get("hf").unwrap().samples()[0], 1.0);
        assert!(MultiSeries::new(vec![("lf".into(), a), ("hf".into(), c)]).is_err());
    }
}
