//! Extraction orchestrator
//!
//! A [`Partition`] is one channel over one time range. Every requested
//! feature gets its own working copy of the merged trace, preprocessed and
//! windowed with that feature's parameters, so features with different
//! band limits or window lengths never interfere. Window values are merged
//! into one [`FeatureRecord`] per window start time.

use crate::bands::aggregate;
use crate::config::{
    BandRatioParams, ConfigurationSource, DsarParams, FeatureSettings, LinearBandParams,
    OctaveBandParams, PreprocessParams, SpectrumParams, TonalityParams, WindowParams,
};
use crate::features::{self, Windowed};
use crate::preprocess::{preprocess_series, remove_sensitivity};
use crate::record::{FeatureKind, FeatureRecord, FeatureValue};
use crate::response::ResponseProvider;
use crate::spectrum::{spectrogram, Spectrum};
use chrono::{DateTime, Utc};
use crotalus_core::{ChannelId, CrotalusResult, Series, WindowSet, Windower};
use ndarray::Array2;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Raw segments of one channel plus the features to compute on them
#[derive(Debug, Clone)]
pub struct Partition {
    pub segments: Vec<Series>,
    pub features: Vec<FeatureKind>,
}

impl Partition {
    pub fn new(segments: Vec<Series>, features: Vec<FeatureKind>) -> Self {
        Self { segments, features }
    }

    /// Partition over a single continuous trace
    pub fn single(series: Series, features: Vec<FeatureKind>) -> Self {
        Self::new(vec![series], features)
    }
}

/// Outcome of one partition
#[derive(Debug, Clone, Serialize)]
pub struct PartitionReport {
    /// Shared by every partition of one `extract_partitions` call
    pub run_id: Uuid,
    pub channel: ChannelId,
    /// Ordered by window start time
    pub records: Vec<FeatureRecord>,
    /// One entry per window value that could not be computed
    pub warnings: Vec<String>,
    pub elapsed: Duration,
}

impl PartitionReport {
    pub fn missing_count(&self) -> usize {
        self.records
            .iter()
            .flat_map(|r| r.values.values())
            .filter(|v| v.is_missing())
            .count()
    }
}

/// Runs preprocess, window and feature computation for partitions
///
/// Collaborators are borrowed, never owned, so one configuration handle and
/// one inventory can serve many extractors.
pub struct FeatureExtractor<'a> {
    config: &'a dyn ConfigurationSource,
    response: &'a dyn ResponseProvider,
    windower: &'a dyn Windower,
}

impl<'a> FeatureExtractor<'a> {
    pub fn new(
        config: &'a dyn ConfigurationSource,
        response: &'a dyn ResponseProvider,
        windower: &'a dyn Windower,
    ) -> Self {
        Self {
            config,
            response,
            windower,
        }
    }

    /// Extract one partition
    pub fn extract(&self, partition: &Partition) -> CrotalusResult<PartitionReport> {
        self.run(partition, Uuid::new_v4())
    }

    /// Extract independent partitions in parallel
    ///
    /// Results keep the input order; a failing partition only fails its own
    /// slot.
    pub fn extract_partitions(&self, partitions: &[Partition]) -> Vec<CrotalusResult<PartitionReport>> {
        let run_id = Uuid::new_v4();
        partitions
            .par_iter()
            .map(|partition| self.run(partition, run_id))
            .collect()
    }

    #[instrument(level = "debug", skip_all, fields(run = %run_id))]
    fn run(&self, partition: &Partition, run_id: Uuid) -> CrotalusResult<PartitionReport> {
        let started = Instant::now();
        let series = Series::merge(partition.segments.clone())?;
        let channel = series.channel.clone();

        let mut rows: BTreeMap<DateTime<Utc>, FeatureRecord> = BTreeMap::new();
        let mut warnings = Vec::new();
        for &kind in &partition.features {
            let windowed = self.compute(kind, &series)?;
            for (timestamp, value) in windowed.timestamps.into_iter().zip(windowed.values) {
                let value = match value {
                    Ok(value) => value,
                    Err(e) if e.is_window_local() => {
                        warn!(feature = %kind, %timestamp, error = %e, "feature value missing");
                        warnings.push(format!("{} at {}: {}", kind, timestamp, e));
                        FeatureValue::Missing
                    }
                    Err(e) => return Err(e),
                };
                rows.entry(timestamp)
                    .or_insert_with(|| FeatureRecord::new(timestamp, channel.clone()))
                    .insert(kind, value);
            }
        }

        let report = PartitionReport {
            run_id,
            channel,
            records: rows.into_values().collect(),
            warnings,
            elapsed: started.elapsed(),
        };
        info!(
            channel = %report.channel,
            records = report.records.len(),
            missing = report.missing_count(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "extracted partition"
        );
        Ok(report)
    }

    /// Per-window values of one feature over a merged trace
    pub fn compute(&self, kind: FeatureKind, series: &Series) -> CrotalusResult<Windowed<FeatureValue>> {
        let settings = self.config.settings(kind.name())?;

        let windowed = match kind {
            FeatureKind::Dsar => {
                // Band-limits itself after integration; only the response is removed here
                let params = DsarParams::from_settings(&settings)?;
                let mut velocity = series.clone();
                remove_sensitivity(&mut velocity, self.response)?;
                let dsar = features::dsar(&velocity, &params, self.windower)?;
                lift(&dsar.timestamps, dsar.values)
            }
            FeatureKind::Rsam => {
                let windows = self.windows(&settings, series)?;
                let values = features::rsam(windows.component(0)?).into_iter().map(Ok).collect();
                lift(windows.timestamps(), values)
            }
            FeatureKind::Rsem => {
                let windows = self.windows(&settings, series)?;
                let values = features::rsem(windows.component(0)?).into_iter().map(Ok).collect();
                lift(windows.timestamps(), values)
            }
            FeatureKind::Kurtosis => {
                let windows = self.windows(&settings, series)?;
                lift(windows.timestamps(), features::kurtosis(windows.component(0)?))
            }
            FeatureKind::DominantFrequency => {
                let top_k = settings.count_or("top_k", 1)?;
                let (timestamps, spectrum) = self.spectrogram(&settings, series)?;
                lift(&timestamps, features::dominant_frequency(&spectrum, top_k))
            }
            FeatureKind::MedianRankFrequency => {
                let (timestamps, spectrum) = self.spectrogram(&settings, series)?;
                lift(&timestamps, features::median_rank_frequency(&spectrum))
            }
            FeatureKind::CentroidFrequency => {
                let (timestamps, spectrum) = self.spectrogram(&settings, series)?;
                lift(&timestamps, features::centroid_frequency(&spectrum))
            }
            FeatureKind::CentroidFrequencyNormalized => {
                let (timestamps, spectrum) = self.spectrogram(&settings, series)?;
                lift(&timestamps, features::centroid_frequency_normalized(&spectrum))
            }
            FeatureKind::BandRatio => {
                let params = BandRatioParams::from_settings(&settings)?;
                let (timestamps, spectrum) = self.spectrogram(&settings, series)?;
                lift(
                    &timestamps,
                    features::band_ratio(&spectrum, params.lower_band, params.upper_band),
                )
            }
            FeatureKind::Tonality => {
                let params = TonalityParams::from_settings(&settings)?;
                let (timestamps, spectrum) = self.spectrogram(&settings, series)?;
                lift(
                    &timestamps,
                    features::tonality(&spectrum, params.top_k, params.bin_width),
                )
            }
            FeatureKind::SsamLinear => {
                let bands = LinearBandParams::from_settings(&settings)?.bands()?;
                let (timestamps, spectrum) = self.spectrogram(&settings, series)?;
                lift(&timestamps, band_rows(aggregate(&spectrum, &bands)))
            }
            FeatureKind::SsamOctave => {
                let bands = OctaveBandParams::from_settings(&settings)?.bands()?;
                let (timestamps, spectrum) = self.spectrogram(&settings, series)?;
                lift(&timestamps, band_rows(aggregate(&spectrum, &bands)))
            }
        };

        tracing::debug!(feature = %kind, windows = windowed.timestamps.len(), "computed feature");
        Ok(windowed)
    }

    /// Preprocess a working copy and window it
    fn windows(&self, settings: &FeatureSettings, series: &Series) -> CrotalusResult<WindowSet> {
        let preprocess = PreprocessParams::from_settings(settings)?;
        let window = WindowParams::from_settings(settings)?;
        let mut working = series.clone();
        preprocess_series(&mut working, &preprocess, self.response)?;
        self.windower
            .window_series(&working, window.window_length, window.overlap)
    }

    fn spectrogram(
        &self,
        settings: &FeatureSettings,
        series: &Series,
    ) -> CrotalusResult<(Vec<DateTime<Utc>>, Spectrum)> {
        let taper = SpectrumParams::from_settings(settings)?.taper;
        let windows = self.windows(settings, series)?;
        let spectrum = spectrogram(&windows, 0, taper)?;
        Ok((windows.timestamps().to_vec(), spectrum))
    }
}

fn lift<T: Into<FeatureValue>>(
    timestamps: &[DateTime<Utc>],
    values: Vec<CrotalusResult<T>>,
) -> Windowed<FeatureValue> {
    Windowed {
        timestamps: timestamps.to_vec(),
        values: values.into_iter().map(|v| v.map(Into::into)).collect(),
    }
}

fn band_rows(matrix: Array2<f64>) -> Vec<CrotalusResult<Vec<f64>>> {
    matrix.rows().into_iter().map(|row| Ok(row.to_vec())).collect()
}
