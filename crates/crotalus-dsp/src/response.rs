//! Instrument response lookup
//!
//! Raw counts are converted to ground motion by dividing by the overall
//! channel sensitivity valid at the trace start time. Full pole/zero
//! deconvolution is out of scope; providers only report the scalar gain.

use chrono::{DateTime, Utc};
use crotalus_core::{ChannelId, CrotalusError, CrotalusResult};
use serde::{Deserialize, Serialize};

/// Overall sensitivity of a recording channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sensitivity {
    /// Counts per physical unit
    pub value: f64,
    /// Physical unit of the ground motion, e.g. `M/S`
    pub input_unit: String,
}

impl Sensitivity {
    pub fn new(value: f64, input_unit: impl Into<String>) -> CrotalusResult<Self> {
        if !value.is_finite() || value == 0.0 {
            return Err(CrotalusError::config(
                "sensitivity",
                format!("must be finite and non-zero, got {}", value),
            ));
        }
        Ok(Self {
            value,
            input_unit: input_unit.into(),
        })
    }
}

/// Source of instrument calibration
pub trait ResponseProvider: Send + Sync {
    /// Sensitivity of `channel` valid at `time`
    fn instrument_scale(&self, channel: &ChannelId, time: DateTime<Utc>) -> CrotalusResult<Sensitivity>;
}

/// One calibration epoch for a channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEpoch {
    pub channel: ChannelId,
    pub start: DateTime<Utc>,
    /// Open-ended when `None`
    pub end: Option<DateTime<Utc>>,
    pub sensitivity: Sensitivity,
}

impl ResponseEpoch {
    fn covers(&self, channel: &ChannelId, time: DateTime<Utc>) -> bool {
        &self.channel == channel && self.start <= time && self.end.map_or(true, |end| time < end)
    }
}

/// In-memory station inventory
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticInventory {
    epochs: Vec<ResponseEpoch>,
}

impl StaticInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a calibration epoch
    pub fn add_epoch(&mut self, epoch: ResponseEpoch) -> &mut Self {
        self.epochs.push(epoch);
        self
    }

    /// Register a sensitivity valid for all time
    pub fn with_channel(mut self, channel: ChannelId, sensitivity: Sensitivity) -> Self {
        self.epochs.push(ResponseEpoch {
            channel,
            start: DateTime::<Utc>::MIN_UTC,
            end: None,
            sensitivity,
        });
        self
    }

    pub fn len(&self) -> usize {
        self.epochs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.epochs.is_empty()
    }
}

impl ResponseProvider for StaticInventory {
    fn instrument_scale(&self, channel: &ChannelId, time: DateTime<Utc>) -> CrotalusResult<Sensitivity> {
        // Latest matching epoch wins when epochs overlap
        self.epochs
            .iter()
            .rev()
            .find(|epoch| epoch.covers(channel, time))
            .map(|epoch| epoch.sensitivity.clone())
            .ok_or_else(|| CrotalusError::MissingCalibration {
                channel: channel.to_string(),
                time,
            })
    }
}

/// Provider for already-calibrated or synthetic data
#[derive(Debug, Clone, Copy, Default)]
pub struct UnitResponse;

impl ResponseProvider for UnitResponse {
    fn instrument_scale(&self, _channel: &ChannelId, _time: DateTime<Utc>) -> CrotalusResult<Sensitivity> {
        Ok(Sensitivity {
            value: 1.0,
            input_unit: "COUNTS".to_string(),
        })
    }
}
