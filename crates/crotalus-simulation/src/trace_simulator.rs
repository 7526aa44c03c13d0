//! Synthetic seismometer output built from seismic patterns and noise

use crate::signal_patterns::SeismicPattern;
use chrono::{DateTime, Utc};
use crotalus_core::{seconds, ChannelId, CrotalusError, CrotalusResult, Series};
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

/// Configuration for trace simulation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Stream the generated series are tagged with
    pub channel: ChannelId,
    /// Sampling rate in Hz
    pub sampling_rate: f64,
    /// Time of the first generated sample
    pub start_time: DateTime<Utc>,
    /// Superimposed ground-velocity sources (m/s)
    pub patterns: Vec<SeismicPattern>,
    /// Instrument sensitivity; samples are emitted in counts
    pub counts_per_unit: f64,
    /// Gaussian ground noise standard deviation (m/s, 0.0 = no noise)
    pub noise_std: f64,
    /// Random seed for reproducibility
    pub seed: Option<u64>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            channel: ChannelId::new("XX", "SIM", "", "HHZ"),
            sampling_rate: 50.0,
            start_time: DateTime::<Utc>::UNIX_EPOCH,
            patterns: vec![SeismicPattern::HarmonicTremor {
                frequency: 2.0,
                amplitude: 1e-6,
                overtones: 2,
            }],
            counts_per_unit: 1e9,
            noise_std: 1e-7,
            seed: None,
        }
    }
}

/// Seismometer trace simulator
pub struct TraceSimulator {
    config: SimulatorConfig,
    rng: rand::rngs::StdRng,
    noise: Normal<f64>,
    /// Samples emitted so far; keeps consecutive chunks contiguous
    cursor: usize,
}

impl TraceSimulator {
    pub fn new(config: SimulatorConfig) -> CrotalusResult<Self> {
        if !config.sampling_rate.is_finite() || config.sampling_rate <= 0.0 {
            return Err(CrotalusError::config("sampling_rate", "must be finite and positive"));
        }
        if !config.counts_per_unit.is_finite() || config.counts_per_unit == 0.0 {
            return Err(CrotalusError::config("counts_per_unit", "must be finite and non-zero"));
        }

        let seed = config.seed.unwrap_or_else(|| {
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default()
        });
        let noise = Normal::new(0.0, config.noise_std)
            .map_err(|e| CrotalusError::config("noise_std", e.to_string()))?;

        Ok(Self {
            config,
            rng: rand::rngs::StdRng::seed_from_u64(seed),
            noise,
            cursor: 0,
        })
    }

    /// Generate the next `duration` seconds of counts
    pub fn generate(&mut self, duration: f64) -> CrotalusResult<Series> {
        let n = (duration * self.config.sampling_rate).round() as usize;
        if n == 0 {
            return Err(CrotalusError::config(
                "duration",
                format!("{} s yields no samples at {} Hz", duration, self.config.sampling_rate),
            ));
        }

        let dt = 1.0 / self.config.sampling_rate;
        let start = self.config.start_time + seconds(self.cursor as f64 / self.config.sampling_rate);
        let mut samples = Vec::with_capacity(n);
        for i in 0..n {
            let time = (self.cursor + i) as f64 * dt;
            let ground: f64 = self
                .config
                .patterns
                .iter()
                .map(|p| p.value_at(time))
                .sum::<f64>()
                + self.noise.sample(&mut self.rng);
            samples.push(ground * self.config.counts_per_unit);
        }
        self.cursor += n;

        Series::new(self.config.channel.clone(), samples, self.config.sampling_rate, start)
    }

    /// Generate `count` back-to-back segments of `duration` seconds each,
    /// as a digitizer would deliver them
    pub fn generate_segments(&mut self, duration: f64, count: usize) -> CrotalusResult<Vec<Series>> {
        (0..count).map(|_| self.generate(duration)).collect()
    }

    /// Restart from the configured start time
    pub fn reset_time(&mut self) {
        self.cursor = 0;
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }
}
