//! Deterministic volcano-seismic signal shapes

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Noise-free ground-velocity patterns, in physical units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SeismicPattern {
    /// Harmonic tremor: a fundamental plus overtones at `1/h` amplitude
    HarmonicTremor {
        frequency: f64,
        amplitude: f64,
        overtones: usize,
    },
    /// Tremor whose envelope swells and fades with the given period
    SpasmodicTremor {
        frequency: f64,
        amplitude: f64,
        period: f64,
    },
    /// Repeating long-period events, each an exponentially decaying wavelet
    LongPeriod {
        frequency: f64,
        amplitude: f64,
        /// Seconds between event onsets
        interval: f64,
        /// Envelope decay rate (1/s)
        decay: f64,
    },
    /// Linear instrument drift
    Drift { slope: f64 },
}

impl SeismicPattern {
    /// Pattern value at `time` seconds after the simulation origin
    pub fn value_at(&self, time: f64) -> f64 {
        match *self {
            SeismicPattern::HarmonicTremor {
                frequency,
                amplitude,
                overtones,
            } => (1..=overtones + 1)
                .map(|h| {
                    let h = h as f64;
                    amplitude / h * (2.0 * PI * h * frequency * time).sin()
                })
                .sum(),

            SeismicPattern::SpasmodicTremor {
                frequency,
                amplitude,
                period,
            } => {
                let envelope = 0.5 * (1.0 - (2.0 * PI * time / period).cos());
                amplitude * envelope * (2.0 * PI * frequency * time).sin()
            }

            SeismicPattern::LongPeriod {
                frequency,
                amplitude,
                interval,
                decay,
            } => {
                let since_onset = time.rem_euclid(interval);
                amplitude * (-decay * since_onset).exp() * (2.0 * PI * frequency * since_onset).sin()
            }

            SeismicPattern::Drift { slope } => slope * time,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            SeismicPattern::HarmonicTremor { .. } => "Harmonic tremor",
            SeismicPattern::SpasmodicTremor { .. } => "Spasmodic tremor",
            SeismicPattern::LongPeriod { .. } => "Long-period events",
            SeismicPattern::Drift { .. } => "Instrument drift",
        }
    }

    /// Common preset patterns
    pub fn presets() -> Vec<(&'static str, SeismicPattern)> {
        vec![
            ("Background Tremor", SeismicPattern::HarmonicTremor {
                frequency: 2.0, amplitude: 1e-7, overtones: 0
            }),
            ("Harmonic Tremor", SeismicPattern::HarmonicTremor {
                frequency: 1.5, amplitude: 2e-6, overtones: 3
            }),
            ("Gliding Spasmodic", SeismicPattern::SpasmodicTremor {
                frequency: 3.0, amplitude: 1e-6, period: 120.0
            }),
            ("LP Swarm", SeismicPattern::LongPeriod {
                frequency: 1.0, amplitude: 5e-6, interval: 90.0, decay: 0.2
            }),
            ("Hybrid Events", SeismicPattern::LongPeriod {
                frequency: 6.0, amplitude: 3e-6, interval: 45.0, decay: 0.8
            }),
        ]
    }
}
