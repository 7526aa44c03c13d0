//! Error handling for the Crotalus feature-extraction engine
//!
//! Every stage of the pipeline reports failures through [`CrotalusError`].
//! Validation errors abort the current series or window only; callers decide
//! whether to continue with the next partition.

use chrono::{DateTime, Utc};

/// Result type alias for Crotalus operations
pub type CrotalusResult<T> = Result<T, CrotalusError>;

/// Comprehensive error type for all Crotalus operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum CrotalusError {
    /// A configuration parameter is missing, mistyped or out of range
    #[error("Invalid configuration for '{parameter}': {reason}")]
    InvalidConfiguration {
        /// Name of the offending parameter
        parameter: String,
        /// Description of the problem
        reason: String,
    },

    /// Filter or band edges violate `0 < low < high < nyquist`
    #[error("Invalid band [{low}, {high}] Hz for Nyquist frequency {nyquist} Hz")]
    InvalidBand {
        /// Lower edge (Hz)
        low: f64,
        /// Upper edge (Hz)
        high: f64,
        /// Nyquist frequency of the series (Hz)
        nyquist: f64,
    },

    /// Segments could not be merged without ambiguity
    #[error("Cannot merge segments: expected next sample at {expected}, segment starts at {found}")]
    Gap {
        /// Time at which the next sample was expected
        expected: DateTime<Utc>,
        /// Start time of the segment that does not line up
        found: DateTime<Utc>,
    },

    /// No instrument response available for the requested channel
    #[error("No instrument response for {channel} at {time}")]
    MissingCalibration {
        /// Channel identifier (NET.STA.LOC.CHA)
        channel: String,
        /// Requested time
        time: DateTime<Utc>,
    },

    /// Decimation factor is not supported
    #[error("Invalid decimation factor {factor}: {reason}")]
    InvalidDecimation {
        /// Requested factor
        factor: f64,
        /// Why the factor was rejected
        reason: &'static str,
    },

    /// A window carries no usable information for the requested measure
    #[error("Degenerate window: {reason}")]
    DegenerateWindow {
        /// Description of the degeneracy
        reason: &'static str,
    },

    /// A frequency band maps onto zero spectrum bins
    #[error("Band [{low}, {high}] Hz collapses to zero spectrum bins")]
    EmptyBand {
        /// Lower edge (Hz)
        low: f64,
        /// Upper edge (Hz)
        high: f64,
    },

    /// A series or spectrum violates its structural invariants
    #[error("Invalid series: {reason}")]
    InvalidSeries {
        /// Description of the violation
        reason: String,
    },
}

impl CrotalusError {
    /// Shorthand for configuration errors
    pub fn config(parameter: impl Into<String>, reason: impl Into<String>) -> Self {
        CrotalusError::InvalidConfiguration {
            parameter: parameter.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for series invariant violations
    pub fn series(reason: impl Into<String>) -> Self {
        CrotalusError::InvalidSeries {
            reason: reason.into(),
        }
    }

    /// True for per-window numerical degeneracies that should become a
    /// missing value instead of aborting a batch
    pub fn is_window_local(&self) -> bool {
        matches!(
            self,
            CrotalusError::DegenerateWindow { .. } | CrotalusError::EmptyBand { .. }
        )
    }
}
