//! Crotalus-Core: Foundation types for volcano-seismic feature extraction
//!
//! Series containers, window sets and the error taxonomy shared by the
//! processing crates.

pub mod channel;
pub mod error;
pub mod series;
pub mod windowing;

pub use channel::{ChannelId, GroundMotion};
pub use error::{CrotalusError, CrotalusResult};
pub use series::{seconds, MultiSeries, Series, Traces};
pub use windowing::{SlidingWindower, WindowSet, Windower};
