//! Crotalus-Simulation: Synthetic volcano-seismic traces
//!
//! Seeded tremor, long-period event and noise generators for tests, demos
//! and benchmarks.

pub mod signal_patterns;
pub mod trace_simulator;

pub use signal_patterns::*;
pub use trace_simulator::*;
