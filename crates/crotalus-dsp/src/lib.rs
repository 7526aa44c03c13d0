//! Crotalus-DSP: Preprocessing and feature extraction for seismic traces
//!
//! Filtering, decimation and response removal, tapered spectra, band
//! aggregation and the scalar/vector feature library, tied together by the
//! partition-level [`FeatureExtractor`].

pub mod bands;
pub mod config;
pub mod features;
pub mod filters;
pub mod pipeline;
pub mod preprocess;
pub mod record;
pub mod response;
pub mod spectrum;

pub use bands::{aggregate, linear_bands, octave_bands, ssam, Band, BandSet, Ssam};
pub use config::{
    BandRatioParams, ConfigurationSource, DsarParams, FeatureSettings, JsonConfiguration,
    LinearBandParams, OctaveBandParams, ParameterValue, PreprocessParams, SpectrumParams,
    TonalityParams, WindowParams,
};
pub use filters::{
    apply_bandpass, apply_filter, apply_highpass, apply_lowpass, ButterworthFilter, FilterBand,
    FilterConfig,
};
pub use pipeline::{FeatureExtractor, Partition, PartitionReport};
pub use preprocess::{decimate, detrend, integrate, preprocess, preprocess_segments};
pub use record::{FeatureKind, FeatureRecord, FeatureValue};
pub use response::{ResponseEpoch, ResponseProvider, Sensitivity, StaticInventory, UnitResponse};
pub use spectrum::{spectrogram, spectrum, SpectralTransform, Spectrum};
