//! Feature configuration
//!
//! Each feature is configured by a named bag of parameters. Parameters are
//! looked up through a [`ConfigurationSource`] and converted into validated,
//! typed structs before any numeric code runs, so bad input surfaces as
//! [`CrotalusError::InvalidConfiguration`] instead of a numeric failure deep
//! inside a kernel.

use crate::filters::MAX_ORDER;
use crate::preprocess::MAX_DECIMATION_FACTOR;
use crotalus_core::{CrotalusError, CrotalusResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Largest whole-number parameter accepted by [`FeatureSettings::count`]
pub const MAX_COUNT: usize = 1_000_000;

/// Parameter value types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Text(String),
    List(Vec<f64>),
}

impl ParameterValue {
    /// Convert to f64 if numeric
    pub fn as_float(&self) -> Option<f64> {
        match self {
            ParameterValue::Float(v) => Some(*v),
            ParameterValue::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParameterValue::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[f64]> {
        match self {
            ParameterValue::List(v) => Some(v),
            _ => None,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            ParameterValue::Integer(_) => "integer",
            ParameterValue::Float(_) => "float",
            ParameterValue::Boolean(_) => "boolean",
            ParameterValue::Text(_) => "string",
            ParameterValue::List(_) => "list",
        }
    }
}

impl From<f64> for ParameterValue {
    fn from(value: f64) -> Self {
        ParameterValue::Float(value)
    }
}

impl From<i64> for ParameterValue {
    fn from(value: i64) -> Self {
        ParameterValue::Integer(value)
    }
}

impl From<bool> for ParameterValue {
    fn from(value: bool) -> Self {
        ParameterValue::Boolean(value)
    }
}

impl From<String> for ParameterValue {
    fn from(value: String) -> Self {
        ParameterValue::Text(value)
    }
}

impl From<Vec<f64>> for ParameterValue {
    fn from(value: Vec<f64>) -> Self {
        ParameterValue::List(value)
    }
}

impl From<[f64; 2]> for ParameterValue {
    fn from(value: [f64; 2]) -> Self {
        ParameterValue::List(value.to_vec())
    }
}

/// Named parameters for one feature
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureSettings {
    pub name: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, ParameterValue>,
}

impl FeatureSettings {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            parameters: BTreeMap::new(),
        }
    }

    /// Builder-style parameter assignment
    pub fn with(mut self, key: &str, value: impl Into<ParameterValue>) -> Self {
        self.set_parameter(key, value);
        self
    }

    pub fn set_parameter(&mut self, key: &str, value: impl Into<ParameterValue>) {
        self.parameters.insert(key.to_string(), value.into());
    }

    pub fn get_parameter(&self, key: &str) -> Option<&ParameterValue> {
        self.parameters.get(key)
    }

    /// Required finite float
    pub fn float(&self, key: &str) -> CrotalusResult<f64> {
        match self.parameters.get(key) {
            Some(value) => self.finite(key, value),
            None => Err(self.missing(key)),
        }
    }

    /// Optional finite float
    pub fn float_or(&self, key: &str, default: f64) -> CrotalusResult<f64> {
        match self.parameters.get(key) {
            Some(value) => self.finite(key, value),
            None => Ok(default),
        }
    }

    /// Required whole number in `[0, MAX_COUNT]`
    pub fn count(&self, key: &str) -> CrotalusResult<usize> {
        let value = self.float(key)?;
        if value < 0.0 || value.fract() != 0.0 {
            return Err(CrotalusError::config(
                self.qualified(key),
                format!("expected a non-negative integer, got {}", value),
            ));
        }
        if value > MAX_COUNT as f64 {
            return Err(CrotalusError::config(
                self.qualified(key),
                format!("{} exceeds the limit of {}", value, MAX_COUNT),
            ));
        }
        Ok(value as usize)
    }

    pub fn count_or(&self, key: &str, default: usize) -> CrotalusResult<usize> {
        if self.parameters.contains_key(key) {
            self.count(key)
        } else {
            Ok(default)
        }
    }

    /// Required `[low, high]` pair
    pub fn pair(&self, key: &str) -> CrotalusResult<[f64; 2]> {
        let value = self.parameters.get(key).ok_or_else(|| self.missing(key))?;
        match value.as_list() {
            Some(&[a, b]) if a.is_finite() && b.is_finite() => Ok([a, b]),
            Some(list) => Err(CrotalusError::config(
                self.qualified(key),
                format!("expected two finite values, got {:?}", list),
            )),
            None => Err(self.wrong_type(key, value, "list")),
        }
    }

    fn finite(&self, key: &str, value: &ParameterValue) -> CrotalusResult<f64> {
        let v = value
            .as_float()
            .ok_or_else(|| self.wrong_type(key, value, "number"))?;
        if !v.is_finite() {
            return Err(CrotalusError::config(self.qualified(key), "must be finite"));
        }
        Ok(v)
    }

    fn qualified(&self, key: &str) -> String {
        if self.name.is_empty() {
            key.to_string()
        } else {
            format!("{}.{}", self.name, key)
        }
    }

    fn missing(&self, key: &str) -> CrotalusError {
        CrotalusError::config(self.qualified(key), "missing")
    }

    fn wrong_type(&self, key: &str, value: &ParameterValue, expected: &str) -> CrotalusError {
        CrotalusError::config(
            self.qualified(key),
            format!("expected {}, got {}", expected, value.type_name()),
        )
    }
}

/// Feature parameter lookup
pub trait ConfigurationSource: Send + Sync {
    /// Parameters configured for `feature`
    fn settings(&self, feature: &str) -> CrotalusResult<FeatureSettings>;
}

/// In-memory configuration loaded from a JSON document
///
/// ```json
/// { "features": { "rsam": { "freq_min": 1.0, "freq_max": 10.0, "window_length": 600 } } }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JsonConfiguration {
    #[serde(default)]
    features: BTreeMap<String, BTreeMap<String, ParameterValue>>,
}

impl JsonConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> CrotalusResult<Self> {
        serde_json::from_str(json).map_err(|e| CrotalusError::config("document", e.to_string()))
    }

    pub fn to_json(&self) -> CrotalusResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| CrotalusError::config("document", e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> CrotalusResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| CrotalusError::config("document", format!("{}: {}", path.display(), e)))?;
        Self::from_json(&text)
    }

    pub fn insert(&mut self, settings: FeatureSettings) {
        self.features.insert(settings.name, settings.parameters);
    }

    pub fn feature_names(&self) -> impl Iterator<Item = &str> {
        self.features.keys().map(String::as_str)
    }
}

impl ConfigurationSource for JsonConfiguration {
    fn settings(&self, feature: &str) -> CrotalusResult<FeatureSettings> {
        self.features
            .get(feature)
            .map(|parameters| FeatureSettings {
                name: feature.to_string(),
                parameters: parameters.clone(),
            })
            .ok_or_else(|| CrotalusError::config(feature, "no configuration for feature"))
    }
}

/// Preprocessing chain parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PreprocessParams {
    pub decimation_factor: usize,
    pub freq_min: f64,
    pub freq_max: f64,
    pub order: usize,
    /// Multiplier applied after response removal (unit conversion)
    pub scale: f64,
}

impl PreprocessParams {
    pub fn from_settings(settings: &FeatureSettings) -> CrotalusResult<Self> {
        let factor = settings.float_or("decimation_factor", 1.0)?;
        if factor < 1.0 || factor.fract() != 0.0 {
            return Err(CrotalusError::InvalidDecimation {
                factor,
                reason: "must be a positive integer",
            });
        }
        if factor > MAX_DECIMATION_FACTOR as f64 {
            return Err(CrotalusError::InvalidDecimation {
                factor,
                reason: "anti-alias filter is unstable above a factor of 16",
            });
        }

        let params = Self {
            decimation_factor: factor as usize,
            freq_min: settings.float("freq_min")?,
            freq_max: settings.float("freq_max")?,
            order: settings.count_or("order", 4)?,
            scale: settings.float_or("scale", 1.0)?,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> CrotalusResult<()> {
        if self.decimation_factor == 0 {
            return Err(CrotalusError::InvalidDecimation {
                factor: 0.0,
                reason: "must be a positive integer",
            });
        }
        validate_edges("freq_min", self.freq_min, self.freq_max)?;
        validate_order(self.order)?;
        if self.scale == 0.0 || !self.scale.is_finite() {
            return Err(CrotalusError::config("scale", "must be finite and non-zero"));
        }
        Ok(())
    }
}

/// Sliding window geometry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowParams {
    /// Window length in seconds
    pub window_length: f64,
    /// Fractional overlap in `[0, 1)`
    pub overlap: f64,
}

impl WindowParams {
    pub fn from_settings(settings: &FeatureSettings) -> CrotalusResult<Self> {
        let params = Self {
            window_length: settings.float("window_length")?,
            overlap: settings.float_or("overlap", 0.0)?,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> CrotalusResult<()> {
        if self.window_length <= 0.0 {
            return Err(CrotalusError::config("window_length", "must be positive"));
        }
        if !(0.0..1.0).contains(&self.overlap) {
            return Err(CrotalusError::config("overlap", "must lie in [0, 1)"));
        }
        Ok(())
    }
}

/// Spectral transform parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpectrumParams {
    /// Tukey taper fraction in `[0, 1]`
    pub taper: f64,
}

impl SpectrumParams {
    pub fn from_settings(settings: &FeatureSettings) -> CrotalusResult<Self> {
        let taper = settings.float_or("taper", 0.1)?;
        if !(0.0..=1.0).contains(&taper) {
            return Err(CrotalusError::config("taper", "must lie in [0, 1]"));
        }
        Ok(Self { taper })
    }
}

/// Fractional-octave band layout
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OctaveBandParams {
    pub fraction: f64,
    pub f_lower: f64,
    pub f_upper: f64,
}

impl OctaveBandParams {
    pub fn from_settings(settings: &FeatureSettings) -> CrotalusResult<Self> {
        let params = Self {
            fraction: settings.float("fraction")?,
            f_lower: settings.float("f_lower")?,
            f_upper: settings.float("f_upper")?,
        };
        if params.fraction <= 0.0 {
            return Err(CrotalusError::config("fraction", "must be positive"));
        }
        validate_edges("f_lower", params.f_lower, params.f_upper)?;
        Ok(params)
    }
}

/// Fixed-width band layout
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearBandParams {
    pub f_lower: f64,
    pub f_upper: f64,
    pub f_delta: f64,
}

impl LinearBandParams {
    pub fn from_settings(settings: &FeatureSettings) -> CrotalusResult<Self> {
        let params = Self {
            f_lower: settings.float("f_lower")?,
            f_upper: settings.float("f_upper")?,
            f_delta: settings.float("f_delta")?,
        };
        if params.f_delta <= 0.0 {
            return Err(CrotalusError::config("f_delta", "must be positive"));
        }
        if params.f_lower < 0.0 || params.f_lower >= params.f_upper {
            return Err(CrotalusError::config("f_lower", "need 0 <= f_lower < f_upper"));
        }
        Ok(params)
    }
}

/// Displacement seismic amplitude ratio parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DsarParams {
    /// Low-frequency band `[min, max]` (Hz)
    pub lf_band: [f64; 2],
    /// High-frequency band `[min, max]` (Hz)
    pub hf_band: [f64; 2],
    /// Order of the two band filters
    pub order: usize,
    /// Corner of the prefilter applied after integration (Hz)
    pub highpass: f64,
    /// Order of the prefilter, independent of the band filters
    pub highpass_order: usize,
    pub window: WindowParams,
}

impl DsarParams {
    pub fn from_settings(settings: &FeatureSettings) -> CrotalusResult<Self> {
        let params = Self {
            lf_band: settings.pair("lf_band")?,
            hf_band: settings.pair("hf_band")?,
            order: settings.count_or("order", 4)?,
            highpass: settings.float_or("highpass", 0.5)?,
            highpass_order: settings.count_or("highpass_order", 4)?,
            window: WindowParams::from_settings(settings)?,
        };
        validate_edges("lf_band", params.lf_band[0], params.lf_band[1])?;
        validate_edges("hf_band", params.hf_band[0], params.hf_band[1])?;
        validate_order(params.order)?;
        validate_order(params.highpass_order)?;
        if params.highpass <= 0.0 {
            return Err(CrotalusError::config("highpass", "must be positive"));
        }
        Ok(params)
    }
}

/// Spectral band-power ratio parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandRatioParams {
    /// Denominator band `[min, max]` (Hz)
    pub lower_band: [f64; 2],
    /// Numerator band `[min, max]` (Hz)
    pub upper_band: [f64; 2],
}

impl BandRatioParams {
    pub fn from_settings(settings: &FeatureSettings) -> CrotalusResult<Self> {
        let params = Self {
            lower_band: settings.pair("lower_band")?,
            upper_band: settings.pair("upper_band")?,
        };
        for (name, [lo, hi]) in [("lower_band", params.lower_band), ("upper_band", params.upper_band)] {
            if lo < 0.0 || lo >= hi {
                return Err(CrotalusError::config(name, "need 0 <= min < max"));
            }
        }
        Ok(params)
    }
}

/// Peak-picking tonality parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TonalityParams {
    /// Number of peaks to accept
    pub top_k: usize,
    /// Width of the local window around each peak, in bins
    pub bin_width: usize,
}

impl TonalityParams {
    pub fn from_settings(settings: &FeatureSettings) -> CrotalusResult<Self> {
        let params = Self {
            top_k: settings.count("top_k")?,
            bin_width: settings.count("bin_width")?,
        };
        if params.top_k == 0 {
            return Err(CrotalusError::config("top_k", "must be at least 1"));
        }
        if params.bin_width < 2 {
            return Err(CrotalusError::config("bin_width", "must be at least 2 bins"));
        }
        Ok(params)
    }
}

fn validate_edges(parameter: &str, low: f64, high: f64) -> CrotalusResult<()> {
    if low <= 0.0 || low >= high {
        return Err(CrotalusError::config(
            parameter,
            format!("need 0 < low < high, got [{}, {}]", low, high),
        ));
    }
    Ok(())
}

fn validate_order(order: usize) -> CrotalusResult<()> {
    if order == 0 || order > MAX_ORDER {
        return Err(CrotalusError::config(
            "order",
            format!("must lie in [1, {}], got {}", MAX_ORDER, order),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"{
        "features": {
            "rsam": {
                "decimation_factor": 2,
                "freq_min": 1.0,
                "freq_max": 10,
                "order": 4,
                "window_length": 60.0,
                "overlap": 0.5
            },
            "dsar": {
                "freq_min": 0.5,
                "freq_max": 20.0,
                "lf_band": [4.0, 8.0],
                "hf_band": [8.0, 16.0],
                "window_length": 600
            }
        }
    }"#;

    #[test]
    fn test_json_round_trip() {
        let config = JsonConfiguration::from_json(DOCUMENT).unwrap();
        let names: Vec<&str> = config.feature_names().collect();
        assert_eq!(names, vec!["dsar", "rsam"]);

        let reparsed = JsonConfiguration::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(reparsed, config);
    }

    #[test]
    fn test_typed_params() {
        let config = JsonConfiguration::from_json(DOCUMENT).unwrap();
        let rsam = config.settings("rsam").unwrap();

        let pre = PreprocessParams::from_settings(&rsam).unwrap();
        assert_eq!(pre.decimation_factor, 2);
        assert_eq!(pre.freq_max, 10.0);
        assert_eq!(pre.scale, 1.0);

        let window = WindowParams::from_settings(&rsam).unwrap();
        assert_eq!(window.overlap, 0.5);

        let dsar = DsarParams::from_settings(&config.settings("dsar").unwrap()).unwrap();
        assert_eq!(dsar.hf_band, [8.0, 16.0]);
        assert_eq!(dsar.highpass, 0.5);
        assert_eq!(dsar.highpass_order, 4);
        assert_eq!(dsar.window.window_length, 600.0);
    }

    #[test]
    fn test_missing_feature_and_parameter() {
        let config = JsonConfiguration::from_json(DOCUMENT).unwrap();
        assert!(matches!(
            config.settings("tonality"),
            Err(CrotalusError::InvalidConfiguration { .. })
        ));

        let settings = FeatureSettings::new("rsam").with("freq_min", 1.0);
        match PreprocessParams::from_settings(&settings) {
            Err(CrotalusError::InvalidConfiguration { parameter, reason }) => {
                assert_eq!(parameter, "rsam.freq_max");
                assert_eq!(reason, "missing");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_rejects_bad_values() {
        let base = FeatureSettings::new("x")
            .with("freq_min", 1.0)
            .with("freq_max", 10.0)
            .with("window_length", 10.0);

        let swapped = base.clone().with("freq_min", 20.0);
        assert!(PreprocessParams::from_settings(&swapped).is_err());

        let fractional = base.clone().with("decimation_factor", 2.5);
        assert!(matches!(
            PreprocessParams::from_settings(&fractional),
            Err(CrotalusError::InvalidDecimation { .. })
        ));

        let overlap = base.clone().with("overlap", 1.0);
        assert!(WindowParams::from_settings(&overlap).is_err());

        let taper = base.clone().with("taper", 1.5);
        assert!(SpectrumParams::from_settings(&taper).is_err());

        let wrong_type = base.clone().with("order", true);
        assert!(PreprocessParams::from_settings(&wrong_type).is_err());

        let tonality = base.with("top_k", 3_i64).with("bin_width", 1_i64);
        assert!(TonalityParams::from_settings(&tonality).is_err());
    }

    #[test]
    fn test_rejects_unrepresentable_values() {
        let base = FeatureSettings::new("tonality")
            .with("freq_min", 1.0)
            .with("freq_max", 10.0)
            .with("window_length", 10.0);

        let wide = base.clone().with("top_k", 3_i64).with("bin_width", 1e19);
        match TonalityParams::from_settings(&wide) {
            Err(CrotalusError::InvalidConfiguration { parameter, .. }) => {
                assert_eq!(parameter, "tonality.bin_width")
            }
            other => panic!("unexpected {:?}", other),
        }
        let at_limit = base.clone().with("top_k", MAX_COUNT as i64).with("bin_width", 4_i64);
        assert_eq!(TonalityParams::from_settings(&at_limit).unwrap().top_k, MAX_COUNT);
        let over = base.clone().with("top_k", MAX_COUNT as i64 + 1).with("bin_width", 4_i64);
        assert!(TonalityParams::from_settings(&over).is_err());

        let order = base.clone().with("order", 33_i64);
        assert!(matches!(
            PreprocessParams::from_settings(&order),
            Err(CrotalusError::InvalidConfiguration { .. })
        ));
        assert!(PreprocessParams::from_settings(&base.clone().with("order", 1e300)).is_err());
        assert!(matches!(
            PreprocessParams::from_settings(&base.clone().with("decimation_factor", 1e19)),
            Err(CrotalusError::InvalidDecimation { .. })
        ));
    }

    #[test]
    fn test_dsar_prefilter_order_is_independent() {
        let settings = FeatureSettings::new("dsar")
            .with("lf_band", [4.0, 8.0])
            .with("hf_band", [8.0, 16.0])
            .with("window_length", 600.0)
            .with("order", 2_i64);
        let params = DsarParams::from_settings(&settings).unwrap();
        assert_eq!(params.order, 2);
        assert_eq!(params.highpass_order, 4);

        let custom = DsarParams::from_settings(&settings.clone().with("highpass_order", 6_i64)).unwrap();
        assert_eq!((custom.order, custom.highpass_order), (2, 6));
        assert!(DsarParams::from_settings(&settings.with("highpass_order", 0_i64)).is_err());
    }

    #[test]
    fn test_band_pairs() {
        let settings = FeatureSettings::new("band_ratio")
            .with("lower_band", [1.0, 5.0])
            .with("upper_band", vec![5.0, 15.0]);
        let params = BandRatioParams::from_settings(&settings).unwrap();
        assert_eq!(params.upper_band, [5.0, 15.0]);

        let bad = settings.with("upper_band", vec![5.0]);
        assert!(BandRatioParams::from_settings(&bad).is_err());
    }
}
