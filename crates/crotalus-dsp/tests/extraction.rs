//! End-to-end extraction over simulated seismometer output

use chrono::{DateTime, TimeZone, Utc};
use crotalus_core::{seconds, ChannelId, CrotalusError, Series, SlidingWindower};
use crotalus_dsp::{
    FeatureExtractor, FeatureKind, FeatureValue, JsonConfiguration, Partition, Sensitivity,
    StaticInventory,
};
use crotalus_simulation::{SeismicPattern, SimulatorConfig, TraceSimulator};

const COUNTS_PER_UNIT: f64 = 1e9;
const AMPLITUDE: f64 = 1e-6;

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2019, 12, 9, 1, 0, 0).unwrap()
}

fn channel() -> ChannelId {
    ChannelId::new("NZ", "WIZ", "10", "HHZ")
}

/// Six 100 s segments of a pure 1.5 Hz tremor, in counts
fn tremor_segments() -> Vec<Series> {
    let config = SimulatorConfig {
        channel: channel(),
        sampling_rate: 50.0,
        start_time: start(),
        patterns: vec![SeismicPattern::HarmonicTremor {
            frequency: 1.5,
            amplitude: AMPLITUDE,
            overtones: 0,
        }],
        counts_per_unit: COUNTS_PER_UNIT,
        noise_std: 0.0,
        seed: Some(3),
    };
    TraceSimulator::new(config)
        .unwrap()
        .generate_segments(100.0, 6)
        .unwrap()
}

fn configuration() -> JsonConfiguration {
    JsonConfiguration::from_json(
        r#"{ "features": {
            "rsam": { "freq_min": 0.5, "freq_max": 10.0, "window_length": 60.0 },
            "rsem": {
                "freq_min": 0.5, "freq_max": 10.0, "window_length": 60.0, "decimation_factor": 2
            },
            "kurtosis": { "freq_min": 0.5, "freq_max": 10.0, "window_length": 60.0 },
            "dsar": {
                "lf_band": [4.0, 8.0], "hf_band": [8.0, 16.0], "window_length": 60.0
            },
            "dominant_frequency": {
                "freq_min": 0.5, "freq_max": 10.0, "window_length": 60.0, "top_k": 1
            },
            "median_rank_frequency": { "freq_min": 0.5, "freq_max": 10.0, "window_length": 60.0 },
            "centroid_frequency": { "freq_min": 0.5, "freq_max": 10.0, "window_length": 60.0 },
            "centroid_frequency_normalized": {
                "freq_min": 0.5, "freq_max": 10.0, "window_length": 60.0
            },
            "band_ratio": {
                "freq_min": 0.5, "freq_max": 10.0, "window_length": 60.0,
                "lower_band": [1.0, 2.0], "upper_band": [2.0, 4.0]
            },
            "tonality": {
                "freq_min": 0.5, "freq_max": 10.0, "window_length": 60.0,
                "top_k": 3, "bin_width": 8
            },
            "ssam_linear": {
                "freq_min": 0.5, "freq_max": 10.0, "window_length": 60.0,
                "f_lower": 0.0, "f_upper": 10.0, "f_delta": 1.0
            },
            "ssam_octave": {
                "freq_min": 0.5, "freq_max": 10.0, "window_length": 60.0,
                "fraction": 0.5, "f_lower": 0.5, "f_upper": 8.0
            }
        } }"#,
    )
    .unwrap()
}

fn inventory() -> StaticInventory {
    StaticInventory::new().with_channel(channel(), Sensitivity::new(COUNTS_PER_UNIT, "M/S").unwrap())
}

fn scalar(value: Option<&FeatureValue>) -> f64 {
    value.and_then(FeatureValue::as_scalar).unwrap()
}

#[test]
fn test_full_catalogue_extraction() {
    let config = configuration();
    let inventory = inventory();
    let extractor = FeatureExtractor::new(&config, &inventory, &SlidingWindower);
    let partition = Partition::new(tremor_segments(), FeatureKind::ALL.to_vec());

    let report = extractor.extract(&partition).unwrap();
    assert_eq!(report.channel, channel());
    assert_eq!(report.records.len(), 10);
    assert_eq!(report.missing_count(), 0);
    for (i, record) in report.records.iter().enumerate() {
        assert_eq!(record.timestamp, start() + seconds(60.0 * i as f64));
        assert_eq!(record.values.len(), FeatureKind::ALL.len());
    }

    // Well past the filter transients
    let last = &report.records[9];

    let rsem = scalar(last.get(FeatureKind::Rsem));
    assert!((rsem / (AMPLITUDE / 2f64.sqrt()) - 1.0).abs() < 0.05, "rsem = {}", rsem);
    let rsam = scalar(last.get(FeatureKind::Rsam));
    assert!((rsam / (AMPLITUDE * 2.0 / std::f64::consts::PI) - 1.0).abs() < 0.05, "rsam = {}", rsam);

    let kurtosis = scalar(last.get(FeatureKind::Kurtosis));
    assert!((kurtosis - 1.5).abs() < 0.05, "kurtosis = {}", kurtosis);

    let dominant = scalar(last.get(FeatureKind::DominantFrequency));
    assert!((dominant - 1.5).abs() < 1e-9, "dominant = {}", dominant);
    let centroid = scalar(last.get(FeatureKind::CentroidFrequency));
    let normalized = scalar(last.get(FeatureKind::CentroidFrequencyNormalized));
    assert!((centroid - 1.5).abs() < 0.3, "centroid = {}", centroid);
    assert!((centroid - normalized).abs() < 1e-9);
    assert!(scalar(last.get(FeatureKind::MedianRankFrequency)).is_finite());

    // Energy sits in the lower band
    assert!(scalar(last.get(FeatureKind::BandRatio)) < 0.0);
    assert!(scalar(last.get(FeatureKind::Tonality)) > 0.0);
    assert!(scalar(last.get(FeatureKind::Dsar)) > 0.0);

    let linear = last.get(FeatureKind::SsamLinear).and_then(FeatureValue::as_vector).unwrap();
    assert_eq!(linear.len(), 10);
    let loudest = linear
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
        .unwrap();
    assert_eq!(loudest, 1);
    let octave = last.get(FeatureKind::SsamOctave).and_then(FeatureValue::as_vector).unwrap();
    assert_eq!(octave.len(), 8);
}

#[test]
fn test_gap_fails_partition_only() {
    let config = configuration();
    let inventory = inventory();
    let extractor = FeatureExtractor::new(&config, &inventory, &SlidingWindower);

    let mut gapped = tremor_segments();
    gapped.remove(2);
    let partitions = vec![
        Partition::new(tremor_segments(), vec![FeatureKind::Rsem]),
        Partition::new(gapped, vec![FeatureKind::Rsem]),
    ];
    let results = extractor.extract_partitions(&partitions);

    assert_eq!(results[0].as_ref().map(|r| r.records.len()), Ok(10));
    assert!(matches!(results[1], Err(CrotalusError::Gap { .. })));
}

#[test]
fn test_unknown_channel_has_no_calibration() {
    let config = configuration();
    let inventory = StaticInventory::new()
        .with_channel(ChannelId::new("NZ", "WSRZ", "10", "HHZ"), Sensitivity::new(1.0, "M/S").unwrap());
    let extractor = FeatureExtractor::new(&config, &inventory, &SlidingWindower);
    let result = extractor.extract(&Partition::new(tremor_segments(), vec![FeatureKind::Rsam]));
    assert!(matches!(result, Err(CrotalusError::MissingCalibration { .. })));
}
