//! Crotalus CLI
//!
//! Runs feature extraction over seismic traces and prints the resulting
//! feature records as JSON.
//!
//! # Usage
//!
//! ```bash
//! # Extract features from a JSON trace file
//! crotalus extract --config features.json --input trace.json --sensitivity 6.2e8
//!
//! # Extract features from a synthetic tremor trace
//! crotalus extract --config features.json --simulate 3600 --seed 1
//!
//! # Write a synthetic trace to disk
//! crotalus simulate --duration 3600 --segments 6 --output trace.json
//!
//! # Inspect a band layout
//! crotalus bands octave --fraction 0.333 --f-lower 0.1 --f-upper 10
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crotalus_core::{ChannelId, GroundMotion, Series, SlidingWindower};
use crotalus_dsp::{
    linear_bands, octave_bands, BandSet, ConfigurationSource, FeatureExtractor, FeatureKind,
    JsonConfiguration, Partition, ResponseProvider, Sensitivity, StaticInventory, UnitResponse,
};
use crotalus_simulation::{SeismicPattern, SimulatorConfig, TraceSimulator};

#[derive(Parser)]
#[command(name = "crotalus")]
#[command(about = "Feature extraction for volcano-seismic traces")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract windowed features and print one record per window
    Extract {
        /// Feature configuration (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Trace file: JSON array of series segments
        #[arg(short, long, conflicts_with = "simulate")]
        input: Option<PathBuf>,

        /// Extract from a synthetic trace of this many seconds instead
        #[arg(long)]
        simulate: Option<f64>,

        /// Seed for the synthetic trace
        #[arg(long, default_value = "1")]
        seed: u64,

        /// Comma-separated features (defaults to every configured feature)
        #[arg(short, long, value_delimiter = ',')]
        features: Vec<String>,

        /// Counts per m/s applied to every channel (unit response if omitted)
        #[arg(long)]
        sensitivity: Option<f64>,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write a synthetic tremor trace as JSON segments
    Simulate {
        /// Total duration in seconds
        #[arg(short, long, default_value = "3600")]
        duration: f64,

        /// Number of contiguous segments to split the trace into
        #[arg(long, default_value = "1")]
        segments: usize,

        /// Sampling rate in Hz
        #[arg(long, default_value = "50")]
        sampling_rate: f64,

        #[arg(long, default_value = "1")]
        seed: u64,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Print a band layout
    Bands {
        #[command(subcommand)]
        layout: BandLayout,
    },
}

#[derive(Subcommand)]
enum BandLayout {
    /// Fixed-width bands
    Linear {
        #[arg(long)]
        f_lower: f64,
        #[arg(long)]
        f_upper: f64,
        #[arg(long)]
        f_delta: f64,
    },
    /// Fractional-octave bands
    Octave {
        #[arg(long)]
        fraction: f64,
        #[arg(long)]
        f_lower: f64,
        #[arg(long)]
        f_upper: f64,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Extract {
            config,
            input,
            simulate,
            seed,
            features,
            sensitivity,
            output,
        } => {
            let configuration = JsonConfiguration::from_file(&config)
                .with_context(|| format!("loading {:?}", config))?;
            let kinds = select_features(&configuration, &features)?;

            let segments = match (input, simulate) {
                (Some(path), _) => read_segments(&path)?,
                (None, Some(duration)) => simulated(duration, 1, 50.0, seed)?,
                (None, None) => bail!("either --input or --simulate is required"),
            };
            tracing::info!(
                segments = segments.len(),
                features = kinds.len(),
                "starting extraction"
            );

            let partitions = partition_by_channel(segments, &kinds);
            let response = response_provider(&partitions, sensitivity)?;
            let extractor = FeatureExtractor::new(&configuration, response.as_ref(), &SlidingWindower);

            let mut reports = Vec::new();
            let mut failed = 0;
            for (partition, result) in partitions.iter().zip(extractor.extract_partitions(&partitions)) {
                match result {
                    Ok(report) => reports.push(report),
                    Err(e) => {
                        failed += 1;
                        let channel = partition.segments.first().map(|s| s.channel.to_string());
                        tracing::error!(channel = ?channel, error = %e, "partition failed");
                    }
                }
            }

            let json = serde_json::to_string_pretty(&reports)?;
            write_output(output.as_deref(), &json)?;
            if failed > 0 {
                bail!("{} of {} partitions failed", failed, partitions.len());
            }
        }

        Commands::Simulate {
            duration,
            segments,
            sampling_rate,
            seed,
            output,
        } => {
            if segments == 0 {
                bail!("--segments must be at least 1");
            }
            let series = simulated(duration, segments, sampling_rate, seed)?;
            std::fs::write(&output, serde_json::to_string(&series)?)
                .with_context(|| format!("writing {:?}", output))?;
            tracing::info!(segments = series.len(), "wrote {:?}", output);
        }

        Commands::Bands { layout } => {
            let bands = match layout {
                BandLayout::Linear {
                    f_lower,
                    f_upper,
                    f_delta,
                } => linear_bands(f_lower, f_upper, f_delta)?,
                BandLayout::Octave {
                    fraction,
                    f_lower,
                    f_upper,
                } => octave_bands(fraction, f_lower, f_upper)?,
            };
            print_bands(&bands);
        }
    }

    Ok(())
}

/// Requested features, or every configured feature the engine knows
fn select_features(config: &JsonConfiguration, requested: &[String]) -> anyhow::Result<Vec<FeatureKind>> {
    if !requested.is_empty() {
        let kinds = requested
            .iter()
            .map(|name| name.trim().parse::<FeatureKind>())
            .collect::<Result<Vec<_>, _>>()?;
        // Fail early on a feature with no configuration
        for kind in &kinds {
            config.settings(kind.name())?;
        }
        return Ok(kinds);
    }

    let mut kinds = Vec::new();
    for name in config.feature_names() {
        match name.parse::<FeatureKind>() {
            Ok(kind) => kinds.push(kind),
            Err(_) => tracing::warn!(feature = name, "ignoring unknown feature in configuration"),
        }
    }
    if kinds.is_empty() {
        bail!("configuration names no known feature");
    }
    Ok(kinds)
}

/// Deserialise segments and re-check the series invariants
fn read_segments(path: &Path) -> anyhow::Result<Vec<Series>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?;
    let raw: Vec<Series> = serde_json::from_str(&text).with_context(|| format!("parsing {:?}", path))?;
    let segments = raw
        .into_iter()
        .map(|s| {
            let (channel, rate, start) = (s.channel.clone(), s.sampling_rate(), s.start_time());
            Series::new(channel, s.into_samples(), rate, start)
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(segments)
}

fn simulated(duration: f64, segments: usize, sampling_rate: f64, seed: u64) -> anyhow::Result<Vec<Series>> {
    let config = SimulatorConfig {
        sampling_rate,
        patterns: vec![
            SeismicPattern::HarmonicTremor {
                frequency: 1.5,
                amplitude: 2e-6,
                overtones: 3,
            },
            SeismicPattern::LongPeriod {
                frequency: 1.0,
                amplitude: 5e-6,
                interval: 90.0,
                decay: 0.2,
            },
        ],
        seed: Some(seed),
        ..SimulatorConfig::default()
    };
    let mut simulator = TraceSimulator::new(config)?;
    Ok(simulator.generate_segments(duration / segments as f64, segments)?)
}

/// One partition per channel; DSAR runs on velocity channels only
fn partition_by_channel(segments: Vec<Series>, kinds: &[FeatureKind]) -> Vec<Partition> {
    let mut groups: BTreeMap<ChannelId, Vec<Series>> = BTreeMap::new();
    for segment in segments {
        groups.entry(segment.channel.clone()).or_default().push(segment);
    }
    groups
        .into_iter()
        .map(|(channel, segments)| Partition::new(segments, features_for(&channel, kinds)))
        .collect()
}

fn features_for(channel: &ChannelId, kinds: &[FeatureKind]) -> Vec<FeatureKind> {
    let motion = channel.ground_motion();
    if motion == GroundMotion::Velocity || !kinds.contains(&FeatureKind::Dsar) {
        return kinds.to_vec();
    }
    tracing::warn!(channel = %channel, motion = ?motion, "skipping dsar on a non-velocity channel");
    kinds.iter().copied().filter(|k| *k != FeatureKind::Dsar).collect()
}

fn response_provider(
    partitions: &[Partition],
    sensitivity: Option<f64>,
) -> anyhow::Result<Box<dyn ResponseProvider>> {
    let Some(value) = sensitivity else {
        return Ok(Box::new(UnitResponse));
    };
    let mut inventory = StaticInventory::new();
    for segment in partitions.iter().filter_map(|p| p.segments.first()) {
        inventory = inventory.with_channel(segment.channel.clone(), Sensitivity::new(value, "M/S")?);
    }
    Ok(Box::new(inventory))
}

fn write_output(path: Option<&Path>, text: &str) -> anyhow::Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, text).with_context(|| format!("writing {:?}", path))?;
            tracing::info!("wrote {:?}", path);
        }
        None => println!("{}", text),
    }
    Ok(())
}

fn print_bands(bands: &BandSet) {
    println!("{:>4}  {:>10}  {:>10}  {:>10}", "#", "lower", "center", "upper");
    for (i, band) in bands.iter().enumerate() {
        println!(
            "{:>4}  {:>10.4}  {:>10.4}  {:>10.4}",
            i, band.lower, band.center, band.upper
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn on_channel(series: &Series, code: &str) -> Series {
        Series::new(
            ChannelId::new("XX", "SIM", "", code),
            series.samples().to_vec(),
            series.sampling_rate(),
            series.start_time(),
        )
        .unwrap()
    }

    #[test]
    fn test_dsar_only_on_velocity_channels() {
        let trace = simulated(60.0, 1, 50.0, 7).unwrap().remove(0);
        let segments = vec![on_channel(&trace, "HNZ"), on_channel(&trace, "HHZ"), on_channel(&trace, "LHZ")];
        let kinds = [FeatureKind::Rsam, FeatureKind::Dsar];

        let partitions = partition_by_channel(segments, &kinds);
        assert_eq!(partitions.len(), 3);
        for partition in &partitions {
            let channel = &partition.segments[0].channel;
            match channel.channel.as_str() {
                "HNZ" => assert_eq!(partition.features, vec![FeatureKind::Rsam]),
                _ => assert_eq!(partition.features, kinds.to_vec()),
            }
        }
    }

    #[test]
    fn test_partitions_group_segments_by_channel() {
        let segments = simulated(60.0, 3, 50.0, 7).unwrap();
        let partitions = partition_by_channel(segments, &[FeatureKind::Rsam]);
        assert_eq!(partitions.len(), 1);
        assert_eq!(partitions[0].segments.len(), 3);
    }
}
