//! Synthetic Array Fixtures
//!
//! Writes a plane-wave recording on a small seismic array, plus the station
//! geometry and a matching FK request, as JSON fixtures for `fk-engine`.
//! The wavefront's azimuth and slowness are known, so the FK peak can be
//! checked by eye.
//!
//! # Usage
//! ```bash
//! synthetic-array --out-dir fixtures --azimuth 60 --slowness 0.12 --noise 0.2
//! fk-engine --request fixtures/request.json \
//!     --waveforms fixtures/waveforms.json --stations fixtures/stations.json
//! ```

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, Utc};
use clap::Parser;
use rand::prelude::*;
use rand_distr::{Distribution, Normal};
use std::collections::HashMap;
use std::f64::consts::TAU;
use std::path::Path;

use fk_engine::types::time::secs_to_duration;
use fk_engine::types::{Location, Units};
use fk_engine::{
    Channel, ChannelSegment, FkStreamingRequest, PhaseType, RelativePosition, Station, Waveform,
};

// ============================================================================
// Array Layout
// ============================================================================

const STATION: &str = "SYNAR";

/// (site, north km, east km): centre element plus a ring of six.
const SITES: &[(&str, f64, f64)] = &[
    ("SY01", 0.0, 0.0),
    ("SY02", 1.5, 0.2),
    ("SY03", 0.3, 1.6),
    ("SY04", -1.2, 0.9),
    ("SY05", -1.0, -1.1),
    ("SY06", 0.6, -1.5),
    ("SY07", 1.8, -0.9),
];

/// Tones (Hz) inside the default analysis band.
const TONES_HZ: &[f64] = &[1.5, 2.0, 2.75];

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "synthetic-array")]
#[command(about = "Plane-wave array fixtures for fk-engine")]
#[command(version)]
struct Args {
    /// Directory receiving waveforms.json, stations.json and request.json
    #[arg(long, default_value = "fixtures")]
    out_dir: String,

    /// Back azimuth of the arrival (degrees clockwise from north)
    #[arg(long, default_value = "60")]
    azimuth: f64,

    /// Horizontal slowness (s/km)
    #[arg(long, default_value = "0.12")]
    slowness: f64,

    /// Waveform sample rate (Hz)
    #[arg(long, default_value = "40")]
    rate: f64,

    /// Recording length (seconds)
    #[arg(long, default_value = "60")]
    duration: f64,

    /// Standard deviation of additive Gaussian noise (0 = clean)
    #[arg(long, default_value = "0")]
    noise: f64,

    /// FK window length (seconds)
    #[arg(long, default_value = "4")]
    window_length: f64,

    /// Spectra per second in the request
    #[arg(long, default_value = "1")]
    spectra_rate: f64,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,
}

fn signal(t: f64, phases: &[f64]) -> f64 {
    TONES_HZ
        .iter()
        .zip(phases)
        .map(|(f, phase)| (TAU * f * t + phase).sin())
        .sum()
}

fn write_json<T: serde::Serialize>(dir: &Path, name: &str, value: &T) -> Result<()> {
    let path = dir.join(name);
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    println!("  wrote {}", path.display());
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    if !(args.rate > 0.0 && args.duration > args.window_length && args.spectra_rate > 0.0) {
        return Err(anyhow!(
            "need rate > 0, spectra rate > 0 and duration > window length"
        ));
    }

    let mut rng = match args.seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };
    let noise = Normal::new(0.0, args.noise.max(0.0)).map_err(|e| anyhow!("noise: {e}"))?;
    let phases: Vec<f64> = TONES_HZ.iter().map(|_| rng.gen_range(0.0..TAU)).collect();

    let azimuth = args.azimuth.to_radians();
    let slow_east = args.slowness * azimuth.sin();
    let slow_north = args.slowness * azimuth.cos();

    let t0: DateTime<Utc> = DateTime::UNIX_EPOCH + Duration::days(19_000);
    let sample_count = (args.duration * args.rate).floor() as usize + 1;

    let mut segments = Vec::with_capacity(SITES.len());
    let mut channels = Vec::with_capacity(SITES.len());
    let mut positions = HashMap::new();
    for &(site, north, east) in SITES {
        let name = format!("{STATION}.{site}.SHZ");
        let position = RelativePosition::new(north, east, 0.0);
        let delay = position.delay_secs(slow_east, slow_north, 0.0);
        let samples: Vec<f64> = (0..sample_count)
            .map(|i| signal(i as f64 / args.rate - delay, &phases) + noise.sample(&mut rng))
            .collect();

        let channel = Channel::raw(&name, STATION, args.rate, t0);
        let waveform = Waveform::new(t0, args.rate, samples)?;
        segments.push(ChannelSegment::from_timeseries(
            channel.clone(),
            Units::Nanometers,
            vec![waveform],
            t0,
        )?);
        positions.insert(name, position);
        channels.push(channel);
    }

    let station = Station {
        name: STATION.to_string(),
        location: Location::default(),
        channels: channels.clone(),
        relative_positions_by_channel: positions,
    };

    let spectra = ((args.duration - args.window_length) * args.spectra_rate).floor() as usize + 1;
    let request = FkStreamingRequest {
        channels,
        start_time: t0,
        sample_rate: args.spectra_rate,
        sample_count: spectra,
        window_lead: Duration::zero(),
        window_length: secs_to_duration(args.window_length),
        phase_type: PhaseType::P,
        low_frequency_hz: None,
        high_frequency_hz: None,
    };

    let dir = Path::new(&args.out_dir);
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    println!(
        "Synthetic array {STATION}: {} channels, azimuth {:.1} deg, slowness {:.3} s/km",
        SITES.len(),
        args.azimuth,
        args.slowness
    );
    write_json(dir, "waveforms.json", &segments)?;
    write_json(dir, "stations.json", &vec![station])?;
    write_json(dir, "request.json", &request)?;
    Ok(())
}
