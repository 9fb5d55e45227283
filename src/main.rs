//! fk-engine: compute an FK spectra channel segment for one request
//!
//! Reads an `FkStreamingRequest` as JSON, fetches waveforms and station
//! geometry from JSON fixtures and/or the configured HTTP services, and
//! writes the resulting `ChannelSegment<FkSpectra>` as JSON.
//!
//! # Usage
//!
//! ```bash
//! # Offline, from fixtures written by synthetic-array
//! fk-engine --request request.json --waveforms waveforms.json --stations stations.json
//!
//! # Against live services, with fixtures as fallback
//! fk-engine --request request.json --waveform-url http://host/waveforms \
//!     --station-url http://host/stations --waveforms waveforms.json --stations stations.json
//! ```
//!
//! # Environment Variables
//!
//! - `FK_CONFIG`: Path to the TOML config (default: ./fk_config.toml)
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use fk_engine::config::{self, FetchConfig, FkConfig};
use fk_engine::control::{
    load_segments, load_stations, BackoffWithFallback, FkConfiguration, FkControl,
    HttpStationRepository, HttpWaveformRepository, JsonFileStore, RetryPolicy, StationRepository,
    WaveformRepository, WithBackoff,
};
use fk_engine::{FkStreamingRequest, PluginRegistry};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "fk-engine")]
#[command(about = "Frequency-wavenumber beamforming over array waveforms")]
#[command(version)]
struct CliArgs {
    /// FK streaming request (JSON)
    #[arg(long, value_name = "JSON")]
    request: PathBuf,

    /// Channel segments (JSON array); fallback when --waveform-url is set
    #[arg(long, value_name = "JSON")]
    waveforms: Option<PathBuf>,

    /// Stations (JSON array); fallback when --station-url is set
    #[arg(long, value_name = "JSON")]
    stations: Option<PathBuf>,

    /// TOML config; overrides FK_CONFIG and ./fk_config.toml
    #[arg(long, value_name = "TOML")]
    config: Option<PathBuf>,

    /// Output file (default: stdout)
    #[arg(short, long, value_name = "JSON")]
    output: Option<PathBuf>,

    /// Waveform service endpoint
    #[arg(long, env = "FK_WAVEFORM_URL")]
    waveform_url: Option<String>,

    /// Station service endpoint
    #[arg(long, env = "FK_STATION_URL")]
    station_url: Option<String>,
}

fn load_config(path: Option<&Path>) -> Result<FkConfig> {
    match path {
        Some(p) => FkConfig::load_from_file(p)
            .with_context(|| format!("loading config {}", p.display())),
        None => Ok(FkConfig::load()),
    }
}

/// HTTP with retries when a URL is given, falling back to fixtures only
/// when fixtures were supplied.
fn waveform_source(
    url: Option<&str>,
    fixtures: Option<&Path>,
    fetch: &FetchConfig,
) -> Result<Arc<dyn WaveformRepository>> {
    let store = fixtures
        .map(|path| {
            load_segments(path)
                .map(|segments| JsonFileStore::new(segments, Vec::new()))
                .with_context(|| format!("loading waveforms {}", path.display()))
        })
        .transpose()?;
    let policy = RetryPolicy::from_config(fetch);
    let timeout = std::time::Duration::from_secs(fetch.timeout_secs);

    Ok(match (url, store) {
        (Some(url), Some(store)) => {
            let http = HttpWaveformRepository::new(url, timeout).context("building waveform client")?;
            info!(url = %url, "Fetching waveforms over HTTP, fixtures as fallback");
            Arc::new(BackoffWithFallback::new(http, store, policy))
        }
        (Some(url), None) => {
            let http = HttpWaveformRepository::new(url, timeout).context("building waveform client")?;
            info!(url = %url, "Fetching waveforms over HTTP");
            Arc::new(WithBackoff::new(http, policy))
        }
        (None, Some(store)) => Arc::new(store),
        (None, None) => bail!("either --waveforms or --waveform-url is required"),
    })
}

fn station_source(
    url: Option<&str>,
    fixtures: Option<&Path>,
    fetch: &FetchConfig,
) -> Result<Arc<dyn StationRepository>> {
    let store = fixtures
        .map(|path| {
            load_stations(path)
                .map(|stations| JsonFileStore::new(Vec::new(), stations))
                .with_context(|| format!("loading stations {}", path.display()))
        })
        .transpose()?;
    let policy = RetryPolicy::from_config(fetch);
    let timeout = std::time::Duration::from_secs(fetch.timeout_secs);

    Ok(match (url, store) {
        (Some(url), Some(store)) => {
            let http = HttpStationRepository::new(url, timeout).context("building station client")?;
            info!(url = %url, "Fetching stations over HTTP, fixtures as fallback");
            Arc::new(BackoffWithFallback::new(http, store, policy))
        }
        (Some(url), None) => {
            let http = HttpStationRepository::new(url, timeout).context("building station client")?;
            info!(url = %url, "Fetching stations over HTTP");
            Arc::new(WithBackoff::new(http, policy))
        }
        (None, Some(store)) => Arc::new(store),
        (None, None) => bail!("either --stations or --station-url is required"),
    })
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = CliArgs::parse();

    config::init(load_config(args.config.as_deref())?);
    let fk_config = config::get();

    let request_text = std::fs::read_to_string(&args.request)
        .with_context(|| format!("reading request {}", args.request.display()))?;
    let request: FkStreamingRequest =
        serde_json::from_str(&request_text).context("parsing FK streaming request")?;

    let waveforms = waveform_source(
        args.waveform_url.as_deref(),
        args.waveforms.as_deref(),
        &fk_config.fetch,
    )?;
    let stations = station_source(
        args.station_url.as_deref(),
        args.stations.as_deref(),
        &fk_config.fetch,
    )?;

    let control = FkControl::new(
        PluginRegistry::default(),
        FkConfiguration::new(fk_config.clone()),
        waveforms,
        stations,
    );
    let segment = control
        .handle_request(Some(&request))
        .await
        .context("computing FK spectra")?;

    let json = serde_json::to_string_pretty(&segment).context("serializing FK spectra")?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), "FK spectra written");
        }
        None => println!("{json}"),
    }

    Ok(())
}
