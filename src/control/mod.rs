//! FK request orchestration
//!
//! `FkControl` turns an `FkStreamingRequest` into a derived FK channel
//! segment: fetch waveforms and the station, resolve configuration and
//! plugins, run the window sequencer off the async runtime, annotate every
//! spectrum with attributes and wrap the result in a synthesized channel.

mod channel_factory;
mod configuration;
mod file_store;
mod repository;
mod retry;
mod web_requests;

pub use channel_factory::{create_fk_channel, BEAM_TYPE, CHANNEL_GROUP, FK_CHANNEL_GROUP};
pub use configuration::{FkAttributesParameters, FkConfiguration, FkSpectraParameters};
pub use file_store::{load_segments, load_stations, JsonFileStore};
pub use repository::{FetchError, StationRepository, WaveformRepository};
pub use retry::{retry_with_backoff, BackoffWithFallback, RetryPolicy, WithBackoff};
pub use web_requests::{HttpStationRepository, HttpWaveformRepository};

use chrono::Utc;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::attributes::{apply_extractors, FkAttributeExtractor, FkSpectraInfo};
use crate::beamforming::SpectralBeamformer;
use crate::error::FkError;
use crate::plugins::{PluginError, PluginRegistry};
use crate::sequencer::FkWindowSequencer;
use crate::types::{
    Channel, ChannelSegment, FkSpectra, FkSpectraMetadata, FkSpectrum, FkStreamingRequest, Units,
};

/// Errors raised while serving an FK request
#[derive(Debug, Error)]
pub enum FkControlError {
    #[error("FK streaming request is required")]
    NullRequest,

    #[error("{context}: {source}")]
    Fetch {
        context: String,
        #[source]
        source: FetchError,
    },

    #[error("Invalid state: {0}")]
    State(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Misconfiguration: {0}")]
    Misconfiguration(#[from] PluginError),

    #[error(transparent)]
    Core(#[from] FkError),

    #[error("FK computation task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub struct FkControl {
    registry: PluginRegistry,
    configuration: FkConfiguration,
    waveforms: Arc<dyn WaveformRepository>,
    stations: Arc<dyn StationRepository>,
}

impl FkControl {
    pub fn new(
        registry: PluginRegistry,
        configuration: FkConfiguration,
        waveforms: Arc<dyn WaveformRepository>,
        stations: Arc<dyn StationRepository>,
    ) -> Self {
        Self {
            registry,
            configuration,
            waveforms,
            stations,
        }
    }

    pub fn configuration(&self) -> &FkConfiguration {
        &self.configuration
    }

    /// Compute the FK spectra channel segment for `request`.
    pub async fn handle_request(
        &self,
        request: Option<&FkStreamingRequest>,
    ) -> Result<ChannelSegment<FkSpectra>, FkControlError> {
        let request = request.ok_or(FkControlError::NullRequest)?;
        let range = request.data_range()?;
        let channel_names = request.channel_names();
        if channel_names.is_empty() {
            return Err(FkControlError::InvalidArgument(
                "FK request names no channels".to_string(),
            ));
        }
        info!(
            channels = channel_names.len(),
            start = %request.start_time,
            sample_count = request.sample_count,
            "Handling FK request"
        );

        let segments = self
            .waveforms
            .fetch_channel_segments(&channel_names, range)
            .await
            .map_err(|source| {
                error!(error = %source, "Channel segment fetch failed");
                FkControlError::Fetch {
                    context: "fetching channel segments".to_string(),
                    source,
                }
            })?;
        if segments.is_empty() {
            return Err(FkControlError::State(format!(
                "no channel segments returned for {} channels between {} and {}",
                channel_names.len(),
                range.start,
                range.end
            )));
        }

        let input_channels = distinct_channels(&segments);
        let station_names: BTreeSet<&str> = input_channels
            .iter()
            .map(|c| c.station_name.as_str())
            .collect();
        if station_names.len() > 1 {
            return Err(FkControlError::InvalidArgument(format!(
                "FK channels must come from one station, got {}",
                station_names.into_iter().collect::<Vec<_>>().join(", ")
            )));
        }
        let station_name = station_names
            .into_iter()
            .next()
            .map(str::to_string)
            .unwrap_or_default();

        let mut stations = self
            .stations
            .fetch_stations(std::slice::from_ref(&station_name), request.start_time)
            .await
            .map_err(|source| {
                error!(station = %station_name, error = %source, "Station fetch failed");
                FkControlError::Fetch {
                    context: format!("fetching station {station_name}"),
                    source,
                }
            })?;
        if stations.len() != 1 {
            return Err(FkControlError::State(format!(
                "expected exactly one station named '{station_name}', got {}",
                stations.len()
            )));
        }
        let station = stations.remove(0);

        let rates: Vec<f64> = input_channels.iter().map(|c| c.nominal_sample_rate_hz).collect();
        let waveform_rate = modal_sample_rate(&rates).ok_or_else(|| {
            FkControlError::State("no input channel has a valid nominal sample rate".to_string())
        })?;

        let spectra_parameters = self
            .configuration
            .spectra_parameters(request, waveform_rate)?;
        let kind = self.registry.spectrum_plugin(&spectra_parameters.plugin_name)?;
        let extractors: Vec<Box<dyn FkAttributeExtractor>> = self
            .configuration
            .attributes_parameters()
            .iter()
            .map(|p| self.registry.attributes_plugin(&p.plugin_name))
            .collect::<Result<_, _>>()?;

        let mut positions = HashMap::with_capacity(input_channels.len());
        for channel in &input_channels {
            let position = station.relative_position(&channel.name).ok_or_else(|| {
                FkControlError::InvalidArgument(format!(
                    "station {} has no relative position for channel {}",
                    station.name, channel.name
                ))
            })?;
            positions.insert(channel.name.clone(), *position);
        }

        let definition = spectra_parameters.definition;
        let beamformer = SpectralBeamformer::new(
            definition.clone(),
            spectra_parameters.medium_velocity_km_per_sec,
            positions,
            kind,
        )?;
        let sequencer = FkWindowSequencer::new(beamformer);
        let info = FkSpectraInfo::from_definition(&definition);
        let scheduled = sequencer.window_starts(&segments)?.len();
        debug!(
            windows = scheduled,
            plugin = %kind,
            velocity_km_per_sec = spectra_parameters.medium_velocity_km_per_sec,
            "Scheduled FK windows"
        );

        let spectra: Vec<FkSpectrum> = tokio::task::spawn_blocking(move || {
            sequencer
                .generate_fk(Some(&segments))?
                .into_iter()
                .map(|spectrum| apply_extractors(&extractors, &info, spectrum))
                .collect::<Result<Vec<_>, FkError>>()
        })
        .await??;

        let fk_channel = create_fk_channel(&station, &input_channels, &definition)?;
        let metadata = FkSpectraMetadata {
            phase_type: definition.phase_type(),
            slow_start_x: definition.slow_start_x(),
            slow_delta_x: definition.slow_delta_x(),
            slow_start_y: definition.slow_start_y(),
            slow_delta_y: definition.slow_delta_y(),
        };
        let spectra_count = spectra.len();
        let fk_spectra = FkSpectra::new(
            request.start_time,
            definition.sample_rate_hz(),
            spectra,
            metadata,
        )?;
        info!(
            channel = %fk_channel.name,
            plugin = %kind,
            spectra = spectra_count,
            requested = request.sample_count,
            "FK request complete"
        );

        Ok(ChannelSegment::from_timeseries(
            fk_channel,
            Units::NanometersSquaredPerSecond,
            vec![fk_spectra],
            Utc::now(),
        )?)
    }
}

/// One entry per channel name, in first-seen order.
fn distinct_channels(segments: &[ChannelSegment<crate::types::Waveform>]) -> Vec<Channel> {
    let mut seen = BTreeSet::new();
    segments
        .iter()
        .filter(|s| seen.insert(s.channel_name().to_string()))
        .map(|s| s.channel().clone())
        .collect()
}

/// Most common rate; ties go to the smallest. Non-positive and non-finite
/// rates are ignored.
pub fn modal_sample_rate(rates: &[f64]) -> Option<f64> {
    let mut valid: Vec<f64> = rates
        .iter()
        .copied()
        .filter(|r| r.is_finite() && *r > 0.0)
        .collect();
    valid.sort_by(f64::total_cmp);

    let mut best: Option<(f64, usize)> = None;
    for run in valid.chunk_by(|a, b| a == b) {
        if best.map_or(true, |(_, count)| run.len() > count) {
            best = Some((run[0], run.len()));
        }
    }
    best.map(|(rate, _)| rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modal_sample_rate() {
        assert_eq!(modal_sample_rate(&[40.0, 20.0, 40.0]), Some(40.0));
        assert_eq!(modal_sample_rate(&[40.0, 20.0, 40.0, 20.0]), Some(20.0));
        assert_eq!(modal_sample_rate(&[f64::NAN, 0.0, 10.0]), Some(10.0));
        assert_eq!(modal_sample_rate(&[]), None);
    }

    #[tokio::test]
    async fn test_null_request_rejected() {
        let store = Arc::new(JsonFileStore::default());
        let control = FkControl::new(
            PluginRegistry::default(),
            FkConfiguration::default(),
            store.clone(),
            store,
        );
        assert!(matches!(
            control.handle_request(None).await,
            Err(FkControlError::NullRequest)
        ));
    }
}
