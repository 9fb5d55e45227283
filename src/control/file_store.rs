//! In-memory waveform and station store loaded from JSON files

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::Path;

use super::repository::{FetchError, StationRepository, WaveformRepository};
use crate::types::{ChannelSegment, Station, TimeRange, Waveform};

/// Serves fixtures: a JSON array of `ChannelSegment<Waveform>` and a JSON
/// array of `Station`.
#[derive(Debug, Clone, Default)]
pub struct JsonFileStore {
    segments: Vec<ChannelSegment<Waveform>>,
    stations: Vec<Station>,
}

impl JsonFileStore {
    pub fn new(segments: Vec<ChannelSegment<Waveform>>, stations: Vec<Station>) -> Self {
        Self { segments, stations }
    }

    pub fn from_files(waveforms: &Path, stations: &Path) -> Result<Self, FetchError> {
        Ok(Self::new(load_segments(waveforms)?, load_stations(stations)?))
    }

    pub fn segments(&self) -> &[ChannelSegment<Waveform>] {
        &self.segments
    }

    pub fn stations(&self) -> &[Station] {
        &self.stations
    }
}

/// Read a JSON array of channel segments.
pub fn load_segments(path: &Path) -> Result<Vec<ChannelSegment<Waveform>>, FetchError> {
    let segments: Vec<ChannelSegment<Waveform>> = serde_json::from_slice(&std::fs::read(path)?)?;
    tracing::info!(segments = segments.len(), path = %path.display(), "Loaded waveform fixtures");
    Ok(segments)
}

/// Read a JSON array of stations.
pub fn load_stations(path: &Path) -> Result<Vec<Station>, FetchError> {
    let stations: Vec<Station> = serde_json::from_slice(&std::fs::read(path)?)?;
    tracing::info!(stations = stations.len(), path = %path.display(), "Loaded station fixtures");
    Ok(stations)
}

/// Copy of `segment` holding only the samples inside `range`.
fn trim_segment(
    segment: &ChannelSegment<Waveform>,
    range: TimeRange,
) -> Option<ChannelSegment<Waveform>> {
    let timeseries: Vec<Waveform> = segment
        .timeseries
        .iter()
        .filter_map(|wf| wf.trim(range.start, range.end))
        .collect();
    let start_time = timeseries.iter().map(|wf| wf.start_time).min()?;
    let end_time = timeseries.iter().map(Waveform::end_time).max()?;

    let mut trimmed = segment.clone();
    trimmed.id.start_time = start_time;
    trimmed.id.end_time = end_time;
    trimmed.timeseries = timeseries;
    Some(trimmed)
}

#[async_trait]
impl WaveformRepository for JsonFileStore {
    async fn fetch_channel_segments(
        &self,
        channels: &[String],
        range: TimeRange,
    ) -> Result<Vec<ChannelSegment<Waveform>>, FetchError> {
        Ok(self
            .segments
            .iter()
            .filter(|s| channels.iter().any(|c| c == s.channel_name()))
            .filter_map(|s| trim_segment(s, range))
            .collect())
    }
}

#[async_trait]
impl StationRepository for JsonFileStore {
    async fn fetch_stations(
        &self,
        names: &[String],
        _effective_time: DateTime<Utc>,
    ) -> Result<Vec<Station>, FetchError> {
        Ok(self
            .stations
            .iter()
            .filter(|s| names.contains(&s.name))
            .cloned()
            .collect())
    }
}
