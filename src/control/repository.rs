//! Upstream collaborators: where waveforms and station metadata come from.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::types::{ChannelSegment, Station, TimeRange, Waveform};

/// Errors raised while fetching from an upstream collaborator
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server returned status {0}")]
    Status(u16),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("{label} failed after {attempts} attempts")]
    Exhausted {
        label: String,
        attempts: u32,
        #[source]
        last: Box<FetchError>,
    },
}

/// Source of raw channel segments.
#[async_trait]
pub trait WaveformRepository: Send + Sync {
    /// Segments for the named channels overlapping `range`. Channels with
    /// no data are simply absent from the result.
    async fn fetch_channel_segments(
        &self,
        channels: &[String],
        range: TimeRange,
    ) -> Result<Vec<ChannelSegment<Waveform>>, FetchError>;
}

/// Source of station metadata and array geometry.
#[async_trait]
pub trait StationRepository: Send + Sync {
    /// Station versions effective at `effective_time`.
    async fn fetch_stations(
        &self,
        names: &[String],
        effective_time: DateTime<Utc>,
    ) -> Result<Vec<Station>, FetchError>;
}
