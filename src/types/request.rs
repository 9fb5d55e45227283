//! Streaming FK request

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::channel::Channel;
use super::position::PhaseType;
use super::time::{secs_to_duration, serde_secs, TimeRange};
use crate::error::{FkError, FkResult};

/// Request for a sequence of `sample_count` spectra at `sample_rate` Hz
/// starting at `start_time`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FkStreamingRequest {
    pub channels: Vec<Channel>,
    pub start_time: DateTime<Utc>,
    pub sample_rate: f64,
    pub sample_count: usize,
    #[serde(with = "serde_secs")]
    pub window_lead: Duration,
    #[serde(with = "serde_secs")]
    pub window_length: Duration,
    #[serde(default)]
    pub phase_type: PhaseType,
    #[serde(default)]
    pub low_frequency_hz: Option<f64>,
    #[serde(default)]
    pub high_frequency_hz: Option<f64>,
}

impl FkStreamingRequest {
    /// Waveform span needed to compute every requested spectrum:
    /// `[start - lead, start + (count-1)/rate + length - lead]`.
    pub fn data_range(&self) -> FkResult<TimeRange> {
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return Err(FkError::InvalidArgument(format!(
                "request sample rate must be > 0, got {}",
                self.sample_rate
            )));
        }
        if self.sample_count == 0 {
            return Err(FkError::InvalidArgument(
                "request sample count must be > 0".to_string(),
            ));
        }
        let span = secs_to_duration((self.sample_count - 1) as f64 / self.sample_rate);
        let start = self.start_time - self.window_lead;
        let end = self.start_time + span + self.window_length - self.window_lead;
        Ok(TimeRange::new(start, end))
    }

    pub fn channel_names(&self) -> Vec<String> {
        self.channels.iter().map(|c| c.name.clone()).collect()
    }
}
