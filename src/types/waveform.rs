//! Waveform timeseries and channel segments

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::channel::{Channel, Units};
use super::time::{secs_between, secs_to_duration, TimeRange};
use crate::error::{FkError, FkResult};

/// Fraction of a sample period tolerated when mapping instants to sample
/// indices (absorbs nanosecond truncation).
const INDEX_EPSILON: f64 = 1.0e-6;

/// Uniformly sampled waveform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Waveform {
    pub start_time: DateTime<Utc>,
    pub sample_rate_hz: f64,
    pub samples: Vec<f64>,
}

impl Waveform {
    pub fn new(start_time: DateTime<Utc>, sample_rate_hz: f64, samples: Vec<f64>) -> FkResult<Self> {
        if !(sample_rate_hz.is_finite() && sample_rate_hz > 0.0) {
            return Err(FkError::InvalidArgument(format!(
                "waveform sample rate must be > 0, got {sample_rate_hz}"
            )));
        }
        Ok(Self {
            start_time,
            sample_rate_hz,
            samples,
        })
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Time of the last sample (equal to `start_time` for 0 or 1 samples).
    pub fn end_time(&self) -> DateTime<Utc> {
        let n = self.samples.len().saturating_sub(1);
        self.start_time + secs_to_duration(n as f64 / self.sample_rate_hz)
    }

    pub fn time_range(&self) -> TimeRange {
        TimeRange::new(self.start_time, self.end_time())
    }

    /// Same samples, start time moved by `delta`.
    pub fn shifted(&self, delta: Duration) -> Self {
        Self {
            start_time: self.start_time + delta,
            sample_rate_hz: self.sample_rate_hz,
            samples: self.samples.clone(),
        }
    }

    pub fn with_samples(&self, samples: Vec<f64>) -> Self {
        Self {
            start_time: self.start_time,
            sample_rate_hz: self.sample_rate_hz,
            samples,
        }
    }

    /// True when both `start` and `end` fall on or inside the waveform's
    /// sampled span.
    pub fn covers(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        if self.samples.is_empty() {
            return false;
        }
        let rate = self.sample_rate_hz;
        secs_between(self.start_time, start) * rate >= -INDEX_EPSILON
            && secs_between(end, self.end_time()) * rate >= -INDEX_EPSILON
    }

    /// Keep the samples whose times fall inside the closed interval
    /// `[start, end]`. Returns `None` when no sample falls inside.
    pub fn trim(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        if self.samples.is_empty() || end < start {
            return None;
        }
        let rate = self.sample_rate_hz;
        let first = (secs_between(self.start_time, start) * rate - INDEX_EPSILON).ceil().max(0.0);
        let last = (secs_between(self.start_time, end) * rate + INDEX_EPSILON).floor();
        let max_index = (self.samples.len() - 1) as f64;
        let last = last.min(max_index);
        if last < first {
            return None;
        }
        let (first, last) = (first as usize, last as usize);
        Some(Self {
            start_time: self.start_time + secs_to_duration(first as f64 / rate),
            sample_rate_hz: rate,
            samples: self.samples[first..=last].to_vec(),
        })
    }
}

/// Identity of a channel segment: the channel plus the span it covers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelSegmentDescriptor {
    pub channel: Channel,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub creation_time: DateTime<Utc>,
}

/// Timeseries trait used to derive segment extents.
pub trait Timeseries {
    fn series_start(&self) -> DateTime<Utc>;
    fn series_end(&self) -> DateTime<Utc>;
}

impl Timeseries for Waveform {
    fn series_start(&self) -> DateTime<Utc> {
        self.start_time
    }

    fn series_end(&self) -> DateTime<Utc> {
        self.end_time()
    }
}

/// A channel's ordered collection of timeseries. Gaps between series are
/// allowed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelSegment<T> {
    pub id: ChannelSegmentDescriptor,
    pub units: Units,
    pub timeseries: Vec<T>,
}

impl<T: Timeseries> ChannelSegment<T> {
    /// Build a segment whose extent is derived from its timeseries.
    ///
    /// Timeseries are sorted by start time.
    pub fn from_timeseries(
        channel: Channel,
        units: Units,
        mut timeseries: Vec<T>,
        creation_time: DateTime<Utc>,
    ) -> FkResult<Self> {
        if timeseries.is_empty() {
            return Err(FkError::InvalidArgument(format!(
                "channel segment for {} requires at least one timeseries",
                channel.name
            )));
        }
        timeseries.sort_by_key(Timeseries::series_start);
        let start_time = timeseries
            .iter()
            .map(Timeseries::series_start)
            .min()
            .unwrap_or(creation_time);
        let end_time = timeseries
            .iter()
            .map(Timeseries::series_end)
            .max()
            .unwrap_or(start_time);
        Ok(Self {
            id: ChannelSegmentDescriptor {
                channel,
                start_time,
                end_time,
                creation_time,
            },
            units,
            timeseries,
        })
    }
}

impl<T> ChannelSegment<T> {
    pub fn channel(&self) -> &Channel {
        &self.id.channel
    }

    pub fn channel_name(&self) -> &str {
        &self.id.channel.name
    }
}
