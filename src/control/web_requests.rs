//! HTTP clients for the waveform and station services
//!
//! Both services take a JSON POST and answer with JSON arrays.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

use super::repository::{FetchError, StationRepository, WaveformRepository};
use crate::config::FetchConfig;
use crate::types::{ChannelSegment, Station, TimeRange, Waveform};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChannelSegmentQuery<'a> {
    channel_names: &'a [String],
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StationQuery<'a> {
    station_names: &'a [String],
    effective_time: DateTime<Utc>,
}

fn build_client(timeout: Duration) -> Result<reqwest::Client, FetchError> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

async fn post_json<B, T>(http: &reqwest::Client, url: &str, body: &B) -> Result<T, FetchError>
where
    B: Serialize + ?Sized,
    T: serde::de::DeserializeOwned,
{
    let resp = http.post(url).json(body).send().await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(FetchError::Status(status.as_u16()));
    }
    let bytes = resp.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Waveform service client.
#[derive(Debug, Clone)]
pub struct HttpWaveformRepository {
    http: reqwest::Client,
    url: String,
}

impl HttpWaveformRepository {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, FetchError> {
        Ok(Self {
            http: build_client(timeout)?,
            url: url.to_string(),
        })
    }

    pub fn from_config(fetch: &FetchConfig) -> Result<Self, FetchError> {
        Self::new(&fetch.waveform_service_url, Duration::from_secs(fetch.timeout_secs))
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl WaveformRepository for HttpWaveformRepository {
    async fn fetch_channel_segments(
        &self,
        channels: &[String],
        range: TimeRange,
    ) -> Result<Vec<ChannelSegment<Waveform>>, FetchError> {
        let query = ChannelSegmentQuery {
            channel_names: channels,
            start_time: range.start,
            end_time: range.end,
        };
        let segments: Vec<ChannelSegment<Waveform>> = post_json(&self.http, &self.url, &query).await?;
        tracing::debug!(url = %self.url, segments = segments.len(), "Fetched channel segments");
        Ok(segments)
    }
}

/// Station service client.
#[derive(Debug, Clone)]
pub struct HttpStationRepository {
    http: reqwest::Client,
    url: String,
}

impl HttpStationRepository {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, FetchError> {
        Ok(Self {
            http: build_client(timeout)?,
            url: url.to_string(),
        })
    }

    pub fn from_config(fetch: &FetchConfig) -> Result<Self, FetchError> {
        Self::new(&fetch.station_service_url, Duration::from_secs(fetch.timeout_secs))
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl StationRepository for HttpStationRepository {
    async fn fetch_stations(
        &self,
        names: &[String],
        effective_time: DateTime<Utc>,
    ) -> Result<Vec<Station>, FetchError> {
        let query = StationQuery {
            station_names: names,
            effective_time,
        };
        let stations: Vec<Station> = post_json(&self.http, &self.url, &query).await?;
        tracing::debug!(url = %self.url, stations = stations.len(), "Fetched stations");
        Ok(stations)
    }
}
