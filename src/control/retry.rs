//! Exponential backoff for upstream fetches, with an optional fallback
//! collaborator once the primary is exhausted.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::time::Duration;

use super::repository::{FetchError, StationRepository, WaveformRepository};
use crate::config::FetchConfig;
use crate::types::{ChannelSegment, Station, TimeRange, Waveform};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total tries, including the first
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(fetch: &FetchConfig) -> Self {
        Self {
            max_attempts: fetch.max_attempts.max(1),
            initial_delay: Duration::from_millis(fetch.initial_delay_ms),
            max_delay: Duration::from_millis(fetch.max_delay_ms),
        }
    }

    /// Single try, no waiting.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Wait after the `attempt`-th failure (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&FetchConfig::default())
    }
}

/// Run `op` until it succeeds or `policy.max_attempts` tries have failed.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut op: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(label, attempt, "Upstream fetch recovered");
                }
                return Ok(value);
            }
            Err(e) if attempt < max_attempts => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    label,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Upstream fetch failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                tracing::warn!(label, attempt, error = %e, "Upstream fetch failed, giving up");
                return Err(FetchError::Exhausted {
                    label: label.to_string(),
                    attempts: attempt,
                    last: Box::new(e),
                });
            }
        }
    }
}

/// Retries `primary` with backoff; the exhaustion error carries the last
/// failure.
#[derive(Debug, Clone)]
pub struct WithBackoff<P> {
    primary: P,
    policy: RetryPolicy,
}

impl<P> WithBackoff<P> {
    pub fn new(primary: P, policy: RetryPolicy) -> Self {
        Self { primary, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl<P: WaveformRepository> WaveformRepository for WithBackoff<P> {
    async fn fetch_channel_segments(
        &self,
        channels: &[String],
        range: TimeRange,
    ) -> Result<Vec<ChannelSegment<Waveform>>, FetchError> {
        retry_with_backoff(&self.policy, "waveforms", || {
            self.primary.fetch_channel_segments(channels, range)
        })
        .await
    }
}

#[async_trait]
impl<P: StationRepository> StationRepository for WithBackoff<P> {
    async fn fetch_stations(
        &self,
        names: &[String],
        effective_time: DateTime<Utc>,
    ) -> Result<Vec<Station>, FetchError> {
        retry_with_backoff(&self.policy, "stations", || {
            self.primary.fetch_stations(names, effective_time)
        })
        .await
    }
}

/// Retries `primary` with backoff, then consults `fallback` once.
#[derive(Debug, Clone)]
pub struct BackoffWithFallback<P, F> {
    primary: P,
    fallback: F,
    policy: RetryPolicy,
}

impl<P, F> BackoffWithFallback<P, F> {
    pub fn new(primary: P, fallback: F, policy: RetryPolicy) -> Self {
        Self {
            primary,
            fallback,
            policy,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl<P, F> WaveformRepository for BackoffWithFallback<P, F>
where
    P: WaveformRepository,
    F: WaveformRepository,
{
    async fn fetch_channel_segments(
        &self,
        channels: &[String],
        range: TimeRange,
    ) -> Result<Vec<ChannelSegment<Waveform>>, FetchError> {
        let primary = retry_with_backoff(&self.policy, "waveforms", || {
            self.primary.fetch_channel_segments(channels, range)
        })
        .await;
        match primary {
            Ok(segments) => Ok(segments),
            Err(e) => {
                tracing::warn!(error = %e, "Waveform fetch exhausted, consulting fallback");
                self.fallback.fetch_channel_segments(channels, range).await
            }
        }
    }
}

#[async_trait]
impl<P, F> StationRepository for BackoffWithFallback<P, F>
where
    P: StationRepository,
    F: StationRepository,
{
    async fn fetch_stations(
        &self,
        names: &[String],
        effective_time: DateTime<Utc>,
    ) -> Result<Vec<Station>, FetchError> {
        let primary = retry_with_backoff(&self.policy, "stations", || {
            self.primary.fetch_stations(names, effective_time)
        })
        .await;
        match primary {
            Ok(stations) => Ok(stations),
            Err(e) => {
                tracing::warn!(error = %e, "Station fetch exhausted, consulting fallback");
                self.fallback.fetch_stations(names, effective_time).await
            }
        }
    }
}
