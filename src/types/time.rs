//! Time helpers shared by the waveform and spectra types.
//!
//! Instants are `chrono::DateTime<Utc>`; spans are `chrono::Duration` at
//! nanosecond resolution. Durations travel over the wire as fractional
//! seconds.

use chrono::{DateTime, Duration, Utc};

const NANOS_PER_SEC: f64 = 1.0e9;

/// Convert a span to fractional seconds.
pub fn duration_secs(d: Duration) -> f64 {
    d.num_seconds() as f64 + f64::from(d.subsec_nanos()) / NANOS_PER_SEC
}

/// Convert fractional seconds to a span, truncating to whole nanoseconds.
pub fn secs_to_duration(secs: f64) -> Duration {
    Duration::nanoseconds((secs * NANOS_PER_SEC) as i64)
}

/// Sample period for a rate in Hz, truncated to whole nanoseconds.
pub fn sample_period(rate_hz: f64) -> Duration {
    secs_to_duration(1.0 / rate_hz)
}

/// Seconds from `from` to `to` (negative when `to` is earlier).
pub fn secs_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    duration_secs(to - from)
}

/// Closed time interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        t >= self.start && t <= self.end
    }

    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

/// Serde adapter: `chrono::Duration` as fractional seconds.
pub mod serde_secs {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(super::duration_secs(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        if !secs.is_finite() {
            return Err(serde::de::Error::custom("duration must be a finite number of seconds"));
        }
        Ok(super::secs_to_duration(secs))
    }
}
