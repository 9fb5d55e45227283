//! Station and channel metadata consumed by the FK pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use super::float_serde;
use super::position::RelativePosition;

/// Physical units of a channel's samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Units {
    #[default]
    Nanometers,
    NanometersPerSecond,
    NanometersSquaredPerSecond,
    Pascals,
    Counts,
    Unitless,
}

/// Orientation class of a channel's sensor component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChannelOrientationType {
    #[default]
    Vertical,
    NorthSouth,
    EastWest,
    Unknown,
}

/// Horizontal / vertical orientation angles in degrees (NaN = undefined).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Orientation {
    #[serde(with = "float_serde::nan_as_null")]
    pub horizontal_angle_deg: f64,
    #[serde(with = "float_serde::nan_as_null")]
    pub vertical_angle_deg: f64,
}

impl Orientation {
    pub fn for_type(orientation_type: ChannelOrientationType) -> Self {
        let (horizontal, vertical) = match orientation_type {
            ChannelOrientationType::Vertical => (f64::NAN, 0.0),
            ChannelOrientationType::NorthSouth => (0.0, 90.0),
            ChannelOrientationType::EastWest => (90.0, 90.0),
            ChannelOrientationType::Unknown => (f64::NAN, f64::NAN),
        };
        Self {
            horizontal_angle_deg: horizontal,
            vertical_angle_deg: vertical,
        }
    }
}

/// Geographic location of a station reference point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub depth_km: f64,
    pub elevation_km: f64,
}

/// A raw or derived channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    /// Fully qualified name, e.g. `ASAR.AS01.SHZ`
    pub name: String,
    pub station_name: String,
    pub nominal_sample_rate_hz: f64,
    #[serde(default)]
    pub orientation_type: ChannelOrientationType,
    #[serde(default = "default_orientation")]
    pub orientation: Orientation,
    #[serde(default)]
    pub units: Units,
    #[serde(default)]
    pub location: Location,
    pub effective_at: DateTime<Utc>,
    #[serde(default)]
    pub effective_until: Option<DateTime<Utc>>,
    /// Names of the channels this channel was derived from
    #[serde(default)]
    pub configured_inputs: Vec<String>,
    #[serde(default)]
    pub processing_metadata: BTreeMap<String, String>,
}

fn default_orientation() -> Orientation {
    Orientation::for_type(ChannelOrientationType::Vertical)
}

impl Channel {
    /// A raw vertical channel with default metadata.
    pub fn raw(
        name: impl Into<String>,
        station_name: impl Into<String>,
        nominal_sample_rate_hz: f64,
        effective_at: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            station_name: station_name.into(),
            nominal_sample_rate_hz,
            orientation_type: ChannelOrientationType::Vertical,
            orientation: default_orientation(),
            units: Units::Nanometers,
            location: Location::default(),
            effective_at,
            effective_until: None,
            configured_inputs: Vec::new(),
            processing_metadata: BTreeMap::new(),
        }
    }

    /// Last dotted component of the name (`SHZ` for `ASAR.AS01.SHZ`).
    pub fn channel_code(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }
}

/// A station: reference location, its raw channels and their array
/// geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Station {
    pub name: String,
    #[serde(default)]
    pub location: Location,
    #[serde(default)]
    pub channels: Vec<Channel>,
    /// Keyed by channel name
    pub relative_positions_by_channel: HashMap<String, RelativePosition>,
}

impl Station {
    pub fn relative_position(&self, channel_name: &str) -> Option<&RelativePosition> {
        self.relative_positions_by_channel.get(channel_name)
    }
}
