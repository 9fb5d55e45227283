//! Array geometry and phase labels

use serde::{Deserialize, Serialize};

/// Displacement of a channel from the array reference point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelativePosition {
    pub north_displacement_km: f64,
    pub east_displacement_km: f64,
    pub vertical_displacement_km: f64,
}

impl RelativePosition {
    pub const fn new(north_km: f64, east_km: f64, vertical_km: f64) -> Self {
        Self {
            north_displacement_km: north_km,
            east_displacement_km: east_km,
            vertical_displacement_km: vertical_km,
        }
    }

    /// Horizontal distance from the reference point (km).
    pub fn horizontal_offset_km(&self) -> f64 {
        self.north_displacement_km.hypot(self.east_displacement_km)
    }

    /// Travel-time delay (s) of a plane wave with the given slowness vector.
    ///
    /// Components are east, north and vertical slowness in s/km.
    pub fn delay_secs(&self, slow_east: f64, slow_north: f64, slow_vertical: f64) -> f64 {
        self.east_displacement_km * slow_east
            + self.north_displacement_km * slow_north
            + self.vertical_displacement_km * slow_vertical
    }
}

/// Seismic / acoustic phase label carried through to spectra metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PhaseType {
    #[default]
    P,
    S,
    Pn,
    Pg,
    Sn,
    Sg,
    Lg,
    Rg,
    #[serde(rename = "PKP")]
    Pkp,
    /// Infrasound arrival
    I,
    Unknown,
}

impl std::fmt::Display for PhaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            PhaseType::P => "P",
            PhaseType::S => "S",
            PhaseType::Pn => "Pn",
            PhaseType::Pg => "Pg",
            PhaseType::Sn => "Sn",
            PhaseType::Sg => "Sg",
            PhaseType::Lg => "Lg",
            PhaseType::Rg => "Rg",
            PhaseType::Pkp => "PKP",
            PhaseType::I => "I",
            PhaseType::Unknown => "Unknown",
        };
        f.write_str(label)
    }
}
