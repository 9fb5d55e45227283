//! FK spectrum, derived attributes and the spectra timeseries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::float_serde;
use super::position::PhaseType;
use super::time::secs_to_duration;
use super::waveform::Timeseries;
use crate::error::{FkError, FkResult};

/// Direction and speed estimate derived from one spectrum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FkAttributes {
    pub azimuth_deg: f64,
    pub slowness_sec_per_km: f64,
    pub azimuth_uncertainty_deg: f64,
    pub slowness_uncertainty_sec_per_km: f64,
    /// F-statistic at the peak cell; may be infinite
    #[serde(with = "float_serde::nan_as_null")]
    pub peak_fstat: f64,
}

/// One FK power spectrum over the slowness grid.
///
/// `power[row][col]`, rows north to south, columns west to east.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FkSpectrum {
    #[serde(with = "float_serde::grid_nan_as_null")]
    pub power: Vec<Vec<f64>>,
    #[serde(with = "float_serde::grid_nan_as_null")]
    pub fstat: Vec<Vec<f64>>,
    /// 1 (single dominant peak) to 4 (ambiguous)
    pub quality: u8,
    #[serde(default)]
    pub attributes: BTreeMap<String, FkAttributes>,
}

impl FkSpectrum {
    pub fn new(power: Vec<Vec<f64>>, fstat: Vec<Vec<f64>>, quality: u8) -> FkResult<Self> {
        let power_shape = grid_shape(&power)?;
        let fstat_shape = grid_shape(&fstat)?;
        if power_shape != fstat_shape {
            return Err(FkError::InvalidArgument(format!(
                "power shape {power_shape:?} does not match fstat shape {fstat_shape:?}"
            )));
        }
        Ok(Self {
            power,
            fstat,
            quality,
            attributes: BTreeMap::new(),
        })
    }

    /// `(rows, cols)`
    pub fn shape(&self) -> (usize, usize) {
        (self.power.len(), self.power.first().map_or(0, Vec::len))
    }

    pub fn with_attributes(mut self, name: impl Into<String>, attributes: FkAttributes) -> Self {
        self.attributes.insert(name.into(), attributes);
        self
    }
}

fn grid_shape(grid: &[Vec<f64>]) -> FkResult<(usize, usize)> {
    let cols = grid.first().map_or(0, Vec::len);
    if grid.iter().any(|row| row.len() != cols) {
        return Err(FkError::InvalidArgument("ragged spectrum grid".to_string()));
    }
    Ok((grid.len(), cols))
}

/// Slowness grid and phase carried alongside the spectra.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FkSpectraMetadata {
    pub phase_type: PhaseType,
    pub slow_start_x: f64,
    pub slow_delta_x: f64,
    pub slow_start_y: f64,
    pub slow_delta_y: f64,
}

/// Uniformly sampled sequence of FK spectra.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FkSpectra {
    pub start_time: DateTime<Utc>,
    pub sample_rate_hz: f64,
    pub values: Vec<FkSpectrum>,
    pub metadata: FkSpectraMetadata,
}

impl FkSpectra {
    pub fn new(
        start_time: DateTime<Utc>,
        sample_rate_hz: f64,
        values: Vec<FkSpectrum>,
        metadata: FkSpectraMetadata,
    ) -> FkResult<Self> {
        if !(sample_rate_hz.is_finite() && sample_rate_hz > 0.0) {
            return Err(FkError::InvalidArgument(format!(
                "spectra sample rate must be > 0, got {sample_rate_hz}"
            )));
        }
        if let Some(first) = values.first() {
            let shape = first.shape();
            if let Some(bad) = values.iter().position(|s| s.shape() != shape) {
                return Err(FkError::InvalidArgument(format!(
                    "spectrum {bad} has shape {:?}, expected {shape:?}",
                    values[bad].shape()
                )));
            }
        }
        Ok(Self {
            start_time,
            sample_rate_hz,
            values,
            metadata,
        })
    }

    pub fn sample_count(&self) -> usize {
        self.values.len()
    }

    /// Time of the last spectrum.
    pub fn end_time(&self) -> DateTime<Utc> {
        let n = self.values.len().saturating_sub(1);
        self.start_time + secs_to_duration(n as f64 / self.sample_rate_hz)
    }
}

impl Timeseries for FkSpectra {
    fn series_start(&self) -> DateTime<Utc> {
        self.start_time
    }

    fn series_end(&self) -> DateTime<Utc> {
        self.end_time()
    }
}
