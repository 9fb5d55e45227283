//! FK spectra definition: the full parameter set of one beamforming run

use chrono::Duration;
use serde::{Deserialize, Serialize};

use super::position::PhaseType;
use super::time::{duration_secs, serde_secs};
use crate::error::{FkError, FkResult};

/// Unvalidated constructor input for [`FkSpectraDefinition`].
///
/// Also the wire form: deserialization goes through
/// [`FkSpectraDefinition::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FkSpectraDefinitionParams {
    #[serde(with = "serde_secs")]
    pub window_lead: Duration,
    #[serde(with = "serde_secs")]
    pub window_length: Duration,
    /// Output rate of the spectra sequence
    pub sample_rate_hz: f64,
    pub waveform_sample_rate_hz: f64,
    pub waveform_sample_rate_tolerance_hz: f64,
    pub low_frequency_hz: f64,
    pub high_frequency_hz: f64,
    pub slow_count_x: usize,
    pub slow_start_x_sec_per_km: f64,
    pub slow_delta_x_sec_per_km: f64,
    pub slow_count_y: usize,
    pub slow_start_y_sec_per_km: f64,
    pub slow_delta_y_sec_per_km: f64,
    pub minimum_waveforms_for_spectra: usize,
    #[serde(default)]
    pub phase_type: PhaseType,
    #[serde(default)]
    pub use_channel_vertical_offsets: bool,
    #[serde(default)]
    pub normalize_waveforms: bool,
}

/// Validated, immutable FK spectra definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "FkSpectraDefinitionParams", into = "FkSpectraDefinitionParams")]
pub struct FkSpectraDefinition {
    params: FkSpectraDefinitionParams,
}

impl TryFrom<FkSpectraDefinitionParams> for FkSpectraDefinition {
    type Error = FkError;

    fn try_from(params: FkSpectraDefinitionParams) -> FkResult<Self> {
        Self::new(params)
    }
}

impl From<FkSpectraDefinition> for FkSpectraDefinitionParams {
    fn from(definition: FkSpectraDefinition) -> Self {
        definition.params
    }
}

impl FkSpectraDefinition {
    pub fn new(params: FkSpectraDefinitionParams) -> FkResult<Self> {
        let mut errors = Vec::new();
        let p = &params;

        let floats = [
            ("windowLead", duration_secs(p.window_lead)),
            ("windowLength", duration_secs(p.window_length)),
            ("sampleRateHz", p.sample_rate_hz),
            ("waveformSampleRateHz", p.waveform_sample_rate_hz),
            ("waveformSampleRateToleranceHz", p.waveform_sample_rate_tolerance_hz),
            ("lowFrequencyHz", p.low_frequency_hz),
            ("highFrequencyHz", p.high_frequency_hz),
            ("slowStartXSecPerKm", p.slow_start_x_sec_per_km),
            ("slowDeltaXSecPerKm", p.slow_delta_x_sec_per_km),
            ("slowStartYSecPerKm", p.slow_start_y_sec_per_km),
            ("slowDeltaYSecPerKm", p.slow_delta_y_sec_per_km),
        ];
        for (name, value) in floats {
            if !value.is_finite() {
                errors.push(format!("{name} must be finite, got {value}"));
            }
        }

        if p.window_length <= Duration::zero() {
            errors.push("windowLength must be > 0".to_string());
        }
        if p.window_lead < Duration::zero() {
            errors.push("windowLead must be >= 0".to_string());
        }
        if p.sample_rate_hz <= 0.0 {
            errors.push(format!("sampleRateHz must be > 0, got {}", p.sample_rate_hz));
        }
        if p.waveform_sample_rate_hz <= 0.0 {
            errors.push(format!(
                "waveformSampleRateHz must be > 0, got {}",
                p.waveform_sample_rate_hz
            ));
        }
        if p.waveform_sample_rate_tolerance_hz < 0.0 {
            errors.push("waveformSampleRateToleranceHz must be >= 0".to_string());
        }
        if p.low_frequency_hz < 0.0 {
            errors.push(format!("lowFrequencyHz must be >= 0, got {}", p.low_frequency_hz));
        }
        if p.high_frequency_hz <= p.low_frequency_hz {
            errors.push(format!(
                "highFrequencyHz ({}) must be > lowFrequencyHz ({})",
                p.high_frequency_hz, p.low_frequency_hz
            ));
        }
        if p.slow_count_x == 0 {
            errors.push("slowCountX must be > 0".to_string());
        }
        if p.slow_count_y == 0 {
            errors.push("slowCountY must be > 0".to_string());
        }
        if p.minimum_waveforms_for_spectra <= 1 {
            errors.push(format!(
                "minimumWaveformsForSpectra must be > 1, got {}",
                p.minimum_waveforms_for_spectra
            ));
        }

        if errors.is_empty() {
            Ok(Self { params })
        } else {
            Err(FkError::InvalidDefinition(errors.join("; ")))
        }
    }

    pub fn params(&self) -> &FkSpectraDefinitionParams {
        &self.params
    }

    pub fn window_lead(&self) -> Duration {
        self.params.window_lead
    }

    pub fn window_length(&self) -> Duration {
        self.params.window_length
    }

    pub fn sample_rate_hz(&self) -> f64 {
        self.params.sample_rate_hz
    }

    pub fn waveform_sample_rate_hz(&self) -> f64 {
        self.params.waveform_sample_rate_hz
    }

    pub fn waveform_sample_rate_tolerance_hz(&self) -> f64 {
        self.params.waveform_sample_rate_tolerance_hz
    }

    pub fn low_frequency_hz(&self) -> f64 {
        self.params.low_frequency_hz
    }

    pub fn high_frequency_hz(&self) -> f64 {
        self.params.high_frequency_hz
    }

    pub fn slow_count_x(&self) -> usize {
        self.params.slow_count_x
    }

    pub fn slow_start_x(&self) -> f64 {
        self.params.slow_start_x_sec_per_km
    }

    pub fn slow_delta_x(&self) -> f64 {
        self.params.slow_delta_x_sec_per_km
    }

    pub fn slow_count_y(&self) -> usize {
        self.params.slow_count_y
    }

    pub fn slow_start_y(&self) -> f64 {
        self.params.slow_start_y_sec_per_km
    }

    pub fn slow_delta_y(&self) -> f64 {
        self.params.slow_delta_y_sec_per_km
    }

    pub fn minimum_waveforms_for_spectra(&self) -> usize {
        self.params.minimum_waveforms_for_spectra
    }

    pub fn phase_type(&self) -> PhaseType {
        self.params.phase_type
    }

    pub fn use_channel_vertical_offsets(&self) -> bool {
        self.params.use_channel_vertical_offsets
    }

    pub fn normalize_waveforms(&self) -> bool {
        self.params.normalize_waveforms
    }

    /// True when `rate_hz` is within tolerance of the nominal waveform rate.
    pub fn accepts_sample_rate(&self, rate_hz: f64) -> bool {
        (rate_hz - self.params.waveform_sample_rate_hz).abs()
            <= self.params.waveform_sample_rate_tolerance_hz
    }

    /// East slowness (s/km) of grid column `col`.
    pub fn slowness_x(&self, col: usize) -> f64 {
        self.params.slow_start_x_sec_per_km + col as f64 * self.params.slow_delta_x_sec_per_km
    }

    /// North slowness (s/km) of grid row `row`. Row 0 is the northern edge.
    pub fn slowness_y(&self, row: usize) -> f64 {
        let index = self.params.slow_count_y.saturating_sub(1).saturating_sub(row);
        self.params.slow_start_y_sec_per_km + index as f64 * self.params.slow_delta_y_sec_per_km
    }

    pub fn with_normalize_waveforms(&self, normalize: bool) -> Self {
        let mut params = self.params.clone();
        params.normalize_waveforms = normalize;
        Self { params }
    }

    pub fn with_window_length(&self, window_length: Duration) -> FkResult<Self> {
        let mut params = self.params.clone();
        params.window_length = window_length;
        Self::new(params)
    }

    pub fn with_sample_rate_hz(&self, sample_rate_hz: f64) -> FkResult<Self> {
        let mut params = self.params.clone();
        params.sample_rate_hz = sample_rate_hz;
        Self::new(params)
    }

    pub fn with_frequency_band(&self, low_hz: f64, high_hz: f64) -> FkResult<Self> {
        let mut params = self.params.clone();
        params.low_frequency_hz = low_hz;
        params.high_frequency_hz = high_hz;
        Self::new(params)
    }

    pub fn with_window_lead(&self, window_lead: Duration) -> FkResult<Self> {
        let mut params = self.params.clone();
        params.window_lead = window_lead;
        Self::new(params)
    }

    pub fn with_phase_type(&self, phase_type: PhaseType) -> Self {
        let mut params = self.params.clone();
        params.phase_type = phase_type;
        Self { params }
    }
}
