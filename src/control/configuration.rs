//! Per-request parameter resolution from the TOML configuration

use crate::config::FkConfig;
use crate::error::FkResult;
use crate::types::{FkSpectraDefinition, FkSpectraDefinitionParams, FkStreamingRequest};

/// Spectrum plugin, its tuning constant and the definition it runs with.
#[derive(Debug, Clone, PartialEq)]
pub struct FkSpectraParameters {
    pub plugin_name: String,
    pub medium_velocity_km_per_sec: f64,
    pub definition: FkSpectraDefinition,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FkAttributesParameters {
    pub plugin_name: String,
}

/// Resolves request-specific parameters against the configured defaults.
#[derive(Debug, Clone, Default)]
pub struct FkConfiguration {
    config: FkConfig,
}

impl FkConfiguration {
    pub fn new(config: FkConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FkConfig {
        &self.config
    }

    /// The request supplies window timing, output rate, phase and
    /// (optionally) the band; everything else comes from `[spectra]`.
    pub fn spectra_parameters(
        &self,
        request: &FkStreamingRequest,
        waveform_sample_rate_hz: f64,
    ) -> FkResult<FkSpectraParameters> {
        let s = &self.config.spectra;
        let params = FkSpectraDefinitionParams {
            window_lead: request.window_lead,
            window_length: request.window_length,
            sample_rate_hz: request.sample_rate,
            waveform_sample_rate_hz,
            waveform_sample_rate_tolerance_hz: s.waveform_sample_rate_tolerance_hz,
            low_frequency_hz: request.low_frequency_hz.unwrap_or(s.low_frequency_hz),
            high_frequency_hz: request.high_frequency_hz.unwrap_or(s.high_frequency_hz),
            slow_count_x: s.slowness.count_x,
            slow_start_x_sec_per_km: s.slowness.start_x,
            slow_delta_x_sec_per_km: s.slowness.delta_x,
            slow_count_y: s.slowness.count_y,
            slow_start_y_sec_per_km: s.slowness.start_y,
            slow_delta_y_sec_per_km: s.slowness.delta_y,
            minimum_waveforms_for_spectra: s.minimum_waveforms_for_spectra,
            phase_type: request.phase_type,
            use_channel_vertical_offsets: s.use_channel_vertical_offsets,
            normalize_waveforms: s.normalize_waveforms,
        };

        Ok(FkSpectraParameters {
            plugin_name: s.plugin.clone(),
            medium_velocity_km_per_sec: s.medium_velocity_for(request.phase_type),
            definition: FkSpectraDefinition::new(params)?,
        })
    }

    pub fn attributes_parameters(&self) -> Vec<FkAttributesParameters> {
        self.config
            .attributes
            .iter()
            .map(|a| FkAttributesParameters {
                plugin_name: a.plugin.clone(),
            })
            .collect()
    }
}
