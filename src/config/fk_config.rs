//! FK engine configuration: beamforming defaults as operator-tunable TOML values
//!
//! Every section implements `Default` with the values in [`super::defaults`],
//! so an empty or missing file yields a working configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::defaults;
use crate::types::PhaseType;

// ============================================================================
// Top-Level Config
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FkConfig {
    #[serde(default)]
    pub spectra: SpectraConfig,

    /// Attribute extractors applied to every spectrum, in order.
    #[serde(default = "default_attributes")]
    pub attributes: Vec<AttributesConfig>,

    #[serde(default)]
    pub fetch: FetchConfig,
}

fn default_attributes() -> Vec<AttributesConfig> {
    defaults::ATTRIBUTES_PLUGINS
        .iter()
        .map(|name| AttributesConfig {
            plugin: (*name).to_string(),
        })
        .collect()
}

impl Default for FkConfig {
    fn default() -> Self {
        Self {
            spectra: SpectraConfig::default(),
            attributes: default_attributes(),
            fetch: FetchConfig::default(),
        }
    }
}

impl FkConfig {
    /// Load configuration using the standard search order:
    /// 1. `$FK_CONFIG` environment variable
    /// 2. `./fk_config.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(defaults::CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), plugin = %config.spectra.plugin, "Loaded FK config from FK_CONFIG");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from FK_CONFIG, falling back");
                    }
                }
            } else {
                warn!(path = %path, "FK_CONFIG points to non-existent file, falling back");
            }
        }

        let local = PathBuf::from(defaults::LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!(plugin = %config.spectra.plugin, "Loaded FK config from ./fk_config.toml");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./fk_config.toml, using defaults");
                }
            }
        }

        info!("No fk_config.toml found, using built-in defaults");
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
            other => other,
        })
    }

    /// Parse and validate TOML text. Unknown keys are logged, not rejected.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let config: Self =
            toml::from_str(contents).map_err(|e| ConfigError::Parse(PathBuf::new(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = self.to_toml()?;
        std::fs::write(path, contents).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        info!(path = %path.display(), "FK config saved");
        Ok(())
    }

    /// Validate every section, collecting all problems before failing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();
        let s = &self.spectra;

        if s.plugin.trim().is_empty() {
            errors.push("spectra.plugin must not be empty".to_string());
        }
        if let Some(v) = s.medium_velocity_km_per_sec {
            Self::check_positive(v, "spectra.medium_velocity_km_per_sec", &mut errors);
        }
        if !s.waveform_sample_rate_tolerance_hz.is_finite() || s.waveform_sample_rate_tolerance_hz < 0.0 {
            errors.push(format!(
                "spectra.waveform_sample_rate_tolerance_hz = {} must be finite and >= 0",
                s.waveform_sample_rate_tolerance_hz
            ));
        }
        Self::check_positive(s.low_frequency_hz, "spectra.low_frequency_hz", &mut errors);
        Self::check_positive(s.high_frequency_hz, "spectra.high_frequency_hz", &mut errors);
        if s.high_frequency_hz <= s.low_frequency_hz {
            errors.push(format!(
                "spectra: high_frequency_hz ({:.3}) must be > low_frequency_hz ({:.3})",
                s.high_frequency_hz, s.low_frequency_hz
            ));
        }
        if s.minimum_waveforms_for_spectra < 2 {
            errors.push(format!(
                "spectra.minimum_waveforms_for_spectra = {} must be >= 2",
                s.minimum_waveforms_for_spectra
            ));
        }

        let g = &s.slowness;
        if g.count_x == 0 || g.count_y == 0 {
            errors.push(format!(
                "spectra.slowness: counts must be > 0 (got count_x={}, count_y={})",
                g.count_x, g.count_y
            ));
        }
        Self::check_positive(g.delta_x, "spectra.slowness.delta_x", &mut errors);
        Self::check_positive(g.delta_y, "spectra.slowness.delta_y", &mut errors);
        if !g.start_x.is_finite() || !g.start_y.is_finite() {
            errors.push(format!(
                "spectra.slowness: starts must be finite (got start_x={}, start_y={})",
                g.start_x, g.start_y
            ));
        }

        if self.attributes.is_empty() {
            errors.push("attributes: at least one attributes plugin is required".to_string());
        }
        for (i, a) in self.attributes.iter().enumerate() {
            if a.plugin.trim().is_empty() {
                errors.push(format!("attributes[{i}].plugin must not be empty"));
            }
        }

        let f = &self.fetch;
        if f.max_attempts == 0 {
            errors.push("fetch.max_attempts must be >= 1".to_string());
        }
        if f.max_delay_ms < f.initial_delay_ms {
            errors.push(format!(
                "fetch: max_delay_ms ({}) must be >= initial_delay_ms ({})",
                f.max_delay_ms, f.initial_delay_ms
            ));
        }
        if f.timeout_secs == 0 {
            errors.push("fetch.timeout_secs must be > 0".to_string());
        }
        for (name, url) in [
            ("fetch.waveform_service_url", &f.waveform_service_url),
            ("fetch.station_service_url", &f.station_service_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                errors.push(format!("{name} = '{url}' must be an http(s) URL"));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    fn check_positive(value: f64, name: &str, errors: &mut Vec<String>) {
        // NaN comparisons silently pass
        if !value.is_finite() || value <= 0.0 {
            errors.push(format!("{name} = {value} must be finite and > 0"));
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Serialize(toml::ser::Error),
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "Config I/O error ({}): {}", path.display(), e),
            ConfigError::Parse(path, e) => {
                write!(f, "Config parse error ({}): {}", path.display(), e)
            }
            ConfigError::Serialize(e) => write!(f, "Config serialization error: {}", e),
            ConfigError::Validation(errors) => {
                writeln!(f, "Config validation failed:")?;
                for e in errors {
                    writeln!(f, "  - {}", e)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Spectra
// ============================================================================

/// Beamforming settings shared by every request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpectraConfig {
    /// Registered spectrum plugin name
    #[serde(default = "default_spectrum_plugin")]
    pub plugin: String,

    /// Fixed propagation velocity; derived from the phase when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medium_velocity_km_per_sec: Option<f64>,

    #[serde(default = "default_tolerance")]
    pub waveform_sample_rate_tolerance_hz: f64,

    /// Band used when the request does not carry one
    #[serde(default = "default_low_frequency")]
    pub low_frequency_hz: f64,

    #[serde(default = "default_high_frequency")]
    pub high_frequency_hz: f64,

    #[serde(default = "default_minimum_waveforms")]
    pub minimum_waveforms_for_spectra: usize,

    #[serde(default)]
    pub use_channel_vertical_offsets: bool,

    #[serde(default)]
    pub normalize_waveforms: bool,

    #[serde(default)]
    pub slowness: SlownessGridConfig,
}

fn default_spectrum_plugin() -> String {
    defaults::SPECTRUM_PLUGIN.to_string()
}
fn default_tolerance() -> f64 {
    defaults::WAVEFORM_SAMPLE_RATE_TOLERANCE_HZ
}
fn default_low_frequency() -> f64 {
    defaults::LOW_FREQUENCY_HZ
}
fn default_high_frequency() -> f64 {
    defaults::HIGH_FREQUENCY_HZ
}
fn default_minimum_waveforms() -> usize {
    defaults::MINIMUM_WAVEFORMS_FOR_SPECTRA
}

impl Default for SpectraConfig {
    fn default() -> Self {
        Self {
            plugin: default_spectrum_plugin(),
            medium_velocity_km_per_sec: None,
            waveform_sample_rate_tolerance_hz: default_tolerance(),
            low_frequency_hz: default_low_frequency(),
            high_frequency_hz: default_high_frequency(),
            minimum_waveforms_for_spectra: default_minimum_waveforms(),
            use_channel_vertical_offsets: false,
            normalize_waveforms: false,
            slowness: SlownessGridConfig::default(),
        }
    }
}

impl SpectraConfig {
    /// Configured velocity, or the typical velocity of the phase family.
    pub fn medium_velocity_for(&self, phase: PhaseType) -> f64 {
        self.medium_velocity_km_per_sec
            .unwrap_or_else(|| medium_velocity_for_phase(phase))
    }
}

/// Typical crustal velocity (km/s) for a phase label.
///
/// P-family labels map to P velocity, S-family to S velocity; Lg and Rg
/// have their own values and anything else falls back to 1 km/s.
pub fn medium_velocity_for_phase(phase: PhaseType) -> f64 {
    match phase {
        PhaseType::P | PhaseType::Pn | PhaseType::Pg | PhaseType::Pkp => {
            defaults::P_WAVE_VELOCITY_KM_PER_SEC
        }
        PhaseType::S | PhaseType::Sn | PhaseType::Sg => defaults::S_WAVE_VELOCITY_KM_PER_SEC,
        PhaseType::Lg => defaults::LG_VELOCITY_KM_PER_SEC,
        PhaseType::Rg => defaults::RG_VELOCITY_KM_PER_SEC,
        PhaseType::I | PhaseType::Unknown => defaults::FALLBACK_VELOCITY_KM_PER_SEC,
    }
}

/// Slowness grid in s/km. Columns run east, rows run north.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlownessGridConfig {
    #[serde(default = "default_slow_count")]
    pub count_x: usize,
    #[serde(default = "default_slow_start")]
    pub start_x: f64,
    #[serde(default = "default_slow_delta")]
    pub delta_x: f64,
    #[serde(default = "default_slow_count")]
    pub count_y: usize,
    #[serde(default = "default_slow_start")]
    pub start_y: f64,
    #[serde(default = "default_slow_delta")]
    pub delta_y: f64,
}

fn default_slow_count() -> usize {
    defaults::SLOW_COUNT
}
fn default_slow_start() -> f64 {
    defaults::SLOW_START_SEC_PER_KM
}
fn default_slow_delta() -> f64 {
    defaults::SLOW_DELTA_SEC_PER_KM
}

impl Default for SlownessGridConfig {
    fn default() -> Self {
        Self {
            count_x: default_slow_count(),
            start_x: default_slow_start(),
            delta_x: default_slow_delta(),
            count_y: default_slow_count(),
            start_y: default_slow_start(),
            delta_y: default_slow_delta(),
        }
    }
}

// ============================================================================
// Attributes
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributesConfig {
    pub plugin: String,
}

// ============================================================================
// Upstream Fetch
// ============================================================================

/// Retry policy and endpoints for the waveform and station services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_waveform_url")]
    pub waveform_service_url: String,

    #[serde(default = "default_station_url")]
    pub station_service_url: String,
}

fn default_max_attempts() -> u32 {
    defaults::FETCH_MAX_ATTEMPTS
}
fn default_initial_delay_ms() -> u64 {
    defaults::FETCH_INITIAL_DELAY_MS
}
fn default_max_delay_ms() -> u64 {
    defaults::FETCH_MAX_DELAY_MS
}
fn default_timeout_secs() -> u64 {
    defaults::FETCH_HTTP_TIMEOUT_SECS
}
fn default_waveform_url() -> String {
    defaults::WAVEFORM_SERVICE_URL.to_string()
}
fn default_station_url() -> String {
    defaults::STATION_SERVICE_URL.to_string()
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            timeout_secs: default_timeout_secs(),
            waveform_service_url: default_waveform_url(),
            station_service_url: default_station_url(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        let config = FkConfig::default();
        assert!(config.validate().is_ok(), "Default config must always validate");
    }

    #[test]
    fn test_empty_toml_produces_defaults() {
        let config: FkConfig = toml::from_str("").expect("empty TOML should parse");
        assert_eq!(config.spectra.plugin, "caponFkSpectrum");
        assert_eq!(config.spectra.slowness.count_x, 81);
        assert_eq!(config.spectra.minimum_waveforms_for_spectra, 2);
        assert_eq!(config.attributes.len(), 2);
        assert_eq!(config.fetch.max_attempts, 3);
        assert!(config.spectra.medium_velocity_km_per_sec.is_none());
    }

    #[test]
    fn test_partial_toml_override() {
        let toml_str = r#"
[spectra]
plugin = "minimumVarianceFkSpectrum"
medium_velocity_km_per_sec = 6.2

[spectra.slowness]
count_x = 41

[[attributes]]
plugin = "maxFstatFkAttributes"
"#;
        let config = FkConfig::from_toml_str(toml_str).expect("partial TOML should parse");
        assert_eq!(config.spectra.plugin, "minimumVarianceFkSpectrum");
        assert_eq!(config.spectra.medium_velocity_for(PhaseType::S), 6.2);
        assert_eq!(config.spectra.slowness.count_x, 41);
        assert_eq!(config.spectra.slowness.count_y, 81);
        assert_eq!(
            config.attributes,
            vec![AttributesConfig {
                plugin: "maxFstatFkAttributes".to_string()
            }]
        );
        assert_eq!(config.fetch.timeout_secs, 30);
    }

    #[test]
    fn test_velocity_follows_phase_family() {
        let spectra = SpectraConfig::default();
        assert_eq!(spectra.medium_velocity_for(PhaseType::P), 5.8);
        assert_eq!(spectra.medium_velocity_for(PhaseType::Pn), 5.8);
        assert_eq!(spectra.medium_velocity_for(PhaseType::Pkp), 5.8);
        assert_eq!(spectra.medium_velocity_for(PhaseType::Sg), 3.6);
        assert_eq!(spectra.medium_velocity_for(PhaseType::Lg), 3.5);
        assert_eq!(spectra.medium_velocity_for(PhaseType::Rg), 3.0);
        assert_eq!(spectra.medium_velocity_for(PhaseType::I), 1.0);
    }

    #[test]
    fn test_validation_collects_every_error() {
        let mut config = FkConfig::default();
        config.spectra.low_frequency_hz = 4.0;
        config.spectra.high_frequency_hz = 2.0;
        config.spectra.slowness.delta_x = 0.0;
        config.spectra.medium_velocity_km_per_sec = Some(f64::NAN);
        config.fetch.max_attempts = 0;
        config.attributes.clear();

        match config.validate() {
            Err(ConfigError::Validation(errors)) => {
                assert!(errors.iter().any(|e| e.contains("high_frequency_hz")));
                assert!(errors.iter().any(|e| e.contains("slowness.delta_x")));
                assert!(errors.iter().any(|e| e.contains("medium_velocity_km_per_sec")));
                assert!(errors.iter().any(|e| e.contains("max_attempts")));
                assert!(errors.iter().any(|e| e.contains("attributes")));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_non_http_url_rejected() {
        let mut config = FkConfig::default();
        config.fetch.station_service_url = "ftp://stations".to_string();
        let err = config.validate().expect_err("ftp is not http");
        assert!(err.to_string().contains("station_service_url"));
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let result = FkConfig::from_toml_str("[spectra\nplugin = 1");
        assert!(matches!(result, Err(ConfigError::Parse(_, _))));
    }

    #[test]
    fn test_toml_round_trip_keeps_overrides() {
        let mut config = FkConfig::default();
        config.spectra.normalize_waveforms = true;
        config.fetch.max_delay_ms = 9_000;
        let text = config.to_toml().expect("serialize");
        let back = FkConfig::from_toml_str(&text).expect("reparse");
        assert!(back.spectra.normalize_waveforms);
        assert_eq!(back.fetch.max_delay_ms, 9_000);
        assert!(back.spectra.medium_velocity_km_per_sec.is_none());
    }
}
