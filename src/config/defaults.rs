//! System-wide default constants.
//!
//! Grouped by subsystem for easy discovery. Every value here is also the
//! serde default of the matching `FkConfig` field.

// ============================================================================
// Spectra
// ============================================================================

/// Spectrum plugin used when the config names none.
pub const SPECTRUM_PLUGIN: &str = "caponFkSpectrum";

/// Allowed deviation of a waveform's sample rate from the modal rate (Hz).
pub const WAVEFORM_SAMPLE_RATE_TOLERANCE_HZ: f64 = 0.001;

/// Analysis band used when a request does not carry one (Hz).
pub const LOW_FREQUENCY_HZ: f64 = 1.25;
pub const HIGH_FREQUENCY_HZ: f64 = 3.25;

/// Fewest usable channels that still produce a spectrum.
pub const MINIMUM_WAVEFORMS_FOR_SPECTRA: usize = 2;

// ============================================================================
// Slowness Grid
// ============================================================================

/// 81 x 81 cells spanning -0.4 to +0.4 s/km on both axes.
pub const SLOW_COUNT: usize = 81;
pub const SLOW_START_SEC_PER_KM: f64 = -0.4;
pub const SLOW_DELTA_SEC_PER_KM: f64 = 0.01;

// ============================================================================
// Medium Velocity (km/s) by phase family
// ============================================================================

pub const P_WAVE_VELOCITY_KM_PER_SEC: f64 = 5.8;
pub const S_WAVE_VELOCITY_KM_PER_SEC: f64 = 3.6;
pub const LG_VELOCITY_KM_PER_SEC: f64 = 3.5;
pub const RG_VELOCITY_KM_PER_SEC: f64 = 3.0;
/// Phases outside the families above (infrasound, unknown).
pub const FALLBACK_VELOCITY_KM_PER_SEC: f64 = 1.0;

// ============================================================================
// Attributes
// ============================================================================

pub const ATTRIBUTES_PLUGINS: &[&str] = &["maxPowerFkAttributes", "maxFstatFkAttributes"];

// ============================================================================
// Upstream Fetch
// ============================================================================

/// Attempts per upstream call, including the first.
pub const FETCH_MAX_ATTEMPTS: u32 = 3;

/// First retry delay (ms); doubles per attempt.
pub const FETCH_INITIAL_DELAY_MS: u64 = 250;

/// Cap on a single retry delay (ms).
pub const FETCH_MAX_DELAY_MS: u64 = 5_000;

/// HTTP client timeout for waveform and station requests (seconds).
pub const FETCH_HTTP_TIMEOUT_SECS: u64 = 30;

pub const WAVEFORM_SERVICE_URL: &str = "http://localhost:8080/waveforms/channel-segment/query";
pub const STATION_SERVICE_URL: &str = "http://localhost:8080/stations/query";

// ============================================================================
// Config Loading
// ============================================================================

/// Environment variable naming the config file.
pub const CONFIG_ENV_VAR: &str = "FK_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "fk_config.toml";
