//! FK Engine Configuration
//!
//! Beamforming defaults, attribute plugins and upstream fetch settings
//! loaded from TOML.
//!
//! ## Loading Order
//!
//! 1. `FK_CONFIG` environment variable (path to TOML file)
//! 2. `fk_config.toml` in the current working directory
//! 3. Built-in defaults
//!
//! ## Usage
//!
//! ```ignore
//! // In main():
//! config::init(FkConfig::load());
//!
//! // Anywhere else:
//! let plugin = &config::get().spectra.plugin;
//! ```

mod fk_config;
pub mod defaults;
pub mod validation;

pub use fk_config::*;

use std::sync::OnceLock;

/// Global FK configuration, initialized once at startup.
static FK_CONFIG: OnceLock<FkConfig> = OnceLock::new();

/// Initialize the global configuration. Later calls are ignored.
pub fn init(config: FkConfig) {
    if FK_CONFIG.set(config).is_err() {
        tracing::warn!("config::init() called more than once, ignoring");
    }
}

/// The global configuration.
///
/// Falls back to built-in defaults (and pins them) when `init()` has not
/// run yet.
pub fn get() -> &'static FkConfig {
    FK_CONFIG.get_or_init(|| {
        tracing::warn!("config::get() called before config::init(), using defaults");
        FkConfig::default()
    })
}

pub fn is_initialized() -> bool {
    FK_CONFIG.get().is_some()
}
