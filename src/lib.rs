//! FK Engine: frequency-wavenumber beamforming for seismic and infrasound arrays
//!
//! Turns multi-channel array waveforms into a timeseries of FK power
//! spectra over a slowness grid, one spectrum per analysis window, each
//! annotated with azimuth and slowness estimates.
//!
//! ## Architecture
//!
//! - **Types**: waveforms, channel segments, station geometry, definitions
//! - **Processing**: FFT helpers and waveform conditioning
//! - **Beamforming**: per-window power, F-statistic and quality
//! - **Sequencer**: sliding windows over jittered, gappy channel data
//! - **Attributes**: peak-derived azimuth / slowness estimates
//! - **Control**: request orchestration over waveform and station services

pub mod attributes;
pub mod beamforming;
pub mod config;
pub mod control;
pub mod error;
pub mod plugins;
pub mod processing;
pub mod sequencer;
pub mod types;

pub use config::FkConfig;
pub use error::{FkError, FkResult};

pub use attributes::{FkAttributeExtractor, FkSpectraInfo, MaxFstatAttributes, MaxPowerAttributes};
pub use beamforming::{BeamformerKind, ChannelWindow, SpectralBeamformer};
pub use control::{FkControl, FkControlError};
pub use plugins::PluginRegistry;
pub use sequencer::FkWindowSequencer;

pub use types::{
    Channel, ChannelSegment, FkAttributes, FkSpectra, FkSpectraDefinition,
    FkSpectraDefinitionParams, FkSpectrum, FkStreamingRequest, PhaseType, RelativePosition,
    Station, Waveform,
};
