//! Shared data structures for FK array processing
//!
//! This module defines the value types flowing through the FK pipeline:
//! - Array geometry: RelativePosition, Station, Channel
//! - Input data: Waveform, ChannelSegment
//! - Run parameters: FkSpectraDefinition, FkStreamingRequest
//! - Output: FkSpectrum, FkAttributes, FkSpectra

mod channel;
mod definition;
pub(crate) mod float_serde;
mod position;
mod request;
mod spectrum;
pub mod time;
mod waveform;

pub use channel::*;
pub use definition::*;
pub use position::*;
pub use request::*;
pub use spectrum::*;
pub use time::TimeRange;
pub use waveform::*;

#[cfg(test)]
pub(crate) use definition::tests::reference_params;
