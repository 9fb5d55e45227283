//! Signal processing module - FFT utilities and waveform conditioning

mod fft;
mod normalize;

pub use fft::*;
pub use normalize::{condition, demean, max_amplitude_normalize};
