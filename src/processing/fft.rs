//! FFT computation using rustfft
//!
//! Unnormalized forward transforms, numpy-style frequency axes and helpers
//! for the packed real-FFT layout used when spectra are exchanged as plain
//! `f64` arrays.
//!
//! # Packed layout
//!
//! A real signal of length `n` packs into `n` values:
//!
//! - even `n`: `[Re0, Re(n/2), Re1, Im1, ..., Re(n/2-1), Im(n/2-1)]`
//! - odd `n`: `[Re0, Im((n-1)/2), Re1, Im1, ..., Re((n-1)/2)]`

use num_complex::Complex64;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

use crate::error::{FkError, FkResult};

// ============================================================================
// Frequency axis
// ============================================================================

/// Frequencies of an `n`-point FFT with bin spacing `bin_spacing_hz`, in
/// numpy `fftfreq` order: `[0, 1, ..., ceil(n/2)-1, -floor(n/2), ..., -1]`
/// scaled by the spacing.
pub fn fft_freq(n: usize, bin_spacing_hz: f64) -> Vec<f64> {
    let positive = n.div_ceil(2);
    (0..n)
        .map(|i| {
            if i < positive {
                i as f64 * bin_spacing_hz
            } else {
                -((n - i) as f64) * bin_spacing_hz
            }
        })
        .collect()
}

/// Indices whose absolute frequency lies in the closed band `[low, high]`,
/// ascending.
pub fn find_bin_indices(freqs: &[f64], low_hz: f64, high_hz: f64) -> Vec<usize> {
    freqs
        .iter()
        .enumerate()
        .filter(|(_, f)| {
            let a = f.abs();
            a >= low_hz && a <= high_hz
        })
        .map(|(i, _)| i)
        .collect()
}

// ============================================================================
// Transforms
// ============================================================================

/// Forward FFT of a real signal (unnormalized, no taper).
pub fn compute_fft(samples: &[f64]) -> FkResult<Vec<Complex64>> {
    FftProcessor::new(samples.len())?.process(samples)
}

/// Forward FFT of a real signal in packed layout.
pub fn compute_packed_fft(samples: &[f64]) -> FkResult<Vec<f64>> {
    let spectrum = compute_fft(samples)?;
    Ok(pack_real_spectrum(&spectrum))
}

/// FFT processor with a pre-planned transform for repeated use on
/// equal-length signals.
pub struct FftProcessor {
    fft: Arc<dyn Fft<f64>>,
    size: usize,
}

impl FftProcessor {
    pub fn new(size: usize) -> FkResult<Self> {
        if size == 0 {
            return Err(FkError::Fft("cannot plan a zero-length FFT".to_string()));
        }
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(size);
        Ok(Self { fft, size })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn process(&self, samples: &[f64]) -> FkResult<Vec<Complex64>> {
        if samples.len() != self.size {
            return Err(FkError::Fft(format!(
                "expected {} samples, got {}",
                self.size,
                samples.len()
            )));
        }
        let mut buffer: Vec<Complex64> = samples.iter().map(|&x| Complex64::new(x, 0.0)).collect();
        self.fft.process(&mut buffer);
        Ok(buffer)
    }
}

// ============================================================================
// Packed real spectra
// ============================================================================

/// Number of non-redundant bins of an `n`-point real FFT.
fn packed_bin_count(n: usize) -> usize {
    if n == 0 {
        0
    } else {
        n / 2 + 1
    }
}

/// Positions of the real and imaginary parts of bin `k` in the packed
/// layout. `None` marks a part that is identically zero.
fn packed_positions(n: usize, k: usize) -> (usize, Option<usize>) {
    if k == 0 {
        (0, None)
    } else if n % 2 == 0 && k == n / 2 {
        (1, None)
    } else if n % 2 == 1 && k == (n - 1) / 2 {
        (n - 1, Some(1))
    } else {
        (2 * k, Some(2 * k + 1))
    }
}

/// Pack the first half of a full complex spectrum of a real signal.
pub fn pack_real_spectrum(spectrum: &[Complex64]) -> Vec<f64> {
    let n = spectrum.len();
    let mut packed = vec![0.0; n];
    for (k, value) in spectrum.iter().enumerate().take(packed_bin_count(n)) {
        let (re, im) = packed_positions(n, k);
        packed[re] = value.re;
        if let Some(im) = im {
            packed[im] = value.im;
        }
    }
    packed
}

/// Non-redundant bins of a packed spectrum.
pub fn unpack_real_spectrum(packed: &[f64]) -> Vec<Complex64> {
    let n = packed.len();
    (0..packed_bin_count(n))
        .map(|k| {
            let (re, im) = packed_positions(n, k);
            Complex64::new(packed[re], im.map_or(0.0, |i| packed[i]))
        })
        .collect()
}

pub fn fft_real_parts(packed: &[f64]) -> Vec<f64> {
    unpack_real_spectrum(packed).iter().map(|c| c.re).collect()
}

pub fn fft_imaginary_parts(packed: &[f64]) -> Vec<f64> {
    unpack_real_spectrum(packed).iter().map(|c| c.im).collect()
}

pub fn fft_magnitudes(packed: &[f64]) -> Vec<f64> {
    unpack_real_spectrum(packed).iter().map(|c| c.norm()).collect()
}

pub fn fft_squared_magnitudes(packed: &[f64]) -> Vec<f64> {
    unpack_real_spectrum(packed).iter().map(|c| c.norm_sqr()).collect()
}

/// Zero every bin of a packed spectrum outside `[low_bin, high_bin]`.
pub fn freq_band_pass_filter(packed: &[f64], low_bin: usize, high_bin: usize) -> Vec<f64> {
    let n = packed.len();
    let mut filtered = vec![0.0; n];
    let last_bin = packed_bin_count(n).saturating_sub(1);
    if n == 0 || low_bin > last_bin {
        return filtered;
    }
    for k in low_bin..=high_bin.min(last_bin) {
        let (re, im) = packed_positions(n, k);
        filtered[re] = packed[re];
        if let Some(im) = im {
            filtered[im] = packed[im];
        }
    }
    filtered
}

// ============================================================================
// Tests
// ============================================================================
