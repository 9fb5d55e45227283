//! Spectral beamformer: one FK power spectrum per waveform window
//!
//! Each contributing channel is transformed once; every slowness grid
//! point then steers the in-band bins by the plane-wave delay at that
//! channel's relative position and evaluates the beam power with the
//! configured estimator. Rows of the grid are evaluated in parallel.

mod power;
mod quality;

pub use power::{f_statistic, WindowSpectra, DIAGONAL_LOADING};
pub use quality::{local_peaks, spectrum_quality};

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::error::{FkError, FkResult};
use crate::processing::{condition, fft_freq, find_bin_indices, FftProcessor};
use crate::types::{FkSpectraDefinition, FkSpectrum, RelativePosition, Waveform};

/// Below this value of `1/v^2 - sx^2 - sy^2` the vertical slowness is
/// treated as evanescent.
pub const EVANESCENT_THRESHOLD: f64 = 1.0e-5;

/// Beam power estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BeamformerKind {
    /// Delay-and-sum (Bartlett) power
    Conventional,
    /// Capon minimum-variance power with diagonal loading
    MinimumVariance,
}

impl std::fmt::Display for BeamformerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BeamformerKind::Conventional => write!(f, "conventional"),
            BeamformerKind::MinimumVariance => write!(f, "minimum-variance"),
        }
    }
}

/// One channel's waveform for the window being evaluated.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelWindow {
    pub channel_name: String,
    pub waveform: Waveform,
}

impl ChannelWindow {
    pub fn new(channel_name: impl Into<String>, waveform: Waveform) -> Self {
        Self {
            channel_name: channel_name.into(),
            waveform,
        }
    }
}

/// Computes FK spectra for a fixed definition and array geometry.
#[derive(Debug, Clone)]
pub struct SpectralBeamformer {
    definition: FkSpectraDefinition,
    medium_velocity_km_per_sec: f64,
    relative_positions: HashMap<String, RelativePosition>,
    kind: BeamformerKind,
}

impl SpectralBeamformer {
    /// `tuning_constant` is the medium velocity (km/s) used for the
    /// vertical slowness when channel vertical offsets are enabled.
    pub fn new(
        definition: FkSpectraDefinition,
        tuning_constant: f64,
        relative_positions_by_channel: HashMap<String, RelativePosition>,
        kind: BeamformerKind,
    ) -> FkResult<Self> {
        if !(tuning_constant.is_finite() && tuning_constant > 0.0) {
            return Err(FkError::InvalidArgument(format!(
                "medium velocity must be > 0 km/s, got {tuning_constant}"
            )));
        }
        if relative_positions_by_channel.is_empty() {
            return Err(FkError::InvalidArgument(
                "beamformer requires at least one channel position".to_string(),
            ));
        }
        Ok(Self {
            definition,
            medium_velocity_km_per_sec: tuning_constant,
            relative_positions: relative_positions_by_channel,
            kind,
        })
    }

    pub fn definition(&self) -> &FkSpectraDefinition {
        &self.definition
    }

    pub fn kind(&self) -> BeamformerKind {
        self.kind
    }

    pub fn medium_velocity_km_per_sec(&self) -> f64 {
        self.medium_velocity_km_per_sec
    }

    pub fn relative_position(&self, channel_name: &str) -> Option<&RelativePosition> {
        self.relative_positions.get(channel_name)
    }

    /// Compute the spectrum of one window.
    ///
    /// Returns `Ok(None)` when fewer than the minimum number of channels are
    /// usable (out-of-tolerance rate, gap over the window) or the window
    /// holds no in-band frequency bin.
    pub fn compute_window(
        &self,
        channel_windows: &[ChannelWindow],
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> FkResult<Option<FkSpectrum>> {
        self.compute(
            channel_windows,
            window_start,
            window_end,
            self.definition.normalize_waveforms(),
        )
    }

    /// As [`compute_window`](Self::compute_window) for waveforms already
    /// demeaned and normalized over their full extent.
    pub(crate) fn compute_conditioned_window(
        &self,
        channel_windows: &[ChannelWindow],
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> FkResult<Option<FkSpectrum>> {
        self.compute(channel_windows, window_start, window_end, false)
    }

    /// Fail on duplicate channels or channels with no known position.
    pub fn check_channels<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> FkResult<()> {
        let mut seen = HashSet::new();
        for name in names {
            if !self.relative_positions.contains_key(name) {
                return Err(FkError::InvalidArgument(format!(
                    "unknown channel geometry for {name}"
                )));
            }
            if !seen.insert(name) {
                return Err(FkError::InvalidArgument(format!("duplicate channel {name}")));
            }
        }
        Ok(())
    }

    fn compute(
        &self,
        channel_windows: &[ChannelWindow],
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        condition_windows: bool,
    ) -> FkResult<Option<FkSpectrum>> {
        self.check_channels(channel_windows.iter().map(|w| w.channel_name.as_str()))?;

        let mut usable: Vec<(RelativePosition, Vec<f64>)> = Vec::with_capacity(channel_windows.len());
        for window in channel_windows {
            let wf = &window.waveform;
            if !self.definition.accepts_sample_rate(wf.sample_rate_hz) {
                debug!(
                    channel = %window.channel_name,
                    sample_rate_hz = wf.sample_rate_hz,
                    "Channel sample rate outside tolerance, skipping"
                );
                continue;
            }
            if !wf.covers(window_start, window_end) {
                debug!(channel = %window.channel_name, "Channel does not cover window, skipping");
                continue;
            }
            let Some(trimmed) = wf.trim(window_start, window_end) else {
                continue;
            };
            let Some(position) = self.relative_positions.get(&window.channel_name) else {
                continue;
            };
            let samples = if condition_windows {
                condition(&trimmed.samples, true)
            } else {
                trimmed.samples
            };
            usable.push((*position, samples));
        }

        if usable.len() < self.definition.minimum_waveforms_for_spectra() {
            debug!(
                usable = usable.len(),
                required = self.definition.minimum_waveforms_for_spectra(),
                window_start = %window_start,
                "Too few usable channels for window"
            );
            return Ok(None);
        }

        self.evaluate(usable)
    }

    fn evaluate(&self, usable: Vec<(RelativePosition, Vec<f64>)>) -> FkResult<Option<FkSpectrum>> {
        // Channels can differ by one sample when their grids straddle an edge
        let n = usable.iter().map(|(_, s)| s.len()).min().unwrap_or(0);
        if n == 0 {
            return Ok(None);
        }

        let freqs = fft_freq(n, self.definition.waveform_sample_rate_hz() / n as f64);
        let band = find_bin_indices(
            &freqs,
            self.definition.low_frequency_hz(),
            self.definition.high_frequency_hz(),
        );
        if band.is_empty() {
            debug!(samples = n, "No frequency bins inside the band");
            return Ok(None);
        }

        let processor = FftProcessor::new(n)?;
        let mut positions = Vec::with_capacity(usable.len());
        let mut bins = Vec::with_capacity(usable.len());
        for (position, samples) in usable {
            let spectrum = processor.process(&samples[..n])?;
            bins.push(band.iter().map(|&j| spectrum[j]).collect::<Vec<_>>());
            positions.push(position);
        }
        let spectra = WindowSpectra {
            bins,
            freqs: band.iter().map(|&j| freqs[j]).collect(),
            sample_count: n,
        };
        let average_power = spectra.average_power();
        // Capon power stays below the loaded covariance's mean diagonal
        let reference_power = match self.kind {
            BeamformerKind::Conventional => average_power,
            BeamformerKind::MinimumVariance => average_power * (1.0 + DIAGONAL_LOADING),
        };
        let m = spectra.channel_count();

        let rows: Vec<(Vec<f64>, Vec<f64>)> = (0..self.definition.slow_count_y())
            .into_par_iter()
            .map(|row| {
                let sy = self.definition.slowness_y(row);
                let mut delays = vec![0.0; positions.len()];
                let mut power_row = Vec::with_capacity(self.definition.slow_count_x());
                let mut fstat_row = Vec::with_capacity(self.definition.slow_count_x());
                for col in 0..self.definition.slow_count_x() {
                    let sx = self.definition.slowness_x(col);
                    let power = match self.vertical_slowness(sx, sy) {
                        Some(sz) => {
                            for (delay, pos) in delays.iter_mut().zip(&positions) {
                                *delay = pos.delay_secs(sx, sy, sz);
                            }
                            match self.kind {
                                BeamformerKind::Conventional => spectra.delay_and_sum(&delays),
                                BeamformerKind::MinimumVariance => spectra.minimum_variance(&delays),
                            }
                        }
                        None => f64::NAN,
                    };
                    power_row.push(power);
                    fstat_row.push(f_statistic(power, reference_power, m));
                }
                (power_row, fstat_row)
            })
            .collect();

        let (power, fstat): (Vec<_>, Vec<_>) = rows.into_iter().unzip();
        let quality = spectrum_quality(&power);
        FkSpectrum::new(power, fstat, quality).map(Some)
    }

    /// Vertical slowness at `(sx, sy)`; `None` when evanescent.
    fn vertical_slowness(&self, sx: f64, sy: f64) -> Option<f64> {
        if !self.definition.use_channel_vertical_offsets() {
            return Some(0.0);
        }
        let v = self.medium_velocity_km_per_sec;
        let q = 1.0 / (v * v) - sx * sx - sy * sy;
        if q < EVANESCENT_THRESHOLD {
            None
        } else {
            Some(q.sqrt())
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::types::reference_params;
    use chrono::Duration;
    use std::f64::consts::TAU;

    /// Seven-element array, roughly 3 km aperture.
    pub(crate) fn array_positions() -> Vec<(String, RelativePosition)> {
        [
            ("AS01", 0.0, 0.0),
            ("AS02", 1.5, 0.2),
            ("AS03", 0.3, 1.6),
            ("AS04", -1.2, 0.9),
            ("AS05", -1.0, -1.1),
            ("AS06", 0.6, -1.5),
            ("AS07", 1.8, -0.9),
        ]
        .into_iter()
        .map(|(site, north, east)| {
            (format!("ASAR.{site}.SHZ"), RelativePosition::new(north, east, 0.0))
        })
        .collect()
    }

    /// Sum of two tones inside 1.2-1.8 Hz, delayed for the given slowness.
    pub(crate) fn plane_wave(
        position: &RelativePosition,
        start: DateTime<Utc>,
        rate: f64,
        count: usize,
        slow_east: f64,
        slow_north: f64,
    ) -> Waveform {
        let delay = position.delay_secs(slow_east, slow_north, 0.0);
        let samples = (0..count)
            .map(|i| {
                let t = i as f64 / rate - delay;
                (TAU * 1.5 * t).sin() + 0.5 * (TAU * 1.25 * t + 0.3).sin()
            })
            .collect();
        Waveform::new(start, rate, samples).expect("valid waveform")
    }

    fn small_definition() -> FkSpectraDefinition {
        let mut params = reference_params();
        params.slow_count_x = 41;
        params.slow_start_x_sec_per_km = -0.4;
        params.slow_delta_x_sec_per_km = 0.02;
        params.slow_count_y = 41;
        params.slow_start_y_sec_per_km = -0.4;
        params.slow_delta_y_sec_per_km = 0.02;
        FkSpectraDefinition::new(params).expect("valid")
    }

    fn beamformer(kind: BeamformerKind) -> SpectralBeamformer {
        SpectralBeamformer::new(
            small_definition(),
            5.8,
            array_positions().into_iter().collect(),
            kind,
        )
        .expect("valid beamformer")
    }

    fn windows(slow_east: f64, slow_north: f64) -> Vec<ChannelWindow> {
        let t0 = DateTime::<Utc>::UNIX_EPOCH;
        array_positions()
            .iter()
            .map(|(name, pos)| ChannelWindow::new(name.clone(), plane_wave(pos, t0, 40.0, 161, slow_east, slow_north)))
            .collect()
    }

    fn peak_cell(grid: &[Vec<f64>]) -> (usize, usize) {
        let mut best = (0, 0);
        let mut best_value = f64::NEG_INFINITY;
        for (r, row) in grid.iter().enumerate() {
            for (c, &v) in row.iter().enumerate() {
                if v > best_value {
                    best_value = v;
                    best = (r, c);
                }
            }
        }
        best
    }

    fn window_end() -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH + Duration::seconds(4)
    }

    #[test]
    fn test_spectrum_has_grid_shape() {
        let bf = beamformer(BeamformerKind::Conventional);
        let spectrum = bf
            .compute_window(&windows(0.1, 0.1), DateTime::<Utc>::UNIX_EPOCH, window_end())
            .expect("computes")
            .expect("enough channels");
        assert_eq!(spectrum.shape(), (41, 41));
        assert_eq!(spectrum.fstat.len(), 41);
        assert!((1..=4).contains(&spectrum.quality));
    }

    #[test]
    fn test_conventional_peak_recovers_slowness() {
        let bf = beamformer(BeamformerKind::Conventional);
        // east 0.1, north -0.2 s/km
        let spectrum = bf
            .compute_window(&windows(0.1, -0.2), DateTime::<Utc>::UNIX_EPOCH, window_end())
            .expect("computes")
            .expect("enough channels");
        let (r, c) = peak_cell(&spectrum.power);
        let def = bf.definition();
        assert!((def.slowness_x(c) - 0.1).abs() < 1e-9, "east slowness {}", def.slowness_x(c));
        assert!((def.slowness_y(r) + 0.2).abs() < 1e-9, "north slowness {}", def.slowness_y(r));
    }

    #[test]
    fn test_minimum_variance_peak_recovers_slowness() {
        let bf = beamformer(BeamformerKind::MinimumVariance);
        let spectrum = bf
            .compute_window(&windows(-0.16, 0.06), DateTime::<Utc>::UNIX_EPOCH, window_end())
            .expect("computes")
            .expect("enough channels");
        let (r, c) = peak_cell(&spectrum.power);
        let def = bf.definition();
        assert!((def.slowness_x(c) + 0.16).abs() < 1e-9);
        assert!((def.slowness_y(r) - 0.06).abs() < 1e-9);
    }

    #[test]
    fn test_minimum_variance_fstat_is_finite_on_coherent_wave() {
        let bf = beamformer(BeamformerKind::MinimumVariance);
        let spectrum = bf
            .compute_window(&windows(0.12, 0.04), DateTime::<Utc>::UNIX_EPOCH, window_end())
            .expect("computes")
            .expect("enough channels");
        for row in &spectrum.fstat {
            assert!(row.iter().all(|f| f.is_finite() && *f >= 0.0), "row {row:?}");
        }
        let (r, c) = peak_cell(&spectrum.fstat);
        let def = bf.definition();
        assert!((def.slowness_x(c) - 0.12).abs() < 1e-9);
        assert!((def.slowness_y(r) - 0.04).abs() < 1e-9);
    }

    #[test]
    fn test_too_few_channels_is_none() {
        let bf = beamformer(BeamformerKind::Conventional);
        let one = windows(0.0, 0.0).into_iter().take(1).collect::<Vec<_>>();
        let result = bf
            .compute_window(&one, DateTime::<Utc>::UNIX_EPOCH, window_end())
            .expect("no error");
        assert!(result.is_none());
    }

    #[test]
    fn test_out_of_tolerance_channel_filtered() {
        let bf = beamformer(BeamformerKind::Conventional);
        let mut ws = windows(0.0, 0.0).into_iter().take(2).collect::<Vec<_>>();
        let wf = &ws[1].waveform;
        ws[1].waveform = Waveform::new(wf.start_time, 41.0, wf.samples.clone()).expect("valid");
        let result = bf
            .compute_window(&ws, DateTime::<Utc>::UNIX_EPOCH, window_end())
            .expect("no error");
        assert!(result.is_none(), "only one channel is within tolerance");
    }

    #[test]
    fn test_gap_over_window_filters_channel() {
        let bf = beamformer(BeamformerKind::Conventional);
        let mut ws = windows(0.0, 0.0).into_iter().take(2).collect::<Vec<_>>();
        ws[0].waveform = ws[0].waveform.with_samples(ws[0].waveform.samples[..100].to_vec());
        let result = bf
            .compute_window(&ws, DateTime::<Utc>::UNIX_EPOCH, window_end())
            .expect("no error");
        assert!(result.is_none());
    }

    #[test]
    fn test_unknown_and_duplicate_channels_rejected() {
        let bf = beamformer(BeamformerKind::Conventional);
        let mut ws = windows(0.0, 0.0);
        ws.push(ws[0].clone());
        let err = bf
            .compute_window(&ws, DateTime::<Utc>::UNIX_EPOCH, window_end())
            .expect_err("duplicate");
        assert!(matches!(err, FkError::InvalidArgument(ref m) if m.contains("duplicate")));

        let mut ws = windows(0.0, 0.0);
        ws[0].channel_name = "ASAR.XX99.SHZ".to_string();
        let err = bf
            .compute_window(&ws, DateTime::<Utc>::UNIX_EPOCH, window_end())
            .expect_err("unknown");
        assert!(matches!(err, FkError::InvalidArgument(ref m) if m.contains("geometry")));
    }

    #[test]
    fn test_evanescent_region_is_nan() {
        let mut params = small_definition().params().clone();
        params.use_channel_vertical_offsets = true;
        let def = FkSpectraDefinition::new(params).expect("valid");
        // 1/v = 0.2 s/km: grid corners at |s| = 0.57 are evanescent
        let bf = SpectralBeamformer::new(
            def,
            5.0,
            array_positions().into_iter().collect(),
            BeamformerKind::Conventional,
        )
        .expect("valid");
        let spectrum = bf
            .compute_window(&windows(0.0, 0.0), DateTime::<Utc>::UNIX_EPOCH, window_end())
            .expect("computes")
            .expect("enough channels");
        assert!(spectrum.power[0][0].is_nan());
        assert!(spectrum.fstat[0][0].is_nan());
        assert!(spectrum.power[20][20].is_finite());
    }

    #[test]
    fn test_normalization_changes_values_not_shape() {
        let t0 = DateTime::<Utc>::UNIX_EPOCH;
        let mut ws = windows(0.05, 0.05);
        for (i, w) in ws.iter_mut().enumerate() {
            let gain = 1.0 + i as f64;
            let samples = w.waveform.samples.iter().map(|x| x * gain + 3.0).collect();
            w.waveform = w.waveform.with_samples(samples);
        }
        let plain = beamformer(BeamformerKind::Conventional);
        let normalized = SpectralBeamformer::new(
            plain.definition().with_normalize_waveforms(true),
            5.8,
            array_positions().into_iter().collect(),
            BeamformerKind::Conventional,
        )
        .expect("valid");
        let a = plain.compute_window(&ws, t0, window_end()).expect("ok").expect("some");
        let b = normalized.compute_window(&ws, t0, window_end()).expect("ok").expect("some");
        assert_eq!(a.shape(), b.shape());
        assert_ne!(a.power, b.power);
    }

    #[test]
    fn test_rejects_bad_tuning_constant() {
        let result = SpectralBeamformer::new(
            small_definition(),
            0.0,
            array_positions().into_iter().collect(),
            BeamformerKind::Conventional,
        );
        assert!(result.is_err());
    }
}
