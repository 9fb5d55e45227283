//! Peak-picking attribute extractors

use super::{FkAttributeExtractor, FkSpectraInfo};
use crate::error::FkResult;
use crate::types::{FkAttributes, FkSpectrum};

/// Attributes at the maximum of the power grid.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaxPowerAttributes;

/// Attributes at the maximum of the F-statistic grid.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaxFstatAttributes;

impl MaxPowerAttributes {
    pub const NAME: &'static str = "maxPowerFkAttributes";
}

impl MaxFstatAttributes {
    pub const NAME: &'static str = "maxFstatFkAttributes";
}

impl FkAttributeExtractor for MaxPowerAttributes {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn extract(&self, info: &FkSpectraInfo, spectrum: &FkSpectrum) -> FkResult<Option<FkAttributes>> {
        Ok(argmax(&spectrum.power).map(|(row, col)| attributes_at(info, spectrum, row, col)))
    }
}

impl FkAttributeExtractor for MaxFstatAttributes {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn extract(&self, info: &FkSpectraInfo, spectrum: &FkSpectrum) -> FkResult<Option<FkAttributes>> {
        Ok(argmax(&spectrum.fstat).map(|(row, col)| attributes_at(info, spectrum, row, col)))
    }
}

/// Cell of the largest non-NaN value (first in row-major order on ties).
fn argmax(grid: &[Vec<f64>]) -> Option<(usize, usize)> {
    let mut best: Option<((usize, usize), f64)> = None;
    for (r, row) in grid.iter().enumerate() {
        for (c, &v) in row.iter().enumerate() {
            if v.is_nan() {
                continue;
            }
            if best.map_or(true, |(_, b)| v > b) {
                best = Some(((r, c), v));
            }
        }
    }
    best.map(|(cell, _)| cell)
}

fn attributes_at(info: &FkSpectraInfo, spectrum: &FkSpectrum, row: usize, col: usize) -> FkAttributes {
    let sx = info.east_slowness(col);
    let sy = info.north_slowness(row);
    let slowness = sx.hypot(sy);
    let azimuth = sx.atan2(sy).to_degrees().rem_euclid(360.0);

    let peak_fstat = spectrum.fstat[row][col];
    let widening = if peak_fstat.is_finite() {
        1.0 / peak_fstat.max(1.0).sqrt()
    } else if peak_fstat > 0.0 {
        0.0
    } else {
        1.0
    };
    let slowness_uncertainty =
        info.east_slow_delta.hypot(info.north_slow_delta) / 2.0 * widening;
    let azimuth_uncertainty = if slowness > 0.0 {
        (slowness_uncertainty / slowness).atan().to_degrees()
    } else {
        180.0
    };

    FkAttributes {
        azimuth_deg: azimuth,
        slowness_sec_per_km: slowness,
        azimuth_uncertainty_deg: azimuth_uncertainty,
        slowness_uncertainty_sec_per_km: slowness_uncertainty,
        peak_fstat,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(count: usize) -> FkSpectraInfo {
        FkSpectraInfo {
            low_frequency_hz: 1.0,
            high_frequency_hz: 2.0,
            east_slow_start: -0.2,
            east_slow_delta: 0.1,
            north_slow_start: -0.2,
            north_slow_delta: 0.1,
            north_slow_count: count,
        }
    }

    fn spectrum_with_peak(row: usize, col: usize, fstat: f64) -> FkSpectrum {
        let mut power = vec![vec![0.1; 5]; 5];
        power[row][col] = 1.0;
        let mut f = vec![vec![0.5; 5]; 5];
        f[row][col] = fstat;
        FkSpectrum::new(power, f, 1).expect("valid")
    }

    #[test]
    fn test_azimuth_conventions() {
        // row 0 = north edge (+0.2), col 4 = east edge (+0.2)
        let cases = [
            ((0, 2), 0.0),   // due north
            ((2, 4), 90.0),  // due east
            ((4, 2), 180.0), // due south
            ((2, 0), 270.0), // due west
        ];
        for ((r, c), azimuth) in cases {
            let attrs = MaxPowerAttributes
                .extract(&info(5), &spectrum_with_peak(r, c, 16.0))
                .expect("extracts")
            .expect("peak");
            assert!((attrs.azimuth_deg - azimuth).abs() < 1e-9, "cell ({r},{c})");
            assert!((attrs.slowness_sec_per_km - 0.2).abs() < 1e-9);
        }
    }

    #[test]
    fn test_uncertainty_shrinks_with_fstat() {
        let weak = MaxPowerAttributes
            .extract(&info(5), &spectrum_with_peak(0, 2, 1.0))
            .expect("extracts")
            .expect("peak");
        let strong = MaxPowerAttributes
            .extract(&info(5), &spectrum_with_peak(0, 2, 16.0))
            .expect("extracts")
            .expect("peak");
        let quantisation = 0.1_f64.hypot(0.1) / 2.0;
        assert!((weak.slowness_uncertainty_sec_per_km - quantisation).abs() < 1e-12);
        assert!((strong.slowness_uncertainty_sec_per_km - quantisation / 4.0).abs() < 1e-12);
        assert!(strong.azimuth_uncertainty_deg < weak.azimuth_uncertainty_deg);
        assert_eq!(strong.peak_fstat, 16.0);
    }

    #[test]
    fn test_zero_slowness_has_full_azimuth_uncertainty() {
        let attrs = MaxPowerAttributes
            .extract(&info(5), &spectrum_with_peak(2, 2, 4.0))
            .expect("extracts")
            .expect("peak");
        assert!(attrs.slowness_sec_per_km.abs() < 1e-12);
        assert_eq!(attrs.azimuth_uncertainty_deg, 180.0);
    }

    #[test]
    fn test_nan_cells_skipped() {
        let mut spectrum = spectrum_with_peak(1, 1, 3.0);
        spectrum.power[0][0] = f64::NAN;
        spectrum.fstat[0][0] = f64::NAN;
        let attrs = MaxFstatAttributes
            .extract(&info(5), &spectrum)
            .expect("extracts")
            .expect("peak");
        assert_eq!(attrs.peak_fstat, 3.0);
    }

    #[test]
    fn test_all_nan_grid_has_no_peak() {
        let nan = vec![vec![f64::NAN; 2]; 2];
        let spectrum = FkSpectrum::new(nan.clone(), nan, 4).expect("valid");
        assert!(MaxPowerAttributes.extract(&info(2), &spectrum).expect("ok").is_none());
        assert!(MaxFstatAttributes.extract(&info(2), &spectrum).expect("ok").is_none());
    }
}
