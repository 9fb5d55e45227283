//! Beam power estimators evaluated at one steering point

use nalgebra::{Cholesky, DMatrix, DVector};
use num_complex::Complex64;
use std::f64::consts::TAU;

/// Diagonal loading factor, relative to the mean channel power.
pub const DIAGONAL_LOADING: f64 = 0.1;

/// In-band spectra of the channels contributing to one window.
pub struct WindowSpectra {
    /// `bins[k][j]`: channel `k`, in-band bin `j`
    pub bins: Vec<Vec<Complex64>>,
    /// Signed frequency (Hz) of each in-band bin
    pub freqs: Vec<f64>,
    /// Samples per channel window
    pub sample_count: usize,
}

impl WindowSpectra {
    pub fn channel_count(&self) -> usize {
        self.bins.len()
    }

    fn norm(&self) -> f64 {
        let n = self.sample_count as f64;
        n * n
    }

    /// Mean single-channel power `sum_k sum_f |X_k(f)|^2 / M / N^2`.
    pub fn average_power(&self) -> f64 {
        let total: f64 = self
            .bins
            .iter()
            .flat_map(|channel| channel.iter().map(|x| x.norm_sqr()))
            .sum();
        total / self.channel_count() as f64 / self.norm()
    }

    fn steered<'a>(&'a self, bin: usize, delays: &'a [f64]) -> impl Iterator<Item = Complex64> + 'a {
        let f = self.freqs[bin];
        self.bins
            .iter()
            .zip(delays)
            .map(move |(channel, &tau)| channel[bin] * Complex64::from_polar(1.0, TAU * f * tau))
    }

    /// Delay-and-sum power `(1/N^2) sum_f |(1/M) sum_k X_k(f) e^{i 2 pi f tau_k}|^2`.
    pub fn delay_and_sum(&self, delays: &[f64]) -> f64 {
        let m = self.channel_count() as f64;
        let total: f64 = (0..self.freqs.len())
            .map(|j| (self.steered(j, delays).sum::<Complex64>() / m).norm_sqr())
            .sum();
        total / self.norm()
    }

    /// Capon power `1 / (1^H R^-1 1)` over the diagonally loaded steered
    /// covariance. NaN when the loaded matrix is not positive definite.
    pub fn minimum_variance(&self, delays: &[f64]) -> f64 {
        let m = self.channel_count();
        let mut covariance = DMatrix::<Complex64>::zeros(m, m);
        for j in 0..self.freqs.len() {
            let y = DVector::from_iterator(m, self.steered(j, delays));
            covariance += &y * y.adjoint();
        }
        covariance.unscale_mut(self.norm());

        let loading = DIAGONAL_LOADING * covariance.trace().re / m as f64;
        for i in 0..m {
            covariance[(i, i)] += Complex64::new(loading, 0.0);
        }

        let Some(cholesky) = Cholesky::new(covariance) else {
            return f64::NAN;
        };
        let ones = DVector::from_element(m, Complex64::new(1.0, 0.0));
        let solved = cholesky.solve(&ones);
        let denominator = ones.dotc(&solved).re;
        if denominator > 0.0 && denominator.is_finite() {
            1.0 / denominator
        } else {
            f64::NAN
        }
    }
}

/// F-statistic `(M - 1) P / (P_avg - P)`. A non-positive denominator with
/// positive power means perfect coherence and maps to infinity.
pub fn f_statistic(power: f64, average_power: f64, channel_count: usize) -> f64 {
    if power.is_nan() {
        return f64::NAN;
    }
    let denominator = average_power - power;
    if denominator <= 0.0 {
        return if power > 0.0 { f64::INFINITY } else { f64::NAN };
    }
    (channel_count as f64 - 1.0) * power / denominator
}
