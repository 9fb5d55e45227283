//! Waveform amplitude conditioning applied before beamforming

/// Subtract the arithmetic mean. Empty input is returned unchanged.
pub fn demean(samples: &[f64]) -> Vec<f64> {
    if samples.is_empty() {
        return Vec::new();
    }
    let mean = samples.iter().sum::<f64>() / samples.len() as f64;
    samples.iter().map(|x| x - mean).collect()
}

/// Scale so the largest absolute sample is 1. An all-zero signal is
/// returned unchanged.
pub fn max_amplitude_normalize(samples: &[f64]) -> Vec<f64> {
    let peak = samples.iter().fold(0.0_f64, |acc, x| acc.max(x.abs()));
    if peak == 0.0 || !peak.is_finite() {
        return samples.to_vec();
    }
    samples.iter().map(|x| x / peak).collect()
}

/// Demean, then optionally max-amplitude normalize.
pub fn condition(samples: &[f64], normalize: bool) -> Vec<f64> {
    let demeaned = demean(samples);
    if normalize {
        max_amplitude_normalize(&demeaned)
    } else {
        demeaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demean() {
        let out = demean(&[1.0, 2.0, 3.0, 6.0]);
        assert_eq!(out, vec![-2.0, -1.0, 0.0, 3.0]);
        assert!(demean(&[]).is_empty());
    }

    #[test]
    fn test_max_amplitude_normalize_uses_absolute_peak() {
        let out = max_amplitude_normalize(&[1.0, -4.0, 2.0]);
        assert_eq!(out, vec![0.25, -1.0, 0.5]);
    }

    #[test]
    fn test_normalize_all_zero_is_identity() {
        assert_eq!(max_amplitude_normalize(&[0.0, 0.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn test_condition() {
        let raw = [10.0, 12.0, 14.0];
        assert_eq!(condition(&raw, false), vec![-2.0, 0.0, 2.0]);
        assert_eq!(condition(&raw, true), vec![-1.0, 0.0, 1.0]);
    }
}
