//! Spectrum quality grading from the separation of its strongest peaks

/// Peak ratio thresholds (log10) for grades 1, 2 and 3.
const GRADE_1_LOG_RATIO: f64 = 0.6;
const GRADE_2_LOG_RATIO: f64 = 0.4;
const GRADE_3_LOG_RATIO: f64 = 0.1;

/// Grade a power grid from 1 (one dominant peak) to 4 (ambiguous).
///
/// NaN cells count as zero. A cell is a local peak when it is `>=` every
/// existing 8-neighbour, so plateaus produce several peaks. The last row and
/// the last column are never candidates. The grade follows the ratio of the
/// largest peak to the second largest (taken as 0 when there is only one).
pub fn spectrum_quality(power: &[Vec<f64>]) -> u8 {
    let peaks = local_peaks(power);
    let Some(&largest) = peaks.first() else {
        return 4;
    };
    let second = peaks.get(1).copied().unwrap_or(0.0);
    let ratio = largest / second;

    if ratio >= 10f64.powf(GRADE_1_LOG_RATIO) {
        1
    } else if ratio >= 10f64.powf(GRADE_2_LOG_RATIO) {
        2
    } else if ratio >= 10f64.powf(GRADE_3_LOG_RATIO) {
        3
    } else {
        4
    }
}

/// Local peak values, descending. Candidates exclude the last row and the
/// last column.
pub fn local_peaks(power: &[Vec<f64>]) -> Vec<f64> {
    let rows = power.len();
    let cols = power.first().map_or(0, Vec::len);
    let value = |r: usize, c: usize| {
        let v = power[r][c];
        if v.is_nan() {
            0.0
        } else {
            v
        }
    };

    let mut peaks = Vec::new();
    for r in 0..rows.saturating_sub(1) {
        for c in 0..cols.saturating_sub(1) {
            let centre = value(r, c);
            let is_peak = (r.saturating_sub(1)..=r + 1).all(|nr| {
                (c.saturating_sub(1)..=c + 1)
                    .all(|nc| (nr == r && nc == c) || value(nr, nc) <= centre)
            });
            if is_peak {
                peaks.push(centre);
            }
        }
    }
    peaks.sort_by(|a, b| b.total_cmp(a));
    peaks
}
