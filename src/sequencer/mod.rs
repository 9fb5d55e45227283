//! Sliding-window driver over multi-channel waveform data
//!
//! The schedule is anchored on the modal waveform start time (the jitter
//! base). Each window takes, per channel, the first waveform whose rate is
//! within tolerance, whose sample grid sits less than half a sample off the
//! base grid, and which covers the whole window once snapped onto it.

use chrono::{DateTime, Duration, Utc};
use rayon::prelude::*;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::beamforming::{ChannelWindow, SpectralBeamformer};
use crate::error::{FkError, FkResult};
use crate::processing::condition;
use crate::types::time::{sample_period, secs_between};
use crate::types::{ChannelSegment, FkSpectrum, Waveform};

/// Largest tolerated offset from the base grid, in samples.
const MAX_JITTER_SAMPLES: f64 = 0.5;

/// Conditioned waveforms of one channel.
struct PreparedChannel<'a> {
    name: &'a str,
    waveforms: Vec<Waveform>,
}

/// Window anchors derived from the data.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSchedule {
    /// Modal start time of in-tolerance waveforms
    pub jitter_base: DateTime<Utc>,
    /// Modal end time of in-tolerance waveforms
    pub end_time: DateTime<Utc>,
    pub window_starts: Vec<DateTime<Utc>>,
}

pub struct FkWindowSequencer {
    beamformer: SpectralBeamformer,
}

impl FkWindowSequencer {
    pub fn new(beamformer: SpectralBeamformer) -> Self {
        Self { beamformer }
    }

    pub fn beamformer(&self) -> &SpectralBeamformer {
        &self.beamformer
    }

    /// Compute the chronologically ordered spectra over every admissible
    /// window. Windows without enough usable channels are dropped.
    pub fn generate_fk(
        &self,
        channel_segments: Option<&[ChannelSegment<Waveform>]>,
    ) -> FkResult<Vec<FkSpectrum>> {
        let segments = channel_segments
            .ok_or_else(|| FkError::NullArgument("channel segments are required".to_string()))?;
        self.validate(segments)?;

        let definition = self.beamformer.definition();
        let normalize = definition.normalize_waveforms();
        let prepared: Vec<PreparedChannel<'_>> = segments
            .iter()
            .map(|segment| PreparedChannel {
                name: segment.channel_name(),
                waveforms: segment
                    .timeseries
                    .iter()
                    .map(|wf| wf.with_samples(condition(&wf.samples, normalize)))
                    .collect(),
            })
            .collect();

        let Some(schedule) = self.schedule(segments)? else {
            return Ok(Vec::new());
        };
        let window_length = definition.window_length();
        let base = schedule.jitter_base;

        let results: Vec<FkResult<Option<FkSpectrum>>> = schedule
            .window_starts
            .par_iter()
            .map(|&start| {
                let end = start + window_length;
                let windows: Vec<ChannelWindow> = prepared
                    .iter()
                    .filter_map(|channel| self.select_window(channel, base, start, end))
                    .collect();
                self.beamformer.compute_conditioned_window(&windows, start, end)
            })
            .collect();

        let mut spectra = Vec::with_capacity(results.len());
        for result in results {
            if let Some(spectrum) = result? {
                spectra.push(spectrum);
            }
        }
        info!(
            windows = schedule.window_starts.len(),
            spectra = spectra.len(),
            channels = segments.len(),
            "Generated FK spectra"
        );
        Ok(spectra)
    }

    /// Naive window start times: every window that fits before the modal
    /// end time, before any per-window channel filtering.
    pub fn window_starts(&self, channel_segments: &[ChannelSegment<Waveform>]) -> FkResult<Vec<DateTime<Utc>>> {
        Ok(self
            .schedule(channel_segments)?
            .map(|s| s.window_starts)
            .unwrap_or_default())
    }

    /// Derive the window schedule. `None` when no waveform is within rate
    /// tolerance or the first window does not fit.
    pub fn schedule(&self, channel_segments: &[ChannelSegment<Waveform>]) -> FkResult<Option<WindowSchedule>> {
        let definition = self.beamformer.definition();
        let in_tolerance: Vec<&Waveform> = channel_segments
            .iter()
            .flat_map(|segment| segment.timeseries.iter())
            .filter(|wf| definition.accepts_sample_rate(wf.sample_rate_hz))
            .collect();

        let (Some(jitter_base), Some(end_time)) = (
            modal_time(in_tolerance.iter().map(|wf| wf.start_time)),
            modal_time(in_tolerance.iter().map(|wf| wf.end_time())),
        ) else {
            warn!("No waveforms within sample rate tolerance");
            return Ok(None);
        };

        let window_lead = definition.window_lead();
        let window_length = definition.window_length();
        if jitter_base + window_length > end_time {
            warn!(
                jitter_base = %jitter_base,
                end_time = %end_time,
                "Initial window extends beyond the end of the waveforms"
            );
            return Ok(None);
        }

        let period = sample_period(definition.sample_rate_hz());
        if period <= Duration::zero() {
            return Err(FkError::InvalidArgument(format!(
                "output sample rate {} Hz is too high to schedule windows",
                definition.sample_rate_hz()
            )));
        }

        let mut window_starts = Vec::new();
        let mut fk_time = jitter_base + window_lead;
        let mut window_start = jitter_base;
        while window_start + window_length <= end_time {
            window_starts.push(window_start);
            fk_time += period;
            window_start = fk_time - window_lead;
        }

        Ok(Some(WindowSchedule {
            jitter_base,
            end_time,
            window_starts,
        }))
    }

    fn validate(&self, segments: &[ChannelSegment<Waveform>]) -> FkResult<()> {
        if segments.is_empty() {
            return Err(FkError::InvalidArgument(
                "at least one channel segment is required".to_string(),
            ));
        }
        self.beamformer
            .check_channels(segments.iter().map(ChannelSegment::channel_name))
    }

    /// First waveform of `channel` usable for `[start, end]`, snapped onto
    /// the base grid and trimmed to the window.
    fn select_window(
        &self,
        channel: &PreparedChannel<'_>,
        base: DateTime<Utc>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Option<ChannelWindow> {
        let definition = self.beamformer.definition();
        let selected = channel
            .waveforms
            .iter()
            .filter(|wf| definition.accepts_sample_rate(wf.sample_rate_hz))
            .filter_map(|wf| snap_to_grid(wf, base))
            .find(|wf| wf.covers(start, end));
        let Some(snapped) = selected else {
            debug!(channel = channel.name, window_start = %start, "No usable waveform for window");
            return None;
        };
        snapped
            .trim(start, end)
            .map(|trimmed| ChannelWindow::new(channel.name, trimmed))
    }
}

/// Most frequent instant; ties resolve to the earliest.
fn modal_time(times: impl Iterator<Item = DateTime<Utc>>) -> Option<DateTime<Utc>> {
    let mut counts: BTreeMap<DateTime<Utc>, usize> = BTreeMap::new();
    for t in times {
        *counts.entry(t).or_default() += 1;
    }
    let mut best: Option<(DateTime<Utc>, usize)> = None;
    for (time, count) in counts {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((time, count));
        }
    }
    best.map(|(time, _)| time)
}

/// Shift `wf` so its samples fall on the grid through `base`. `None` when
/// the offset is half a sample or more.
fn snap_to_grid(wf: &Waveform, base: DateTime<Utc>) -> Option<Waveform> {
    if wf.start_time == base {
        return Some(wf.clone());
    }
    let offset_samples = secs_between(base, wf.start_time) * wf.sample_rate_hz;
    let jitter = offset_samples - offset_samples.round();
    if jitter.abs() >= MAX_JITTER_SAMPLES {
        return None;
    }
    let shift_nanos = (jitter / wf.sample_rate_hz * 1.0e9).round() as i64;
    Some(wf.shifted(-Duration::nanoseconds(shift_nanos)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use crate::beamforming::tests::{array_positions, plane_wave};
    use crate::beamforming::BeamformerKind;
    use crate::types::{reference_params, Channel, FkSpectraDefinition, Units};

    const SLOW_EAST: f64 = 0.1;
    const SLOW_NORTH: f64 = -0.2;

    fn epoch() -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH
    }

    fn definition() -> FkSpectraDefinition {
        let mut params = reference_params();
        params.slow_count_x = 21;
        params.slow_start_x_sec_per_km = -0.4;
        params.slow_delta_x_sec_per_km = 0.04;
        params.slow_count_y = 21;
        params.slow_start_y_sec_per_km = -0.4;
        params.slow_delta_y_sec_per_km = 0.04;
        FkSpectraDefinition::new(params).expect("valid")
    }

    fn sequencer_for(definition: FkSpectraDefinition) -> FkWindowSequencer {
        let bf = SpectralBeamformer::new(
            definition,
            5.8,
            array_positions().into_iter().collect(),
            BeamformerKind::Conventional,
        )
        .expect("valid");
        FkWindowSequencer::new(bf)
    }

    fn segment(name: &str, waveforms: Vec<Waveform>) -> ChannelSegment<Waveform> {
        let channel = Channel::raw(name, "ASAR", 40.0, epoch());
        ChannelSegment::from_timeseries(channel, Units::Nanometers, waveforms, epoch()).expect("valid")
    }

    /// 10 s of plane wave per channel: 7 windows of 4 s at 1 Hz.
    fn segments(count: usize) -> Vec<ChannelSegment<Waveform>> {
        array_positions()
            .iter()
            .take(count)
            .map(|(name, pos)| {
                segment(name, vec![plane_wave(pos, epoch(), 40.0, 401, SLOW_EAST, SLOW_NORTH)])
            })
            .collect()
    }

    #[test]
    fn test_null_and_empty_rejected() {
        let seq = sequencer_for(definition());
        assert!(matches!(seq.generate_fk(None), Err(FkError::NullArgument(_))));
        assert!(matches!(seq.generate_fk(Some(&[])), Err(FkError::InvalidArgument(_))));
    }

    #[test]
    fn test_duplicate_channel_rejected() {
        let seq = sequencer_for(definition());
        let mut segs = segments(3);
        segs.push(segs[0].clone());
        let err = seq.generate_fk(Some(&segs)).expect_err("duplicate");
        assert!(matches!(err, FkError::InvalidArgument(ref m) if m.contains("duplicate")));
    }

    #[test]
    fn test_unknown_geometry_rejected() {
        let seq = sequencer_for(definition());
        let mut segs = segments(3);
        segs.push(segment("ASAR.XX01.SHZ", segs[0].timeseries.clone()));
        assert!(seq.generate_fk(Some(&segs)).is_err());
    }

    #[test]
    fn test_window_schedule() {
        let seq = sequencer_for(definition());
        let starts = seq.window_starts(&segments(7)).expect("schedule");
        assert_eq!(starts.len(), 7);
        assert_eq!(starts[0], epoch());
        assert_eq!(starts[6], epoch() + Duration::seconds(6));
    }

    #[test]
    fn test_window_lead_offsets_fk_times_not_windows() {
        let def = definition().with_window_lead(Duration::seconds(1)).expect("valid");
        let seq = sequencer_for(def);
        let starts = seq.window_starts(&segments(7)).expect("schedule");
        assert_eq!(starts.len(), 7);
        assert_eq!(starts[0], epoch());
    }

    #[test]
    fn test_generates_one_spectrum_per_window() {
        let seq = sequencer_for(definition());
        let spectra = seq.generate_fk(Some(&segments(7))).expect("spectra");
        assert_eq!(spectra.len(), 7);
        assert!(spectra.iter().all(|s| s.shape() == (21, 21)));
    }

    #[test]
    fn test_output_independent_of_input_order() {
        let seq = sequencer_for(definition());
        let forward = seq.generate_fk(Some(&segments(7))).expect("spectra");
        let mut reversed = segments(7);
        reversed.reverse();
        let backward = seq.generate_fk(Some(&reversed)).expect("spectra");
        assert_eq!(forward.len(), backward.len());
        for (a, b) in forward.iter().zip(&backward) {
            for (ra, rb) in a.power.iter().zip(&b.power) {
                for (x, y) in ra.iter().zip(rb) {
                    assert!((x - y).abs() <= 1e-9 * x.abs().max(1.0));
                }
            }
        }
    }

    #[test]
    fn test_out_of_tolerance_channel_excluded() {
        let seq = sequencer_for(definition());
        let mut segs = segments(3);
        let wf = &segs[2].timeseries[0];
        let off_rate = Waveform::new(wf.start_time, 20.0, wf.samples.clone()).expect("valid");
        segs[2] = segment(segs[2].channel_name(), vec![off_rate]);
        let spectra = seq.generate_fk(Some(&segs)).expect("spectra");
        assert_eq!(spectra.len(), 7, "two in-tolerance channels still meet the minimum");
    }

    #[test]
    fn test_all_out_of_tolerance_yields_empty() {
        let seq = sequencer_for(definition());
        let segs: Vec<_> = segments(3)
            .into_iter()
            .map(|s| {
                let wf = &s.timeseries[0];
                let off = Waveform::new(wf.start_time, 20.0, wf.samples.clone()).expect("valid");
                segment(s.channel_name(), vec![off])
            })
            .collect();
        assert!(seq.generate_fk(Some(&segs)).expect("ok").is_empty());
    }

    #[test]
    fn test_gap_below_minimum_drops_windows() {
        let seq = sequencer_for(definition());
        let mut segs = segments(2);
        // second channel has no samples strictly between 4 s and 6 s
        let wf = segs[1].timeseries[0].clone();
        let head = wf.trim(epoch(), epoch() + Duration::seconds(4)).expect("head");
        let tail = wf
            .trim(epoch() + Duration::seconds(6), epoch() + Duration::seconds(10))
            .expect("tail");
        segs[1] = segment(segs[1].channel_name(), vec![head, tail]);

        let naive = seq.window_starts(&segs).expect("schedule").len();
        let spectra = seq.generate_fk(Some(&segs)).expect("spectra");
        // windows starting at 0 s and 6 s survive; 1-5 s overlap the gap
        assert_eq!(naive, 7);
        assert_eq!(spectra.len(), 2);
    }

    #[test]
    fn test_gap_with_enough_channels_keeps_windows() {
        let seq = sequencer_for(definition());
        let mut segs = segments(3);
        let wf = segs[2].timeseries[0].clone();
        let head = wf.trim(epoch(), epoch() + Duration::seconds(3)).expect("head");
        segs[2] = segment(segs[2].channel_name(), vec![head]);
        assert_eq!(seq.generate_fk(Some(&segs)).expect("spectra").len(), 7);
    }

    #[test]
    fn test_first_window_not_fitting_is_empty() {
        let seq = sequencer_for(definition());
        let segs: Vec<_> = array_positions()
            .iter()
            .take(3)
            .map(|(name, pos)| segment(name, vec![plane_wave(pos, epoch(), 40.0, 100, 0.0, 0.0)]))
            .collect();
        assert!(seq.generate_fk(Some(&segs)).expect("ok").is_empty());
    }

    #[test]
    fn test_normalization_changes_values_not_count() {
        let plain = sequencer_for(definition());
        let normalized = sequencer_for(definition().with_normalize_waveforms(true));
        let segs: Vec<_> = segments(4)
            .into_iter()
            .enumerate()
            .map(|(i, s)| {
                let wf = &s.timeseries[0];
                let scaled = wf.with_samples(wf.samples.iter().map(|x| x * (1.0 + i as f64)).collect());
                segment(s.channel_name(), vec![scaled])
            })
            .collect();
        let a = plain.generate_fk(Some(&segs)).expect("spectra");
        let b = normalized.generate_fk(Some(&segs)).expect("spectra");
        assert_eq!(a.len(), b.len());
        assert_ne!(a[0].power, b[0].power);
    }

    #[test]
    fn test_sub_half_sample_jitter_absorbed() {
        let seq = sequencer_for(definition());
        let mut segs = segments(2);
        let (name, pos) = &array_positions()[2];
        // 10 ms late at 40 Hz: 0.4 samples
        let late = plane_wave(pos, epoch(), 40.0, 401, SLOW_EAST, SLOW_NORTH)
            .shifted(Duration::milliseconds(10));
        segs.push(segment(name, vec![late]));

        let spectra = seq.generate_fk(Some(&segs)).expect("spectra");
        assert_eq!(spectra.len(), 7);
        let baseline = seq.generate_fk(Some(&segments(3))).expect("spectra");
        assert_eq!(baseline.len(), spectra.len());

        for (jittered, aligned) in spectra.iter().zip(&baseline) {
            assert_eq!(jittered.quality, aligned.quality);
            let cells = |s: &FkSpectrum| -> Vec<f64> {
                s.power.iter().chain(&s.fstat).flatten().copied().collect()
            };
            for (a, b) in cells(jittered).into_iter().zip(cells(aligned)) {
                if b.is_nan() {
                    assert!(a.is_nan());
                } else {
                    assert_relative_eq!(a, b, epsilon = 1e-12, max_relative = 1e-9);
                }
            }
        }
    }

    #[test]
    fn test_jitter_beyond_half_sample_rejects_channel() {
        let wf = Waveform::new(epoch(), 40.0, vec![0.0; 10]).expect("valid");
        assert!(snap_to_grid(&wf.shifted(Duration::milliseconds(10)), epoch()).is_some());
        assert!(snap_to_grid(&wf.shifted(Duration::microseconds(12_500)), epoch()).is_none());
        let snapped = snap_to_grid(&wf.shifted(Duration::milliseconds(-35)), epoch()).expect("snaps");
        assert_eq!(snapped.start_time, epoch() - Duration::milliseconds(25));
    }

    #[test]
    fn test_modal_time_ties_resolve_earliest() {
        let t = |s| epoch() + Duration::seconds(s);
        assert_eq!(modal_time([t(5), t(3), t(5), t(3)].into_iter()), Some(t(3)));
        assert_eq!(modal_time([t(5), t(3), t(5)].into_iter()), Some(t(5)));
        assert_eq!(modal_time(std::iter::empty()), None);
    }
}
