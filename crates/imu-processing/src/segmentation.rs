//! Movement window around the event.
//!
//! Samples before the window are resting, samples inside it are the rising
//! movement, samples from the end on have recovered to the baseline.
//!
//! The start is found in two phases. Walking backwards from the event, an
//! anchor is a sample whose trailing quiet period (every axis inside the
//! threshold) is long enough. From the nearest such anchor the first sample
//! exceeding the threshold before the event is the movement start. Anchors
//! whose forward search finds nothing are skipped in favour of older ones.

use crate::baseline::Baseline;
use imu_core::MotionChannels;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// How the movement start was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StartBoundary {
    /// First threshold crossing after a quiet anchor
    Detected { anchor: usize, index: usize },
    /// No quiet anchor followed by a crossing; the baseline start is used
    FallbackBaselineStart { index: usize },
}

/// How the movement end was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndBoundary {
    /// First sample at or after the event with every axis back inside the threshold
    Detected { index: usize },
    /// Never settled; the last sample is used
    FallbackLastSample { index: usize },
}

impl StartBoundary {
    pub fn index(&self) -> usize {
        match *self {
            StartBoundary::Detected { index, .. } | StartBoundary::FallbackBaselineStart { index } => index,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, StartBoundary::FallbackBaselineStart { .. })
    }
}

impl EndBoundary {
    pub fn index(&self) -> usize {
        match *self {
            EndBoundary::Detected { index } | EndBoundary::FallbackLastSample { index } => index,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, EndBoundary::FallbackLastSample { .. })
    }
}

/// Phase of a sample relative to the movement window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MovementPhase {
    Baseline,
    Rising,
    Recovered,
}

/// Inclusive sample range `[start, end]` of one step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementWindow {
    pub start: StartBoundary,
    pub end: EndBoundary,
    /// Event index the search was anchored on
    pub event: usize,
}

impl MovementWindow {
    pub fn start_index(&self) -> usize {
        self.start.index()
    }

    pub fn end_index(&self) -> usize {
        self.end.index()
    }

    /// Number of samples in the window
    pub fn len(&self) -> usize {
        self.end_index() - self.start_index() + 1
    }

    /// Window reduced to one sample
    pub fn is_degenerate(&self) -> bool {
        self.start_index() == self.end_index()
    }

    pub fn phase(&self, index: usize) -> MovementPhase {
        if index < self.start_index() {
            MovementPhase::Baseline
        } else if index < self.end_index() {
            MovementPhase::Rising
        } else {
            MovementPhase::Recovered
        }
    }

    /// Time between start and end samples
    pub fn duration(&self, time: &[f64]) -> f64 {
        time[self.end_index()] - time[self.start_index()]
    }
}

/// Per-sample threshold classification of the upright acceleration
struct DeviationMap {
    within: Vec<bool>,
    exceeded: Vec<bool>,
}

impl DeviationMap {
    fn new(upright: &MotionChannels, baseline: &Baseline) -> Self {
        let (within, exceeded) = (0..upright.len())
            .map(|i| {
                let accel = upright.accel_vector(i);
                (baseline.is_within(accel), baseline.is_exceeded(accel))
            })
            .unzip();

        DeviationMap { within, exceeded }
    }

    /// Length of the run of in-threshold samples ending at each index
    fn quiet_runs(&self) -> Vec<usize> {
        let mut run = 0;
        self.within.iter()
            .map(|&within| {
                run = if within { run + 1 } else { 0 };
                run
            })
            .collect()
    }
}

/// Find the movement start for the event at `event`
pub fn find_movement_start(
    upright: &MotionChannels,
    baseline: &Baseline,
    event: usize,
    stable_samples: usize,
) -> StartBoundary {
    let map = DeviationMap::new(upright, baseline);
    start_from_map(&map, baseline.window.start, event, stable_samples)
}

fn start_from_map(map: &DeviationMap, baseline_start: usize, event: usize, stable_samples: usize) -> StartBoundary {
    let fallback = StartBoundary::FallbackBaselineStart { index: baseline_start };
    if event >= map.within.len() {
        return fallback;
    }

    let runs = map.quiet_runs();

    // next_crossing[k]: first exceeding index in [k, event)
    let mut next_crossing = vec![None; event + 1];
    for k in (0..event).rev() {
        next_crossing[k] = if map.exceeded[k] { Some(k) } else { next_crossing[k + 1] };
    }

    for anchor in (baseline_start + 1..=event).rev() {
        if anchor + 1 < stable_samples || runs[anchor] < stable_samples {
            continue;
        }

        if let Some(index) = next_crossing.get(anchor + 1).copied().flatten() {
            return StartBoundary::Detected { anchor, index };
        }
    }

    fallback
}

/// Find the movement end for the event at `event`
pub fn find_movement_end(upright: &MotionChannels, baseline: &Baseline, event: usize) -> EndBoundary {
    let last = upright.len().saturating_sub(1);

    (event..upright.len())
        .find(|&i| baseline.is_within(upright.accel_vector(i)))
        .map(|index| EndBoundary::Detected { index })
        .unwrap_or(EndBoundary::FallbackLastSample { index: last })
}

/// Movement window around `event`
pub fn segment(upright: &MotionChannels, baseline: &Baseline, event: usize, stable_samples: usize) -> MovementWindow {
    let start = find_movement_start(upright, baseline, event, stable_samples);
    let end = find_movement_end(upright, baseline, event);

    debug!(?start, ?end, event, "movement window");

    MovementWindow { start, end, event }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baseline::BaselineWindow;
    use approx::assert_relative_eq;

    fn channels(az: Vec<f64>) -> MotionChannels {
        let n = az.len();
        MotionChannels {
            time: (0..n).map(|i| i as f64 / 100.0).collect(),
            accel: [vec![0.0; n], vec![0.0; n], az],
            gyro: [vec![0.0; n], vec![0.0; n], vec![0.0; n]],
        }
    }

    fn baseline(window: BaselineWindow) -> Baseline {
        Baseline { window, means: [0.0; 3], threshold: 0.4 }
    }

    /// Rest, ramp 300..310 to 5, hold 4 with a spike of 5 at 350, ramp down to 0 at 398
    fn step_profile() -> Vec<f64> {
        let mut az = vec![0.0; 500];
        for k in 0..=10 {
            az[300 + k] = 0.5 * k as f64;
        }
        for value in &mut az[311..391] {
            *value = 4.0;
        }
        az[350] = 5.0;
        for k in 0..=8 {
            az[390 + k] = 4.0 - 0.5 * k as f64;
        }
        az
    }

    #[test]
    fn test_step_scenario() {
        let upright = channels(step_profile());
        let base = baseline(BaselineWindow::ending_at(350, 200));

        let window = segment(&upright, &base, 350, 100);

        assert_eq!(window.start, StartBoundary::Detected { anchor: 300, index: 301 });
        assert_eq!(window.end, EndBoundary::Detected { index: 398 });
        assert_relative_eq!(window.duration(&upright.time), 0.97, epsilon = 1e-9);
        assert_eq!(window.len(), 98);
        assert_eq!(window.phase(200), MovementPhase::Baseline);
        assert_eq!(window.phase(350), MovementPhase::Rising);
        assert_eq!(window.phase(450), MovementPhase::Recovered);
    }

    #[test]
    fn test_crossing_at_event_is_excluded() {
        // Single-sample spike at the event, nothing else crosses
        let mut az = vec![0.0; 300];
        az[200] = 3.0;
        let upright = channels(az);
        let base = baseline(BaselineWindow::ending_at(200, 200));

        let start = find_movement_start(&upright, &base, 200, 100);
        assert_eq!(start, StartBoundary::FallbackBaselineStart { index: 0 });
        assert!(start.is_fallback());

        let end = find_movement_end(&upright, &base, 200);
        assert_eq!(end, EndBoundary::Detected { index: 201 });
    }

    #[test]
    fn test_short_quiet_runs_are_not_anchors() {
        // Quiet until 150, disturbance 150..=160, quiet again until the event at 180.
        // Anchors 161..=180 lack a full quiet period; the nearest valid anchor is 149.
        let mut az = vec![0.0; 260];
        for value in &mut az[150..=160] {
            *value = 1.0;
        }
        az[180] = 2.0;
        let upright = channels(az);
        let base = baseline(BaselineWindow::ending_at(180, 200));

        let start = find_movement_start(&upright, &base, 180, 100);
        assert_eq!(start, StartBoundary::Detected { anchor: 149, index: 150 });
    }

    #[test]
    fn test_older_anchor_used_when_nearest_has_no_crossing() {
        // Anchors 301..=399 are quiet but nothing crosses between them and the event
        let mut az = vec![0.0; 500];
        az[200] = 1.0;
        az[400] = 2.0;
        let upright = channels(az);

        let wide = baseline(BaselineWindow::ending_at(400, 300));
        let start = find_movement_start(&upright, &wide, 400, 100);
        assert_eq!(start, StartBoundary::Detected { anchor: 199, index: 200 });

        // Same data, older anchors outside the scan range
        let narrow = baseline(BaselineWindow::ending_at(400, 200));
        let start = find_movement_start(&upright, &narrow, 400, 100);
        assert_eq!(start, StartBoundary::FallbackBaselineStart { index: 200 });
    }

    #[test]
    fn test_anchor_needs_full_history() {
        // Event too close to the beginning for any quiet period
        let mut az = vec![0.0; 200];
        for value in &mut az[40..60] {
            *value = 2.0;
        }
        let upright = channels(az);
        let base = baseline(BaselineWindow::ending_at(50, 200));

        let start = find_movement_start(&upright, &base, 50, 100);
        assert_eq!(start, StartBoundary::FallbackBaselineStart { index: 0 });
    }

    #[test]
    fn test_end_falls_back_to_last_sample() {
        let mut az = vec![0.0; 200];
        for value in &mut az[100..] {
            *value = 2.0;
        }
        let upright = channels(az);
        let base = baseline(BaselineWindow::ending_at(150, 200));

        let end = find_movement_end(&upright, &base, 150);
        assert_eq!(end, EndBoundary::FallbackLastSample { index: 199 });
        assert!(end.is_fallback());
    }

    #[test]
    fn test_window_bounds_are_ordered() {
        let upright = channels(step_profile());
        for event in [320, 350, 380] {
            let base = baseline(BaselineWindow::ending_at(event, 200));
            let window = segment(&upright, &base, event, 100);

            assert!(window.start_index() <= event);
            assert!(event <= window.end_index());
            assert!(window.end_index() < upright.len());
        }
    }
}
