//! Pre-event baseline window and per-axis resting levels

use imu_core::{Axis, ChannelStats, ImuResult, MotionChannels};
use serde::{Deserialize, Serialize};

/// Half-open sample range `[start, end)` preceding an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaselineWindow {
    pub start: usize,
    pub end: usize,
}

impl BaselineWindow {
    /// Up to `size` samples ending just before `event`
    pub fn ending_at(event: usize, size: usize) -> Self {
        BaselineWindow {
            start: event.saturating_sub(size),
            end: event,
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Mean of a channel over the window; `None` when empty
    pub fn mean_of(&self, channel: &[f64]) -> Option<f64> {
        channel.get(self.start..self.end)
            .and_then(ChannelStats::calculate)
            .map(|stats| stats.mean)
    }
}

/// Resting acceleration per upright axis
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub window: BaselineWindow,
    /// Mean upright acceleration per axis (m/s²)
    pub means: [f64; 3],
    /// Per-axis deviation threshold (m/s²)
    pub threshold: f64,
}

impl Baseline {
    /// Per-axis means of the upright acceleration over `window`
    pub fn estimate(upright: &MotionChannels, window: BaselineWindow, threshold: f64) -> ImuResult<Self> {
        let mut means = [0.0; 3];
        for axis in Axis::ALL {
            means[axis.index()] = window.mean_of(upright.accel_axis(axis)).ok_or_else(|| {
                imu_core::malformed!("empty baseline window [{}, {})", window.start, window.end)
            })?;
        }

        Ok(Baseline { window, means, threshold })
    }

    pub fn mean(&self, axis: Axis) -> f64 {
        self.means[axis.index()]
    }

    /// Signed deviation of `value` from the axis baseline
    pub fn deviation(&self, axis: Axis, value: f64) -> f64 {
        value - self.mean(axis)
    }

    /// Every axis strictly inside the threshold
    pub fn is_within(&self, accel: [f64; 3]) -> bool {
        Axis::ALL.iter()
            .all(|&axis| self.deviation(axis, accel[axis.index()]).abs() < self.threshold)
    }

    /// Any axis strictly beyond the threshold
    pub fn is_exceeded(&self, accel: [f64; 3]) -> bool {
        Axis::ALL.iter()
            .any(|&axis| self.deviation(axis, accel[axis.index()]).abs() > self.threshold)
    }
}
