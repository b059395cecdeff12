//! Peak extraction inside the movement window

use crate::baseline::Baseline;
use crate::peaks::{argmax_abs, find_peaks};
use crate::segmentation::MovementWindow;
use imu_core::{Axis, ChannelStats, MotionChannels};
use serde::{Deserialize, Serialize};

/// Strongest acceleration deviation on one upright axis
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeakRecord {
    pub axis: Axis,
    pub index: usize,
    /// Upright acceleration at the peak (m/s²)
    pub value: f64,
    /// Baseline mean of the axis (m/s²)
    pub baseline: f64,
    /// `value - baseline`
    pub deviation: f64,
    pub time: f64,
    /// Seconds since the baseline window start
    pub time_from_baseline: f64,
}

/// Largest angular rate on one upright axis
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GyroPeak {
    pub axis: Axis,
    pub index: usize,
    /// Signed angular rate (°/s)
    pub value: f64,
    pub time: f64,
    /// Seconds since the movement start
    pub time_from_start: f64,
}

/// Largest combined angular-rate magnitude
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GyroMagnitudePeak {
    pub index: usize,
    /// `sqrt(gx² + gy² + gz²)` (°/s)
    pub magnitude: f64,
    pub time: f64,
    pub time_from_start: f64,
}

/// Everything measured inside one movement window
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepKinematics {
    /// Mean upright acceleration per axis over the window
    pub mean_accel: [Option<f64>; 3],
    pub accel_peaks: [Option<PeakRecord>; 3],
    pub gyro_peaks: [Option<GyroPeak>; 3],
    pub gyro_magnitude: Option<GyroMagnitudePeak>,
}

impl StepKinematics {
    pub fn accel_peak(&self, axis: Axis) -> Option<&PeakRecord> {
        self.accel_peaks[axis.index()].as_ref()
    }

    pub fn gyro_peak(&self, axis: Axis) -> Option<&GyroPeak> {
        self.gyro_peaks[axis.index()].as_ref()
    }
}

/// Peak extraction parameters derived from the sampling rate
#[derive(Debug, Clone, Copy)]
pub struct PeakExtractor {
    /// Minimum distance between acceleration peaks (samples)
    pub peak_distance: usize,
}

impl PeakExtractor {
    pub fn new(sampling_rate: f64) -> Self {
        PeakExtractor {
            peak_distance: ((sampling_rate / 2.0).floor() as usize).max(1),
        }
    }

    /// Measure every axis over the inclusive window
    pub fn extract(&self, upright: &MotionChannels, baseline: &Baseline, window: &MovementWindow) -> StepKinematics {
        let start = window.start_index();
        let end = window.end_index().min(upright.len().saturating_sub(1));
        if upright.is_empty() || start > end {
            return StepKinematics {
                mean_accel: [None; 3],
                accel_peaks: [None; 3],
                gyro_peaks: [None; 3],
                gyro_magnitude: None,
            };
        }

        let range = start..=end;
        let mean_accel = Axis::ALL.map(|axis| {
            ChannelStats::calculate(&upright.accel_axis(axis)[range.clone()]).map(|stats| stats.mean)
        });
        let accel_peaks = Axis::ALL.map(|axis| self.accel_peak(upright, baseline, axis, start, end));
        let gyro_peaks = Axis::ALL.map(|axis| gyro_peak(upright, axis, start, end));

        StepKinematics {
            mean_accel,
            accel_peaks,
            gyro_peaks,
            gyro_magnitude: gyro_magnitude_peak(upright, start, end),
        }
    }

    fn accel_peak(
        &self,
        upright: &MotionChannels,
        baseline: &Baseline,
        axis: Axis,
        start: usize,
        end: usize,
    ) -> Option<PeakRecord> {
        let values = &upright.accel_axis(axis)[start..=end];
        let deviation: Vec<f64> = values.iter()
            .map(|&v| baseline.deviation(axis, v).abs())
            .collect();

        let peaks = find_peaks(&deviation, self.peak_distance);
        let best = peaks[argmax_abs(peaks.iter().map(|&p| deviation[p]))?];

        let index = start + best;
        let value = values[best];
        let time = upright.time[index];
        Some(PeakRecord {
            axis,
            index,
            value,
            baseline: baseline.mean(axis),
            deviation: baseline.deviation(axis, value),
            time,
            time_from_baseline: time - upright.time[baseline.window.start],
        })
    }
}

fn gyro_peak(upright: &MotionChannels, axis: Axis, start: usize, end: usize) -> Option<GyroPeak> {
    let values = &upright.gyro_axis(axis)[start..=end];
    let best = argmax_abs(values.iter().copied())?;

    let index = start + best;
    let time = upright.time[index];
    Some(GyroPeak {
        axis,
        index,
        value: values[best],
        time,
        time_from_start: time - upright.time[start],
    })
}

fn gyro_magnitude_peak(upright: &MotionChannels, start: usize, end: usize) -> Option<GyroMagnitudePeak> {
    let magnitudes: Vec<f64> = (start..=end)
        .map(|i| {
            let [gx, gy, gz] = upright.gyro_vector(i);
            (gx * gx + gy * gy + gz * gz).sqrt()
        })
        .collect();
    let best = argmax_abs(magnitudes.iter().copied())?;

    let index = start + best;
    let time = upright.time[index];
    Some(GyroMagnitudePeak {
        index,
        magnitude: magnitudes[best],
        time,
        time_from_start: time - upright.time[start],
    })
}
