//! Dominant event detection and gravity alignment.
//!
//! The resting acceleration before the dominant event gives the gravity
//! direction in the sensor frame. A single rotation maps it onto +Z and is
//! applied to both acceleration and angular rate, yielding the upright frame.
//! The angular-rate rotation is a static-frame approximation: it ignores the
//! orientation change during the movement itself.

use crate::baseline::BaselineWindow;
use crate::config::DetectionSettings;
use crate::peaks::{find_peaks, prominences, top_by_magnitude};
use imu_core::{Axis, ImuError, ImuResult, MotionChannels};
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Below this cross-product norm gravity is treated as collinear with Z
const COLLINEAR_EPSILON: f64 = 1e-9;

/// Latest of the strongest peaks across the acceleration axes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DominantEvent {
    /// Sample index of the event
    pub index: usize,
    /// Axis that contributed the event
    pub axis: Axis,
    /// Ranked candidates per axis (x, y, z)
    pub candidates: [Vec<usize>; 3],
}

impl DominantEvent {
    /// Rank peaks on each axis by magnitude and keep the latest candidate
    /// overall. Ties go to the larger index, then the later axis.
    ///
    /// Peaks less prominent than `min_prominence` times the most prominent
    /// peak on any axis are not candidates; 0 keeps every peak.
    pub fn detect(accel: &[Vec<f64>; 3], distance: usize, per_axis: usize, min_prominence: f64) -> Option<Self> {
        let peaks = [0, 1, 2].map(|axis| find_peaks(&accel[axis], distance));
        let prominence = [0, 1, 2].map(|axis| prominences(&accel[axis], &peaks[axis]));
        let floor = min_prominence * prominence.iter().flatten().copied().fold(0.0, f64::max);

        let candidates = [0, 1, 2].map(|axis| {
            let significant: Vec<usize> = peaks[axis].iter()
                .zip(&prominence[axis])
                .filter(|&(_, &p)| p >= floor)
                .map(|(&peak, _)| peak)
                .collect();
            top_by_magnitude(&accel[axis], &significant, per_axis)
        });

        let (axis, index) = Axis::ALL.iter()
            .filter_map(|&axis| {
                candidates[axis.index()].iter().max().map(|&index| (axis, index))
            })
            .max_by_key(|&(axis, index)| (index, axis.index()))?;

        Some(DominantEvent { index, axis, candidates })
    }
}

/// Sensor-to-upright rotation and the gravity estimate it came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GravityAlignment {
    /// Baseline window the gravity estimate was averaged over
    pub window: BaselineWindow,
    /// Mean filtered acceleration over the window (m/s²)
    pub mean_accel: [f64; 3],
    /// Unit gravity direction in the sensor frame
    pub gravity: [f64; 3],
    /// Row-major rotation taking `gravity` onto +Z
    pub rotation: [[f64; 3]; 3],
}

impl GravityAlignment {
    /// Estimate gravity over `window` of the filtered channels
    pub fn estimate(filtered: &MotionChannels, window: BaselineWindow) -> ImuResult<Self> {
        if window.is_empty() {
            return Err(ImuError::GravityUndefined);
        }

        let mut mean_accel = [0.0; 3];
        for axis in Axis::ALL {
            mean_accel[axis.index()] = window.mean_of(filtered.accel_axis(axis))
                .ok_or(ImuError::GravityUndefined)?;
        }

        let mean = Vector3::from(mean_accel);
        let norm = mean.norm();
        if !(norm.is_finite() && norm > 0.0) {
            return Err(ImuError::GravityUndefined);
        }

        let gravity = mean / norm;
        let rotation = rotation_to_vertical(&gravity);
        debug!(gravity = ?gravity.as_slice(), "gravity direction estimated");

        Ok(GravityAlignment {
            window,
            mean_accel,
            gravity: gravity.into(),
            rotation: rotation_rows(&rotation),
        })
    }

    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        Matrix3::from_fn(|r, c| self.rotation[r][c])
    }

    /// Rotate every acceleration and angular-rate sample into the upright frame
    pub fn to_upright(&self, channels: &MotionChannels) -> MotionChannels {
        let rotation = self.rotation_matrix();
        let mut upright = channels.clone();

        for i in 0..channels.len() {
            let accel = rotation * Vector3::from(channels.accel_vector(i));
            let gyro = rotation * Vector3::from(channels.gyro_vector(i));
            for axis in 0..3 {
                upright.accel[axis][i] = accel[axis];
                upright.gyro[axis][i] = gyro[axis];
            }
        }

        upright
    }
}

/// Rotation taking the unit vector `gravity` onto +Z (Rodrigues form)
pub fn rotation_to_vertical(gravity: &Vector3<f64>) -> Matrix3<f64> {
    let z = Vector3::z();
    let v = gravity.cross(&z);
    let s = v.norm();
    let c = gravity.dot(&z);

    if s < COLLINEAR_EPSILON {
        return if c > 0.0 {
            Matrix3::identity()
        } else {
            // Upside down: half turn about X
            Matrix3::from_diagonal(&Vector3::new(1.0, -1.0, -1.0))
        };
    }

    let vx = v.cross_matrix();
    Matrix3::identity() + vx + vx * vx * ((1.0 - c) / (s * s))
}

fn rotation_rows(rotation: &Matrix3<f64>) -> [[f64; 3]; 3] {
    [0, 1, 2].map(|r| [rotation[(r, 0)], rotation[(r, 1)], rotation[(r, 2)]])
}

/// Search the event again on the upright axes.
///
/// Returns the refined index only when it lies in `[window.start, last]`.
pub fn refine_event(upright: &MotionChannels, window: BaselineWindow, settings: &DetectionSettings) -> Option<usize> {
    let event = DominantEvent::detect(
        &upright.accel,
        settings.refine_peak_distance,
        settings.candidate_peaks_per_axis,
        settings.min_candidate_prominence,
    )?;

    (window.start..upright.len()).contains(&event.index).then_some(event.index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn still_channels(accel: [f64; 3], n: usize) -> MotionChannels {
        MotionChannels {
            time: (0..n).map(|i| i as f64 * 0.01).collect(),
            accel: accel.map(|v| vec![v; n]),
            gyro: [vec![0.0; n], vec![0.0; n], vec![1.0; n]],
        }
    }

    fn pulse(n: usize, at: usize, height: f64) -> Vec<f64> {
        (0..n).map(|i| {
            let d = i as f64 - at as f64;
            height * (-d * d / 50.0).exp()
        }).collect()
    }

    #[test]
    fn test_upright_gravity_is_identity() {
        let rotation = rotation_to_vertical(&Vector3::new(0.0, 0.0, 1.0));
        assert_relative_eq!(rotation, Matrix3::identity(), epsilon = 1e-12);
    }

    #[test]
    fn test_x_gravity_maps_to_z() {
        let channels = still_channels([9.81, 0.0, 0.0], 50);
        let alignment = GravityAlignment::estimate(&channels, BaselineWindow::ending_at(50, 200)).unwrap();
        let upright = alignment.to_upright(&channels);

        assert_relative_eq!(upright.accel[0][10], 0.0, epsilon = 1e-9);
        assert_relative_eq!(upright.accel[1][10], 0.0, epsilon = 1e-9);
        assert_relative_eq!(upright.accel[2][10], 9.81, epsilon = 1e-9);

        // Rotation is orthonormal
        let r = alignment.rotation_matrix();
        assert_relative_eq!(r * r.transpose(), Matrix3::identity(), epsilon = 1e-12);
        assert_relative_eq!(r.determinant(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_tilted_gravity() {
        let g = Vector3::new(1.0, -2.0, 3.0).normalize();
        let rotated = rotation_to_vertical(&g) * g;
        assert_relative_eq!(rotated, Vector3::z(), epsilon = 1e-12);
    }

    #[test]
    fn test_inverted_gravity() {
        let rotation = rotation_to_vertical(&Vector3::new(0.0, 0.0, -1.0));
        assert_relative_eq!(rotation * Vector3::new(0.0, 0.0, -9.81), Vector3::new(0.0, 0.0, 9.81));

        let channels = still_channels([0.0, 0.0, -9.81], 20);
        let alignment = GravityAlignment::estimate(&channels, BaselineWindow::ending_at(20, 200)).unwrap();
        let upright = alignment.to_upright(&channels);
        // Angular rate rotated with the same matrix
        assert_relative_eq!(upright.gyro[2][0], -1.0);
    }

    #[test]
    fn test_zero_baseline_is_undefined() {
        let channels = still_channels([0.0, 0.0, 0.0], 20);
        let error = GravityAlignment::estimate(&channels, BaselineWindow::ending_at(20, 200)).unwrap_err();
        assert_eq!(error, ImuError::GravityUndefined);
    }

    #[test]
    fn test_dominant_event_latest_candidate() {
        let n = 600;
        let mut x = pulse(n, 100, 8.0);
        for (value, extra) in x.iter_mut().zip(pulse(n, 250, 3.0)) {
            *value += extra;
        }
        let accel = [x, pulse(n, 400, 2.0), vec![9.81; n]];

        let event = DominantEvent::detect(&accel, 100, 4, 0.0).unwrap();
        assert_eq!(event.index, 400);
        assert_eq!(event.axis, Axis::Y);
        assert_eq!(event.candidates[0], vec![100, 250]);
        assert!(event.candidates[2].is_empty());
    }

    #[test]
    fn test_no_event_on_flat_input() {
        assert!(DominantEvent::detect(&[vec![0.0; 100], vec![0.0; 100], vec![0.0; 100]], 100, 4, 1e-3).is_none());
    }

    #[test]
    fn test_faint_ripple_is_not_a_candidate() {
        let n = 500;
        let mut z = pulse(n, 350, 5.0);
        for (i, value) in z.iter_mut().enumerate().skip(440) {
            // Decaying ripple after the pulse, microscopic next to it
            *value += 1e-6 * (i as f64 * 0.3).sin();
        }
        let accel = [vec![0.0; n], vec![0.0; n], z];

        let event = DominantEvent::detect(&accel, 100, 4, 1e-3).unwrap();
        assert_eq!(event.index, 350);
        assert_eq!(event.candidates[2], vec![350]);

        // Without the floor the latest ripple wins
        let event = DominantEvent::detect(&accel, 100, 4, 0.0).unwrap();
        assert!(event.index > 440);
    }

    #[test]
    fn test_refinement_bounds() {
        let n = 500;
        let mut channels = still_channels([0.0, 0.0, 9.81], n);
        for (value, extra) in channels.accel[2].iter_mut().zip(pulse(n, 350, 5.0)) {
            *value += extra;
        }
        let settings = DetectionSettings::default();

        assert_eq!(refine_event(&channels, BaselineWindow::ending_at(360, 200), &settings), Some(350));
        // Refined index before the baseline start is rejected
        assert_eq!(refine_event(&channels, BaselineWindow { start: 400, end: 450 }, &settings), None);
    }
}
