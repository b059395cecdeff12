//! TrialRecording: owned sample buffer for one recording, and the channel-major
//! representation every processing stage produces.

use crate::imu_types::{Axis, ConvertedSample, Sample, ScaleFactors, TrialId};
use crate::error::ImuResult;
use serde::{Deserialize, Serialize};

/// Samples of one trial, in file order
#[derive(Debug, Clone, PartialEq)]
pub struct TrialRecording {
    /// Trial identity
    pub id: TrialId,
    /// Raw samples
    pub samples: Vec<Sample>,
}

impl TrialRecording {
    /// Create a recording, rejecting short or non-finite input
    pub fn new(id: TrialId, samples: Vec<Sample>) -> ImuResult<Self> {
        if samples.len() < 2 {
            return Err(crate::malformed!(
                "{} has {} samples, at least 2 required",
                id, samples.len()
            ));
        }

        if let Some(row) = samples.iter().position(|s| !s.is_finite()) {
            return Err(crate::malformed!("{} has a non-finite value in row {}", id, row + 1));
        }

        Ok(TrialRecording { id, samples })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn times(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.t).collect()
    }

    /// Fix time direction and rebase time to start at zero.
    ///
    /// A non-increasing timestamp column is reversed on its own, rows keep their
    /// order. Any other disorder is resolved with a stable sort of the rows.
    pub fn normalized(&self) -> TrialRecording {
        let mut samples = self.samples.clone();

        let non_increasing = samples.windows(2).all(|w| w[1].t <= w[0].t);
        let non_decreasing = samples.windows(2).all(|w| w[1].t >= w[0].t);

        if non_increasing {
            let reversed: Vec<f64> = samples.iter().rev().map(|s| s.t).collect();
            for (sample, t) in samples.iter_mut().zip(reversed) {
                sample.t = t;
            }
        } else if !non_decreasing {
            samples.sort_by(|a, b| a.t.total_cmp(&b.t));
        }

        let t0 = samples.iter().map(|s| s.t).fold(f64::INFINITY, f64::min);
        for sample in &mut samples {
            sample.t -= t0;
        }

        TrialRecording { id: self.id.clone(), samples }
    }

    /// Convert every sample to physical units
    pub fn to_channels(&self, scale: &ScaleFactors) -> MotionChannels {
        MotionChannels::from_converted(self.samples.iter().map(|s| scale.convert(s)))
    }

    /// Duration covered by the timestamps
    pub fn duration(&self) -> f64 {
        match (self.samples.first(), self.samples.last()) {
            (Some(first), Some(last)) => last.t - first.t,
            _ => 0.0,
        }
    }
}

/// Channel-major motion data: one time vector, three acceleration and three
/// angular-rate channels of equal length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionChannels {
    pub time: Vec<f64>,
    pub accel: [Vec<f64>; 3],
    pub gyro: [Vec<f64>; 3],
}

impl MotionChannels {
    pub fn from_converted<I>(samples: I) -> Self
    where
        I: IntoIterator<Item = ConvertedSample>,
    {
        let mut channels = MotionChannels {
            time: Vec::new(),
            accel: [Vec::new(), Vec::new(), Vec::new()],
            gyro: [Vec::new(), Vec::new(), Vec::new()],
        };

        for sample in samples {
            channels.time.push(sample.t);
            for axis in 0..3 {
                channels.accel[axis].push(sample.accel_mps2[axis]);
                channels.gyro[axis].push(sample.gyro_dps[axis]);
            }
        }

        channels
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn accel_axis(&self, axis: Axis) -> &[f64] {
        &self.accel[axis.index()]
    }

    pub fn gyro_axis(&self, axis: Axis) -> &[f64] {
        &self.gyro[axis.index()]
    }

    pub fn accel_vector(&self, index: usize) -> [f64; 3] {
        [self.accel[0][index], self.accel[1][index], self.accel[2][index]]
    }

    pub fn gyro_vector(&self, index: usize) -> [f64; 3] {
        [self.gyro[0][index], self.gyro[1][index], self.gyro[2][index]]
    }

    pub fn sample(&self, index: usize) -> ConvertedSample {
        ConvertedSample {
            t: self.time[index],
            accel_mps2: self.accel_vector(index),
            gyro_dps: self.gyro_vector(index),
        }
    }

    /// New channel set with every data channel mapped, time copied
    pub fn map_channels<F>(&self, mut f: F) -> ImuResult<MotionChannels>
    where
        F: FnMut(&[f64]) -> ImuResult<Vec<f64>>,
    {
        Ok(MotionChannels {
            time: self.time.clone(),
            accel: [f(&self.accel[0])?, f(&self.accel[1])?, f(&self.accel[2])?],
            gyro: [f(&self.gyro[0])?, f(&self.gyro[1])?, f(&self.gyro[2])?],
        })
    }
}

/// Basic statistics for a signal channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelStats {
    pub mean: f64,
    pub rms: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub peak_to_peak: f64,
}

impl ChannelStats {
    /// Statistics of a channel slice; `None` for an empty slice
    pub fn calculate(data: &[f64]) -> Option<Self> {
        if data.is_empty() {
            return None;
        }

        let n = data.len() as f64;
        let mean = data.iter().sum::<f64>() / n;

        let sum_sq: f64 = data.iter().map(|x| x * x).sum();
        let rms = (sum_sq / n).sqrt();

        let variance: f64 = data.iter()
            .map(|x| (x - mean).powi(2))
            .sum::<f64>() / n;
        let std_dev = variance.sqrt();

        let min = data.iter().fold(f64::INFINITY, |a, &b| a.min(b));
        let max = data.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));

        Some(Self {
            mean,
            rms,
            std_dev,
            min,
            max,
            peak_to_peak: max - min,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imu_types::Intervention;

    fn trial_id() -> TrialId {
        TrialId::new("p1", Intervention::No, "s1", "imu_104_0.csv")
    }

    fn recording(times: &[f64]) -> TrialRecording {
        let samples = times.iter()
            .enumerate()
            .map(|(i, &t)| Sample::new(t, [i as f64, 0.0, 16384.0], [0.0; 3]))
            .collect();
        TrialRecording::new(trial_id(), samples).unwrap()
    }

    #[test]
    fn test_rejects_short_recording() {
        let result = TrialRecording::new(trial_id(), vec![Sample::new(0.0, [0.0; 3], [0.0; 3])]);
        assert!(result.is_err());

        let nan = vec![
            Sample::new(0.0, [0.0; 3], [0.0; 3]),
            Sample::new(f64::NAN, [0.0; 3], [0.0; 3]),
        ];
        assert!(TrialRecording::new(trial_id(), nan).is_err());
    }

    #[test]
    fn test_rebase_to_zero() {
        let normalized = recording(&[12.5, 12.51, 12.52, 12.53]).normalized();
        let times = normalized.times();

        assert_eq!(times[0], 0.0);
        assert!(times.windows(2).all(|w| w[1] >= w[0]));
        assert!((normalized.duration() - 0.03).abs() < 1e-9);
    }

    #[test]
    fn test_reversed_time_column() {
        let normalized = recording(&[3.0, 2.0, 1.0, 0.5]).normalized();

        // Only the time column flips; rows stay in file order
        assert_eq!(normalized.times(), vec![0.0, 0.5, 1.5, 2.5]);
        assert_eq!(normalized.samples[0].accel[0], 0.0);
        assert_eq!(normalized.samples[3].accel[0], 3.0);
    }

    #[test]
    fn test_unsorted_rows_are_sorted() {
        let normalized = recording(&[0.0, 0.2, 0.1, 0.3]).normalized();

        assert_eq!(normalized.times(), vec![0.0, 0.1, 0.2, 0.3]);
        assert_eq!(normalized.samples[1].accel[0], 2.0);
        assert_eq!(normalized.samples[2].accel[0], 1.0);
    }

    #[test]
    fn test_channels_conversion() {
        let channels = recording(&[0.0, 0.01, 0.02]).to_channels(&ScaleFactors::default());

        assert_eq!(channels.len(), 3);
        assert!((channels.accel_axis(Axis::Z)[0] - crate::imu_types::G_TO_MS2).abs() < 1e-12);
        assert_eq!(channels.sample(2).t, 0.02);

        let doubled = channels.map_channels(|c| Ok(c.iter().map(|v| v * 2.0).collect())).unwrap();
        assert_eq!(doubled.time, channels.time);
        assert_eq!(doubled.accel[2][1], channels.accel[2][1] * 2.0);
    }

    #[test]
    fn test_channel_stats() {
        let stats = ChannelStats::calculate(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(stats.mean, 2.5);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 4.0);
        assert_eq!(stats.peak_to_peak, 3.0);
        assert!(ChannelStats::calculate(&[]).is_none());
    }
}
