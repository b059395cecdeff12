//! Zero-phase Butterworth low-pass filtering of whole recordings

use crate::config::FilterSettings;
use imu_core::{ImuError, ImuResult, MotionChannels};
use serde::{Deserialize, Serialize};

/// Single biquad section (2nd order), transposed direct form II
///
/// `y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2] - a1*y[n-1] - a2*y[n-2]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BiquadSection {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl BiquadSection {
    /// Bilinear-transform low-pass section with quality factor `q`.
    /// `k` is the pre-warped cutoff `tan(pi * fc / fs)`.
    fn lowpass(k: f64, q: f64) -> Self {
        let k2 = k * k;
        let norm = k2 + k / q + 1.0;

        let b0 = k2 / norm;
        BiquadSection {
            b0,
            b1: 2.0 * b0,
            b2: b0,
            a1: 2.0 * (k2 - 1.0) / norm,
            a2: (k2 - k / q + 1.0) / norm,
        }
    }

    /// State that makes a unit step input produce a steady output
    fn steady_state(&self) -> [f64; 2] {
        let gain = (self.b0 + self.b1 + self.b2) / (1.0 + self.a1 + self.a2);
        let z1 = self.b2 - self.a2 * gain;
        let z0 = self.b1 - self.a1 * gain + z1;
        [z0, z1]
    }

    fn process(&self, input: &[f64], initial: [f64; 2]) -> Vec<f64> {
        let [mut z0, mut z1] = initial;
        input.iter()
            .map(|&x| {
                let y = self.b0 * x + z0;
                z0 = self.b1 * x - self.a1 * y + z1;
                z1 = self.b2 * x - self.a2 * y;
                y
            })
            .collect()
    }
}

/// Butterworth low-pass filter as a cascade of biquad sections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ButterworthLowpass {
    pub cutoff_hz: f64,
    pub sampling_rate: f64,
    pub order: usize,
    sections: Vec<BiquadSection>,
}

impl ButterworthLowpass {
    /// Design the filter, rejecting cutoffs at or above Nyquist
    pub fn design(settings: &FilterSettings, sampling_rate: f64) -> ImuResult<Self> {
        let normalized_cutoff = settings.cutoff_hz / (0.5 * sampling_rate);

        if !(normalized_cutoff.is_finite() && normalized_cutoff > 0.0 && normalized_cutoff < 1.0) {
            return Err(ImuError::DegenerateFilterDesign {
                cutoff_hz: settings.cutoff_hz,
                sampling_rate,
                normalized_cutoff,
            });
        }

        if settings.order == 0 || settings.order % 2 != 0 {
            return Err(imu_core::config_error!(
                "filter order must be a positive even number, got {}", settings.order
            ));
        }

        // Pre-warp frequency for bilinear transform
        let k = (std::f64::consts::PI * settings.cutoff_hz / sampling_rate).tan();

        // Pole pairs of the analog prototype, one biquad each
        let order = settings.order;
        let sections = (0..order / 2)
            .map(|i| {
                let theta = std::f64::consts::PI * (2 * i + 1) as f64 / (2 * order) as f64;
                BiquadSection::lowpass(k, 1.0 / (2.0 * theta.cos()))
            })
            .collect();

        Ok(ButterworthLowpass {
            cutoff_hz: settings.cutoff_hz,
            sampling_rate,
            order,
            sections,
        })
    }

    pub fn sections(&self) -> &[BiquadSection] {
        &self.sections
    }

    /// Cutoff relative to the Nyquist frequency
    pub fn normalized_cutoff(&self) -> f64 {
        self.cutoff_hz / (0.5 * self.sampling_rate)
    }

    /// Reflection padding used at each end by [`Self::filtfilt`]
    pub fn pad_length(&self) -> usize {
        3 * (self.order + 1)
    }

    /// One causal pass starting from the steady state of the first sample
    pub fn filter(&self, input: &[f64]) -> Vec<f64> {
        let Some(&first) = input.first() else {
            return Vec::new();
        };

        self.sections.iter().fold(input.to_vec(), |signal, section| {
            let [z0, z1] = section.steady_state();
            section.process(&signal, [z0 * first, z1 * first])
        })
    }

    /// Forward-backward application: zero phase, squared magnitude response,
    /// output index-aligned with the input.
    pub fn filtfilt(&self, input: &[f64]) -> ImuResult<Vec<f64>> {
        let padlen = self.pad_length();
        if input.len() <= padlen {
            return Err(imu_core::malformed!(
                "{} samples, zero-phase filtering needs more than {}",
                input.len(), padlen
            ));
        }

        let extended = odd_extension(input, padlen);

        let mut backward = self.filter(&extended);
        backward.reverse();
        let mut output = self.filter(&backward);
        output.reverse();

        Ok(output[padlen..padlen + input.len()].to_vec())
    }

    /// Smooth every acceleration and angular-rate channel independently
    pub fn smooth_channels(&self, channels: &MotionChannels) -> ImuResult<MotionChannels> {
        channels.map_channels(|channel| self.filtfilt(channel))
    }
}

/// Point-symmetric reflection of `padlen` samples around both end points
fn odd_extension(input: &[f64], padlen: usize) -> Vec<f64> {
    let n = input.len();
    let first = input[0];
    let last = input[n - 1];

    let mut extended = Vec::with_capacity(n + 2 * padlen);
    extended.extend((1..=padlen).rev().map(|i| 2.0 * first - input[i]));
    extended.extend_from_slice(input);
    extended.extend((1..=padlen).map(|i| 2.0 * last - input[n - 1 - i]));
    extended
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    fn lowpass(fs: f64) -> ButterworthLowpass {
        ButterworthLowpass::design(&FilterSettings::default(), fs).unwrap()
    }

    fn sine(freq: f64, fs: f64, n: usize) -> Vec<f64> {
        (0..n).map(|i| (2.0 * PI * freq * i as f64 / fs).sin()).collect()
    }

    #[test]
    fn test_second_order_coefficients() {
        // 3 Hz at 100 Hz, Wn = 0.06
        let filter = lowpass(100.0);
        let section = filter.sections()[0];

        assert_eq!(filter.sections().len(), 1);
        assert_relative_eq!(section.b0, 0.00782021, epsilon = 1e-7);
        assert_relative_eq!(section.b1, 0.01564042, epsilon = 1e-7);
        assert_relative_eq!(section.a1, -1.73472577, epsilon = 1e-7);
        assert_relative_eq!(section.a2, 0.76600660, epsilon = 1e-7);
        assert_relative_eq!(filter.normalized_cutoff(), 0.06, epsilon = 1e-12);
    }

    #[test]
    fn test_degenerate_design() {
        for fs in [6.0, 5.0, 0.0, f64::INFINITY] {
            let error = ButterworthLowpass::design(&FilterSettings::default(), fs).unwrap_err();
            assert!(matches!(error, ImuError::DegenerateFilterDesign { .. }), "fs = {}", fs);
        }
        assert!(ButterworthLowpass::design(&FilterSettings::default(), 6.5).is_ok());
    }

    #[test]
    fn test_odd_order_rejected() {
        let settings = FilterSettings { order: 3, ..Default::default() };
        assert!(ButterworthLowpass::design(&settings, 100.0).is_err());
    }

    #[test]
    fn test_constant_passes_unchanged() {
        let filter = lowpass(100.0);
        let output = filter.filtfilt(&[9.80665; 300]).unwrap();

        assert_eq!(output.len(), 300);
        for value in output {
            assert_relative_eq!(value, 9.80665, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_zero_phase_sinusoid() {
        let fs = 100.0;
        let input = sine(0.5, fs, 1000);
        let output = lowpass(fs).filtfilt(&input).unwrap();

        // Cross-correlation over +/-20 lags peaks at zero
        let xcorr = |lag: isize| -> f64 {
            (100..900)
                .map(|i| input[i] * output[(i as isize + lag) as usize])
                .sum()
        };
        let best_lag = (-20..=20)
            .max_by(|&a, &b| xcorr(a).total_cmp(&xcorr(b)))
            .unwrap();
        assert_eq!(best_lag, 0);

        // Pass band: amplitude is preserved too
        for i in 100..900 {
            assert!((output[i] - input[i]).abs() < 0.02);
        }
    }

    #[test]
    fn test_stop_band_attenuation() {
        let fs = 100.0;
        let input = sine(20.0, fs, 1000);
        let output = lowpass(fs).filtfilt(&input).unwrap();

        let peak = output[100..900].iter().fold(0.0f64, |m, v| m.max(v.abs()));
        assert!(peak < 0.01, "residual amplitude {}", peak);
    }

    #[test]
    fn test_higher_order_cascade() {
        let settings = FilterSettings { order: 4, ..Default::default() };
        let filter = ButterworthLowpass::design(&settings, 100.0).unwrap();

        assert_eq!(filter.sections().len(), 2);
        assert_eq!(filter.pad_length(), 15);
        let output = filter.filtfilt(&[1.5; 100]).unwrap();
        assert_relative_eq!(output[50], 1.5, epsilon = 1e-9);
    }

    #[test]
    fn test_short_input_rejected() {
        let filter = lowpass(100.0);
        assert!(filter.filtfilt(&[1.0; 9]).is_err());
        assert_eq!(filter.filtfilt(&[1.0; 10]).unwrap().len(), 10);
    }

    #[test]
    fn test_odd_extension() {
        let extended = odd_extension(&[1.0, 2.0, 4.0, 7.0], 2);
        assert_eq!(extended, vec![-2.0, 0.0, 1.0, 2.0, 4.0, 7.0, 10.0, 12.0]);
    }
}
