//! Synthetic IMU trial generator with configurable mounting, movement and noise

use crate::movement_patterns::MovementPattern;
use imu_core::{ImuError, ImuResult, Quaternion, Sample, ScaleFactors, TrialId, TrialRecording};
use nalgebra::{Rotation3, UnitQuaternion, Vector3};
use rand::{rngs::StdRng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

/// Configuration for trial simulation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialSimulatorConfig {
    /// Sampling rate in Hz
    pub sampling_rate: f64,
    /// Recording length in seconds
    pub duration_s: f64,
    /// Direction of gravity in the sensor frame (normalized internally)
    pub gravity_direction: [f64; 3],
    /// Upright-frame acceleration added to gravity (m/s²), per axis
    pub accel_patterns: [MovementPattern; 3],
    /// Upright-frame angular rate (°/s), per axis
    pub gyro_patterns: [MovementPattern; 3],
    /// Sensor noise
    pub noise: NoiseConfig,
    /// Conversion used to produce raw counts
    pub scale: ScaleFactors,
    /// Program time of the first sample
    pub time_offset_s: f64,
    /// Write the timestamp column in descending order
    pub reverse_time: bool,
    /// Round to integer counts like the sensor does
    pub quantize: bool,
    /// Emit the mounting orientation as quaternion columns
    pub include_quaternion: bool,
    /// Random seed for reproducibility
    pub seed: Option<u64>,
}

/// Noise configuration for the sensor channels
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NoiseConfig {
    /// Gaussian accelerometer noise (m/s²), 0 disables
    pub accel_std_mps2: f64,
    /// Gaussian gyroscope noise (°/s), 0 disables
    pub gyro_std_dps: f64,
}

impl NoiseConfig {
    pub fn none() -> Self {
        NoiseConfig {
            accel_std_mps2: 0.0,
            gyro_std_dps: 0.0,
        }
    }
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            accel_std_mps2: 0.02,
            gyro_std_dps: 0.3,
        }
    }
}

impl Default for TrialSimulatorConfig {
    /// Upright sensor, one vertical push 0.9 s before the end of a 5 s recording
    fn default() -> Self {
        Self {
            sampling_rate: 100.0,
            duration_s: 5.0,
            gravity_direction: [0.0, 0.0, 1.0],
            accel_patterns: [
                MovementPattern::Rest,
                MovementPattern::Rest,
                MovementPattern::RaisedCosine { center: 4.1, half_width: 0.3, amplitude: 5.0 },
            ],
            gyro_patterns: [
                MovementPattern::RaisedCosine { center: 4.1, half_width: 0.3, amplitude: 30.0 },
                MovementPattern::Rest,
                MovementPattern::Rest,
            ],
            noise: NoiseConfig::default(),
            scale: ScaleFactors::default(),
            time_offset_s: 0.0,
            reverse_time: false,
            quantize: true,
            include_quaternion: false,
            seed: None,
        }
    }
}

impl TrialSimulatorConfig {
    /// Default scenario without noise, for exact expectations in tests
    pub fn noiseless() -> Self {
        Self {
            noise: NoiseConfig::none(),
            seed: Some(0),
            ..Default::default()
        }
    }

    /// Number of samples the configuration produces
    pub fn sample_count(&self) -> usize {
        (self.duration_s * self.sampling_rate).round() as usize
    }

    fn validate(&self) -> ImuResult<()> {
        if !(self.sampling_rate.is_finite() && self.sampling_rate > 0.0) {
            return Err(imu_core::config_error!("sampling rate must be positive, got {}", self.sampling_rate));
        }
        if self.sample_count() < 2 {
            return Err(imu_core::config_error!(
                "{} s at {} Hz gives fewer than 2 samples", self.duration_s, self.sampling_rate
            ));
        }
        if Vector3::from(self.gravity_direction).norm() == 0.0 {
            return Err(imu_core::config_error!("gravity direction must be non-zero"));
        }
        for (sensor, std) in [("accelerometer", self.noise.accel_std_mps2), ("gyroscope", self.noise.gyro_std_dps)] {
            if !(std.is_finite() && std >= 0.0) {
                return Err(imu_core::config_error!("{} noise std must be finite and non-negative, got {}", sensor, std));
            }
        }
        self.scale.validate()
    }
}

/// IMU trial simulator
pub struct TrialSimulator {
    config: TrialSimulatorConfig,
    rng: StdRng,
    accel_noise: Normal<f64>,
    gyro_noise: Normal<f64>,
    /// Upright frame to sensor frame
    mounting: Rotation3<f64>,
}

impl TrialSimulator {
    /// Create new trial simulator with configuration
    pub fn new(config: TrialSimulatorConfig) -> ImuResult<Self> {
        config.validate()?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let accel_noise = Normal::new(0.0, config.noise.accel_std_mps2).map_err(|e| ImuError::InvalidConfig {
            reason: format!("Failed to create accelerometer noise distribution: {}", e),
        })?;
        let gyro_noise = Normal::new(0.0, config.noise.gyro_std_dps).map_err(|e| ImuError::InvalidConfig {
            reason: format!("Failed to create gyroscope noise distribution: {}", e),
        })?;

        let gravity = Vector3::from(config.gravity_direction).normalize();
        let mounting = Rotation3::rotation_between(&Vector3::z(), &gravity)
            .unwrap_or_else(|| Rotation3::from_axis_angle(&Vector3::x_axis(), std::f64::consts::PI));

        Ok(TrialSimulator {
            config,
            rng,
            accel_noise,
            gyro_noise,
            mounting,
        })
    }

    /// Get current configuration
    pub fn config(&self) -> &TrialSimulatorConfig {
        &self.config
    }

    /// Generate raw samples in sensor counts
    pub fn generate_samples(&mut self) -> Vec<Sample> {
        let n = self.config.sample_count();
        let dt = 1.0 / self.config.sampling_rate;
        let g = self.config.scale.g_to_ms2;
        let quantize = self.config.quantize;

        let quaternion = self.config.include_quaternion.then(|| {
            let q = UnitQuaternion::from_rotation_matrix(&self.mounting);
            Quaternion { w: q.w, x: q.i, y: q.j, z: q.k }
        });

        let mut samples: Vec<Sample> = (0..n)
            .map(|i| {
                let time = i as f64 * dt;

                let upright_accel = Vector3::from(self.config.accel_patterns.map(|p| p.value_at(time, dt)))
                    + Vector3::new(0.0, 0.0, g);
                let upright_gyro = Vector3::from(self.config.gyro_patterns.map(|p| p.value_at(time, dt)));

                let accel = self.mounting * upright_accel;
                let gyro = self.mounting * upright_gyro;

                let mut raw_accel = [0.0; 3];
                let mut raw_gyro = [0.0; 3];
                for axis in 0..3 {
                    let a = accel[axis] + self.accel_noise.sample(&mut self.rng);
                    let w = gyro[axis] + self.gyro_noise.sample(&mut self.rng);
                    raw_accel[axis] = to_counts(a / g * self.config.scale.acc_sensitivity_lsb_per_g, quantize);
                    raw_gyro[axis] = to_counts(w * self.config.scale.gyro_sensitivity_lsb_per_dps, quantize);
                }

                Sample {
                    t: self.config.time_offset_s + time,
                    accel: raw_accel,
                    gyro: raw_gyro,
                    quaternion,
                }
            })
            .collect();

        if self.config.reverse_time {
            let times: Vec<f64> = samples.iter().rev().map(|s| s.t).collect();
            for (sample, t) in samples.iter_mut().zip(times) {
                sample.t = t;
            }
        }

        samples
    }

    /// Generate a complete recording for `id`
    pub fn generate(&mut self, id: TrialId) -> ImuResult<TrialRecording> {
        let samples = self.generate_samples();
        TrialRecording::new(id, samples)
    }
}

fn to_counts(value: f64, quantize: bool) -> f64 {
    if quantize {
        value.round()
    } else {
        value
    }
}
