//! IMU-specific sample types, trial identity and unit conversion

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use crate::error::{ImuError, ImuResult};

/// Accelerometer sensitivity at the ±2 g range (LSB per g)
pub const ACC_SENSITIVITY_LSB_PER_G: f64 = 16384.0;
/// Gyroscope sensitivity at the ±250 °/s range (LSB per °/s)
pub const GYRO_SENSITIVITY_LSB_PER_DPS: f64 = 131.0;
/// Standard gravity
pub const G_TO_MS2: f64 = 9.80665;

/// Intervention condition of a trial
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intervention {
    No,
    Yes,
}

impl Intervention {
    pub const ALL: [Intervention; 2] = [Intervention::No, Intervention::Yes];

    pub fn as_str(&self) -> &'static str {
        match self {
            Intervention::No => "no",
            Intervention::Yes => "yes",
        }
    }
}

impl FromStr for Intervention {
    type Err = ImuError;

    fn from_str(s: &str) -> ImuResult<Self> {
        match s {
            "no" => Ok(Intervention::No),
            "yes" => Ok(Intervention::Yes),
            other => Err(crate::malformed!("unknown intervention type '{}'", other)),
        }
    }
}

/// Sensor identity encoded in the `imu_<addr>_<bus>` file name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SensorId {
    /// I2C address
    pub address: u16,
    /// I2C bus number
    pub bus: u8,
}

impl FromStr for SensorId {
    type Err = ImuError;

    /// Accepts `imu_105_1` or `imu_105_1.csv`
    fn from_str(s: &str) -> ImuResult<Self> {
        let stem = s.strip_suffix(".csv").unwrap_or(s);
        let mut parts = stem.split('_');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some("imu"), Some(addr), Some(bus), None) => {
                let address = addr.parse()
                    .map_err(|_| crate::malformed!("invalid sensor address in '{}'", s))?;
                let bus = bus.parse()
                    .map_err(|_| crate::malformed!("invalid sensor bus in '{}'", s))?;
                Ok(SensorId { address, bus })
            }
            _ => Err(crate::malformed!("'{}' does not follow imu_<addr>_<bus>", s)),
        }
    }
}

impl std::fmt::Display for SensorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "imu_{}_{}", self.address, self.bus)
    }
}

/// Identity of one recording
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrialId {
    /// Patient label, e.g. `p7`
    pub patient_id: String,
    /// Intervention condition
    pub intervention: Intervention,
    /// Session folder name
    pub session: String,
    /// Sensor, when the file name follows the convention
    pub sensor: Option<SensorId>,
    /// Source file name (join key downstream)
    pub csv_filename: String,
}

impl TrialId {
    pub fn new(patient_id: &str, intervention: Intervention, session: &str, csv_filename: &str) -> Self {
        TrialId {
            patient_id: patient_id.to_string(),
            intervention,
            session: session.to_string(),
            sensor: csv_filename.parse().ok(),
            csv_filename: csv_filename.to_string(),
        }
    }
}

impl std::fmt::Display for TrialId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}{}/{}/{}", self.patient_id, self.patient_id,
               self.intervention.as_str(), self.session, self.csv_filename)
    }
}

/// Cartesian axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub fn index(&self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    /// Column label of the acceleration channel
    pub fn accel_label(&self) -> &'static str {
        match self {
            Axis::X => "ax",
            Axis::Y => "ay",
            Axis::Z => "az",
        }
    }

    /// Column label of the angular-rate channel
    pub fn gyro_label(&self) -> &'static str {
        match self {
            Axis::X => "gx",
            Axis::Y => "gy",
            Axis::Z => "gz",
        }
    }
}

/// On-device orientation estimate, scalar first
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Quaternion {
    /// Roll, pitch and yaw in degrees (extrinsic x-y-z)
    pub fn to_euler_degrees(&self) -> [f64; 3] {
        let Quaternion { w, x, y, z } = *self;
        let roll = (2.0 * (w * x + y * z)).atan2(1.0 - 2.0 * (x * x + y * y));
        let pitch = (2.0 * (w * y - z * x)).clamp(-1.0, 1.0).asin();
        let yaw = (2.0 * (w * z + x * y)).atan2(1.0 - 2.0 * (y * y + z * z));
        [roll.to_degrees(), pitch.to_degrees(), yaw.to_degrees()]
    }
}

/// One raw IMU reading in sensor counts
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Program time in seconds
    pub t: f64,
    /// Raw accelerometer counts (x, y, z)
    pub accel: [f64; 3],
    /// Raw gyroscope counts (x, y, z)
    pub gyro: [f64; 3],
    /// Optional orientation columns
    pub quaternion: Option<Quaternion>,
}

impl Sample {
    pub fn new(t: f64, accel: [f64; 3], gyro: [f64; 3]) -> Self {
        Sample { t, accel, gyro, quaternion: None }
    }

    pub fn is_finite(&self) -> bool {
        self.t.is_finite()
            && self.accel.iter().all(|v| v.is_finite())
            && self.gyro.iter().all(|v| v.is_finite())
    }
}

/// Sample in physical units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConvertedSample {
    pub t: f64,
    /// Acceleration in m/s²
    pub accel_mps2: [f64; 3],
    /// Angular rate in °/s
    pub gyro_dps: [f64; 3],
}

/// Fixed linear count-to-unit conversion
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleFactors {
    pub acc_sensitivity_lsb_per_g: f64,
    pub gyro_sensitivity_lsb_per_dps: f64,
    pub g_to_ms2: f64,
}

impl ScaleFactors {
    /// Accelerometer counts to m/s²
    pub fn accel_mps2(&self, raw: f64) -> f64 {
        raw / self.acc_sensitivity_lsb_per_g * self.g_to_ms2
    }

    /// Gyroscope counts to °/s
    pub fn gyro_dps(&self, raw: f64) -> f64 {
        raw / self.gyro_sensitivity_lsb_per_dps
    }

    pub fn convert(&self, sample: &Sample) -> ConvertedSample {
        ConvertedSample {
            t: sample.t,
            accel_mps2: sample.accel.map(|v| self.accel_mps2(v)),
            gyro_dps: sample.gyro.map(|v| self.gyro_dps(v)),
        }
    }

    /// Reject non-positive or non-finite constants
    pub fn validate(&self) -> ImuResult<()> {
        let values = [
            ("acc_sensitivity_lsb_per_g", self.acc_sensitivity_lsb_per_g),
            ("gyro_sensitivity_lsb_per_dps", self.gyro_sensitivity_lsb_per_dps),
            ("g_to_ms2", self.g_to_ms2),
        ];
        for (name, value) in values {
            if !value.is_finite() || value <= 0.0 {
                return Err(crate::config_error!("{} must be positive, got {}", name, value));
            }
        }
        Ok(())
    }
}

impl Default for ScaleFactors {
    fn default() -> Self {
        ScaleFactors {
            acc_sensitivity_lsb_per_g: ACC_SENSITIVITY_LSB_PER_G,
            gyro_sensitivity_lsb_per_dps: GYRO_SENSITIVITY_LSB_PER_DPS,
            g_to_ms2: G_TO_MS2,
        }
    }
}

impl std::fmt::Display for Intervention {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_unit_conversion() {
        let scale = ScaleFactors::default();
        let sample = Sample::new(0.0, [16384.0, -8192.0, 0.0], [131.0, -262.0, 0.0]);
        let converted = scale.convert(&sample);

        assert_relative_eq!(converted.accel_mps2[0], G_TO_MS2);
        assert_relative_eq!(converted.accel_mps2[1], -G_TO_MS2 / 2.0);
        assert_eq!(converted.accel_mps2[2], 0.0);
        assert_relative_eq!(converted.gyro_dps[0], 1.0);
        assert_relative_eq!(converted.gyro_dps[1], -2.0);
    }

    #[test]
    fn test_alternate_gyro_range() {
        let scale = ScaleFactors { gyro_sensitivity_lsb_per_dps: 250.0, ..Default::default() };
        assert_relative_eq!(scale.gyro_dps(500.0), 2.0);
        assert!(scale.validate().is_ok());

        let broken = ScaleFactors { g_to_ms2: 0.0, ..Default::default() };
        assert!(broken.validate().is_err());
    }

    #[test]
    fn test_sensor_id_parsing() {
        let sensor: SensorId = "imu_105_1.csv".parse().unwrap();
        assert_eq!(sensor, SensorId { address: 105, bus: 1 });
        assert_eq!(sensor.to_string(), "imu_105_1");

        assert!("imu_105.csv".parse::<SensorId>().is_err());
        assert!("accel_105_1.csv".parse::<SensorId>().is_err());
        assert!("imu_x_1".parse::<SensorId>().is_err());
    }

    #[test]
    fn test_trial_id() {
        let id = TrialId::new("p3", Intervention::Yes, "2025-05-28_16-28-59", "imu_104_0.csv");
        assert_eq!(id.sensor, Some(SensorId { address: 104, bus: 0 }));
        assert_eq!(id.to_string(), "p3/p3yes/2025-05-28_16-28-59/imu_104_0.csv");

        let odd = TrialId::new("p3", Intervention::No, "s1", "left_ankle.csv");
        assert_eq!(odd.sensor, None);
        assert_eq!("yes".parse::<Intervention>().unwrap(), Intervention::Yes);
        assert!("maybe".parse::<Intervention>().is_err());
    }

    #[test]
    fn test_quaternion_euler() {
        let identity = Quaternion { w: 1.0, x: 0.0, y: 0.0, z: 0.0 };
        assert_eq!(identity.to_euler_degrees(), [0.0, 0.0, 0.0]);

        let half = std::f64::consts::FRAC_PI_4;
        let yaw_90 = Quaternion { w: half.cos(), x: 0.0, y: 0.0, z: half.sin() };
        let euler = yaw_90.to_euler_degrees();
        assert_relative_eq!(euler[2], 90.0, epsilon = 1e-9);
        assert_relative_eq!(euler[0], 0.0, epsilon = 1e-9);
    }
}
