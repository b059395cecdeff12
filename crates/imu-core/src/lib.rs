//! IMU-Core: foundation types for step-kinematics extraction
//!
//! Raw samples, trial identity, unit conversion and the error type shared by
//! the processing and batch crates.

pub mod error;
pub mod imu_types;
pub mod recording;

pub use error::{FailureKind, ImuError, ImuResult};
pub use imu_types::*;
pub use recording::*;
