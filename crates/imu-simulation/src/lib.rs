//! IMU-Simulation: synthetic step trials
//!
//! Deterministic (seeded) raw IMU recordings for tests and demo data sets.

pub mod movement_patterns;
pub mod trial_simulator;

pub use movement_patterns::*;
pub use trial_simulator::*;
