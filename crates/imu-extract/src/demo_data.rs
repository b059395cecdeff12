//! Synthetic input trees following the acquisition directory convention

use crate::loader::write_trial_csv;
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Local};
use imu_core::{Intervention, ScaleFactors, SensorId};
use imu_simulation::{MovementPattern, NoiseConfig, TrialSimulator, TrialSimulatorConfig};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

/// Session folder name format used by the acquisition software
pub const SESSION_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Sensors written into every session
pub const DEMO_SENSORS: [SensorId; 2] = [
    SensorId { address: 104, bus: 0 },
    SensorId { address: 105, bus: 1 },
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemoTreeConfig {
    pub root: PathBuf,
    /// Patients `p1..=pN`
    pub patients: u32,
    pub sessions_per_condition: u32,
    pub sampling_rate: f64,
    pub seed: u64,
}

impl Default for DemoTreeConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("csv"),
            patients: 3,
            sessions_per_condition: 2,
            sampling_rate: 100.0,
            seed: 7,
        }
    }
}

/// Simulator settings for one file. The second sensor is mounted tilted and
/// logs a descending clock; the intervention condition pushes harder.
fn trial_config(
    config: &DemoTreeConfig,
    patient: u32,
    intervention: Intervention,
    session: u32,
    sensor: usize,
) -> TrialSimulatorConfig {
    let gain = match intervention {
        Intervention::No => 1.0,
        Intervention::Yes => 1.3,
    };
    let amplitude = gain * (4.0 + 0.25 * (patient % 4) as f64);
    let tilted = sensor % 2 == 1;

    TrialSimulatorConfig {
        sampling_rate: config.sampling_rate,
        duration_s: 5.0,
        gravity_direction: if tilted { [0.3, 0.1, 0.95] } else { [0.0, 0.0, 1.0] },
        accel_patterns: [
            MovementPattern::Rest,
            MovementPattern::Sinusoid { frequency: 0.3, amplitude: 0.05 },
            MovementPattern::RaisedCosine { center: 4.1, half_width: 0.3, amplitude },
        ],
        gyro_patterns: [
            MovementPattern::RaisedCosine { center: 4.1, half_width: 0.3, amplitude: 10.0 * amplitude },
            MovementPattern::Rest,
            MovementPattern::Rest,
        ],
        noise: NoiseConfig::default(),
        scale: ScaleFactors::default(),
        time_offset_s: 1000.0 * patient as f64 + 60.0 * session as f64,
        reverse_time: tilted,
        quantize: true,
        include_quaternion: !tilted,
        seed: Some(
            config.seed
                ^ (patient as u64) << 32
                ^ (intervention as u64) << 24
                ^ (session as u64) << 8
                ^ sensor as u64,
        ),
    }
}

/// Write the tree, returning the files created
pub fn write_demo_tree(config: &DemoTreeConfig, started: DateTime<Local>) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();

    for patient in 1..=config.patients {
        let patient_id = format!("p{}", patient);
        for intervention in Intervention::ALL {
            let condition_dir = config.root
                .join(&patient_id)
                .join(format!("{}{}", patient_id, intervention.as_str()));

            for session in 0..config.sessions_per_condition {
                let offset = Duration::minutes(i64::from(patient * 100 + session * 10 + intervention as u32));
                let session_name = (started + offset).format(SESSION_FORMAT).to_string();
                let session_dir = condition_dir.join(session_name);

                for (index, sensor) in DEMO_SENSORS.iter().enumerate() {
                    let path = session_dir.join(format!("{}.csv", sensor));
                    let trial = trial_config(config, patient, intervention, session, index);
                    let samples = TrialSimulator::new(trial)
                        .with_context(|| format!("Invalid simulation for {:?}", path))?
                        .generate_samples();
                    write_trial_csv(&path, &samples)?;
                    debug!("Wrote {}", path.display());
                    written.push(path);
                }
            }
        }
    }

    info!("Wrote {} synthetic trials under {}", written.len(), config.root.display());
    Ok(written)
}

/// Resolve a session name back to its timestamp
pub fn parse_session_time(name: &str) -> Option<chrono::NaiveDateTime> {
    chrono::NaiveDateTime::parse_from_str(name, SESSION_FORMAT).ok()
}
