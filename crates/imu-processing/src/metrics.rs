//! Flat per-trial metrics record, one row of the summary table

use crate::extraction::StepKinematics;
use imu_core::{Axis, Intervention, TrialId};
use serde::{Deserialize, Serialize};

/// Column order of the metrics table
pub const METRICS_COLUMNS: [&str; 20] = [
    "patient_id",
    "intervention_type",
    "session",
    "csv_filename",
    "step_duration_s",
    "avg_acc_ax_upright",
    "avg_acc_ay_upright",
    "avg_acc_az_upright",
    "max_acc_ax_upright",
    "time_to_max_acc_ax_upright",
    "max_acc_ay_upright",
    "time_to_max_acc_ay_upright",
    "max_acc_az_upright",
    "time_to_max_acc_az_upright",
    "max_ang_vel_gx_upright",
    "time_to_max_ang_vel_gx_upright",
    "max_ang_vel_gy_upright",
    "time_to_max_ang_vel_gy_upright",
    "max_ang_vel_gz_upright",
    "time_to_max_ang_vel_gz_upright",
];

/// One trial's step metrics. Missing values serialize as empty cells.
///
/// Field order matches [`METRICS_COLUMNS`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRecord {
    pub patient_id: String,
    pub intervention_type: Intervention,
    pub session: String,
    pub csv_filename: String,
    pub step_duration_s: Option<f64>,
    pub avg_acc_ax_upright: Option<f64>,
    pub avg_acc_ay_upright: Option<f64>,
    pub avg_acc_az_upright: Option<f64>,
    pub max_acc_ax_upright: Option<f64>,
    pub time_to_max_acc_ax_upright: Option<f64>,
    pub max_acc_ay_upright: Option<f64>,
    pub time_to_max_acc_ay_upright: Option<f64>,
    pub max_acc_az_upright: Option<f64>,
    pub time_to_max_acc_az_upright: Option<f64>,
    pub max_ang_vel_gx_upright: Option<f64>,
    pub time_to_max_ang_vel_gx_upright: Option<f64>,
    pub max_ang_vel_gy_upright: Option<f64>,
    pub time_to_max_ang_vel_gy_upright: Option<f64>,
    pub max_ang_vel_gz_upright: Option<f64>,
    pub time_to_max_ang_vel_gz_upright: Option<f64>,
}

impl MetricsRecord {
    /// Flatten the kinematics of one trial
    pub fn assemble(id: &TrialId, step_duration_s: Option<f64>, kinematics: &StepKinematics) -> Self {
        let acc = |axis: Axis| kinematics.accel_peak(axis);
        let gyro = |axis: Axis| kinematics.gyro_peak(axis);

        MetricsRecord {
            patient_id: id.patient_id.clone(),
            intervention_type: id.intervention,
            session: id.session.clone(),
            csv_filename: id.csv_filename.clone(),
            step_duration_s,
            avg_acc_ax_upright: kinematics.mean_accel[0],
            avg_acc_ay_upright: kinematics.mean_accel[1],
            avg_acc_az_upright: kinematics.mean_accel[2],
            max_acc_ax_upright: acc(Axis::X).map(|p| p.value),
            time_to_max_acc_ax_upright: acc(Axis::X).map(|p| p.time_from_baseline),
            max_acc_ay_upright: acc(Axis::Y).map(|p| p.value),
            time_to_max_acc_ay_upright: acc(Axis::Y).map(|p| p.time_from_baseline),
            max_acc_az_upright: acc(Axis::Z).map(|p| p.value),
            time_to_max_acc_az_upright: acc(Axis::Z).map(|p| p.time_from_baseline),
            max_ang_vel_gx_upright: gyro(Axis::X).map(|p| p.value),
            time_to_max_ang_vel_gx_upright: gyro(Axis::X).map(|p| p.time_from_start),
            max_ang_vel_gy_upright: gyro(Axis::Y).map(|p| p.value),
            time_to_max_ang_vel_gy_upright: gyro(Axis::Y).map(|p| p.time_from_start),
            max_ang_vel_gz_upright: gyro(Axis::Z).map(|p| p.value),
            time_to_max_ang_vel_gz_upright: gyro(Axis::Z).map(|p| p.time_from_start),
        }
    }

    /// Numeric fields in column order
    pub fn numeric_fields(&self) -> [Option<f64>; 16] {
        [
            self.step_duration_s,
            self.avg_acc_ax_upright,
            self.avg_acc_ay_upright,
            self.avg_acc_az_upright,
            self.max_acc_ax_upright,
            self.time_to_max_acc_ax_upright,
            self.max_acc_ay_upright,
            self.time_to_max_acc_ay_upright,
            self.max_acc_az_upright,
            self.time_to_max_acc_az_upright,
            self.max_ang_vel_gx_upright,
            self.time_to_max_ang_vel_gx_upright,
            self.max_ang_vel_gy_upright,
            self.time_to_max_ang_vel_gy_upright,
            self.max_ang_vel_gz_upright,
            self.time_to_max_ang_vel_gz_upright,
        ]
    }

    /// Every numeric field zero or missing: nothing worth a row
    pub fn is_empty(&self) -> bool {
        self.numeric_fields()
            .iter()
            .all(|field| field.map_or(true, |value| value == 0.0))
    }
}
