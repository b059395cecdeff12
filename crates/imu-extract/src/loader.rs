//! Trial CSV loading and writing
//!
//! Columns are located by header name, extra columns are ignored. The
//! quaternion columns are optional and only read when all four are present.

use anyhow::{Context, Result};
use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};
use imu_core::{Axis, ImuResult, Quaternion, Sample, TrialId, TrialRecording};
use std::path::Path;

pub const TIME_COLUMN: &str = "programtime";
pub const QUATERNION_COLUMNS: [&str; 4] = ["q0", "q1", "q2", "q3"];

/// Positions of the recognised columns in one file
struct ColumnMap {
    time: usize,
    accel: [usize; 3],
    gyro: [usize; 3],
    quaternion: Option<[usize; 4]>,
}

impl ColumnMap {
    fn from_headers(headers: &StringRecord, path: &Path) -> ImuResult<Self> {
        let find = |name: &str| headers.iter().position(|h| h.trim() == name);
        let require = |name: &str| {
            find(name).ok_or_else(|| imu_core::malformed!("{}: missing column '{}'", path.display(), name))
        };

        let time = require(TIME_COLUMN)?;
        let mut accel = [0; 3];
        let mut gyro = [0; 3];
        for axis in Axis::ALL {
            accel[axis.index()] = require(axis.accel_label())?;
            gyro[axis.index()] = require(axis.gyro_label())?;
        }

        let quaternion = match QUATERNION_COLUMNS.map(find) {
            [Some(w), Some(x), Some(y), Some(z)] => Some([w, x, y, z]),
            _ => None,
        };

        Ok(ColumnMap { time, accel, gyro, quaternion })
    }
}

fn parse_cell(record: &StringRecord, index: usize, column: &str, row: usize, path: &Path) -> ImuResult<f64> {
    let cell = record.get(index).unwrap_or("");
    cell.trim().parse::<f64>().map_err(|_| {
        imu_core::malformed!("{}: row {} has invalid {} value '{}'", path.display(), row, column, cell)
    })
}

/// Read one trial CSV
pub fn load_trial(path: &Path, id: TrialId) -> ImuResult<TrialRecording> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .flexible(true)
        .from_path(path)
        .map_err(|e| imu_core::malformed!("{}: cannot open ({})", path.display(), e))?;

    let headers = reader.headers()
        .map_err(|e| imu_core::malformed!("{}: unreadable header ({})", path.display(), e))?
        .clone();
    let columns = ColumnMap::from_headers(&headers, path)?;

    let mut samples = Vec::new();
    for (row_idx, result) in reader.records().enumerate() {
        // 1-based line number including the header
        let row = row_idx + 2;
        let record = result.map_err(|e| imu_core::malformed!("{}: row {} unreadable ({})", path.display(), row, e))?;

        let t = parse_cell(&record, columns.time, TIME_COLUMN, row, path)?;
        let mut accel = [0.0; 3];
        let mut gyro = [0.0; 3];
        for axis in Axis::ALL {
            let i = axis.index();
            accel[i] = parse_cell(&record, columns.accel[i], axis.accel_label(), row, path)?;
            gyro[i] = parse_cell(&record, columns.gyro[i], axis.gyro_label(), row, path)?;
        }

        // Orientation is auxiliary; an unparsable quaternion is dropped, not fatal
        let quaternion = columns.quaternion.and_then(|[w, x, y, z]| {
            let value = |i: usize| record.get(i).and_then(|c| c.trim().parse::<f64>().ok());
            Some(Quaternion { w: value(w)?, x: value(x)?, y: value(y)?, z: value(z)? })
        });

        samples.push(Sample { t, accel, gyro, quaternion });
    }

    TrialRecording::new(id, samples)
}

/// Write samples in the acquisition layout, quaternion columns when present
pub fn write_trial_csv(path: &Path, samples: &[Sample]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {:?}", parent))?;
    }

    let with_quaternion = samples.first().map_or(false, |s| s.quaternion.is_some());
    let mut writer = WriterBuilder::new()
        .from_path(path)
        .with_context(|| format!("Failed to create {:?}", path))?;

    let mut header = vec![TIME_COLUMN];
    header.extend(Axis::ALL.map(|axis| axis.accel_label()));
    header.extend(Axis::ALL.map(|axis| axis.gyro_label()));
    if with_quaternion {
        header.extend(QUATERNION_COLUMNS);
    }
    writer.write_record(&header)?;

    for sample in samples {
        let mut row = vec![sample.t.to_string()];
        row.extend(sample.accel.iter().map(f64::to_string));
        row.extend(sample.gyro.iter().map(f64::to_string));
        if let (true, Some(q)) = (with_quaternion, sample.quaternion) {
            row.extend([q.w, q.x, q.y, q.z].iter().map(f64::to_string));
        }
        writer.write_record(&row)?;
    }

    writer.flush().with_context(|| format!("Failed to write {:?}", path))?;
    Ok(())
}
