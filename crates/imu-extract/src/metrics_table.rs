//! Append-only metrics summary table

use anyhow::{anyhow, Context, Result};
use csv::WriterBuilder;
use imu_processing::{MetricsRecord, METRICS_COLUMNS};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Owner of the output file. Every row reaches the file in one `write_all`.
pub struct MetricsTable {
    path: PathBuf,
    file: File,
    rows_written: usize,
}

fn encode<F>(fill: F) -> Result<Vec<u8>>
where
    F: FnOnce(&mut csv::Writer<Vec<u8>>) -> csv::Result<()>,
{
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(Vec::new());
    fill(&mut writer)?;
    writer.into_inner().map_err(|e| anyhow!("Failed to encode row: {}", e.error()))
}

impl MetricsTable {
    /// Open for appending; the header is written only when the file is new or empty
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open metrics table {:?}", path))?;

        let existing = file.metadata()
            .with_context(|| format!("Failed to stat {:?}", path))?
            .len();
        if existing == 0 {
            let header = encode(|w| w.write_record(METRICS_COLUMNS))?;
            file.write_all(&header)
                .with_context(|| format!("Failed to write header to {:?}", path))?;
            info!("Created metrics table {}", path.display());
        }

        Ok(MetricsTable {
            path: path.to_path_buf(),
            file,
            rows_written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows appended through this handle
    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    pub fn append(&mut self, record: &MetricsRecord) -> Result<()> {
        let row = encode(|w| w.serialize(record))?;
        self.file.write_all(&row)
            .with_context(|| format!("Failed to append to {:?}", self.path))?;
        self.file.flush()?;
        self.rows_written += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use imu_core::{Intervention, TrialId};
    use imu_processing::StepKinematics;
    use tempfile::tempdir;

    fn record(file: &str) -> MetricsRecord {
        let id = TrialId::new("p4", Intervention::Yes, "s1", file);
        let mut record = MetricsRecord::assemble(&id, Some(0.97), &StepKinematics::default());
        record.max_acc_az_upright = Some(14.8);
        record
    }

    #[test]
    fn test_header_written_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("results").join("metrics_summary.csv");

        let mut table = MetricsTable::open(&path).unwrap();
        table.append(&record("imu_104_0.csv")).unwrap();
        drop(table);

        let mut table = MetricsTable::open(&path).unwrap();
        table.append(&record("imu_105_1.csv")).unwrap();
        assert_eq!(table.rows_written(), 1);

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], METRICS_COLUMNS.join(","));
        assert!(lines[1].starts_with("p4,yes,s1,imu_104_0.csv,0.97,"));
        assert_eq!(content.matches("patient_id").count(), 1);
    }

    #[test]
    fn test_missing_values_are_empty_cells() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("metrics_summary.csv");
        let mut table = MetricsTable::open(&path).unwrap();
        let expected = record("imu_104_0.csv");
        table.append(&expected).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.len(), METRICS_COLUMNS.len());

        let rows: Vec<MetricsRecord> = reader.deserialize().map(|r| r.unwrap()).collect();
        assert_eq!(rows, vec![expected]);

        let raw = std::fs::read_to_string(&path).unwrap();
        let row = raw.lines().nth(1).unwrap();
        assert!(row.contains(",,"));
    }
}
