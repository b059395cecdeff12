//! Batch service: discover trials, process them on a bounded worker pool and
//! funnel every outcome through a single writer task

use crate::discovery::{discover_trials, TrialSource};
use crate::loader::load_trial;
use crate::metrics_table::MetricsTable;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use imu_core::{ImuError, ImuResult, TrialId};
use imu_processing::{MetricsRecord, PipelineConfig, TrialPipeline};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Batch run configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Root of the `p<N>/p<N><no|yes>/<session>` tree
    pub root: PathBuf,
    pub first_patient: u32,
    pub last_patient: u32,
    /// Metrics table, appended to
    pub output: PathBuf,
    /// Trials processed concurrently
    pub workers: usize,
    pub pipeline: PipelineConfig,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("csv"),
            first_patient: 1,
            last_patient: 34,
            output: PathBuf::from("metrics_summary.csv"),
            workers: std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl BatchConfig {
    /// Load from a JSON file; absent fields keep their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {:?}", path))?;
        let config: BatchConfig = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse config {:?}", path))?;
        Ok(config)
    }

    pub fn patients(&self) -> RangeInclusive<u32> {
        self.first_patient..=self.last_patient
    }

    pub fn validate(&self) -> ImuResult<()> {
        if self.workers == 0 {
            return Err(imu_core::config_error!("at least one worker is required"));
        }
        if self.first_patient > self.last_patient {
            return Err(imu_core::config_error!(
                "patient range {}..={} is empty", self.first_patient, self.last_patient
            ));
        }
        self.pipeline.validate()
    }
}

/// Result of one trial as seen by the writer
#[derive(Debug, Clone)]
pub enum TrialOutcome {
    /// Row to append, with the warnings raised along the way
    Extracted {
        record: MetricsRecord,
        warnings: Vec<String>,
    },
    /// Processed, but every numeric field was zero or missing
    Discarded,
    /// Skipped with the reason
    Failed(ImuError),
}

/// Outcome tagged with the trial it belongs to
#[derive(Debug, Clone)]
pub struct TrialReport {
    pub id: TrialId,
    pub outcome: TrialOutcome,
}

/// Batch totals
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub output: PathBuf,
    pub discovered: usize,
    /// Trials that made it through the pipeline (written or discarded)
    pub processed: usize,
    pub written: usize,
    pub discarded: usize,
    pub skipped: usize,
    /// Trials that carried at least one warning
    pub with_warnings: usize,
    /// Skipped trials per failure kind
    pub failures: BTreeMap<String, usize>,
}

impl BatchSummary {
    fn new(output: &Path) -> Self {
        BatchSummary {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            output: output.to_path_buf(),
            discovered: 0,
            processed: 0,
            written: 0,
            discarded: 0,
            skipped: 0,
            with_warnings: 0,
            failures: BTreeMap::new(),
        }
    }

    fn record(&mut self, outcome: &TrialOutcome) {
        match outcome {
            TrialOutcome::Extracted { warnings, .. } => {
                self.processed += 1;
                self.written += 1;
                if !warnings.is_empty() {
                    self.with_warnings += 1;
                }
            }
            TrialOutcome::Discarded => {
                self.processed += 1;
                self.discarded += 1;
            }
            TrialOutcome::Failed(error) => {
                self.skipped += 1;
                *self.failures.entry(error.kind().to_string()).or_insert(0) += 1;
            }
        }
    }

    /// Wall time in seconds, once finished
    pub fn elapsed_s(&self) -> Option<f64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds() as f64 / 1000.0)
    }
}

impl std::fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Run {} started {}", self.run_id, self.started_at.format("%Y-%m-%d %H:%M:%S UTC"))?;
        writeln!(f, "  discovered: {}", self.discovered)?;
        writeln!(f, "  processed:  {} ({} written, {} discarded)", self.processed, self.written, self.discarded)?;
        writeln!(f, "  skipped:    {}", self.skipped)?;
        for (kind, count) in &self.failures {
            writeln!(f, "    {}: {}", kind, count)?;
        }
        if let Some(elapsed) = self.elapsed_s() {
            writeln!(f, "  elapsed:    {:.2}s", elapsed)?;
        }
        write!(f, "  output:     {}", self.output.display())
    }
}

/// Load and process one trial file
pub fn process_trial(pipeline: &TrialPipeline, source: &TrialSource) -> TrialOutcome {
    let analysis = load_trial(&source.path, source.id.clone())
        .and_then(|recording| pipeline.analyze(&recording));

    match analysis {
        Ok(analysis) => match analysis.metrics_record() {
            Some(record) => TrialOutcome::Extracted {
                record: record.clone(),
                warnings: analysis.warnings.clone(),
            },
            None => TrialOutcome::Discarded,
        },
        Err(error) => TrialOutcome::Failed(error),
    }
}

/// Batch processing service
pub struct BatchService {
    config: BatchConfig,
    pipeline: Arc<TrialPipeline>,
}

impl BatchService {
    pub fn new(config: BatchConfig) -> ImuResult<Self> {
        config.validate()?;
        let pipeline = Arc::new(TrialPipeline::new(config.pipeline.clone())?);
        Ok(BatchService { config, pipeline })
    }

    /// Process every discovered trial, appending rows as trials complete
    pub async fn run(&self) -> Result<BatchSummary> {
        let trials = discover_trials(&self.config.root, self.config.patients());
        info!(
            "Discovered {} trials under {} (patients {}..={})",
            trials.len(), self.config.root.display(), self.config.first_patient, self.config.last_patient
        );

        let mut summary = BatchSummary::new(&self.config.output);
        summary.discovered = trials.len();

        let table = MetricsTable::open(&self.config.output)?;
        let (report_sender, report_receiver) = mpsc::channel(self.config.workers * 2);
        let writer = tokio::spawn(write_reports(table, report_receiver, summary));

        let semaphore = Arc::new(Semaphore::new(self.config.workers));
        let mut workers = Vec::with_capacity(trials.len());

        for source in trials {
            let permit = semaphore.clone().acquire_owned().await
                .context("Worker pool closed")?;
            let pipeline = self.pipeline.clone();
            let sender = report_sender.clone();

            workers.push(tokio::spawn(async move {
                let id = source.id.clone();
                let outcome = match tokio::task::spawn_blocking(move || process_trial(&pipeline, &source)).await {
                    Ok(outcome) => outcome,
                    Err(e) => TrialOutcome::Failed(imu_core::malformed!("worker aborted: {}", e)),
                };
                drop(permit);

                if sender.send(TrialReport { id, outcome }).await.is_err() {
                    warn!("Writer stopped before all trials were reported");
                }
            }));
        }
        drop(report_sender);

        for worker in workers {
            worker.await.context("Trial worker failed")?;
        }

        let mut summary = writer.await.context("Writer task failed")??;
        summary.finished_at = Some(Utc::now());

        info!(
            run_id = %summary.run_id,
            "Batch complete: {} processed, {} written, {} discarded, {} skipped",
            summary.processed, summary.written, summary.discarded, summary.skipped
        );
        Ok(summary)
    }
}

/// Single owner of the metrics table
async fn write_reports(
    mut table: MetricsTable,
    mut receiver: mpsc::Receiver<TrialReport>,
    mut summary: BatchSummary,
) -> Result<BatchSummary> {
    while let Some(report) = receiver.recv().await {
        match &report.outcome {
            TrialOutcome::Extracted { record, warnings } => {
                for warning in warnings {
                    warn!(trial = %report.id, "{}", warning);
                }
                table.append(record)?;
                info!(trial = %report.id, "Row written");
            }
            TrialOutcome::Discarded => {
                info!(trial = %report.id, "All metrics empty, row discarded");
            }
            TrialOutcome::Failed(error) => {
                warn!(trial = %report.id, kind = %error.kind(), "Skipped: {}", error);
            }
        }
        summary.record(&report.outcome);
    }

    debug!("Writer closed after {} rows to {}", table.rows_written(), table.path().display());
    Ok(summary)
}
