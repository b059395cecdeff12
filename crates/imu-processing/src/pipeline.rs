//! Trial pipeline: one recording in, one analysis (and metrics row) out

use crate::alignment::{refine_event, DominantEvent, GravityAlignment};
use crate::baseline::{Baseline, BaselineWindow};
use crate::config::PipelineConfig;
use crate::extraction::{PeakExtractor, StepKinematics};
use crate::filters::ButterworthLowpass;
use crate::metrics::MetricsRecord;
use crate::processor::{Stage, StageMetrics};
use crate::sampling::estimate_sampling_rate;
use crate::segmentation::{segment, MovementWindow};
use imu_core::{ImuError, ImuResult, TrialId, TrialRecording};
use serde::Serialize;
use tracing::{debug, warn};

/// Runs every stage on one recording with a fixed configuration
#[derive(Debug, Clone)]
pub struct TrialPipeline {
    config: PipelineConfig,
}

/// Full result of one trial, including intermediate diagnostics
#[derive(Debug, Clone, Serialize)]
pub struct TrialAnalysis {
    pub trial: TrialId,
    pub sample_count: usize,
    /// Estimated sampling rate (Hz)
    pub sampling_rate: f64,
    pub filter: ButterworthLowpass,
    /// Roll, pitch and yaw (degrees) of the on-device quaternion at the first sample
    pub initial_orientation_deg: Option<[f64; 3]>,
    /// Dominant event in the sensor frame
    pub dominant_event: DominantEvent,
    /// Event index found again in the upright frame, when accepted
    pub refined_event: Option<usize>,
    pub alignment: GravityAlignment,
    pub baseline: Baseline,
    pub window: MovementWindow,
    pub step_duration_s: f64,
    pub kinematics: StepKinematics,
    pub record: MetricsRecord,
    pub stage_metrics: Vec<StageMetrics>,
    pub warnings: Vec<String>,
}

impl TrialAnalysis {
    /// Event index the movement window was searched around
    pub fn event_index(&self) -> usize {
        self.window.event
    }

    /// Metrics row, or `None` when every numeric field is zero or missing
    pub fn metrics_record(&self) -> Option<&MetricsRecord> {
        (!self.record.is_empty()).then_some(&self.record)
    }

    /// Sum of all stage times in microseconds
    pub fn total_time_us(&self) -> u64 {
        self.stage_metrics.iter().map(|m| m.processing_time_us).sum()
    }
}

/// Collects stage metrics while the pipeline runs
struct StageLog<'a> {
    trial: &'a TrialId,
    metrics: Vec<StageMetrics>,
}

impl<'a> StageLog<'a> {
    fn run<T, F>(&mut self, stage: Stage, samples: usize, f: F) -> ImuResult<T>
    where
        F: FnOnce() -> ImuResult<T>,
    {
        let timer = StageMetrics::start_timing(stage, samples);
        match f() {
            Ok(value) => {
                let metrics = timer.finish();
                debug!(trial = %self.trial, stage = stage.name(), time_us = metrics.processing_time_us, "stage complete");
                self.metrics.push(metrics);
                Ok(value)
            }
            Err(error) => {
                debug!(trial = %self.trial, stage = stage.name(), %error, "stage failed");
                self.metrics.push(timer.finish_with_error(&error.to_string()));
                Err(error)
            }
        }
    }
}

impl TrialPipeline {
    /// Create a pipeline, rejecting invalid configuration up front
    pub fn new(config: PipelineConfig) -> ImuResult<Self> {
        config.validate()?;
        Ok(TrialPipeline { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every stage on `recording`
    pub fn analyze(&self, recording: &TrialRecording) -> ImuResult<TrialAnalysis> {
        let config = &self.config;
        let n = recording.len();
        let mut stages = StageLog { trial: &recording.id, metrics: Vec::new() };
        let mut warnings = Vec::new();

        let normalized = stages.run(Stage::Normalize, n, || Ok(recording.normalized()))?;
        let channels = stages.run(Stage::Convert, n, || Ok(normalized.to_channels(&config.scale)))?;
        let initial_orientation_deg = normalized.samples.first()
            .and_then(|s| s.quaternion)
            .map(|q| q.to_euler_degrees());
        let sampling_rate = stages.run(Stage::EstimateRate, n, || estimate_sampling_rate(&channels.time))?;

        let (filter, filtered) = stages.run(Stage::Filter, n, || {
            let filter = ButterworthLowpass::design(&config.filter, sampling_rate)?;
            let filtered = filter.smooth_channels(&channels)?;
            Ok((filter, filtered))
        })?;

        let (dominant_event, alignment, upright) = stages.run(Stage::Align, n, || {
            let distance = (sampling_rate.floor() as usize).max(1);
            let detection = &config.detection;
            let event = DominantEvent::detect(
                &filtered.accel,
                distance,
                detection.candidate_peaks_per_axis,
                detection.min_candidate_prominence,
            )
            .ok_or(ImuError::NoEventDetected)?;

            let window = BaselineWindow::ending_at(event.index, config.detection.baseline_window);
            let alignment = GravityAlignment::estimate(&filtered, window)?;
            let upright = alignment.to_upright(&filtered);
            Ok((event, alignment, upright))
        })?;

        let refined_event = if config.detection.refine_in_upright_frame {
            let refined = refine_event(&upright, alignment.window, &config.detection);
            if refined.is_none() {
                debug!(trial = %recording.id, event = dominant_event.index, "upright refinement rejected, keeping dominant event");
            }
            refined
        } else {
            None
        };
        let event = refined_event.unwrap_or(dominant_event.index);

        let baseline = stages.run(Stage::Baseline, alignment.window.len(), || {
            Baseline::estimate(&upright, alignment.window, config.segmentation.deviation_threshold)
        })?;

        let window = stages.run(Stage::Segment, n, || {
            let stable_samples = config.segmentation.stable_samples(sampling_rate);
            Ok(segment(&upright, &baseline, event, stable_samples))
        })?;

        if window.start.is_fallback() {
            warn!(trial = %recording.id, start = window.start_index(), "no quiet period before the event, movement start falls back to baseline start");
            warnings.push(format!("movement start fell back to baseline start {}", window.start_index()));
        }
        if window.end.is_fallback() {
            warn!(trial = %recording.id, end = window.end_index(), "signal never settled, movement end falls back to last sample");
            warnings.push(format!("movement end fell back to last sample {}", window.end_index()));
        }
        if window.is_degenerate() {
            let error = ImuError::InsufficientWindow {
                start: window.start_index(),
                end: window.end_index(),
            };
            warn!(trial = %recording.id, %error, "peak fields left empty");
            warnings.push(error.to_string());
        }

        let kinematics = stages.run(Stage::Extract, window.len(), || {
            Ok(PeakExtractor::new(sampling_rate).extract(&upright, &baseline, &window))
        })?;

        let step_duration_s = window.duration(&upright.time);
        let record = stages.run(Stage::Aggregate, window.len(), || {
            Ok(MetricsRecord::assemble(&recording.id, Some(step_duration_s), &kinematics))
        })?;

        Ok(TrialAnalysis {
            trial: recording.id.clone(),
            sample_count: n,
            sampling_rate,
            filter,
            initial_orientation_deg,
            dominant_event,
            refined_event,
            alignment,
            baseline,
            window,
            step_duration_s,
            kinematics,
            record,
            stage_metrics: stages.metrics,
            warnings,
        })
    }

    /// Metrics row of one recording; `Ok(None)` when the row would be empty
    pub fn process(&self, recording: &TrialRecording) -> ImuResult<Option<MetricsRecord>> {
        let analysis = self.analyze(recording)?;
        Ok(analysis.metrics_record().cloned())
    }
}
