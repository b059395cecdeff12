//! Pipeline stages and per-stage timing

use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Processing stages of one trial, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    /// Time direction fix and rebase
    Normalize,
    /// Counts to physical units
    Convert,
    /// Sampling rate from timestamps
    EstimateRate,
    /// Zero-phase low-pass
    Filter,
    /// Dominant event, gravity and rotation
    Align,
    /// Upright resting levels
    Baseline,
    /// Movement window
    Segment,
    /// Peaks inside the window
    Extract,
    /// Flat metrics record
    Aggregate,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Normalize => "normalize",
            Stage::Convert => "convert",
            Stage::EstimateRate => "estimate_rate",
            Stage::Filter => "filter",
            Stage::Align => "align",
            Stage::Baseline => "baseline",
            Stage::Segment => "segment",
            Stage::Extract => "extract",
            Stage::Aggregate => "aggregate",
        }
    }
}

/// Timing and outcome of one stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageMetrics {
    pub stage: Stage,
    /// Wall time in microseconds
    pub processing_time_us: u64,
    /// Samples the stage worked on
    pub samples: usize,
    pub success: bool,
    /// Error message if the stage failed
    pub error_message: Option<String>,
}

impl StageMetrics {
    /// Start timing a stage
    pub fn start_timing(stage: Stage, samples: usize) -> StageTimer {
        StageTimer {
            start_time: Instant::now(),
            stage,
            samples,
        }
    }
}

/// Helper for timing one stage
pub struct StageTimer {
    start_time: Instant,
    stage: Stage,
    samples: usize,
}

impl StageTimer {
    /// Finish timing and return metrics
    pub fn finish(self) -> StageMetrics {
        StageMetrics {
            stage: self.stage,
            processing_time_us: self.start_time.elapsed().as_micros() as u64,
            samples: self.samples,
            success: true,
            error_message: None,
        }
    }

    /// Finish with error
    pub fn finish_with_error(self, error: &str) -> StageMetrics {
        StageMetrics {
            success: false,
            error_message: Some(error.to_string()),
            ..self.finish()
        }
    }
}
