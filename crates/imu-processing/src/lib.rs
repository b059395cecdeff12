//! IMU-Processing: step-kinematics extraction for single trials
//!
//! Rate estimation, zero-phase filtering, gravity alignment, movement
//! segmentation and peak extraction, chained by [`TrialPipeline`].

pub mod alignment;
pub mod baseline;
pub mod config;
pub mod extraction;
pub mod filters;
pub mod metrics;
pub mod peaks;
pub mod pipeline;
pub mod processor;
pub mod sampling;
pub mod segmentation;

pub use pipeline::{TrialAnalysis, TrialPipeline};
pub use processor::{Stage, StageMetrics};
pub use alignment::{DominantEvent, GravityAlignment};
pub use baseline::{Baseline, BaselineWindow};
pub use config::{DetectionSettings, FilterSettings, PipelineConfig, SegmentationSettings};
pub use extraction::{GyroMagnitudePeak, GyroPeak, PeakExtractor, PeakRecord, StepKinematics};
pub use filters::ButterworthLowpass;
pub use metrics::{MetricsRecord, METRICS_COLUMNS};
pub use segmentation::{EndBoundary, MovementPhase, MovementWindow, StartBoundary};
