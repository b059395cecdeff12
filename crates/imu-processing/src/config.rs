//! Configuration management for trial processing

use imu_core::{ImuError, ImuResult, ScaleFactors};
use serde::{Deserialize, Serialize};

/// Complete parameter set of the trial pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PipelineConfig {
    /// Count-to-unit conversion
    pub scale: ScaleFactors,
    /// Zero-phase low-pass
    pub filter: FilterSettings,
    /// Event detection and gravity baseline
    pub detection: DetectionSettings,
    /// Movement window search
    pub segmentation: SegmentationSettings,
}

/// Butterworth low-pass parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    /// Cutoff frequency in Hz
    pub cutoff_hz: f64,
    /// Filter order, even
    pub order: usize,
}

/// Dominant event and baseline parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionSettings {
    /// Candidates kept per axis, ranked by magnitude
    pub candidate_peaks_per_axis: usize,
    /// Samples before the event used as the gravity baseline
    pub baseline_window: usize,
    /// Search the event again on the upright axes
    pub refine_in_upright_frame: bool,
    /// Peak distance (samples) of the upright search
    pub refine_peak_distance: usize,
    /// Fraction of the strongest peak prominence below which a peak is not a candidate
    pub min_candidate_prominence: f64,
}

/// Movement window parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationSettings {
    /// Per-axis deviation from baseline (m/s²)
    pub deviation_threshold: f64,
    /// Required quiet period before the movement start (s)
    pub stable_duration_s: f64,
}

impl Default for FilterSettings {
    fn default() -> Self {
        FilterSettings {
            cutoff_hz: 3.0,
            order: 2,
        }
    }
}

impl Default for DetectionSettings {
    fn default() -> Self {
        DetectionSettings {
            candidate_peaks_per_axis: 4,
            baseline_window: 200,
            refine_in_upright_frame: true,
            refine_peak_distance: 20,
            min_candidate_prominence: 0.01,
        }
    }
}

impl Default for SegmentationSettings {
    fn default() -> Self {
        SegmentationSettings {
            deviation_threshold: 0.4,
            stable_duration_s: 1.0,
        }
    }
}

impl SegmentationSettings {
    /// Quiet-period length in samples at the given rate, at least one
    pub fn stable_samples(&self, sampling_rate: f64) -> usize {
        ((sampling_rate * self.stable_duration_s).floor() as usize).max(1)
    }
}

impl PipelineConfig {
    /// Check every parameter before any trial is touched
    pub fn validate(&self) -> ImuResult<()> {
        self.scale.validate()?;

        if !(self.filter.cutoff_hz.is_finite() && self.filter.cutoff_hz > 0.0) {
            return Err(imu_core::config_error!(
                "cutoff frequency must be positive, got {}", self.filter.cutoff_hz
            ));
        }
        if self.filter.order == 0 || self.filter.order % 2 != 0 {
            return Err(imu_core::config_error!(
                "filter order must be a positive even number, got {}", self.filter.order
            ));
        }

        if self.detection.candidate_peaks_per_axis == 0 {
            return Err(imu_core::config_error!("at least one candidate peak per axis is required"));
        }
        if self.detection.baseline_window == 0 {
            return Err(imu_core::config_error!("baseline window must hold at least one sample"));
        }
        if self.detection.refine_peak_distance == 0 {
            return Err(imu_core::config_error!("refinement peak distance must be at least 1"));
        }
        let floor = self.detection.min_candidate_prominence;
        if !(floor.is_finite() && (0.0..1.0).contains(&floor)) {
            return Err(imu_core::config_error!("candidate prominence fraction must be in [0, 1), got {}", floor));
        }

        let segmentation = &self.segmentation;
        if !(segmentation.deviation_threshold.is_finite() && segmentation.deviation_threshold > 0.0) {
            return Err(imu_core::config_error!(
                "deviation threshold must be positive, got {}", segmentation.deviation_threshold
            ));
        }
        if !(segmentation.stable_duration_s.is_finite() && segmentation.stable_duration_s > 0.0) {
            return Err(imu_core::config_error!(
                "stable duration must be positive, got {}", segmentation.stable_duration_s
            ));
        }

        Ok(())
    }

    /// Export configuration to JSON
    pub fn to_json_pretty(&self) -> ImuResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| ImuError::InvalidConfig {
            reason: format!("Failed to serialize config: {}", e),
        })
    }

    /// Import and validate configuration from JSON; missing fields take defaults
    pub fn from_json_str(json: &str) -> ImuResult<Self> {
        let config: PipelineConfig = serde_json::from_str(json).map_err(|e| ImuError::InvalidConfig {
            reason: format!("Failed to deserialize config: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }
}
