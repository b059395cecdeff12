//! Sampling-rate estimation from recorded timestamps

use imu_core::{ImuError, ImuResult};

/// Median of a slice; the mean of the two middle values for an even count
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Effective sampling rate: `1 / median(Δt)`
pub fn estimate_sampling_rate(times: &[f64]) -> ImuResult<f64> {
    if times.len() < 2 {
        return Err(ImuError::InvalidSamplingRate {
            rate: f64::NAN,
            reason: format!("{} timestamps, at least 2 required", times.len()),
        });
    }

    let gaps: Vec<f64> = times.windows(2).map(|w| w[1] - w[0]).collect();
    let median_gap = median(&gaps).unwrap_or(0.0);

    if !(median_gap.is_finite() && median_gap > 0.0) {
        return Err(ImuError::InvalidSamplingRate {
            rate: 1.0 / median_gap,
            reason: format!("median time gap is {}", median_gap),
        });
    }

    Ok(1.0 / median_gap)
}
