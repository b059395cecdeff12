//! Error handling for the IMU extraction workspace
//!
//! Every error is local to one trial. The batch reports it with the trial's
//! identity and moves on to the next recording.

use core::fmt;

/// Result type alias for IMU workspace operations
pub type ImuResult<T> = Result<T, ImuError>;

/// Error type for all trial processing operations
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ImuError {
    /// Unreadable, short or inconsistent input table
    MalformedInput {
        /// Description of the input problem
        reason: String,
    },

    /// Sampling rate could not be derived from the timestamps
    InvalidSamplingRate {
        /// Estimated rate (may be infinite or NaN)
        rate: f64,
        /// Why the rate was rejected
        reason: String,
    },

    /// Low-pass design impossible for the estimated sampling rate
    DegenerateFilterDesign {
        /// Requested cutoff frequency in Hz
        cutoff_hz: f64,
        /// Estimated sampling rate in Hz
        sampling_rate: f64,
        /// Cutoff normalized to Nyquist, outside (0, 1)
        normalized_cutoff: f64,
    },

    /// No candidate peak on any acceleration axis
    NoEventDetected,

    /// Mean baseline acceleration has zero length
    GravityUndefined,

    /// Movement window collapsed to a single sample
    InsufficientWindow {
        /// Movement start index
        start: usize,
        /// Movement end index
        end: usize,
    },

    /// Invalid pipeline or batch configuration
    InvalidConfig {
        /// Description of the configuration error
        reason: String,
    },
}

/// Coarse failure classification used in batch reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FailureKind {
    MalformedInput,
    DegenerateFilterDesign,
    NoEventDetected,
    InsufficientWindow,
    Configuration,
}

impl ImuError {
    /// Classify the error for batch accounting
    pub fn kind(&self) -> FailureKind {
        match self {
            ImuError::MalformedInput { .. } | ImuError::InvalidSamplingRate { .. } => {
                FailureKind::MalformedInput
            }
            ImuError::DegenerateFilterDesign { .. } => FailureKind::DegenerateFilterDesign,
            ImuError::NoEventDetected | ImuError::GravityUndefined => FailureKind::NoEventDetected,
            ImuError::InsufficientWindow { .. } => FailureKind::InsufficientWindow,
            ImuError::InvalidConfig { .. } => FailureKind::Configuration,
        }
    }
}

impl fmt::Display for ImuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImuError::MalformedInput { reason } => {
                write!(f, "Malformed input: {}", reason)
            }
            ImuError::InvalidSamplingRate { rate, reason } => {
                write!(f, "Invalid sampling rate {}Hz: {}", rate, reason)
            }
            ImuError::DegenerateFilterDesign { cutoff_hz, sampling_rate, normalized_cutoff } => {
                write!(f, "Degenerate filter design: cutoff {}Hz at {:.3}Hz gives normalized cutoff {:.3}",
                       cutoff_hz, sampling_rate, normalized_cutoff)
            }
            ImuError::NoEventDetected => {
                write!(f, "No event detected: no peak candidates on any acceleration axis")
            }
            ImuError::GravityUndefined => {
                write!(f, "Gravity undefined: baseline acceleration has zero length")
            }
            ImuError::InsufficientWindow { start, end } => {
                write!(f, "Insufficient movement window: [{}, {}]", start, end)
            }
            ImuError::InvalidConfig { reason } => {
                write!(f, "Invalid configuration: {}", reason)
            }
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::MalformedInput => "MalformedInput",
            FailureKind::DegenerateFilterDesign => "DegenerateFilterDesign",
            FailureKind::NoEventDetected => "NoEventDetected",
            FailureKind::InsufficientWindow => "InsufficientWindow",
            FailureKind::Configuration => "Configuration",
        };
        f.write_str(name)
    }
}

impl std::error::Error for ImuError {}

/// Convenience macro for creating malformed-input errors
#[macro_export]
macro_rules! malformed {
    ($($arg:tt)+) => {
        $crate::error::ImuError::MalformedInput {
            reason: format!($($arg)+)
        }
    };
}

/// Convenience macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)+) => {
        $crate::error::ImuError::InvalidConfig {
            reason: format!($($arg)+)
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = ImuError::DegenerateFilterDesign {
            cutoff_hz: 3.0,
            sampling_rate: 5.0,
            normalized_cutoff: 1.2,
        };
        let display = format!("{}", error);
        assert!(display.contains("Degenerate filter design"));
        assert!(display.contains("3Hz"));
        assert!(display.contains("1.200"));
    }

    #[test]
    fn test_error_kinds() {
        let rate = ImuError::InvalidSamplingRate {
            rate: f64::INFINITY,
            reason: "all timestamps identical".to_string(),
        };
        assert_eq!(rate.kind(), FailureKind::MalformedInput);
        assert_eq!(ImuError::GravityUndefined.kind(), FailureKind::NoEventDetected);
        assert_eq!(ImuError::InsufficientWindow { start: 3, end: 3 }.kind(),
                   FailureKind::InsufficientWindow);
    }

    #[test]
    fn test_error_macros() {
        let error = malformed!("only {} rows", 1);
        assert_eq!(error, ImuError::MalformedInput { reason: "only 1 rows".to_string() });

        let error = config_error!("threshold must be positive");
        assert_eq!(error.kind(), FailureKind::Configuration);
    }
}
