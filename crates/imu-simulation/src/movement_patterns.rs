//! Pre-defined movement profiles for synthetic trials

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Time profile of one upright-frame channel, added on top of gravity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MovementPattern {
    /// No movement
    Rest,
    /// Smooth single push: `amplitude * (1 + cos(pi * dt / half_width)) / 2`
    RaisedCosine {
        center: f64,
        half_width: f64,
        amplitude: f64,
    },
    /// Linear ramp up, hold, linear ramp down
    Trapezoid {
        start: f64,
        rise: f64,
        hold: f64,
        fall: f64,
        amplitude: f64,
    },
    /// Continuous oscillation, e.g. sway
    Sinusoid {
        frequency: f64,
        amplitude: f64,
    },
    /// Single-sample impulse at the sample nearest `time`
    Spike {
        time: f64,
        amplitude: f64,
    },
}

impl MovementPattern {
    /// Value at `time`; `dt` is the sample spacing (used by `Spike`)
    pub fn value_at(&self, time: f64, dt: f64) -> f64 {
        match *self {
            MovementPattern::Rest => 0.0,

            MovementPattern::RaisedCosine { center, half_width, amplitude } => {
                let offset = time - center;
                if offset.abs() < half_width {
                    0.5 * amplitude * (1.0 + (PI * offset / half_width).cos())
                } else {
                    0.0
                }
            }

            MovementPattern::Trapezoid { start, rise, hold, fall, amplitude } => {
                let t = time - start;
                if t <= 0.0 {
                    0.0
                } else if t < rise {
                    amplitude * t / rise
                } else if t <= rise + hold {
                    amplitude
                } else if t < rise + hold + fall {
                    amplitude * (1.0 - (t - rise - hold) / fall)
                } else {
                    0.0
                }
            }

            MovementPattern::Sinusoid { frequency, amplitude } => {
                amplitude * (2.0 * PI * frequency * time).sin()
            }

            MovementPattern::Spike { time: at, amplitude } => {
                if (time - at).abs() < 0.5 * dt {
                    amplitude
                } else {
                    0.0
                }
            }
        }
    }

    /// Get pattern description
    pub fn description(&self) -> &'static str {
        match self {
            MovementPattern::Rest => "Rest",
            MovementPattern::RaisedCosine { .. } => "Smooth push",
            MovementPattern::Trapezoid { .. } => "Ramp and hold",
            MovementPattern::Sinusoid { .. } => "Oscillation",
            MovementPattern::Spike { .. } => "Impulse",
        }
    }

    /// Common upright vertical-acceleration profiles
    pub fn presets() -> Vec<(&'static str, MovementPattern)> {
        vec![
            ("Quiet standing", MovementPattern::Rest),
            ("Step", MovementPattern::RaisedCosine {
                center: 4.1, half_width: 0.3, amplitude: 5.0
            }),
            ("Slow rise", MovementPattern::Trapezoid {
                start: 3.0, rise: 0.3, hold: 0.6, fall: 0.3, amplitude: 2.5
            }),
            ("Postural sway", MovementPattern::Sinusoid {
                frequency: 0.3, amplitude: 0.1
            }),
            ("Tap", MovementPattern::Spike {
                time: 4.0, amplitude: 8.0
            }),
        ]
    }
}
