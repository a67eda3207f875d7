use std::fmt;

use serde::{Deserialize, Serialize};

/// The physical action an alarm demands before it can be silenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Step,
    Blink,
}

impl Modality {
    /// Unit noun used in user-facing text ("steps", "blinks").
    pub fn unit_plural(self) -> &'static str {
        match self {
            Modality::Step => "steps",
            Modality::Blink => "blinks",
        }
    }

    /// Short instruction shown on the alarm indicator.
    pub fn instruction(self, goal: u32) -> String {
        match self {
            Modality::Step => format!("Walk {goal} steps to stop"),
            Modality::Blink => format!("Blink {goal} times to stop"),
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Modality::Step => f.write_str("step"),
            Modality::Blink => f.write_str("blink"),
        }
    }
}

/// Which upstream signal produced a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTag {
    /// Linear acceleration magnitude in m/s².
    Accelerometer,
    /// One sample per step reported by a hardware step detector.
    StepPulse,
    /// Lifetime step counter; magnitude is the cumulative count.
    StepCounter,
    /// Mean luma (0-255) of a front camera frame.
    Camera,
}

impl SourceTag {
    pub fn modality(self) -> Modality {
        match self {
            SourceTag::Accelerometer | SourceTag::StepPulse | SourceTag::StepCounter => {
                Modality::Step
            }
            SourceTag::Camera => Modality::Blink,
        }
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceTag::Accelerometer => "accelerometer",
            SourceTag::StepPulse => "step pulse",
            SourceTag::StepCounter => "step counter",
            SourceTag::Camera => "camera",
        };
        f.write_str(name)
    }
}

/// One scalar reading. Consumed immediately by a detector, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorSample {
    /// Monotonic timestamp in milliseconds.
    pub timestamp_ms: u64,
    pub magnitude: f64,
    pub source: SourceTag,
}

impl SensorSample {
    pub fn new(source: SourceTag, timestamp_ms: u64, magnitude: f64) -> Self {
        Self {
            timestamp_ms,
            magnitude,
            source,
        }
    }

    /// Acceleration magnitude from a three-axis reading.
    pub fn from_axes(timestamp_ms: u64, x: f64, y: f64, z: f64) -> Self {
        Self::new(
            SourceTag::Accelerometer,
            timestamp_ms,
            (x * x + y * y + z * z).sqrt(),
        )
    }
}
