//! Sample-to-event detection.
//!
//! Each ring cycle gets a fresh [`EventDetector`] for the alarm's
//! modality. The detector owns its window; nothing is shared between
//! cycles or alarms.

mod blink;
mod fusion;
mod motion;

pub use blink::{BlinkDetector, BlinkDetectorConfig};
pub use fusion::{fuse, CounterAccumulator, PulseAccumulator};
pub use motion::{MotionDetector, MotionDetectorConfig};

use serde::{Deserialize, Serialize};

use crate::sensing::{Modality, SensorSample, SourceTag};

/// Turns samples into unit events (steps or blinks).
pub trait EventDetector: Send {
    fn modality(&self) -> Modality;

    /// Consume one sample and return how many new units it produced.
    /// Samples from sources of another modality produce nothing.
    fn ingest(&mut self, sample: &SensorSample) -> u32;
}

/// Detector settings for both modalities.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    #[serde(default)]
    pub motion: MotionDetectorConfig,
    #[serde(default)]
    pub blink: BlinkDetectorConfig,
}

/// Build a fresh detector for one ring cycle.
pub fn detector_for(modality: Modality, config: &DetectorConfig) -> Box<dyn EventDetector> {
    match modality {
        Modality::Step => Box::new(StepDetector::new(config.motion.clone())),
        Modality::Blink => Box::new(BlinkDetector::new(config.blink.clone())),
    }
}

/// Step detection over every step-capable source, fused by `max`.
///
/// Each channel keeps its own tally: accelerometer peaks, hardware
/// pulses and the lifetime counter delta. A step seen by several
/// channels counts once.
#[derive(Debug, Clone)]
pub struct StepDetector {
    motion: MotionDetector,
    peaks: PulseAccumulator,
    pulses: PulseAccumulator,
    counter: CounterAccumulator,
    reported: u32,
}

impl StepDetector {
    pub fn new(config: MotionDetectorConfig) -> Self {
        Self {
            motion: MotionDetector::new(config),
            peaks: PulseAccumulator::default(),
            pulses: PulseAccumulator::default(),
            counter: CounterAccumulator::default(),
            reported: 0,
        }
    }

    /// Fused progress so far.
    pub fn total(&self) -> u32 {
        fuse(
            fuse(self.peaks.count(), self.pulses.count()),
            self.counter.delta(),
        )
    }

    pub fn peak_count(&self) -> u32 {
        self.peaks.count()
    }

    pub fn pulse_count(&self) -> u32 {
        self.pulses.count()
    }

    pub fn counter_delta(&self) -> u32 {
        self.counter.delta()
    }
}

impl EventDetector for StepDetector {
    fn modality(&self) -> Modality {
        Modality::Step
    }

    fn ingest(&mut self, sample: &SensorSample) -> u32 {
        match sample.source {
            SourceTag::Accelerometer => {
                if self.motion.process(sample.timestamp_ms, sample.magnitude) {
                    self.peaks.record();
                }
            }
            SourceTag::StepPulse => {
                self.pulses.record();
            }
            SourceTag::StepCounter => {
                self.counter.observe(sample.magnitude);
            }
            SourceTag::Camera => return 0,
        }

        let total = self.total();
        let fresh = total.saturating_sub(self.reported);
        self.reported = total;
        fresh
    }
}

impl EventDetector for BlinkDetector {
    fn modality(&self) -> Modality {
        Modality::Blink
    }

    fn ingest(&mut self, sample: &SensorSample) -> u32 {
        if sample.source != SourceTag::Camera {
            return 0;
        }
        u32::from(self.process(sample.timestamp_ms, sample.magnitude))
    }
}
