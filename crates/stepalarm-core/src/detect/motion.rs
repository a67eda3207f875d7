//! Peak detector for walking steps.
//!
//! Single pass, O(1) per sample. A step is accepted when the magnitude
//! rises above `threshold` while the detector is armed and at least
//! `min_interval_ms` has passed since the previous step. The detector
//! re-arms only once the magnitude falls below
//! `threshold * release_ratio`; anything in between is the hysteresis
//! band and changes nothing.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Tuning for [`MotionDetector`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionDetectorConfig {
    /// Magnitude (m/s²) a sample must exceed to count as a step peak.
    pub threshold: f64,
    /// Fraction of `threshold` below which the detector re-arms.
    pub release_ratio: f64,
    /// Minimum milliseconds between two accepted steps.
    pub min_interval_ms: u64,
    /// Number of recent magnitudes retained.
    pub window_len: usize,
    /// Readings above this are treated as sensor glitches and ignored.
    pub max_magnitude: f64,
}

impl Default for MotionDetectorConfig {
    fn default() -> Self {
        Self {
            threshold: 12.0,
            release_ratio: 0.6,
            min_interval_ms: 250,
            window_len: 10,
            max_magnitude: 200.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MotionDetector {
    config: MotionDetectorConfig,
    window: VecDeque<f64>,
    peak: bool,
    last_event_ms: Option<u64>,
}

impl MotionDetector {
    pub fn new(config: MotionDetectorConfig) -> Self {
        let window = VecDeque::with_capacity(config.window_len.max(1));
        Self {
            config,
            window,
            peak: false,
            last_event_ms: None,
        }
    }

    pub fn config(&self) -> &MotionDetectorConfig {
        &self.config
    }

    /// Feed one magnitude. Returns `true` when a step is accepted.
    pub fn process(&mut self, timestamp_ms: u64, magnitude: f64) -> bool {
        if !magnitude.is_finite() || magnitude < 0.0 || magnitude > self.config.max_magnitude {
            return false;
        }

        if self.window.len() >= self.config.window_len.max(1) {
            self.window.pop_front();
        }
        self.window.push_back(magnitude);

        let threshold = self.config.threshold;
        if magnitude > threshold && !self.peak && self.interval_elapsed(timestamp_ms) {
            self.peak = true;
            self.last_event_ms = Some(timestamp_ms);
            true
        } else {
            if magnitude < threshold * self.config.release_ratio {
                self.peak = false;
            }
            false
        }
    }

    fn interval_elapsed(&self, now_ms: u64) -> bool {
        match self.last_event_ms {
            Some(last) => now_ms.saturating_sub(last) > self.config.min_interval_ms,
            None => true,
        }
    }

    /// Clear the window and timing state for a new ring cycle.
    pub fn reset(&mut self) {
        self.window.clear();
        self.peak = false;
        self.last_event_ms = None;
    }

    pub fn window(&self) -> &VecDeque<f64> {
        &self.window
    }

    pub fn is_peak(&self) -> bool {
        self.peak
    }

    pub fn last_event_ms(&self) -> Option<u64> {
        self.last_event_ms
    }
}

impl Default for MotionDetector {
    fn default() -> Self {
        Self::new(MotionDetectorConfig::default())
    }
}
