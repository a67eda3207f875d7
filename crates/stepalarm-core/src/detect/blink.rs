//! Blink detection from frame brightness.
//!
//! An eyelid closing in front of the camera shows up as a
//! bright -> dark -> bright envelope in mean frame luma. The detector
//! keeps the last `window_len` values and fires when the oldest five
//! and newest five are both above `bright_ceiling` while something in
//! between dipped below `dark_floor`. The consumed pattern is discarded
//! so it cannot match twice.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

const EDGE_LEN: usize = 5;
const MAX_LUMA: f64 = 255.0;

/// Tuning for [`BlinkDetector`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlinkDetectorConfig {
    /// A frame darker than this counts as "eye closed".
    pub dark_floor: f64,
    /// Both edges of the window must average brighter than this.
    pub bright_ceiling: f64,
    pub min_interval_ms: u64,
    pub window_len: usize,
    /// Samples needed before the window is evaluated.
    pub min_samples: usize,
}

impl Default for BlinkDetectorConfig {
    fn default() -> Self {
        Self {
            dark_floor: 80.0,
            bright_ceiling: 100.0,
            min_interval_ms: 100,
            window_len: 15,
            min_samples: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BlinkDetector {
    config: BlinkDetectorConfig,
    window: VecDeque<f64>,
    last_event_ms: Option<u64>,
}

impl BlinkDetector {
    pub fn new(config: BlinkDetectorConfig) -> Self {
        let window = VecDeque::with_capacity(config.window_len.max(EDGE_LEN));
        Self {
            config,
            window,
            last_event_ms: None,
        }
    }

    pub fn config(&self) -> &BlinkDetectorConfig {
        &self.config
    }

    /// Feed one brightness value. Returns `true` when a blink is accepted.
    pub fn process(&mut self, timestamp_ms: u64, luma: f64) -> bool {
        if !luma.is_finite() || !(0.0..=MAX_LUMA).contains(&luma) {
            return false;
        }

        if self.window.len() >= self.config.window_len.max(EDGE_LEN) {
            self.window.pop_front();
        }
        self.window.push_back(luma);

        if self.window.len() < self.config.min_samples.max(EDGE_LEN) {
            return false;
        }

        let avg_first = mean(self.window.iter().take(EDGE_LEN));
        let avg_last = mean(self.window.iter().rev().take(EDGE_LEN));
        let min_in_window = self.window.iter().copied().fold(f64::INFINITY, f64::min);

        let ceiling = self.config.bright_ceiling;
        let pattern = avg_first > ceiling && min_in_window < self.config.dark_floor && avg_last > ceiling;
        if pattern && self.interval_elapsed(timestamp_ms) {
            self.window.clear();
            self.last_event_ms = Some(timestamp_ms);
            return true;
        }
        false
    }

    fn interval_elapsed(&self, now_ms: u64) -> bool {
        match self.last_event_ms {
            Some(last) => now_ms.saturating_sub(last) > self.config.min_interval_ms,
            None => true,
        }
    }

    pub fn reset(&mut self) {
        self.window.clear();
        self.last_event_ms = None;
    }

    pub fn window(&self) -> &VecDeque<f64> {
        &self.window
    }
}

impl Default for BlinkDetector {
    fn default() -> Self {
        Self::new(BlinkDetectorConfig::default())
    }
}

fn mean<'a>(values: impl Iterator<Item = &'a f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}
