//! Redundant step signals.
//!
//! Phones may report the same steps several times: as accelerometer
//! peaks, as one pulse per step and as a lifetime counter. Any of them can
//! be missing or lag on a given device. Each is accumulated independently
//! and the reported progress is the largest, accepting slight
//! over-counting in exchange for never stalling on a silent channel.

/// Counts one unit per pulse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PulseAccumulator {
    count: u32,
}

impl PulseAccumulator {
    pub fn record(&mut self) -> u32 {
        self.count = self.count.saturating_add(1);
        self.count
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}

/// Tracks a cumulative counter relative to the first value seen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CounterAccumulator {
    baseline: Option<f64>,
    delta: u32,
}

impl CounterAccumulator {
    /// Observe a raw counter value and return the delta since the baseline.
    ///
    /// A counter that goes backwards (the platform reset it) moves the
    /// baseline so the delta never shrinks.
    pub fn observe(&mut self, value: f64) -> u32 {
        if !value.is_finite() || value < 0.0 {
            return self.delta;
        }
        let baseline = *self.baseline.get_or_insert(value);
        if value < baseline {
            self.baseline = Some(value - f64::from(self.delta));
            return self.delta;
        }
        let delta = (value - baseline).floor();
        if delta > f64::from(self.delta) {
            self.delta = if delta >= f64::from(u32::MAX) {
                u32::MAX
            } else {
                delta as u32
            };
        }
        self.delta
    }

    pub fn delta(&self) -> u32 {
        self.delta
    }

    pub fn baseline(&self) -> Option<f64> {
        self.baseline
    }
}

/// Merge two redundant progress counts.
pub fn fuse(pulse: u32, counter: u32) -> u32 {
    pulse.max(counter)
}
