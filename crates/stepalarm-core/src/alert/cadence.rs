//! Periodic phase schedule driven by `tick`.
//!
//! A [`Cadence`] replaces a chain of self-rescheduling timers: it is a
//! plain value, advanced by whoever owns it, and dropping it is the
//! single way to cancel it. There is no background timer to leak.

/// Repeating sequence of phases with fixed durations (milliseconds).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cadence {
    phases: Vec<u64>,
    period_ms: u64,
    phase: usize,
    next_edge_ms: u64,
}

impl Cadence {
    /// Start in phase 0 at `start_ms`. Returns `None` when `phases` is
    /// empty or contains a zero duration.
    pub fn new(phases: Vec<u64>, start_ms: u64) -> Option<Self> {
        if phases.is_empty() || phases.contains(&0) {
            return None;
        }
        let period_ms = phases.iter().fold(0u64, |acc, p| acc.saturating_add(*p));
        let next_edge_ms = start_ms.saturating_add(phases[0]);
        Some(Self {
            phases,
            period_ms,
            phase: 0,
            next_edge_ms,
        })
    }

    /// Advance to `now_ms`. Returns the phase now current if at least one
    /// edge was crossed. A late poll skips whole periods instead of
    /// replaying every missed edge.
    pub fn poll(&mut self, now_ms: u64) -> Option<usize> {
        if now_ms < self.next_edge_ms {
            return None;
        }

        let behind = now_ms - self.next_edge_ms;
        if behind >= self.period_ms {
            let skipped = behind / self.period_ms;
            self.next_edge_ms = self
                .next_edge_ms
                .saturating_add(skipped.saturating_mul(self.period_ms));
        }

        while now_ms >= self.next_edge_ms {
            self.phase = (self.phase + 1) % self.phases.len();
            if self.next_edge_ms == u64::MAX {
                break;
            }
            self.next_edge_ms = self.next_edge_ms.saturating_add(self.phases[self.phase]);
        }
        Some(self.phase)
    }

    pub fn phase(&self) -> usize {
        self.phase
    }

    pub fn next_edge_ms(&self) -> u64 {
        self.next_edge_ms
    }

    pub fn period_ms(&self) -> u64 {
        self.period_ms
    }
}
