//! Keep-awake hold for the duration of a ring.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Host primitive that keeps the device (screen, CPU) awake.
pub trait WakeLock: Send + Sync {
    /// Acquire with an upper bound; the host may release on its own after
    /// `max_hold`.
    fn acquire(&self, tag: &str, max_hold: Duration);
    fn release(&self, tag: &str);
}

/// For hosts without a wake primitive.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopWakeLock;

impl WakeLock for NoopWakeLock {
    fn acquire(&self, _tag: &str, _max_hold: Duration) {}
    fn release(&self, _tag: &str) {}
}

/// Counts acquire/release calls.
#[derive(Debug, Default)]
pub struct CountingWakeLock {
    acquired: AtomicU32,
    released: AtomicU32,
}

impl CountingWakeLock {
    pub fn acquired(&self) -> u32 {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> u32 {
        self.released.load(Ordering::SeqCst)
    }

    pub fn held(&self) -> bool {
        self.acquired() > self.released()
    }
}

impl WakeLock for CountingWakeLock {
    fn acquire(&self, _tag: &str, _max_hold: Duration) {
        self.acquired.fetch_add(1, Ordering::SeqCst);
    }

    fn release(&self, _tag: &str) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// Scoped, time-bounded hold on a [`WakeLock`]. Released exactly once:
/// explicitly, on expiry, or when dropped.
pub struct WakeHold {
    lock: Arc<dyn WakeLock>,
    tag: String,
    deadline_ms: u64,
    held: bool,
}

impl WakeHold {
    pub fn acquire(lock: Arc<dyn WakeLock>, tag: impl Into<String>, now_ms: u64, max_hold_ms: u64) -> Self {
        let tag = tag.into();
        lock.acquire(&tag, Duration::from_millis(max_hold_ms));
        Self {
            lock,
            tag,
            deadline_ms: now_ms.saturating_add(max_hold_ms),
            held: true,
        }
    }

    pub fn is_held(&self) -> bool {
        self.held
    }

    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.deadline_ms
    }

    /// Returns `true` if this call released the hold.
    pub fn release(&mut self) -> bool {
        if !self.held {
            return false;
        }
        self.held = false;
        self.lock.release(&self.tag);
        true
    }
}

impl Drop for WakeHold {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for WakeHold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WakeHold")
            .field("tag", &self.tag)
            .field("deadline_ms", &self.deadline_ms)
            .field("held", &self.held)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_happens_once() {
        let lock = Arc::new(CountingWakeLock::default());
        let mut hold = WakeHold::acquire(lock.clone(), "alarm", 0, 1_000);
        assert!(lock.held());
        assert!(hold.release());
        assert!(!hold.release());
        drop(hold);
        assert_eq!(lock.acquired(), 1);
        assert_eq!(lock.released(), 1);
    }

    #[test]
    fn drop_releases() {
        let lock = Arc::new(CountingWakeLock::default());
        {
            let _hold = WakeHold::acquire(lock.clone(), "alarm", 0, 1_000);
        }
        assert!(!lock.held());
    }

    #[test]
    fn expiry_is_relative_to_acquire_time() {
        let lock = Arc::new(NoopWakeLock);
        let hold = WakeHold::acquire(lock, "alarm", 5_000, 1_000);
        assert!(!hold.is_expired(5_999));
        assert!(hold.is_expired(6_000));
    }
}
