//! Alerting side effects of a ringing alarm: tone, vibration, indicator
//! and the keep-awake hold.

mod cadence;
mod coordinator;
mod sink;
mod wake;

pub use cadence::Cadence;
pub use coordinator::{AlertConfig, AlertCoordinator, AlertStart};
pub use sink::{AlertCall, AlertLog, AlertSink, RecordingSink, ToneHandle};
pub use wake::{CountingWakeLock, NoopWakeLock, WakeHold, WakeLock};
