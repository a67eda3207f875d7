//! # stepalarm core library
//!
//! A wake alarm that only goes quiet after the user proves they are up:
//! a number of walking steps or eye blinks, counted from raw sensor
//! samples.
//!
//! ## Architecture
//!
//! - **Sensing**: [`SignalSource`] adapters deliver timestamped scalar
//!   samples; [`PushSource`] is the in-process implementation.
//! - **Detection**: per-modality [`EventDetector`]s turn samples into unit
//!   events (peak/hysteresis for motion, bright-dark-bright for blinks).
//! - **Engine**: [`AlarmEngine`] is the tick-driven state machine that
//!   owns every [`Alarm`], counts progress and drives the
//!   [`AlertCoordinator`].
//! - **Service**: [`AlarmService`] shares the engine across sensor
//!   callbacks and host calls; [`AlarmDriver`] fires due alarms on a
//!   tokio interval.
//! - **Storage**: TOML-based configuration.

pub mod alarm;
pub mod alert;
pub mod clock;
pub mod detect;
pub mod driver;
pub mod engine;
pub mod error;
pub mod events;
pub mod progress;
pub mod scheduler;
pub mod sensing;
pub mod service;
pub mod storage;

pub use alarm::{Alarm, AlarmId, AlarmState};
pub use alert::{AlertConfig, AlertCoordinator, AlertSink, RecordingSink, ToneHandle, WakeLock};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use detect::{detector_for, DetectorConfig, EventDetector};
pub use driver::AlarmDriver;
pub use engine::{AlarmEngine, EngineConfig};
pub use error::{AlertError, ConfigError, CoreError, SourceError, ValidationError};
pub use events::Event;
pub use progress::ProgressTracker;
pub use scheduler::{next_occurrence, DueList, FireScheduler};
pub use sensing::{Modality, PushSource, SensorSample, SignalSource, SourceTag, Subscription};
pub use service::AlarmService;
pub use storage::Config;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, recovering the data if a panicking thread poisoned it.
/// A panic inside one sensor callback must not wedge every later one.
pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
