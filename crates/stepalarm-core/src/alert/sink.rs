//! Alert boundary: the host's tone, vibration and indicator primitives.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::alarm::AlarmId;
use crate::error::AlertError;
use crate::lock_unpoisoned;

/// Reference to the user's chosen alarm clip (URI, path or platform id).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToneHandle(String);

impl ToneHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Host alerting primitives. Every start/stop pair must be safe to call
/// repeatedly and in any order; stop calls must never fail.
pub trait AlertSink: Send {
    /// Start looping the clip.
    fn play_clip(&mut self, tone: &ToneHandle) -> Result<(), AlertError>;
    fn stop_clip(&mut self);

    /// Start sounding the synthesized tone.
    fn tone_on(&mut self, frequency_hz: u32);
    fn tone_off(&mut self);

    fn supports_vibration(&self) -> bool {
        true
    }
    /// Run one vibration pattern (alternating on/off milliseconds).
    fn vibrate(&mut self, pattern: &[u64]);
    fn stop_vibration(&mut self);

    fn show_indicator(&mut self, alarm: AlarmId, text: &str);
    fn clear_indicator(&mut self, alarm: AlarmId);
}

/// One call made on a [`RecordingSink`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum AlertCall {
    ClipStarted { tone: String },
    ClipStopped,
    ToneOn { frequency_hz: u32 },
    ToneOff,
    Vibrate { pattern: Vec<u64> },
    VibrationStopped,
    IndicatorShown { alarm_id: AlarmId, text: String },
    IndicatorCleared { alarm_id: AlarmId },
}

/// Shared view of the calls recorded by a [`RecordingSink`].
#[derive(Debug, Clone, Default)]
pub struct AlertLog {
    calls: Arc<Mutex<Vec<AlertCall>>>,
}

impl AlertLog {
    pub fn calls(&self) -> Vec<AlertCall> {
        lock_unpoisoned(&self.calls).clone()
    }

    pub fn take(&self) -> Vec<AlertCall> {
        std::mem::take(&mut *lock_unpoisoned(&self.calls))
    }

    pub fn count(&self, pred: impl Fn(&AlertCall) -> bool) -> usize {
        lock_unpoisoned(&self.calls).iter().filter(|c| pred(c)).count()
    }

    fn push(&self, call: AlertCall) {
        tracing::trace!(?call, "alert sink call");
        lock_unpoisoned(&self.calls).push(call);
    }
}

/// Sink that performs nothing and records every call. Used by headless
/// hosts (the CLI simulator) and tests.
#[derive(Debug, Clone)]
pub struct RecordingSink {
    log: AlertLog,
    vibration: bool,
    failing_clips: bool,
}

impl RecordingSink {
    pub fn new() -> (Self, AlertLog) {
        let log = AlertLog::default();
        (
            Self {
                log: log.clone(),
                vibration: true,
                failing_clips: false,
            },
            log,
        )
    }

    /// Report vibration as unsupported.
    pub fn without_vibration(mut self) -> Self {
        self.vibration = false;
        self
    }

    /// Make every clip fail to play.
    pub fn with_failing_clips(mut self) -> Self {
        self.failing_clips = true;
        self
    }
}

impl AlertSink for RecordingSink {
    fn play_clip(&mut self, tone: &ToneHandle) -> Result<(), AlertError> {
        if self.failing_clips {
            return Err(AlertError::ClipFailed {
                handle: tone.as_str().to_string(),
                message: "playback rejected".to_string(),
            });
        }
        self.log.push(AlertCall::ClipStarted {
            tone: tone.as_str().to_string(),
        });
        Ok(())
    }

    fn stop_clip(&mut self) {
        self.log.push(AlertCall::ClipStopped);
    }

    fn tone_on(&mut self, frequency_hz: u32) {
        self.log.push(AlertCall::ToneOn { frequency_hz });
    }

    fn tone_off(&mut self) {
        self.log.push(AlertCall::ToneOff);
    }

    fn supports_vibration(&self) -> bool {
        self.vibration
    }

    fn vibrate(&mut self, pattern: &[u64]) {
        self.log.push(AlertCall::Vibrate {
            pattern: pattern.to_vec(),
        });
    }

    fn stop_vibration(&mut self) {
        self.log.push(AlertCall::VibrationStopped);
    }

    fn show_indicator(&mut self, alarm: AlarmId, text: &str) {
        self.log.push(AlertCall::IndicatorShown {
            alarm_id: alarm,
            text: text.to_string(),
        });
    }

    fn clear_indicator(&mut self, alarm: AlarmId) {
        self.log.push(AlertCall::IndicatorCleared { alarm_id: alarm });
    }
}
