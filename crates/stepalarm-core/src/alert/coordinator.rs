//! Alert lifecycle for a ringing alarm.
//!
//! The coordinator does not run its own timers. The owner calls
//! [`AlertCoordinator::tick`] periodically; the synthesized tone's
//! on/off duty cycle and the repeated vibration pattern are [`Cadence`]s
//! that live inside the active alert and vanish with it on `stop`.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::cadence::Cadence;
use super::sink::{AlertSink, ToneHandle};
use crate::alarm::AlarmId;

/// Alert timing and tone settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertConfig {
    pub beep_frequency_hz: u32,
    pub beep_on_ms: u64,
    pub beep_off_ms: u64,
    pub vibration_enabled: bool,
    /// Alternating on/off milliseconds for one vibration burst.
    pub vibration_pattern: Vec<u64>,
    /// How often the vibration burst is re-issued.
    pub vibration_repeat_ms: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            beep_frequency_hz: 600,
            beep_on_ms: 800,
            beep_off_ms: 500,
            vibration_enabled: true,
            vibration_pattern: vec![100, 50, 100],
            vibration_repeat_ms: 300,
        }
    }
}

#[derive(Debug)]
enum ToneChannel {
    Clip,
    Synth { cadence: Option<Cadence> },
}

#[derive(Debug)]
struct ActiveAlert {
    alarm: AlarmId,
    tone: ToneChannel,
    vibration: Option<Cadence>,
}

/// Outcome of [`AlertCoordinator::start`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertStart {
    /// `false` when alerts were already running for this alarm.
    pub started: bool,
    /// Why the configured clip was replaced by the synthesized tone.
    pub fallback: Option<String>,
}

pub struct AlertCoordinator {
    sink: Box<dyn AlertSink>,
    config: AlertConfig,
    active: Option<ActiveAlert>,
}

impl AlertCoordinator {
    pub fn new(sink: Box<dyn AlertSink>, config: AlertConfig) -> Self {
        Self {
            sink,
            config,
            active: None,
        }
    }

    pub fn config(&self) -> &AlertConfig {
        &self.config
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_alarm(&self) -> Option<AlarmId> {
        self.active.as_ref().map(|a| a.alarm)
    }

    /// Number of periodic cadences currently alive. Zero after `stop`.
    pub fn active_timers(&self) -> usize {
        self.active.as_ref().map_or(0, |a| {
            let tone = matches!(a.tone, ToneChannel::Synth { cadence: Some(_) });
            usize::from(tone) + usize::from(a.vibration.is_some())
        })
    }

    /// Start tone, vibration and indicator for `alarm`.
    ///
    /// A no-op when already active for the same alarm. Alerts still
    /// running for a different alarm are stopped first.
    pub fn start(
        &mut self,
        alarm: AlarmId,
        indicator_text: &str,
        tone: Option<&ToneHandle>,
        now_ms: u64,
    ) -> AlertStart {
        match self.active_alarm() {
            Some(current) if current == alarm => {
                return AlertStart {
                    started: false,
                    fallback: None,
                }
            }
            Some(other) => {
                self.stop(other);
            }
            None => {}
        }

        let mut fallback = None;
        let tone_channel = match tone {
            Some(handle) => match self.sink.play_clip(handle) {
                Ok(()) => ToneChannel::Clip,
                Err(e) => {
                    warn!(%alarm, error = %e, "tone clip failed, using synthesized tone");
                    fallback = Some(e.to_string());
                    self.start_synth(now_ms)
                }
            },
            None => self.start_synth(now_ms),
        };

        let vibration = if self.config.vibration_enabled && self.sink.supports_vibration() {
            self.sink.vibrate(&self.config.vibration_pattern);
            Cadence::new(vec![self.config.vibration_repeat_ms], now_ms)
        } else {
            None
        };

        self.sink.show_indicator(alarm, indicator_text);
        debug!(%alarm, "alerts started");

        self.active = Some(ActiveAlert {
            alarm,
            tone: tone_channel,
            vibration,
        });
        AlertStart {
            started: true,
            fallback,
        }
    }

    fn start_synth(&mut self, now_ms: u64) -> ToneChannel {
        self.sink.tone_on(self.config.beep_frequency_hz);
        ToneChannel::Synth {
            cadence: Cadence::new(vec![self.config.beep_on_ms, self.config.beep_off_ms], now_ms),
        }
    }

    /// Advance the tone duty cycle and re-issue vibration bursts.
    pub fn tick(&mut self, now_ms: u64) {
        let Some(active) = self.active.as_mut() else {
            return;
        };

        if let ToneChannel::Synth {
            cadence: Some(cadence),
        } = &mut active.tone
        {
            match cadence.poll(now_ms) {
                Some(0) => self.sink.tone_on(self.config.beep_frequency_hz),
                Some(_) => self.sink.tone_off(),
                None => {}
            }
        }

        if let Some(cadence) = active.vibration.as_mut() {
            if cadence.poll(now_ms).is_some() {
                self.sink.vibrate(&self.config.vibration_pattern);
            }
        }
    }

    /// Stop every channel started for `alarm`. Idempotent; returns `true`
    /// only on the call that actually released something.
    pub fn stop(&mut self, alarm: AlarmId) -> bool {
        if self.active_alarm() != Some(alarm) {
            return false;
        }
        let Some(active) = self.active.take() else {
            return false;
        };

        match active.tone {
            ToneChannel::Clip => self.sink.stop_clip(),
            ToneChannel::Synth { .. } => self.sink.tone_off(),
        }
        if active.vibration.is_some() {
            self.sink.stop_vibration();
        }
        self.sink.clear_indicator(alarm);
        debug!(%alarm, "alerts stopped");
        true
    }
}

impl Drop for AlertCoordinator {
    fn drop(&mut self) {
        if let Some(alarm) = self.active_alarm() {
            self.stop(alarm);
        }
    }
}

impl std::fmt::Debug for AlertCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertCoordinator")
            .field("config", &self.config)
            .field("active", &self.active)
            .finish()
    }
}
