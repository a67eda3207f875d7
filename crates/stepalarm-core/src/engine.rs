//! Alarm engine.
//!
//! The engine is a time-parameterized state machine. It does not use
//! internal threads or read a clock: every command takes `now_ms`, and the
//! caller is responsible for calling `tick()` periodically so the tone
//! cadence, wake hold expiry and sensor silence checks advance.
//!
//! ## Ring cycle
//!
//! ```text
//! fire ──> Ringing ──(goal reached)──> Completed
//!            │   └──(require_acknowledge)──> waits for manual_stop
//!            └──(delete)──> removed
//! ```
//!
//! Every entry into Ringing opens a new ring cycle with its own detector,
//! subscriptions, alert cadences and wake hold. Samples carry the cycle
//! they were subscribed for; anything tagged with an older cycle is
//! dropped, so a late sample can never count toward a finished ring.
//!
//! Subscribing to sources is left to the owner: after `fire` (or anything
//! that may promote a queued alarm) the owner takes the pending
//! [`Wiring`], subscribes outside its lock and hands the result back via
//! [`AlarmEngine::attach`].

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::alarm::{Alarm, AlarmId, AlarmState};
use crate::alert::{AlertConfig, AlertCoordinator, AlertSink, ToneHandle, WakeHold, WakeLock};
use crate::detect::{detector_for, DetectorConfig, EventDetector};
use crate::error::{SourceError, ValidationError};
use crate::events::Event;
use crate::sensing::{Modality, SensorSample, Subscription};

/// Engine tuning. Built from [`Config`](crate::Config) by hosts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub detectors: DetectorConfig,
    #[serde(default)]
    pub alert: AlertConfig,
    /// Upper bound on the keep-awake hold of one ring cycle.
    pub wake_hold_max_ms: u64,
    /// Report a silent sensor after this long without a single sample.
    pub sensor_silence_ms: u64,
    /// Keep ringing after the goal until the user dismisses.
    pub require_acknowledge: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            detectors: DetectorConfig::default(),
            alert: AlertConfig::default(),
            wake_hold_max_ms: 10 * 60 * 1000,
            sensor_silence_ms: 5_000,
            require_acknowledge: false,
        }
    }
}

/// Sources the owner must subscribe for a freshly opened ring cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wiring {
    pub alarm_id: AlarmId,
    pub cycle: u64,
    pub modality: Modality,
}

struct RingSession {
    alarm_id: AlarmId,
    cycle: u64,
    modality: Modality,
    detector: Box<dyn EventDetector>,
    subscriptions: Vec<Subscription>,
    /// False once the goal is met in acknowledge mode.
    sensing: bool,
    started_ms: u64,
    samples_seen: u64,
    silence_reported: bool,
    wake: WakeHold,
}

impl RingSession {
    fn stop_sensing(&mut self) {
        self.sensing = false;
        for sub in &mut self.subscriptions {
            sub.cancel();
        }
        self.subscriptions.clear();
    }
}

pub struct AlarmEngine {
    config: EngineConfig,
    alarms: HashMap<AlarmId, Alarm>,
    ringing: Option<RingSession>,
    /// Alarms fired while another one was ringing, oldest first.
    queue: VecDeque<AlarmId>,
    coordinator: AlertCoordinator,
    wake_lock: Arc<dyn WakeLock>,
    tone: Option<ToneHandle>,
    next_cycle: u64,
    pending: Option<Wiring>,
    outbox: Vec<Event>,
}

impl AlarmEngine {
    pub fn new(config: EngineConfig, sink: Box<dyn AlertSink>, wake_lock: Arc<dyn WakeLock>) -> Self {
        let coordinator = AlertCoordinator::new(sink, config.alert.clone());
        Self {
            config,
            alarms: HashMap::new(),
            ringing: None,
            queue: VecDeque::new(),
            coordinator,
            wake_lock,
            tone: None,
            next_cycle: 0,
            pending: None,
            outbox: Vec::new(),
        }
    }

    /// Clip to loop while ringing. `None` uses the synthesized tone.
    pub fn with_tone(mut self, tone: Option<ToneHandle>) -> Self {
        self.tone = tone;
        self
    }

    pub fn set_tone(&mut self, tone: Option<ToneHandle>) {
        self.tone = tone;
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn alarm(&self, id: AlarmId) -> Option<&Alarm> {
        self.alarms.get(&id)
    }

    pub fn alarms(&self) -> impl Iterator<Item = &Alarm> {
        self.alarms.values()
    }

    /// `Idle` for ids with no alarm behind them.
    pub fn state_of(&self, id: AlarmId) -> AlarmState {
        self.alarms
            .get(&id)
            .map_or(AlarmState::Idle, Alarm::state)
    }

    pub fn ringing_alarm(&self) -> Option<AlarmId> {
        self.ringing.as_ref().map(|s| s.alarm_id)
    }

    pub fn queued(&self) -> Vec<AlarmId> {
        self.queue.iter().copied().collect()
    }

    /// Live source subscriptions held for the ringing alarm.
    pub fn subscription_count(&self) -> usize {
        self.ringing.as_ref().map_or(0, |s| s.subscriptions.len())
    }

    /// Periodic alert cadences still alive.
    pub fn active_alert_timers(&self) -> usize {
        self.coordinator.active_timers()
    }

    pub fn is_alerting(&self) -> bool {
        self.coordinator.is_active()
    }

    pub fn is_wake_held(&self) -> bool {
        self.ringing.as_ref().is_some_and(|s| s.wake.is_held())
    }

    /// Build a full state snapshot event for one alarm.
    pub fn snapshot(&self, id: AlarmId) -> Option<Event> {
        let alarm = self.alarms.get(&id)?;
        let samples_seen = self
            .ringing
            .as_ref()
            .filter(|s| s.alarm_id == id)
            .map_or(0, |s| s.samples_seen);
        Some(Event::StateSnapshot {
            alarm_id: id,
            state: alarm.state(),
            modality: alarm.modality(),
            goal: alarm.goal(),
            count: alarm.current_count(),
            acknowledged: alarm.is_acknowledged(),
            ring_cycles: alarm.ring_cycles(),
            samples_seen,
            queued: self.queue.contains(&id),
            at: Utc::now(),
        })
    }

    /// Take every event produced since the last drain.
    pub fn drain_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.outbox)
    }

    /// Take the subscription request opened by the last ring start.
    pub fn take_pending_wiring(&mut self) -> Option<Wiring> {
        self.pending.take()
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Idle -> Scheduled.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidGoal`] for a zero goal.
    pub fn schedule(
        &mut self,
        target_time: DateTime<Utc>,
        goal: u32,
        modality: Modality,
    ) -> Result<AlarmId, ValidationError> {
        let alarm = Alarm::schedule(target_time, goal, modality)?;
        let id = alarm.id();
        info!(alarm = %id, %modality, goal, target = %target_time, "alarm scheduled");
        self.alarms.insert(id, alarm);
        self.emit(Event::AlarmScheduled {
            alarm_id: id,
            target_time,
            goal,
            modality,
            at: Utc::now(),
        });
        Ok(id)
    }

    /// Scheduled -> Ringing. Returns `true` if a ring cycle started.
    ///
    /// Delivery may be late or duplicated: a late fire rings right away,
    /// a fire for a Ringing or Completed alarm does nothing, and a fire for
    /// an unknown id is ignored. Firing while another alarm rings queues
    /// this one behind it.
    pub fn fire(&mut self, id: AlarmId, now_ms: u64) -> bool {
        let Some(alarm) = self.alarms.get(&id) else {
            debug!(alarm = %id, "fire for unknown alarm ignored");
            return false;
        };
        if alarm.state() != AlarmState::Scheduled {
            debug!(alarm = %id, state = ?alarm.state(), "duplicate fire ignored");
            return false;
        }
        if let Some(active) = self.ringing_alarm() {
            if !self.queue.contains(&id) {
                info!(alarm = %id, behind = %active, "alarm queued");
                self.queue.push_back(id);
                self.emit(Event::AlarmQueued {
                    alarm_id: id,
                    behind: active,
                    at: Utc::now(),
                });
            }
            return false;
        }
        self.begin_ring(id, now_ms)
    }

    /// Hand over the subscriptions made for ring cycle `cycle`.
    ///
    /// Subscriptions for a cycle that already ended are dropped (and so
    /// cancelled) right here. Returns `true` if they were kept.
    pub fn attach(
        &mut self,
        cycle: u64,
        subscriptions: Vec<Subscription>,
        failures: Vec<SourceError>,
    ) -> bool {
        let (alarm_id, modality, stalled) = match self.ringing.as_mut() {
            Some(session) if session.cycle == cycle && session.sensing => {
                session.subscriptions.extend(subscriptions);
                (
                    session.alarm_id,
                    session.modality,
                    session.subscriptions.is_empty(),
                )
            }
            _ => {
                debug!(cycle, "subscriptions for a finished ring cycle dropped");
                return false;
            }
        };

        for err in failures {
            warn!(alarm = %alarm_id, source = %err.tag(), error = %err, "sensing channel unavailable");
            self.emit(Event::ChannelUnavailable {
                alarm_id,
                source: err.tag(),
                reason: err.to_string(),
                at: Utc::now(),
            });
        }
        if stalled {
            warn!(alarm = %alarm_id, %modality, "no sensing channel available, alarm rings until deleted");
            self.emit(Event::SensingStalled {
                alarm_id,
                modality,
                at: Utc::now(),
            });
        }
        true
    }

    /// Feed one sample delivered for ring cycle `cycle`.
    ///
    /// Returns the new count when the sample advanced progress. Reaching
    /// the goal completes the alarm before this returns (or, in
    /// acknowledge mode, stops sensing and waits for `manual_stop`).
    pub fn on_sample(&mut self, cycle: u64, sample: &SensorSample, now_ms: u64) -> Option<u32> {
        let session = self.ringing.as_mut()?;
        if session.cycle != cycle || !session.sensing {
            trace!(cycle, "sample for an inactive ring cycle dropped");
            return None;
        }
        session.samples_seen += 1;
        let units = session.detector.ingest(sample);
        let alarm_id = session.alarm_id;
        if units == 0 {
            return None;
        }

        let alarm = self.alarms.get_mut(&alarm_id)?;
        let goal = alarm.goal();
        let mut events = Vec::new();
        let mut latest = None;
        for _ in 0..units {
            let Some(count) = alarm.record_unit() else {
                break;
            };
            debug!(alarm = %alarm_id, count, goal, source = %sample.source, "unit recorded");
            latest = Some(count);
            events.push(Event::ProgressAdvanced {
                alarm_id,
                count,
                goal,
                at: Utc::now(),
            });
        }
        let reached = alarm.is_goal_reached();
        self.outbox.extend(events);

        if reached {
            self.goal_reached(alarm_id, goal, now_ms);
        }
        latest
    }

    /// Dismiss an alarm whose goal is met. A no-op before that; there is
    /// no way to silence an alarm without the physical proof.
    pub fn manual_stop(&mut self, id: AlarmId, now_ms: u64) -> bool {
        let Some(alarm) = self.alarms.get_mut(&id) else {
            return false;
        };
        if !alarm.is_goal_reached() {
            debug!(alarm = %id, count = alarm.current_count(), goal = alarm.goal(), "manual stop before goal ignored");
            return false;
        }
        let state = alarm.state();
        if !alarm.acknowledge() {
            return false;
        }
        info!(alarm = %id, "alarm dismissed");
        self.emit(Event::AlarmDismissed {
            alarm_id: id,
            at: Utc::now(),
        });
        if state == AlarmState::Ringing {
            self.complete(id, now_ms);
        }
        true
    }

    /// Remove an alarm from any state. A ringing alarm is torn down first
    /// and the next queued alarm, if any, starts ringing.
    pub fn delete(&mut self, id: AlarmId, now_ms: u64) -> bool {
        let Some(previous_state) = self.alarms.get(&id).map(Alarm::state) else {
            return false;
        };
        self.queue.retain(|queued| *queued != id);
        let was_ringing = self.ringing_alarm() == Some(id);
        if was_ringing {
            self.end_ring();
        }
        self.alarms.remove(&id);
        info!(alarm = %id, state = ?previous_state, "alarm deleted");
        self.emit(Event::AlarmDeleted {
            alarm_id: id,
            previous_state,
            at: Utc::now(),
        });
        if was_ringing {
            self.promote_queued(now_ms);
        }
        true
    }

    /// Advance alert cadences and the ring cycle's timeouts.
    pub fn tick(&mut self, now_ms: u64) {
        self.coordinator.tick(now_ms);

        let Some(session) = self.ringing.as_mut() else {
            return;
        };
        let alarm_id = session.alarm_id;
        let mut events = Vec::new();

        if session.wake.is_held() && session.wake.is_expired(now_ms) {
            session.wake.release();
            let held_ms = now_ms.saturating_sub(session.started_ms);
            warn!(alarm = %alarm_id, held_ms, "wake hold expired while ringing");
            events.push(Event::WakeHoldExpired {
                alarm_id,
                held_ms,
                at: Utc::now(),
            });
        }

        let silent_ms = now_ms.saturating_sub(session.started_ms);
        if session.sensing
            && !session.silence_reported
            && session.samples_seen == 0
            && !session.subscriptions.is_empty()
            && silent_ms >= self.config.sensor_silence_ms
        {
            session.silence_reported = true;
            warn!(alarm = %alarm_id, silent_ms, "no sensor samples received");
            events.push(Event::SensorSilent {
                alarm_id,
                silent_ms,
                at: Utc::now(),
            });
        }

        self.outbox.extend(events);
    }

    // ── Internals ────────────────────────────────────────────────────

    fn emit(&mut self, event: Event) {
        self.outbox.push(event);
    }

    fn begin_ring(&mut self, id: AlarmId, now_ms: u64) -> bool {
        let Some(alarm) = self.alarms.get_mut(&id) else {
            return false;
        };
        if !alarm.enter_ringing() {
            return false;
        }
        let (modality, goal, ring_cycle) = (alarm.modality(), alarm.goal(), alarm.ring_cycles());

        self.next_cycle += 1;
        let cycle = self.next_cycle;
        let wake = WakeHold::acquire(
            Arc::clone(&self.wake_lock),
            format!("stepalarm:{id}"),
            now_ms,
            self.config.wake_hold_max_ms,
        );
        let start = self
            .coordinator
            .start(id, &modality.instruction(goal), self.tone.as_ref(), now_ms);

        self.ringing = Some(RingSession {
            alarm_id: id,
            cycle,
            modality,
            detector: detector_for(modality, &self.config.detectors),
            subscriptions: Vec::new(),
            sensing: true,
            started_ms: now_ms,
            samples_seen: 0,
            silence_reported: false,
            wake,
        });
        self.pending = Some(Wiring {
            alarm_id: id,
            cycle,
            modality,
        });

        info!(alarm = %id, %modality, goal, cycle, "alarm ringing");
        self.emit(Event::AlarmRinging {
            alarm_id: id,
            modality,
            goal,
            ring_cycle,
            at: Utc::now(),
        });
        if let Some(reason) = start.fallback {
            self.emit(Event::ToneFallback {
                alarm_id: id,
                reason,
                at: Utc::now(),
            });
        }
        true
    }

    fn goal_reached(&mut self, id: AlarmId, count: u32, now_ms: u64) {
        info!(alarm = %id, count, "goal reached");
        self.emit(Event::GoalReached {
            alarm_id: id,
            count,
            at: Utc::now(),
        });
        if self.config.require_acknowledge {
            if let Some(session) = self.ringing.as_mut() {
                session.stop_sensing();
            }
        } else {
            self.complete(id, now_ms);
        }
    }

    /// Ringing -> Completed, then start the next queued alarm.
    fn complete(&mut self, id: AlarmId, now_ms: u64) {
        self.end_ring();
        if let Some(alarm) = self.alarms.get_mut(&id) {
            if alarm.complete() {
                let count = alarm.current_count();
                info!(alarm = %id, count, "alarm completed");
                self.emit(Event::AlarmCompleted {
                    alarm_id: id,
                    count,
                    at: Utc::now(),
                });
            }
        }
        self.promote_queued(now_ms);
    }

    /// Release everything the ring cycle holds: subscriptions, alert
    /// channels and cadences, wake hold.
    fn end_ring(&mut self) {
        let Some(mut session) = self.ringing.take() else {
            return;
        };
        session.stop_sensing();
        self.coordinator.stop(session.alarm_id);
        session.wake.release();
        if self.pending.is_some_and(|w| w.cycle == session.cycle) {
            self.pending = None;
        }
    }

    fn promote_queued(&mut self, now_ms: u64) {
        if self.ringing.is_some() {
            return;
        }
        while let Some(next) = self.queue.pop_front() {
            if self.begin_ring(next, now_ms) {
                break;
            }
        }
    }
}

impl std::fmt::Debug for AlarmEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlarmEngine")
            .field("alarms", &self.alarms.len())
            .field("ringing", &self.ringing_alarm())
            .field("queue", &self.queue)
            .field("coordinator", &self.coordinator)
            .finish()
    }
}
