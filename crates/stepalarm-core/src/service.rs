//! Thread-safe handle around [`AlarmEngine`].
//!
//! Sensor callbacks, driver ticks and host commands all funnel through one
//! mutex, so every count and state change of an alarm is serialized.
//! Subscribing to sources happens outside that mutex: a source may call
//! back on its own thread at any moment after `subscribe` returns, and the
//! callback needs the lock.
//!
//! Callbacks hold only a weak reference to the service and the ring cycle
//! they were created for. Dropping the last [`AlarmService`] clone drops
//! the engine, which cancels every subscription and releases the alerts.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, Weak};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::alarm::{AlarmId, AlarmState};
use crate::clock::Clock;
use crate::engine::{AlarmEngine, Wiring};
use crate::error::{CoreError, Result};
use crate::events::Event;
use crate::lock_unpoisoned;
use crate::scheduler::FireScheduler;
use crate::sensing::{Modality, SensorSample, SignalSource, SourceTag};

struct Shared {
    engine: Mutex<AlarmEngine>,
    sources: Mutex<BTreeMap<SourceTag, Arc<dyn SignalSource>>>,
    scheduler: Arc<dyn FireScheduler>,
    clock: Arc<dyn Clock>,
}

#[derive(Clone)]
pub struct AlarmService {
    shared: Arc<Shared>,
}

impl AlarmService {
    pub fn new(engine: AlarmEngine, scheduler: Arc<dyn FireScheduler>, clock: Arc<dyn Clock>) -> Self {
        Self {
            shared: Arc::new(Shared {
                engine: Mutex::new(engine),
                sources: Mutex::new(BTreeMap::new()),
                scheduler,
                clock,
            }),
        }
    }

    /// Make a source available to future ring cycles. Replaces any source
    /// registered under the same tag.
    pub fn register_source(&self, source: Arc<dyn SignalSource>) {
        let tag = source.tag();
        lock_unpoisoned(&self.shared.sources).insert(tag, source);
    }

    fn sources_for(&self, modality: Modality) -> Vec<Arc<dyn SignalSource>> {
        lock_unpoisoned(&self.shared.sources)
            .iter()
            .filter(|(tag, _)| tag.modality() == modality)
            .map(|(_, source)| Arc::clone(source))
            .collect()
    }

    fn now_ms(&self) -> u64 {
        self.shared.clock.now_ms()
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Create an alarm and ask the scheduler to fire it at `target_time`.
    pub fn schedule(&self, target_time: DateTime<Utc>, goal: u32, modality: Modality) -> Result<AlarmId> {
        let id = lock_unpoisoned(&self.shared.engine).schedule(target_time, goal, modality)?;
        self.shared.scheduler.request_fire(id, target_time);
        Ok(id)
    }

    /// Scheduler callback. See [`AlarmEngine::fire`].
    pub fn fire(&self, id: AlarmId) -> bool {
        let now = self.now_ms();
        let (started, wiring) = {
            let mut engine = lock_unpoisoned(&self.shared.engine);
            let started = engine.fire(id, now);
            (started, engine.take_pending_wiring())
        };
        self.wire(wiring);
        started
    }

    pub fn manual_stop(&self, id: AlarmId) -> bool {
        let now = self.now_ms();
        let (stopped, wiring) = {
            let mut engine = lock_unpoisoned(&self.shared.engine);
            let stopped = engine.manual_stop(id, now);
            (stopped, engine.take_pending_wiring())
        };
        self.wire(wiring);
        stopped
    }

    /// Delete from any state and withdraw the scheduler request.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::AlarmNotFound`] for an unknown id.
    pub fn delete(&self, id: AlarmId) -> Result<()> {
        let now = self.now_ms();
        let (deleted, wiring) = {
            let mut engine = lock_unpoisoned(&self.shared.engine);
            let deleted = engine.delete(id, now);
            (deleted, engine.take_pending_wiring())
        };
        self.shared.scheduler.cancel(id);
        self.wire(wiring);
        if deleted {
            Ok(())
        } else {
            Err(CoreError::AlarmNotFound(id))
        }
    }

    pub fn tick(&self) {
        let now = self.now_ms();
        lock_unpoisoned(&self.shared.engine).tick(now);
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state_of(&self, id: AlarmId) -> AlarmState {
        lock_unpoisoned(&self.shared.engine).state_of(id)
    }

    pub fn current_count(&self, id: AlarmId) -> Option<u32> {
        lock_unpoisoned(&self.shared.engine)
            .alarm(id)
            .map(|alarm| alarm.current_count())
    }

    pub fn snapshot(&self, id: AlarmId) -> Option<Event> {
        lock_unpoisoned(&self.shared.engine).snapshot(id)
    }

    pub fn drain_events(&self) -> Vec<Event> {
        lock_unpoisoned(&self.shared.engine).drain_events()
    }

    /// Run a read-only query against the engine under its lock.
    pub fn with_engine<R>(&self, f: impl FnOnce(&AlarmEngine) -> R) -> R {
        f(&lock_unpoisoned(&self.shared.engine))
    }

    // ── Wiring ───────────────────────────────────────────────────────

    fn deliver(&self, cycle: u64, sample: SensorSample) {
        let now = self.now_ms();
        let wiring = {
            let mut engine = lock_unpoisoned(&self.shared.engine);
            engine.on_sample(cycle, &sample, now);
            engine.take_pending_wiring()
        };
        self.wire(wiring);
    }

    /// Subscribe the sources for newly opened ring cycles. Runs without
    /// the engine lock held.
    fn wire(&self, mut wiring: Option<Wiring>) {
        while let Some(Wiring {
            alarm_id,
            cycle,
            modality,
        }) = wiring
        {
            let mut subscriptions = Vec::new();
            let mut failures = Vec::new();
            for source in self.sources_for(modality) {
                let weak: Weak<Shared> = Arc::downgrade(&self.shared);
                let subscribed = source.subscribe(Box::new(move |sample| {
                    if let Some(shared) = weak.upgrade() {
                        AlarmService { shared }.deliver(cycle, sample);
                    }
                }));
                match subscribed {
                    Ok(sub) => subscriptions.push(sub),
                    Err(err) => failures.push(err),
                }
            }
            debug!(
                alarm = %alarm_id,
                cycle,
                subscribed = subscriptions.len(),
                failed = failures.len(),
                "ring cycle wired"
            );

            let mut engine = lock_unpoisoned(&self.shared.engine);
            engine.attach(cycle, subscriptions, failures);
            wiring = engine.take_pending_wiring();
        }
    }
}

impl std::fmt::Debug for AlarmService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlarmService")
            .field("engine", &*lock_unpoisoned(&self.shared.engine))
            .finish()
    }
}
