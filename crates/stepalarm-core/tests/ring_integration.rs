//! Integration tests for full ring cycles.
//!
//! Drives alarms through `AlarmService` with in-process sources, a
//! recording alert sink and a hand-driven clock.

use std::sync::Arc;
use std::thread;

use chrono::Utc;
use stepalarm_core::alert::{AlertCall, AlertLog, CountingWakeLock, RecordingSink};
use stepalarm_core::{
    AlarmEngine, AlarmId, AlarmService, AlarmState, DueList, EngineConfig, Event, ManualClock,
    Modality, PushSource, SourceError, SourceTag, ToneHandle,
};

struct Harness {
    service: AlarmService,
    log: AlertLog,
    wake: Arc<CountingWakeLock>,
    clock: ManualClock,
    due: DueList,
}

impl Harness {
    fn new(config: EngineConfig) -> Self {
        let (sink, log) = RecordingSink::new();
        Self::with_sink(config, sink, log, None)
    }

    fn with_sink(config: EngineConfig, sink: RecordingSink, log: AlertLog, tone: Option<ToneHandle>) -> Self {
        let wake = Arc::new(CountingWakeLock::default());
        let engine = AlarmEngine::new(config, Box::new(sink), wake.clone()).with_tone(tone);
        let due = DueList::new();
        let clock = ManualClock::new(0);
        let service = AlarmService::new(engine, Arc::new(due.clone()), Arc::new(clock.clone()));
        Self {
            service,
            log,
            wake,
            clock,
            due,
        }
    }

    fn source(&self, tag: SourceTag) -> PushSource {
        let source = PushSource::new(tag);
        self.service.register_source(Arc::new(source.clone()));
        source
    }

    fn ring(&self, goal: u32, modality: Modality) -> AlarmId {
        let id = self.service.schedule(Utc::now(), goal, modality).unwrap();
        assert!(self.service.fire(id));
        id
    }

    /// Push samples `interval_ms` apart, advancing the clock with them.
    fn feed(&self, source: &PushSource, start_ms: u64, interval_ms: u64, values: &[f64]) {
        for (i, value) in values.iter().enumerate() {
            let t = start_ms + i as u64 * interval_ms;
            self.clock.set(t);
            source.push(t, *value);
        }
    }

    fn progress(&self) -> Vec<u32> {
        self.service
            .drain_events()
            .into_iter()
            .filter_map(|e| match e {
                Event::ProgressAdvanced { count, .. } => Some(count),
                _ => None,
            })
            .collect()
    }
}

#[test]
fn test_step_scenario_completes_on_third_step() {
    let h = Harness::new(EngineConfig::default());
    let accel = h.source(SourceTag::Accelerometer);
    let id = h.ring(3, Modality::Step);

    h.feed(&accel, 0, 260, &[2.0, 2.0, 15.0, 2.0, 2.0, 15.0, 2.0, 2.0, 15.0]);

    let events = h.service.drain_events();
    let counts: Vec<u32> = events
        .iter()
        .filter_map(|e| match e {
            Event::ProgressAdvanced { count, .. } => Some(*count),
            _ => None,
        })
        .collect();
    assert_eq!(counts, vec![1, 2, 3]);
    assert!(matches!(events.last(), Some(Event::AlarmCompleted { count: 3, .. })));

    assert_eq!(h.service.state_of(id), AlarmState::Completed);
    assert_eq!(accel.listener_count(), 0);
    assert!(!h.wake.held());
    h.service.with_engine(|engine| {
        assert!(!engine.is_alerting());
        assert_eq!(engine.active_alert_timers(), 0);
    });
    assert!(h.log.calls().contains(&AlertCall::IndicatorCleared { alarm_id: id }));
}

#[test]
fn test_blink_scenario_counts_one_blink() {
    let h = Harness::new(EngineConfig::default());
    let camera = h.source(SourceTag::Camera);
    let id = h.ring(1, Modality::Blink);

    let luma = [
        150.0, 150.0, 150.0, 150.0, 150.0, 60.0, 60.0, 60.0, 150.0, 150.0, 150.0, 150.0, 150.0,
        150.0, 150.0,
    ];
    h.feed(&camera, 0, 33, &luma);

    assert_eq!(h.progress(), vec![1]);
    assert_eq!(h.service.state_of(id), AlarmState::Completed);
    assert_eq!(h.service.current_count(id), Some(1));
}

#[test]
fn test_bright_only_frames_never_count() {
    let h = Harness::new(EngineConfig::default());
    let camera = h.source(SourceTag::Camera);
    let id = h.ring(1, Modality::Blink);

    let luma: Vec<f64> = (0..200).map(|i| 90.0 + f64::from(i % 60)).collect();
    h.feed(&camera, 0, 33, &luma);

    assert!(h.progress().is_empty());
    assert_eq!(h.service.state_of(id), AlarmState::Ringing);
}

#[test]
fn test_debounce_keeps_close_peaks_apart() {
    let h = Harness::new(EngineConfig::default());
    let accel = h.source(SourceTag::Accelerometer);
    let id = h.ring(5, Modality::Step);

    h.feed(&accel, 1_000, 50, &[15.0, 15.0]);

    assert_eq!(h.progress(), vec![1]);
    assert_eq!(h.service.current_count(id), Some(1));
}

#[test]
fn test_duplicate_fire_is_noop() {
    let h = Harness::new(EngineConfig::default());
    let pulses = h.source(SourceTag::StepPulse);
    let id = h.ring(5, Modality::Step);
    h.feed(&pulses, 0, 400, &[1.0, 1.0]);

    assert!(!h.service.fire(id));
    assert_eq!(h.service.current_count(id), Some(2));
    assert_eq!(pulses.listener_count(), 1);
    let ringing = h
        .service
        .drain_events()
        .into_iter()
        .filter(|e| matches!(e, Event::AlarmRinging { .. }))
        .count();
    assert_eq!(ringing, 1);
}

#[test]
fn test_manual_stop_only_after_goal() {
    let config = EngineConfig {
        require_acknowledge: true,
        ..EngineConfig::default()
    };
    let h = Harness::new(config);
    let pulses = h.source(SourceTag::StepPulse);
    let id = h.ring(2, Modality::Step);

    h.feed(&pulses, 0, 400, &[1.0]);
    assert!(!h.service.manual_stop(id));
    assert_eq!(h.service.state_of(id), AlarmState::Ringing);
    assert!(h.wake.held());

    h.feed(&pulses, 400, 400, &[1.0, 1.0, 1.0]);
    assert_eq!(h.service.current_count(id), Some(2));
    assert_eq!(h.service.state_of(id), AlarmState::Ringing);
    assert_eq!(pulses.listener_count(), 0);

    assert!(h.service.manual_stop(id));
    assert_eq!(h.service.state_of(id), AlarmState::Completed);
    assert!(!h.wake.held());
    h.service.with_engine(|engine| assert_eq!(engine.active_alert_timers(), 0));
}

#[test]
fn test_delete_while_ringing_leaks_nothing() {
    let h = Harness::new(EngineConfig::default());
    let accel = h.source(SourceTag::Accelerometer);
    let id = h.ring(10, Modality::Step);
    h.feed(&accel, 0, 260, &[15.0, 2.0]);

    h.service.delete(id).unwrap();
    assert_eq!(h.service.state_of(id), AlarmState::Idle);
    assert_eq!(accel.listener_count(), 0);
    assert_eq!(h.wake.acquired(), h.wake.released());
    assert!(h.due.is_empty());

    h.log.take();
    for t in (1_000..20_000).step_by(100) {
        h.clock.set(t);
        h.service.tick();
    }
    assert!(h.log.calls().is_empty());
    assert_eq!(accel.push(20_000, 15.0), 0);
}

#[test]
fn test_fused_step_sources_take_the_max() {
    let h = Harness::new(EngineConfig::default());
    let pulses = h.source(SourceTag::StepPulse);
    let counter = h.source(SourceTag::StepCounter);
    let id = h.ring(10, Modality::Step);

    counter.push(0, 1_000.0);
    pulses.push(100, 1.0);
    pulses.push(500, 1.0);
    pulses.push(900, 1.0);
    assert_eq!(h.service.current_count(id), Some(3));

    counter.push(1_000, 1_005.0);
    assert_eq!(h.service.current_count(id), Some(5));

    pulses.push(1_300, 1.0);
    assert_eq!(h.service.current_count(id), Some(5));
}

#[test]
fn test_accelerometer_and_pulse_for_same_steps_count_once() {
    let h = Harness::new(EngineConfig::default());
    let accel = h.source(SourceTag::Accelerometer);
    let pulses = h.source(SourceTag::StepPulse);
    let id = h.ring(10, Modality::Step);

    for step in 0..3u64 {
        let t = step * 400;
        h.clock.set(t);
        accel.push(t, 15.0);
        pulses.push(t + 10, 1.0);
        accel.push(t + 200, 2.0);
    }

    assert_eq!(h.service.current_count(id), Some(3));
    assert_eq!(h.progress(), vec![1, 2, 3]);
    assert_eq!(h.service.state_of(id), AlarmState::Ringing);
}

#[test]
fn test_counter_reset_does_not_regress() {
    let h = Harness::new(EngineConfig::default());
    let counter = h.source(SourceTag::StepCounter);
    let id = h.ring(10, Modality::Step);

    counter.push(0, 500.0);
    counter.push(1_000, 504.0);
    counter.push(2_000, 2.0);
    assert_eq!(h.service.current_count(id), Some(4));
    counter.push(3_000, 4.0);
    assert_eq!(h.service.current_count(id), Some(6));
}

#[test]
fn test_second_alarm_queues_and_starts_from_zero() {
    let h = Harness::new(EngineConfig::default());
    let pulses = h.source(SourceTag::StepPulse);
    let first = h.ring(2, Modality::Step);
    let second = h.service.schedule(Utc::now(), 3, Modality::Step).unwrap();

    h.feed(&pulses, 0, 400, &[1.0]);
    assert!(!h.service.fire(second));
    assert_eq!(h.service.state_of(second), AlarmState::Scheduled);

    h.feed(&pulses, 400, 400, &[1.0]);
    assert_eq!(h.service.state_of(first), AlarmState::Completed);
    assert_eq!(h.service.state_of(second), AlarmState::Ringing);
    assert_eq!(h.service.current_count(second), Some(0));
    assert_eq!(pulses.listener_count(), 1);

    h.feed(&pulses, 800, 400, &[1.0, 1.0, 1.0]);
    assert_eq!(h.service.state_of(second), AlarmState::Completed);
    assert_eq!(h.service.current_count(first), Some(2));
    assert_eq!(h.service.current_count(second), Some(3));
}

#[test]
fn test_samples_after_completion_are_harmless() {
    let h = Harness::new(EngineConfig::default());
    let pulses = h.source(SourceTag::StepPulse);
    let id = h.ring(2, Modality::Step);

    h.feed(&pulses, 0, 300, &[1.0; 6]);
    assert_eq!(h.service.current_count(id), Some(2));
    assert_eq!(h.progress(), vec![1, 2]);
}

#[test]
fn test_unavailable_channels_keep_the_alarm_ringing() {
    let h = Harness::new(EngineConfig::default());
    for tag in [SourceTag::Accelerometer, SourceTag::StepPulse, SourceTag::StepCounter] {
        h.service
            .register_source(Arc::new(PushSource::unavailable(tag, SourceError::Unsupported(tag))));
    }
    let id = h.ring(3, Modality::Step);

    let events = h.service.drain_events();
    let unavailable = events
        .iter()
        .filter(|e| matches!(e, Event::ChannelUnavailable { .. }))
        .count();
    assert_eq!(unavailable, 3);
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::SensingStalled { modality: Modality::Step, .. })));

    h.clock.set(60_000);
    h.service.tick();
    assert_eq!(h.service.state_of(id), AlarmState::Ringing);
    h.service.with_engine(|engine| assert!(engine.is_alerting()));

    h.service.delete(id).unwrap();
    h.service.with_engine(|engine| assert!(!engine.is_alerting()));
}

#[test]
fn test_one_denied_channel_degrades_but_counts() {
    let h = Harness::new(EngineConfig::default());
    h.service.register_source(Arc::new(PushSource::unavailable(
        SourceTag::StepCounter,
        SourceError::PermissionDenied(SourceTag::StepCounter),
    )));
    let pulses = h.source(SourceTag::StepPulse);
    let id = h.ring(1, Modality::Step);

    let events = h.service.drain_events();
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::ChannelUnavailable { source: SourceTag::StepCounter, .. })));
    assert!(!events.iter().any(|e| matches!(e, Event::SensingStalled { .. })));

    pulses.push(0, 1.0);
    assert_eq!(h.service.state_of(id), AlarmState::Completed);
}

#[test]
fn test_failing_clip_falls_back_to_tone() {
    let (sink, log) = RecordingSink::new();
    let h = Harness::with_sink(
        EngineConfig::default(),
        sink.with_failing_clips(),
        log,
        Some(ToneHandle::new("content://media/missing")),
    );
    h.source(SourceTag::Accelerometer);
    let id = h.ring(1, Modality::Step);

    assert!(h
        .service
        .drain_events()
        .iter()
        .any(|e| matches!(e, Event::ToneFallback { alarm_id, .. } if *alarm_id == id)));
    assert_eq!(h.log.calls()[0], AlertCall::ToneOn { frequency_hz: 600 });
}

#[test]
fn test_concurrent_sources_never_exceed_goal() {
    let h = Harness::new(EngineConfig::default());
    let pulses = h.source(SourceTag::StepPulse);
    let counter = h.source(SourceTag::StepCounter);
    let id = h.ring(50, Modality::Step);

    let mut workers = Vec::new();
    for w in 0..4u64 {
        let pulses = pulses.clone();
        workers.push(thread::spawn(move || {
            for i in 0..40u64 {
                pulses.push(w * 10_000 + i * 300, 1.0);
            }
        }));
    }
    let counter_worker = {
        let counter = counter.clone();
        thread::spawn(move || {
            for i in 0..80u64 {
                counter.push(i * 300, 7_000.0 + i as f64);
            }
        })
    };
    for worker in workers {
        worker.join().unwrap();
    }
    counter_worker.join().unwrap();

    assert_eq!(h.service.state_of(id), AlarmState::Completed);
    assert_eq!(h.service.current_count(id), Some(50));
    assert_eq!(pulses.listener_count(), 0);
    assert_eq!(counter.listener_count(), 0);

    let counts = h.progress();
    assert_eq!(counts, (1..=50).collect::<Vec<u32>>());
}
