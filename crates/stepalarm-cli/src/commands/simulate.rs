use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use clap::{Args, ValueEnum};
use stepalarm_core::alert::NoopWakeLock;
use stepalarm_core::{
    AlarmEngine, AlarmService, Config, DueList, Event, ManualClock, Modality,
    PushSource, RecordingSink, SourceTag,
};
use tracing::debug;

#[derive(Clone, Copy, ValueEnum)]
pub enum ModalityArg {
    Step,
    Blink,
}

impl From<ModalityArg> for Modality {
    fn from(arg: ModalityArg) -> Self {
        match arg {
            ModalityArg::Step => Modality::Step,
            ModalityArg::Blink => Modality::Blink,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum SourceArg {
    /// Acceleration magnitude in m/s²
    Accel,
    /// One value per hardware-detected step
    Pulse,
    /// Cumulative step counter
    Counter,
}

#[derive(Args)]
pub struct SimulateArgs {
    /// Activity that dismisses the alarm
    #[arg(long, value_enum, default_value = "step")]
    pub modality: ModalityArg,
    /// Number of units required (defaults to engine.default_goal)
    #[arg(long)]
    pub goal: Option<u32>,
    /// Comma-separated sensor values, one per sample
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true, required = true)]
    pub samples: Vec<f64>,
    /// Milliseconds between consecutive samples
    #[arg(long, default_value_t = 260)]
    pub interval_ms: u64,
    /// Step source the samples come from (ignored for blink)
    #[arg(long, value_enum, default_value = "accel")]
    pub source: SourceArg,
    /// Require a manual stop after the goal is reached
    #[arg(long)]
    pub acknowledge: bool,
    /// Also print the alert calls (tone, vibration, indicator)
    #[arg(long)]
    pub show_alerts: bool,
    /// Read config from this file instead of the config directory
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl SimulateArgs {
    fn source_tag(&self) -> SourceTag {
        match (self.modality, self.source) {
            (ModalityArg::Blink, _) => SourceTag::Camera,
            (ModalityArg::Step, SourceArg::Accel) => SourceTag::Accelerometer,
            (ModalityArg::Step, SourceArg::Pulse) => SourceTag::StepPulse,
            (ModalityArg::Step, SourceArg::Counter) => SourceTag::StepCounter,
        }
    }
}

pub fn run(args: SimulateArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let mut engine_config = config.engine_config();
    if args.acknowledge {
        engine_config.require_acknowledge = true;
    }
    let goal = args.goal.unwrap_or(config.engine.default_goal);

    let (sink, log) = RecordingSink::new();
    let engine = AlarmEngine::new(engine_config, Box::new(sink), Arc::new(NoopWakeLock))
        .with_tone(config.tone_handle());
    let clock = ManualClock::new(0);
    let due = DueList::new();
    let service = AlarmService::new(engine, Arc::new(due.clone()), Arc::new(clock.clone()));

    let source = PushSource::new(args.source_tag());
    service.register_source(Arc::new(source.clone()));

    let id = service.schedule(Utc::now(), goal, args.modality.into())?;
    for due_id in due.take_due(Utc::now()) {
        service.fire(due_id);
    }
    print_events(service.drain_events())?;

    for (i, value) in args.samples.iter().enumerate() {
        let t = i as u64 * args.interval_ms;
        clock.set(t);
        let delivered = source.push(t, *value);
        debug!(t, value, delivered, "sample pushed");
        service.tick();
        print_events(service.drain_events())?;
    }

    if args.acknowledge && service.manual_stop(id) {
        print_events(service.drain_events())?;
    }

    if args.show_alerts {
        for call in log.calls() {
            println!("{}", serde_json::to_string(&call)?);
        }
    }

    if let Some(snapshot) = service.snapshot(id) {
        println!("{}", serde_json::to_string(&snapshot)?);
    }
    Ok(())
}

fn print_events(events: Vec<Event>) -> Result<(), serde_json::Error> {
    for event in events {
        println!("{}", serde_json::to_string(&event)?);
    }
    Ok(())
}
