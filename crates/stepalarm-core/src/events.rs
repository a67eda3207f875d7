use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::alarm::{AlarmId, AlarmState};
use crate::sensing::{Modality, SourceTag};

/// Every state change in the engine produces an Event.
/// Hosts drain them after each call; the CLI prints them as JSON lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    AlarmScheduled {
        alarm_id: AlarmId,
        target_time: DateTime<Utc>,
        goal: u32,
        modality: Modality,
        at: DateTime<Utc>,
    },
    AlarmRinging {
        alarm_id: AlarmId,
        modality: Modality,
        goal: u32,
        ring_cycle: u32,
        at: DateTime<Utc>,
    },
    /// Fired while another alarm was ringing; rings once that one ends.
    AlarmQueued {
        alarm_id: AlarmId,
        behind: AlarmId,
        at: DateTime<Utc>,
    },
    ProgressAdvanced {
        alarm_id: AlarmId,
        count: u32,
        goal: u32,
        at: DateTime<Utc>,
    },
    GoalReached {
        alarm_id: AlarmId,
        count: u32,
        at: DateTime<Utc>,
    },
    AlarmCompleted {
        alarm_id: AlarmId,
        count: u32,
        at: DateTime<Utc>,
    },
    /// User acknowledged an alarm whose goal was met.
    AlarmDismissed {
        alarm_id: AlarmId,
        at: DateTime<Utc>,
    },
    AlarmDeleted {
        alarm_id: AlarmId,
        previous_state: AlarmState,
        at: DateTime<Utc>,
    },
    /// A source refused the subscription for this ring cycle.
    ChannelUnavailable {
        alarm_id: AlarmId,
        source: SourceTag,
        reason: String,
        at: DateTime<Utc>,
    },
    /// No source for the modality could be subscribed. Progress cannot
    /// advance; the alarm keeps ringing until deleted.
    SensingStalled {
        alarm_id: AlarmId,
        modality: Modality,
        at: DateTime<Utc>,
    },
    /// Subscribed, but not a single sample has arrived yet.
    SensorSilent {
        alarm_id: AlarmId,
        silent_ms: u64,
        at: DateTime<Utc>,
    },
    /// The configured clip failed; the synthesized tone is playing instead.
    ToneFallback {
        alarm_id: AlarmId,
        reason: String,
        at: DateTime<Utc>,
    },
    WakeHoldExpired {
        alarm_id: AlarmId,
        held_ms: u64,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        alarm_id: AlarmId,
        state: AlarmState,
        modality: Modality,
        goal: u32,
        count: u32,
        acknowledged: bool,
        ring_cycles: u32,
        /// Samples received during the current ring cycle.
        samples_seen: u64,
        queued: bool,
        at: DateTime<Utc>,
    },
}

impl Event {
    /// The alarm this event is about.
    pub fn alarm_id(&self) -> AlarmId {
        match self {
            Event::AlarmScheduled { alarm_id, .. }
            | Event::AlarmRinging { alarm_id, .. }
            | Event::AlarmQueued { alarm_id, .. }
            | Event::ProgressAdvanced { alarm_id, .. }
            | Event::GoalReached { alarm_id, .. }
            | Event::AlarmCompleted { alarm_id, .. }
            | Event::AlarmDismissed { alarm_id, .. }
            | Event::AlarmDeleted { alarm_id, .. }
            | Event::ChannelUnavailable { alarm_id, .. }
            | Event::SensingStalled { alarm_id, .. }
            | Event::SensorSilent { alarm_id, .. }
            | Event::ToneFallback { alarm_id, .. }
            | Event::WakeHoldExpired { alarm_id, .. }
            | Event::StateSnapshot { alarm_id, .. } => *alarm_id,
        }
    }
}
