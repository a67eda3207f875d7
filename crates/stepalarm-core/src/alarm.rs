//! The alarm entity and its lifecycle.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Scheduled -> Ringing -> Completed
//! ```
//!
//! `Idle` is the state of an id with no alarm behind it. Every other edge
//! is guarded here; the engine decides *when* to take them.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;
use crate::progress::ProgressTracker;
use crate::sensing::Modality;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlarmId(Uuid);

impl AlarmId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for AlarmId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AlarmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for AlarmId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlarmState {
    Idle,
    Scheduled,
    Ringing,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alarm {
    id: AlarmId,
    target_time: DateTime<Utc>,
    modality: Modality,
    progress: ProgressTracker,
    state: AlarmState,
    /// Set once the user dismissed the alarm after meeting the goal.
    acknowledged: bool,
    /// How many times this alarm has entered Ringing.
    ring_cycles: u32,
    created_at: DateTime<Utc>,
}

impl Alarm {
    /// Create a scheduled alarm.
    ///
    /// # Errors
    ///
    /// Rejects a zero goal; it is never clamped.
    pub fn schedule(
        target_time: DateTime<Utc>,
        goal: u32,
        modality: Modality,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            id: AlarmId::new(),
            target_time,
            modality,
            progress: ProgressTracker::new(goal)?,
            state: AlarmState::Scheduled,
            acknowledged: false,
            ring_cycles: 0,
            created_at: Utc::now(),
        })
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn id(&self) -> AlarmId {
        self.id
    }

    pub fn target_time(&self) -> DateTime<Utc> {
        self.target_time
    }

    pub fn modality(&self) -> Modality {
        self.modality
    }

    pub fn goal(&self) -> u32 {
        self.progress.goal()
    }

    pub fn current_count(&self) -> u32 {
        self.progress.count()
    }

    pub fn state(&self) -> AlarmState {
        self.state
    }

    pub fn is_goal_reached(&self) -> bool {
        self.progress.is_goal_reached()
    }

    pub fn is_acknowledged(&self) -> bool {
        self.acknowledged
    }

    pub fn ring_cycles(&self) -> u32 {
        self.ring_cycles
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    // ── Transitions ──────────────────────────────────────────────────

    /// Scheduled -> Ringing. Resets the count. Returns `false` (and
    /// changes nothing) from any other state.
    pub(crate) fn enter_ringing(&mut self) -> bool {
        if self.state != AlarmState::Scheduled {
            return false;
        }
        self.state = AlarmState::Ringing;
        self.progress.reset();
        self.ring_cycles += 1;
        true
    }

    /// Count one unit. Only while Ringing and short of the goal, so a late
    /// sample can never push the count past it.
    pub(crate) fn record_unit(&mut self) -> Option<u32> {
        if self.state != AlarmState::Ringing || self.progress.is_goal_reached() {
            return None;
        }
        Some(self.progress.record_unit())
    }

    /// Ringing -> Completed.
    pub(crate) fn complete(&mut self) -> bool {
        if self.state != AlarmState::Ringing {
            return false;
        }
        self.state = AlarmState::Completed;
        true
    }

    /// Mark as dismissed by the user. Only meaningful once the goal is met.
    pub(crate) fn acknowledge(&mut self) -> bool {
        if !self.progress.is_goal_reached() || self.acknowledged {
            return false;
        }
        self.acknowledged = true;
        true
    }
}
