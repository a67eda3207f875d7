//! Boundary to the host's wake-up scheduler.
//!
//! The engine only asks for `fire(id)` at a wall-clock instant. When the
//! instant has already passed, [`DueList`] reports the alarm as due right
//! away; rolling a time of day forward to its next occurrence is the
//! caller's job, see [`next_occurrence`].

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};

use crate::alarm::AlarmId;
use crate::lock_unpoisoned;

/// Host scheduler that calls back `fire(id)` at or after `at`.
pub trait FireScheduler: Send + Sync {
    /// Replaces any earlier request for the same alarm.
    fn request_fire(&self, id: AlarmId, at: DateTime<Utc>);
    fn cancel(&self, id: AlarmId);
}

/// In-process scheduler polled by [`AlarmDriver`](crate::AlarmDriver).
/// Clones share the same list.
#[derive(Debug, Clone, Default)]
pub struct DueList {
    entries: Arc<Mutex<Vec<(AlarmId, DateTime<Utc>)>>>,
}

impl DueList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return every alarm due at `now`, earliest first.
    pub fn take_due(&self, now: DateTime<Utc>) -> Vec<AlarmId> {
        let mut entries = lock_unpoisoned(&self.entries);
        let (mut due, pending): (Vec<_>, Vec<_>) = entries.drain(..).partition(|(_, at)| *at <= now);
        *entries = pending;
        due.sort_by_key(|(_, at)| *at);
        due.into_iter().map(|(id, _)| id).collect()
    }

    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        lock_unpoisoned(&self.entries).iter().map(|(_, at)| *at).min()
    }

    pub fn len(&self) -> usize {
        lock_unpoisoned(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FireScheduler for DueList {
    fn request_fire(&self, id: AlarmId, at: DateTime<Utc>) {
        let mut entries = lock_unpoisoned(&self.entries);
        entries.retain(|(existing, _)| *existing != id);
        entries.push((id, at));
    }

    fn cancel(&self, id: AlarmId) {
        lock_unpoisoned(&self.entries).retain(|(existing, _)| *existing != id);
    }
}

/// Next instant strictly after `now` whose local time of day is `at`:
/// today if still ahead, otherwise tomorrow.
///
/// A time of day that falls into a DST gap moves to the next day on which
/// it exists. Returns `None` only if no such day is found within two days.
pub fn next_occurrence<Tz: TimeZone>(now: &DateTime<Tz>, at: NaiveTime) -> Option<DateTime<Tz>> {
    let tz = now.timezone();
    let today = now.date_naive();
    (0..=2).find_map(|offset| {
        let naive = (today + Duration::days(offset)).and_time(at);
        tz.from_local_datetime(&naive)
            .earliest()
            .filter(|candidate| candidate > now)
    })
}
