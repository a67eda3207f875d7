//! Background task that plays the host scheduler's role in-process.
//!
//! Every period it fires the alarms a [`DueList`] reports as due and
//! ticks the service so alert cadences and timeouts advance.

use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace};

use crate::scheduler::DueList;
use crate::service::AlarmService;

/// Handle to the driver task. Stopping or dropping it aborts the task.
#[derive(Debug)]
pub struct AlarmDriver {
    handle: JoinHandle<()>,
}

impl AlarmDriver {
    /// Spawn on the current tokio runtime.
    pub fn spawn(service: AlarmService, due: DueList, period: Duration) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                for id in due.take_due(Utc::now()) {
                    let started = service.fire(id);
                    debug!(alarm = %id, started, "due alarm fired");
                }
                service.tick();
                trace!("driver tick");
            }
        });
        Self { handle }
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for AlarmDriver {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
