//! Signal source boundary.
//!
//! A [`SignalSource`] turns a platform sensor into callbacks carrying
//! [`SensorSample`]s. Subscribing either succeeds with a [`Subscription`]
//! handle or fails right away with a [`SourceError`]; it never waits for a
//! permission prompt.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use super::sample::{SensorSample, SourceTag};
use crate::error::SourceError;
use crate::lock_unpoisoned;

/// Callback invoked for every delivered sample.
pub type SampleCallback = Box<dyn Fn(SensorSample) + Send + Sync>;

/// A platform sensor adapted to a uniform sample stream.
///
/// Implementations must not invoke the callback from inside `subscribe`
/// and must not hold internal locks while a callback runs, so that a
/// callback may cancel its own subscription.
pub trait SignalSource: Send + Sync {
    fn tag(&self) -> SourceTag;

    fn subscribe(&self, on_sample: SampleCallback) -> Result<Subscription, SourceError>;
}

/// Handle for one live subscription. Cancelling is idempotent and also
/// happens on drop.
pub struct Subscription {
    tag: SourceTag,
    active: Arc<AtomicBool>,
    detach: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(
        tag: SourceTag,
        active: Arc<AtomicBool>,
        detach: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            tag,
            active,
            detach: Some(Box::new(detach)),
        }
    }

    pub fn tag(&self) -> SourceTag {
        self.tag
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Stop delivery. Safe to call any number of times, from any thread,
    /// including from within the subscription's own callback.
    pub fn cancel(&mut self) {
        self.active.store(false, Ordering::Release);
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("tag", &self.tag)
            .field("active", &self.is_active())
            .finish()
    }
}

struct Listener {
    id: u64,
    active: Arc<AtomicBool>,
    callback: SampleCallback,
}

#[derive(Default)]
struct PushInner {
    listeners: Mutex<Vec<Arc<Listener>>>,
    unavailable: Mutex<Option<SourceError>>,
    next_id: AtomicU64,
}

/// In-process source that the host feeds by calling [`PushSource::push`].
///
/// Platform glue (sensor listeners, frame grabbers) pushes readings here;
/// tests and the CLI use it directly. Clones share the same listeners.
#[derive(Clone)]
pub struct PushSource {
    tag: SourceTag,
    inner: Arc<PushInner>,
}

impl PushSource {
    pub fn new(tag: SourceTag) -> Self {
        Self {
            tag,
            inner: Arc::new(PushInner::default()),
        }
    }

    /// A source that refuses every subscription with `error`.
    pub fn unavailable(tag: SourceTag, error: SourceError) -> Self {
        let source = Self::new(tag);
        source.set_unavailable(Some(error));
        source
    }

    /// Mark the source unavailable (or available again with `None`).
    /// Existing subscriptions are left alone.
    pub fn set_unavailable(&self, error: Option<SourceError>) {
        *lock_unpoisoned(&self.inner.unavailable) = error;
    }

    /// Deliver one reading to every active subscriber.
    /// Returns how many callbacks were invoked.
    pub fn push(&self, timestamp_ms: u64, magnitude: f64) -> usize {
        self.push_sample(SensorSample::new(self.tag, timestamp_ms, magnitude))
    }

    pub fn push_sample(&self, sample: SensorSample) -> usize {
        // Snapshot so callbacks run without the listener lock held.
        let listeners: Vec<Arc<Listener>> = lock_unpoisoned(&self.inner.listeners).clone();
        let mut delivered = 0;
        for listener in listeners {
            if listener.active.load(Ordering::Acquire) {
                (listener.callback)(sample);
                delivered += 1;
            }
        }
        delivered
    }

    pub fn listener_count(&self) -> usize {
        lock_unpoisoned(&self.inner.listeners).len()
    }
}

impl SignalSource for PushSource {
    fn tag(&self) -> SourceTag {
        self.tag
    }

    fn subscribe(&self, on_sample: SampleCallback) -> Result<Subscription, SourceError> {
        if let Some(err) = lock_unpoisoned(&self.inner.unavailable).clone() {
            return Err(err);
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let active = Arc::new(AtomicBool::new(true));
        lock_unpoisoned(&self.inner.listeners).push(Arc::new(Listener {
            id,
            active: Arc::clone(&active),
            callback: on_sample,
        }));

        let weak: Weak<PushInner> = Arc::downgrade(&self.inner);
        Ok(Subscription::new(self.tag, active, move || {
            if let Some(inner) = weak.upgrade() {
                lock_unpoisoned(&inner.listeners).retain(|l| l.id != id);
            }
        }))
    }
}

impl fmt::Debug for PushSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PushSource")
            .field("tag", &self.tag)
            .field("listeners", &self.listener_count())
            .finish()
    }
}
