//! Suspension primitives available to sequence bodies.

use core::future::Future;
use core::pin::Pin;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use core::task::{Context, Poll};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tickbus_event::kind::Event;
use tickbus_event::listener::ListenerRef;

use crate::sequence::{Predicate, SequenceInner, Slot};
use crate::tick::{SequenceConfig, Tick};

/// Handle a sequence body uses to suspend itself.
///
/// Every wait registers a temporary hook for the awaited kind and completes
/// inside the `fire` call that satisfies it. Bodies should only await these
/// primitives: nothing wakes a sequence that awaits any other pending future.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use tickbus_event::prelude::*;
/// use tickbus_sequence::prelude::*;
///
/// let bus = Arc::new(EventBus::new(EventCatalogue::new().with::<Tick>()));
/// let owner: ListenerRef = ToggleListener::new("module", true);
/// let steps = Arc::new(AtomicU32::new(0));
///
/// let counter = Arc::clone(&steps);
/// Sequence::launch(&bus, &owner, move |ctx| async move {
///     counter.fetch_add(1, Ordering::SeqCst);
///     ctx.wait_ticks(3).await;
///     counter.fetch_add(1, Ordering::SeqCst);
/// });
///
/// for _ in 0..2 {
///     bus.fire(Tick);
/// }
/// assert_eq!(steps.load(Ordering::SeqCst), 1);
///
/// bus.fire(Tick);
/// assert_eq!(steps.load(Ordering::SeqCst), 2);
/// ```
#[derive(Clone)]
pub struct SequenceContext {
    sequence: Weak<SequenceInner>,
}

impl SequenceContext {
    pub(crate) fn new(sequence: Weak<SequenceInner>) -> Self {
        Self { sequence }
    }

    /// The listener that owns the sequence, if it is still alive.
    #[must_use]
    pub fn owner(&self) -> Option<ListenerRef> {
        self.sequence.upgrade().and_then(|sequence| sequence.owner())
    }

    /// The configuration the sequence was launched with.
    #[must_use]
    pub fn config(&self) -> SequenceConfig {
        self.sequence
            .upgrade()
            .map(|sequence| sequence.config())
            .unwrap_or_default()
    }

    /// Resumes on the first later event of kind `E` accepted by `predicate`,
    /// and returns a clone of it.
    pub fn wait_event<E: Event + Clone>(
        &self,
        predicate: impl Fn(&E) -> bool + Send + Sync + 'static,
    ) -> WaitFor<E> {
        WaitFor {
            sequence: self.sequence.clone(),
            predicate: Arc::new(predicate),
            slot: Arc::new(Mutex::new(None)),
            registered: false,
        }
    }

    /// Resumes on exactly the `ticks`-th subsequent tick. Returns
    /// immediately for zero.
    pub async fn wait_ticks(&self, ticks: u32) {
        if ticks == 0 {
            return;
        }
        let remaining = AtomicU32::new(ticks);
        self.wait_event::<Tick>(move |_| remaining.fetch_sub(1, Ordering::Relaxed) == 1)
            .await;
    }

    /// Waits one tick.
    pub async fn sync(&self) {
        self.wait_ticks(1).await;
    }

    /// Waits `seconds` worth of ticks at the configured tick rate.
    pub async fn wait_seconds(&self, seconds: u32) {
        let ticks = self.config().ticks_for_seconds(seconds);
        self.wait_ticks(ticks).await;
    }

    /// Checks `condition` on every subsequent tick and resumes on the first
    /// tick where it holds.
    pub async fn wait_until(&self, condition: impl Fn() -> bool + Send + Sync + 'static) {
        self.wait_event::<Tick>(move |_| condition()).await;
    }

    /// Like [`wait_until`](Self::wait_until), but gives up after `max_ticks`
    /// ticks. Returns whether `condition` held.
    ///
    /// With `max_ticks == 0` the condition is checked once, without waiting.
    pub async fn wait_conditional(
        &self,
        max_ticks: u32,
        condition: impl Fn() -> bool + Send + Sync + 'static,
    ) -> bool {
        if max_ticks == 0 {
            return condition();
        }

        let held = Arc::new(AtomicBool::new(false));
        let elapsed = AtomicU32::new(0);
        let flag = Arc::clone(&held);
        self.wait_event::<Tick>(move |_| {
            if condition() {
                flag.store(true, Ordering::Relaxed);
                return true;
            }
            elapsed.fetch_add(1, Ordering::Relaxed) + 1 >= max_ticks
        })
        .await;

        held.load(Ordering::Relaxed)
    }
}

/// Future returned by [`SequenceContext::wait_event`].
///
/// The first poll registers the temporary hook; the hook stores the matching
/// event and re-polls the sequence, which then completes this future.
#[must_use = "waits do nothing unless awaited"]
pub struct WaitFor<E: Event> {
    sequence: Weak<SequenceInner>,
    predicate: Predicate<E>,
    slot: Slot<E>,
    registered: bool,
}

impl<E: Event + Clone> Future for WaitFor<E> {
    type Output = E;

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<E> {
        if let Some(event) = self.slot.lock().take() {
            return Poll::Ready(event);
        }
        if self.registered {
            return Poll::Pending;
        }

        self.registered = true;
        if let Some(sequence) = self.sequence.upgrade() {
            sequence.suspend_on(Arc::clone(&self.predicate), Arc::clone(&self.slot));
        }
        Poll::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::{Sequence, SequenceState};
    use tickbus_event::bus::EventBus;
    use tickbus_event::kind::EventCatalogue;
    use tickbus_event::listener::ToggleListener;

    fn setup() -> (Arc<EventBus>, ListenerRef) {
        let bus = Arc::new(EventBus::new(EventCatalogue::new().with::<Tick>()));
        let owner: ListenerRef = ToggleListener::new("owner", true);
        (bus, owner)
    }

    #[test]
    fn zero_ticks_does_not_suspend() {
        let (bus, owner) = setup();
        let sequence = Sequence::launch(&bus, &owner, |ctx| async move {
            ctx.wait_ticks(0).await;
        });
        assert_eq!(sequence.state(), SequenceState::Completed);
    }

    #[test]
    fn wait_seconds_uses_configured_rate() {
        let (bus, owner) = setup();
        let config = SequenceConfig::new().with_ticks_per_second(2);
        let sequence = Sequence::launch_with(&bus, &owner, 0, config, |ctx| async move {
            ctx.wait_seconds(2).await;
        });

        for _ in 0..3 {
            bus.fire(Tick);
        }
        assert!(sequence.is_live());

        bus.fire(Tick);
        assert_eq!(sequence.state(), SequenceState::Completed);
    }

    #[test]
    fn context_reports_owner_and_config() {
        let (bus, owner) = setup();
        let id = owner.listener_id();
        let seen = Arc::new(Mutex::new(None));

        let slot = Arc::clone(&seen);
        Sequence::launch(&bus, &owner, move |ctx| async move {
            *slot.lock() = Some((
                ctx.owner().map(|owner| owner.listener_id()),
                ctx.config().ticks_per_second,
            ));
        });

        assert_eq!(*seen.lock(), Some((Some(id), 20)));
    }
}
