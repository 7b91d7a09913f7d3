//! Suspendable sequences.
//!
//! A [`Sequence`] runs an `async` body on the thread that fires events. The
//! body is polled with a no-op waker: it advances only when a wait primitive
//! on its [`SequenceContext`] is satisfied by a fired event, and it resumes
//! synchronously inside the `fire` call that satisfied it.
//!
//! # Lifecycle
//!
//! ```text
//!              launch            wait primitive
//!   Created ──────────> Running ───────────────> Suspended(kind)
//!                        │  ^                      │
//!                        │  └──── event matches ───┘
//!                        │
//!                        ├── body returns ─────────> Completed
//!                        └── cancel / panic ───────> Cancelled
//! ```
//!
//! While suspended the sequence owns one temporary hook on the awaited event
//! kind. The hook belongs to the sequence's listener, ignores the running
//! state so it can notice a stopped owner, and is removed when the sequence
//! resumes, completes or is cancelled. If the hook disappears any other way
//! (the listener is unregistered, the bus is cleared) the sequence is
//! cancelled with it.

use core::fmt;
use core::future::Future;
use core::pin::Pin;
use core::sync::atomic::{AtomicU64, Ordering};
use core::task::{Context, Poll};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Weak};

use futures::future::BoxFuture;
use futures::task::noop_waker_ref;
use parking_lot::Mutex;
use tickbus_event::bus::EventBus;
use tickbus_event::error::panic_message;
use tickbus_event::hook::{AnyHookHandle, HookOptions};
use tickbus_event::kind::{Event, EventKind};
use tickbus_event::listener::{Listener, ListenerId, ListenerRef};

use crate::tick::SequenceConfig;
use crate::wait::SequenceContext;

// ─────────────────────────────────────────────────────────────────────────────
// Identity and state
// ─────────────────────────────────────────────────────────────────────────────

/// Process-unique identity of a sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SequenceId(u64);

impl SequenceId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw ID value.
    #[must_use]
    pub fn index(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SequenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sequence_{}", self.0)
    }
}

/// What a suspended sequence is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitCondition {
    kind: EventKind,
}

impl WaitCondition {
    pub(crate) fn of<E: Event>() -> Self {
        Self {
            kind: EventKind::of::<E>(),
        }
    }

    /// The event kind that will resume the sequence.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        self.kind
    }
}

/// Lifecycle state of a sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceState {
    /// Built but not polled yet.
    Created,
    /// The body is executing.
    Running,
    /// The body awaits an event.
    Suspended(WaitCondition),
    /// The body returned.
    Completed,
    /// The sequence was cancelled, its owner stopped, or its body panicked.
    Cancelled,
}

impl SequenceState {
    /// Returns `true` for `Completed` and `Cancelled`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SequenceInner
// ─────────────────────────────────────────────────────────────────────────────

pub(crate) type Predicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;
pub(crate) type Slot<E> = Arc<Mutex<Option<E>>>;

/// Shared state of one sequence.
///
/// Locks are split so that `cancel` never needs the future lock, which is
/// held for the whole duration of a poll.
pub(crate) struct SequenceInner {
    id: SequenceId,
    bus: Weak<EventBus>,
    owner: Weak<dyn Listener>,
    owner_id: ListenerId,
    owner_name: Arc<str>,
    priority: i16,
    config: SequenceConfig,
    state: Mutex<SequenceState>,
    future: Mutex<Option<BoxFuture<'static, ()>>>,
    /// The temporary hook, tagged with the number of the wait that registered it.
    wait: Mutex<Option<(u64, AnyHookHandle)>>,
    waits: AtomicU64,
}

impl SequenceInner {
    pub(crate) fn config(&self) -> SequenceConfig {
        self.config
    }

    pub(crate) fn owner(&self) -> Option<ListenerRef> {
        self.owner.upgrade()
    }

    fn state(&self) -> SequenceState {
        *self.state.lock()
    }

    /// State as observed through a handle. A live sequence whose owner was
    /// unregistered or dropped is cancelled first.
    fn settled_state(&self) -> SequenceState {
        let state = self.state();
        if state.is_terminal() || self.owner_present() {
            return state;
        }
        self.cancel();
        self.state()
    }

    fn owner_present(&self) -> bool {
        self.owner
            .upgrade()
            .is_some_and(|owner| !owner.core().is_destructed())
    }

    /// Moves to `next` unless the sequence already finished.
    fn transition(&self, next: SequenceState) -> bool {
        let mut state = self.state.lock();
        if state.is_terminal() {
            return false;
        }
        *state = next;
        true
    }

    fn take_wait(&self) -> Option<AnyHookHandle> {
        self.wait.lock().take().map(|(_, handle)| handle)
    }

    fn is_awaiting(&self, wait: u64) -> bool {
        self.wait
            .lock()
            .as_ref()
            .is_some_and(|(current, _)| *current == wait)
    }

    fn remove_wait_hook(&self) {
        let Some(handle) = self.take_wait() else {
            return;
        };
        if let Some(bus) = self.bus.upgrade() {
            bus.unregister_any(handle);
        }
    }

    /// Polls the body once.
    fn poll(self: &Arc<Self>) {
        let Some(mut slot) = self.future.try_lock() else {
            tracing::warn!(sequence = %self.id, "sequence resumed from inside its own body, ignoring");
            return;
        };
        let Some(future) = (*slot).as_mut() else {
            return;
        };
        if !self.transition(SequenceState::Running) {
            *slot = None;
            return;
        }

        let _span = tracing::trace_span!(
            "sequence",
            id = %self.id,
            listener = %self.owner_name
        )
        .entered();

        let mut cx = Context::from_waker(noop_waker_ref());
        match catch_unwind(AssertUnwindSafe(|| future.as_mut().poll(&mut cx))) {
            Ok(Poll::Ready(())) => {
                *slot = None;
                drop(slot);
                self.remove_wait_hook();
                if self.transition(SequenceState::Completed) {
                    tracing::trace!(sequence = %self.id, "sequence completed");
                }
            }
            Ok(Poll::Pending) => {
                if self.state().is_terminal() {
                    // Cancelled from inside the body; the body is dropped here
                    // because `cancel` could not take the future lock.
                    *slot = None;
                }
            }
            Err(payload) => {
                *slot = None;
                drop(slot);
                tracing::error!(
                    sequence = %self.id,
                    listener = %self.owner_name,
                    listener_id = %self.owner_id,
                    panic = panic_message(payload.as_ref()),
                    "sequence body panicked"
                );
                self.cancel();
            }
        }
    }

    pub(crate) fn cancel(&self) {
        {
            let mut state = self.state.lock();
            if state.is_terminal() {
                return;
            }
            *state = SequenceState::Cancelled;
        }

        self.remove_wait_hook();
        if let Some(mut future) = self.future.try_lock() {
            *future = None;
        }
        tracing::debug!(sequence = %self.id, listener = %self.owner_name, "sequence cancelled");
    }

    /// Registers the temporary hook that resumes the body on a matching `E`.
    ///
    /// Called from inside a poll. Cancels the sequence if the hook cannot be
    /// registered.
    pub(crate) fn suspend_on<E: Event + Clone>(
        self: &Arc<Self>,
        predicate: Predicate<E>,
        slot: Slot<E>,
    ) {
        let (Some(bus), Some(owner)) = (self.bus.upgrade(), self.owner.upgrade()) else {
            self.cancel();
            return;
        };

        let wait = self.waits.fetch_add(1, Ordering::Relaxed);
        let guard = WaitHook {
            sequence: Arc::clone(self),
            wait,
        };
        let options = HookOptions::new()
            .with_priority(self.priority)
            .ignoring_inactive();
        let registered = bus.register::<E>(&owner, options, move |event| {
            guard.sequence().deliver(event, predicate.as_ref(), &slot);
            Ok(())
        });

        match registered {
            Ok(handle) => {
                *self.wait.lock() = Some((wait, handle.erase()));
                if !self.transition(SequenceState::Suspended(WaitCondition::of::<E>())) {
                    // Cancelled while registering.
                    self.remove_wait_hook();
                }
            }
            Err(error) => {
                tracing::warn!(
                    sequence = %self.id,
                    listener = %self.owner_name,
                    %error,
                    "cannot suspend sequence, cancelling"
                );
                self.cancel();
            }
        }
    }

    /// Body of the temporary hook.
    fn deliver<E: Event + Clone>(
        self: &Arc<Self>,
        event: &E,
        predicate: &(dyn Fn(&E) -> bool + Send + Sync),
        slot: &Mutex<Option<E>>,
    ) {
        if self.state().is_terminal() {
            return;
        }
        if !self.owner.upgrade().is_some_and(|owner| owner.running()) {
            tracing::debug!(sequence = %self.id, listener = %self.owner_name, "owner stopped running");
            self.cancel();
            return;
        }
        if !predicate(event) {
            return;
        }

        *slot.lock() = Some(event.clone());
        self.remove_wait_hook();
        self.poll();
    }
}

/// Captured by a temporary hook. Dropping the hook while the sequence still
/// awaits it means the bus removed it behind the sequence's back, so the
/// sequence can never resume and is cancelled.
struct WaitHook {
    sequence: Arc<SequenceInner>,
    wait: u64,
}

impl WaitHook {
    fn sequence(&self) -> &Arc<SequenceInner> {
        &self.sequence
    }
}

impl Drop for WaitHook {
    fn drop(&mut self) {
        if self.sequence.is_awaiting(self.wait) {
            self.sequence.cancel();
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Sequence
// ─────────────────────────────────────────────────────────────────────────────

/// Handle to a launched sequence.
///
/// Dropping the handle does not stop the sequence: a suspended sequence is
/// kept alive by its temporary hook until it completes or is cancelled.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use tickbus_event::prelude::*;
/// use tickbus_sequence::prelude::*;
///
/// let bus = Arc::new(EventBus::new(EventCatalogue::new().with::<Tick>()));
/// let owner: ListenerRef = ToggleListener::new("module", true);
///
/// let sequence = Sequence::launch(&bus, &owner, |ctx| async move {
///     ctx.wait_ticks(2).await;
/// });
/// assert!(matches!(sequence.state(), SequenceState::Suspended(_)));
///
/// bus.fire(Tick);
/// bus.fire(Tick);
/// assert_eq!(sequence.state(), SequenceState::Completed);
/// ```
#[derive(Clone)]
pub struct Sequence {
    inner: Arc<SequenceInner>,
}

impl Sequence {
    /// Launches `body` for `owner` with default priority and configuration.
    ///
    /// The body runs immediately until its first suspension point.
    pub fn launch<F, Fut>(bus: &Arc<EventBus>, owner: &ListenerRef, body: F) -> Self
    where
        F: FnOnce(SequenceContext) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::launch_with(bus, owner, 0, SequenceConfig::default(), body)
    }

    /// Launches `body` for `owner`.
    ///
    /// Temporary hooks registered by the body's waits use `priority`.
    pub fn launch_with<F, Fut>(
        bus: &Arc<EventBus>,
        owner: &ListenerRef,
        priority: i16,
        config: SequenceConfig,
        body: F,
    ) -> Self
    where
        F: FnOnce(SequenceContext) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let inner = Arc::new(SequenceInner {
            id: SequenceId::next(),
            bus: Arc::downgrade(bus),
            owner: Arc::downgrade(owner),
            owner_id: owner.listener_id(),
            owner_name: Arc::from(owner.name()),
            priority,
            config,
            state: Mutex::new(SequenceState::Created),
            future: Mutex::new(None),
            wait: Mutex::new(None),
            waits: AtomicU64::new(0),
        });

        let future: Pin<Box<dyn Future<Output = ()> + Send>> =
            Box::pin(body(SequenceContext::new(Arc::downgrade(&inner))));
        *inner.future.lock() = Some(future);

        tracing::trace!(sequence = %inner.id, listener = owner.name(), "sequence launched");
        inner.poll();

        Self { inner }
    }

    /// Returns the sequence's identity.
    #[must_use]
    pub fn id(&self) -> SequenceId {
        self.inner.id
    }

    /// Returns the owning listener's identity.
    #[must_use]
    pub fn owner_id(&self) -> ListenerId {
        self.inner.owner_id
    }

    /// Returns the current state.
    ///
    /// A sequence whose listener was unregistered or dropped reports
    /// [`SequenceState::Cancelled`].
    #[must_use]
    pub fn state(&self) -> SequenceState {
        self.inner.settled_state()
    }

    /// Returns `true` until the sequence completes or is cancelled.
    #[must_use]
    pub fn is_live(&self) -> bool {
        !self.state().is_terminal()
    }

    /// Stops the sequence and removes its temporary hook. Idempotent.
    pub fn cancel(&self) {
        self.inner.cancel();
    }
}

impl fmt::Debug for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sequence")
            .field("id", &self.inner.id)
            .field("listener", &self.inner.owner_name)
            .field("state", &self.state())
            .finish()
    }
}
