//! Listener-side registration of sequence handlers.
//!
//! - [`SequenceExt::sequence_handler`] launches a fresh [`Sequence`] for every
//!   event of a kind.
//! - [`SequenceExt::tick_handler`] keeps at most one live sequence per
//!   listener, relaunching it on the tick after it completes for as long as
//!   the listener runs. See [`TickSequence`].

use core::fmt;
use core::future::Future;
use core::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::Mutex;
use tickbus_event::bus::{EventBus, ListenerExt};
use tickbus_event::error::EventError;
use tickbus_event::hook::{HookHandle, HookOptions};
use tickbus_event::kind::Event;
use tickbus_event::listener::Listener;

use crate::sequence::{Sequence, SequenceState};
use crate::tick::{SequenceConfig, Tick};
use crate::wait::SequenceContext;

// ─────────────────────────────────────────────────────────────────────────────
// TickSequence
// ─────────────────────────────────────────────────────────────────────────────

struct Supervisor {
    bus: Weak<EventBus>,
    hook: OnceLock<HookHandle<Tick>>,
    current: Mutex<Option<Sequence>>,
    launches: AtomicUsize,
}

impl Supervisor {
    fn on_tick<F, Fut>(
        &self,
        bus: &Arc<EventBus>,
        owner: &Arc<dyn Listener>,
        config: SequenceConfig,
        body: &F,
    ) where
        F: Fn(SequenceContext) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if owner.running() {
            let live = self.current.lock().as_ref().is_some_and(Sequence::is_live);
            if !live {
                // Launching polls the body, so the lock must not be held.
                let sequence = Sequence::launch_with(bus, owner, 0, config, body);
                self.launches.fetch_add(1, Ordering::Relaxed);
                *self.current.lock() = Some(sequence);
            }
            return;
        }

        let Some(sequence) = self.current.lock().take() else {
            return;
        };
        sequence.cancel();
        if let Some(&hook) = self.hook.get()
            && bus.is_registered(hook)
        {
            bus.deactivate(hook);
        }
        tracing::debug!(listener = owner.name(), "tick sequence stopped");
    }
}

/// Handle to a repeating tick sequence registered with
/// [`SequenceExt::tick_handler`].
///
/// On every tick, while the listener runs and no sequence is live, a new one
/// is launched. On the first tick where the listener is not running the live
/// sequence is cancelled and the supervising hook is deactivated;
/// [`attempt_resume_events`](ListenerExt::attempt_resume_events) reactivates it.
#[derive(Clone)]
pub struct TickSequence {
    supervisor: Arc<Supervisor>,
}

impl TickSequence {
    /// Returns `true` while a launched sequence has neither completed nor
    /// been cancelled.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.supervisor
            .current
            .lock()
            .as_ref()
            .is_some_and(Sequence::is_live)
    }

    /// Number of sequences launched so far.
    #[must_use]
    pub fn launches(&self) -> usize {
        self.supervisor.launches.load(Ordering::Relaxed)
    }

    /// State of the most recent sequence, if there is one.
    #[must_use]
    pub fn current_state(&self) -> Option<SequenceState> {
        self.supervisor.current.lock().as_ref().map(Sequence::state)
    }

    /// Handle of the supervising hook.
    #[must_use]
    pub fn hook(&self) -> Option<HookHandle<Tick>> {
        self.supervisor.hook.get().copied()
    }

    /// Cancels the live sequence and removes the supervising hook for good.
    pub fn cancel(&self) {
        let current = self.supervisor.current.lock().take();
        if let Some(sequence) = current {
            sequence.cancel();
        }
        if let (Some(bus), Some(hook)) = (self.supervisor.bus.upgrade(), self.supervisor.hook.get()) {
            bus.unregister_any(hook.erase());
        }
    }
}

impl fmt::Debug for TickSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TickSequence")
            .field("hook", &self.hook())
            .field("launches", &self.launches())
            .field("current", &self.current_state())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SequenceExt
// ─────────────────────────────────────────────────────────────────────────────

/// Registers sequence-driving hooks for a listener.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use tickbus_event::prelude::*;
/// use tickbus_sequence::prelude::*;
///
/// let bus = Arc::new(EventBus::new(EventCatalogue::new().with::<Tick>()));
/// let module = ToggleListener::new("module", true);
/// let rounds = Arc::new(AtomicUsize::new(0));
///
/// let counter = Arc::clone(&rounds);
/// let ticker = module
///     .tick_handler(&bus, move |ctx| {
///         let counter = Arc::clone(&counter);
///         async move {
///             ctx.sync().await;
///             counter.fetch_add(1, Ordering::SeqCst);
///         }
///     })
///     .unwrap();
///
/// for _ in 0..4 {
///     bus.fire(Tick);
/// }
/// assert_eq!(rounds.load(Ordering::SeqCst), 2);
/// assert_eq!(ticker.launches(), 2);
/// ```
pub trait SequenceExt: ListenerExt {
    /// Launches a sequence for every event of kind `E`, with default
    /// configuration. The body receives a clone of the triggering event.
    ///
    /// # Errors
    ///
    /// See [`EventBus::register`].
    fn sequence_handler<E, F, Fut>(
        &self,
        bus: &Arc<EventBus>,
        options: HookOptions,
        body: F,
    ) -> Result<HookHandle<E>, EventError>
    where
        E: Event + Clone,
        F: Fn(SequenceContext, E) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.sequence_handler_with(bus, options, SequenceConfig::default(), body)
    }

    /// Like [`sequence_handler`](Self::sequence_handler), with an explicit
    /// configuration for the launched sequences.
    ///
    /// # Errors
    ///
    /// See [`EventBus::register`].
    fn sequence_handler_with<E, F, Fut>(
        &self,
        bus: &Arc<EventBus>,
        options: HookOptions,
        config: SequenceConfig,
        body: F,
    ) -> Result<HookHandle<E>, EventError>
    where
        E: Event + Clone,
        F: Fn(SequenceContext, E) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let owner = self.listener_ref();
        let weak_owner = Arc::downgrade(&owner);
        let weak_bus = Arc::downgrade(bus);

        bus.register::<E>(&owner, options, move |event| {
            if let (Some(bus), Some(owner)) = (weak_bus.upgrade(), weak_owner.upgrade()) {
                let event = event.clone();
                Sequence::launch_with(&bus, &owner, options.priority, config, |ctx| {
                    body(ctx, event)
                });
            }
            Ok(())
        })
    }

    /// Registers a repeating tick sequence with default configuration.
    ///
    /// # Errors
    ///
    /// See [`EventBus::register`]. [`Tick`] must be part of the bus catalogue.
    fn tick_handler<F, Fut>(&self, bus: &Arc<EventBus>, body: F) -> Result<TickSequence, EventError>
    where
        F: Fn(SequenceContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.tick_handler_with(bus, SequenceConfig::default(), body)
    }

    /// Like [`tick_handler`](Self::tick_handler), with an explicit
    /// configuration for the launched sequences.
    ///
    /// # Errors
    ///
    /// See [`EventBus::register`].
    fn tick_handler_with<F, Fut>(
        &self,
        bus: &Arc<EventBus>,
        config: SequenceConfig,
        body: F,
    ) -> Result<TickSequence, EventError>
    where
        F: Fn(SequenceContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let owner = self.listener_ref();
        let supervisor = Arc::new(Supervisor {
            bus: Arc::downgrade(bus),
            hook: OnceLock::new(),
            current: Mutex::new(None),
            launches: AtomicUsize::new(0),
        });

        let weak_owner = Arc::downgrade(&owner);
        let weak_bus = Arc::downgrade(bus);
        let on_tick = Arc::clone(&supervisor);
        let hook = bus.register::<Tick>(
            &owner,
            HookOptions::new().ignoring_inactive(),
            move |_| {
                if let (Some(bus), Some(owner)) = (weak_bus.upgrade(), weak_owner.upgrade()) {
                    on_tick.on_tick(&bus, &owner, config, &body);
                }
                Ok(())
            },
        )?;
        // The supervisor is fresh, so this always stores `hook`.
        supervisor.hook.get_or_init(|| hook);

        Ok(TickSequence { supervisor })
    }
}

impl<T: ListenerExt + ?Sized> SequenceExt for T {}
