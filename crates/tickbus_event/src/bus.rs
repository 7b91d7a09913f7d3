//! The event bus: per-kind registries, dispatch and listener lifecycle.
//!
//! # Architecture
//!
//! ```text
//! EventBus
//! ├── registries: EventKind -> OnceLock<HookRegistry<E>>   (fixed membership)
//! ├── scheduler:  EventScheduler                          (one-shot actions)
//! └── config:     BusConfig
//!
//! fire::<E>(event)
//!   1. drain scheduled actions for E
//!   2. load one HookList<E> snapshot
//!   3. invoke active hooks in order, skipping non-running owners
//! ```
//!
//! The set of kinds is fixed when the bus is built from an [`EventCatalogue`].
//! Each registry is created on first typed access and never removed, so
//! looking one up needs no lock. Registries store immutable snapshots that
//! writers replace with compare-and-swap, which means a hook registered or
//! removed while an event is being dispatched takes effect from the next
//! `fire` onward.
//!
//! # Failure isolation
//!
//! A hook that returns `Err` or panics is logged with its owner's identity
//! and the event kind, and dispatch continues with the next hook. Panic
//! isolation can be disabled through [`BusConfig::isolate_panics`].

use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, OnceLock};

use hashbrown::HashMap;

use crate::config::BusConfig;
use crate::error::{EventError, HandlerResult, panic_message};
use crate::hook::{AnyHookHandle, Hook, HookHandle, HookOptions};
use crate::kind::{Event, EventCatalogue, EventKind};
use crate::listener::{Listener, ListenerId, ListenerRef};
use crate::registry::{ErasedRegistry, HookList, HookRegistry};
use crate::scheduler::EventScheduler;

type RegistrySlot = OnceLock<Box<dyn ErasedRegistry>>;

/// Dispatches events to hooks registered by listeners.
///
/// # Example
///
/// ```
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use tickbus_event::prelude::*;
///
/// struct Tick;
/// impl Event for Tick {}
///
/// let bus = EventBus::new(EventCatalogue::new().with::<Tick>());
/// let module: ListenerRef = ToggleListener::new("module", true);
/// let ticks = Arc::new(AtomicUsize::new(0));
///
/// let counter = Arc::clone(&ticks);
/// bus.register::<Tick>(&module, HookOptions::new(), move |_| {
///     counter.fetch_add(1, Ordering::SeqCst);
///     Ok(())
/// })
/// .unwrap();
///
/// bus.fire(Tick);
/// assert_eq!(ticks.load(Ordering::SeqCst), 1);
/// ```
pub struct EventBus {
    registries: HashMap<EventKind, RegistrySlot>,
    catalogue: EventCatalogue,
    scheduler: EventScheduler,
    config: BusConfig,
    shut_down: AtomicBool,
}

impl EventBus {
    /// Creates a bus for the given catalogue with default configuration.
    #[must_use]
    pub fn new(catalogue: EventCatalogue) -> Self {
        Self::with_config(catalogue, BusConfig::default())
    }

    /// Creates a bus for the given catalogue.
    #[must_use]
    pub fn with_config(catalogue: EventCatalogue, config: BusConfig) -> Self {
        let registries = catalogue
            .kinds()
            .iter()
            .map(|kind| (*kind, RegistrySlot::new()))
            .collect();
        let scheduler = EventScheduler::new(&catalogue);

        tracing::debug!(kinds = catalogue.len(), ?config, "event bus created");

        Self {
            registries,
            catalogue,
            scheduler,
            config,
            shut_down: AtomicBool::new(false),
        }
    }

    /// Returns the catalogue the bus was built from.
    #[must_use]
    pub fn catalogue(&self) -> &EventCatalogue {
        &self.catalogue
    }

    /// Returns the bus configuration.
    #[must_use]
    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    /// Returns the scheduler for one-shot deferred actions.
    #[must_use]
    pub fn scheduler(&self) -> &EventScheduler {
        &self.scheduler
    }

    // ─────────────────────────────────────────────────────────────────────
    // Registry lookup
    // ─────────────────────────────────────────────────────────────────────

    fn registry<E: Event>(&self) -> Option<&HookRegistry<E>> {
        self.registries
            .get(&EventKind::of::<E>())?
            .get_or_init(|| Box::new(HookRegistry::<E>::new()))
            .downcast_ref::<HookRegistry<E>>()
    }

    fn registry_for_handle<E: Event>(&self, handle: HookHandle<E>) -> &HookRegistry<E> {
        match self.registry::<E>() {
            Some(registry) => registry,
            None => panic!(
                "{} belongs to event '{}' which is not part of this bus",
                handle.id(),
                handle.kind().type_name()
            ),
        }
    }

    fn initialized(&self) -> impl Iterator<Item = &dyn ErasedRegistry> {
        self.registries
            .values()
            .filter_map(OnceLock::get)
            .map(|registry| &**registry)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Registration
    // ─────────────────────────────────────────────────────────────────────

    /// Registers `handler` for events of type `E`, owned by `owner`.
    ///
    /// The hook is activated immediately if the owner currently reports
    /// [`should_be_on_hook_list`](Listener::should_be_on_hook_list).
    ///
    /// # Errors
    ///
    /// - [`EventError::UnknownEvent`] if `E` is not part of the catalogue.
    /// - [`EventError::ListenerDropped`] if `owner` was already unregistered.
    ///
    /// # Panics
    ///
    /// With [`BusConfig::verify_listener_tree`] set, panics if the owner has
    /// a parent that does not list it among its children.
    pub fn register<E: Event>(
        &self,
        owner: &ListenerRef,
        options: HookOptions,
        handler: impl Fn(&E) -> HandlerResult + Send + Sync + 'static,
    ) -> Result<HookHandle<E>, EventError> {
        let registry = self.registry::<E>().ok_or(EventError::UnknownEvent {
            kind: EventKind::of::<E>().type_name(),
        })?;

        if owner.core().is_destructed() {
            return Err(EventError::ListenerDropped {
                name: owner.name().to_owned(),
            });
        }

        if self.config.verify_listener_tree {
            verify_parent_lists(owner.as_ref());
        }

        let hook = Arc::new(Hook::new(owner, options, handler));
        let id = hook.id();
        let activate = owner.should_be_on_hook_list();
        registry.register(hook, activate);

        tracing::debug!(
            hook = %id,
            event = %EventKind::of::<E>(),
            listener = owner.name(),
            priority = options.priority,
            active = activate,
            "hook registered"
        );

        Ok(HookHandle::new(id))
    }

    /// Moves the hook into the active region. No-op if already active.
    ///
    /// Among hooks of equal priority the order follows registration, not
    /// activation: a hook registered earlier runs first even if it was
    /// activated later.
    ///
    /// # Panics
    ///
    /// Panics if the hook is not registered on this bus.
    pub fn activate<E: Event>(&self, handle: HookHandle<E>) {
        self.registry_for_handle(handle).activate(handle.id());
    }

    /// Moves the hook out of the active region without removing it.
    ///
    /// # Panics
    ///
    /// Panics if the hook is not registered on this bus.
    pub fn deactivate<E: Event>(&self, handle: HookHandle<E>) {
        self.registry_for_handle(handle)
            .deactivate(handle.id(), false);
    }

    /// Removes the hook.
    ///
    /// # Panics
    ///
    /// Panics if the hook is not registered on this bus.
    pub fn unregister_hook<E: Event>(&self, handle: HookHandle<E>) {
        self.registry_for_handle(handle)
            .deactivate(handle.id(), true);
        tracing::trace!(hook = %handle.id(), event = %handle.kind(), "hook unregistered");
    }

    /// Removes the hook if it is still registered. Returns whether it was.
    pub fn unregister_any(&self, handle: AnyHookHandle) -> bool {
        self.registries
            .get(&handle.kind())
            .and_then(OnceLock::get)
            .is_some_and(|registry| registry.remove_hook(handle.id()))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Introspection
    // ─────────────────────────────────────────────────────────────────────

    /// Returns `true` if the hook is registered and active.
    #[must_use]
    pub fn is_active<E: Event>(&self, handle: HookHandle<E>) -> bool {
        self.registry::<E>()
            .is_some_and(|registry| registry.snapshot().is_active(handle.id()))
    }

    /// Returns `true` if the hook is registered, active or not.
    #[must_use]
    pub fn is_registered<E: Event>(&self, handle: HookHandle<E>) -> bool {
        self.registry::<E>()
            .is_some_and(|registry| registry.snapshot().contains(handle.id()))
    }

    /// Current snapshot of the hooks for `E`, or `None` for unknown kinds.
    #[must_use]
    pub fn snapshot<E: Event>(&self) -> Option<Arc<HookList<E>>> {
        self.registry::<E>().map(HookRegistry::snapshot)
    }

    /// Number of hooks registered for `E`.
    #[must_use]
    pub fn hook_count<E: Event>(&self) -> usize {
        self.registry::<E>()
            .map_or(0, |registry| registry.snapshot().len())
    }

    /// Number of active hooks for `E`.
    #[must_use]
    pub fn active_hook_count<E: Event>(&self) -> usize {
        self.registry::<E>()
            .map_or(0, |registry| registry.snapshot().active_len())
    }

    /// Number of hooks owned by `listener` across every event kind.
    #[must_use]
    pub fn listener_hook_count(&self, listener: &dyn Listener) -> usize {
        let owner = listener.listener_id();
        self.initialized()
            .map(|registry| registry.owned_hook_count(owner))
            .sum()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Dispatch
    // ─────────────────────────────────────────────────────────────────────

    /// Delivers `event` to the active hooks of its kind and returns it.
    ///
    /// Scheduled one-shot actions for the kind run first. Hooks run in
    /// priority order; a hook is skipped if its owner was dropped, or if it
    /// does not ignore inactivity and its owner is not running. Unknown kinds
    /// are ignored.
    ///
    /// Hooks of listeners dropped without being unregistered are removed from
    /// the registry once dispatch finishes.
    pub fn fire<E: Event>(&self, event: E) -> E {
        let kind = EventKind::of::<E>();

        let shut_down = self.shut_down.load(Ordering::Acquire);
        debug_assert!(!shut_down, "event '{kind}' fired after the bus was shut down");
        if shut_down {
            tracing::warn!(event = %kind, "event fired after shutdown, ignoring");
            return event;
        }

        let Some(registry) = self.registry::<E>() else {
            tracing::trace!(event = %kind, "no registry for event kind, ignoring");
            return event;
        };

        self.run_scheduled(kind, &event);

        let snapshot = registry.snapshot();
        let mut dropped_owner = false;
        for hook in snapshot.active() {
            let Some(owner) = hook.owner() else {
                dropped_owner = true;
                continue;
            };
            if !hook.ignores_inactive() && !owner.running() {
                continue;
            }
            self.guarded(kind, hook.owner_id(), hook.owner_name(), || {
                hook.invoke(&event)
            });
        }
        drop(snapshot);

        if dropped_owner {
            tracing::trace!(event = %kind, "pruning hooks of dropped listeners");
            registry.prune_dropped_owners();
        }

        event
    }

    fn run_scheduled<E: Event>(&self, kind: EventKind, event: &E) {
        for scheduled in self.scheduler.take::<E>() {
            let alive = scheduled
                .owner
                .upgrade()
                .is_some_and(|owner| !owner.core().is_destructed());
            if !alive {
                tracing::trace!(
                    event = %kind,
                    listener = %scheduled.owner_name,
                    "discarding scheduled action of a dropped listener"
                );
                continue;
            }
            let action = scheduled.action;
            self.guarded(kind, scheduled.owner_id, &scheduled.owner_name, || {
                action(event)
            });
        }
    }

    /// Runs a callback, logging its failure instead of propagating it.
    fn guarded(
        &self,
        kind: EventKind,
        owner_id: ListenerId,
        owner_name: &str,
        callback: impl FnOnce() -> HandlerResult,
    ) {
        let outcome = if self.config.isolate_panics {
            match catch_unwind(AssertUnwindSafe(callback)) {
                Ok(outcome) => outcome,
                Err(payload) => {
                    tracing::error!(
                        listener = owner_name,
                        listener_id = %owner_id,
                        event = %kind,
                        panic = panic_message(payload.as_ref()),
                        "hook panicked"
                    );
                    return;
                }
            }
        } else {
            callback()
        };

        if let Err(error) = outcome {
            tracing::error!(
                listener = owner_name,
                listener_id = %owner_id,
                event = %kind,
                %error,
                "hook failed"
            );
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Listener lifecycle
    // ─────────────────────────────────────────────────────────────────────

    /// Removes every hook of `listener` and its children, irreversibly.
    ///
    /// The listener is marked destructed, its pending scheduled actions are
    /// discarded, and the operation recurses into its children. Calling this
    /// again for the same listener does nothing.
    pub fn unregister_listener(&self, listener: &dyn Listener) {
        if !listener.core().destruct() {
            return;
        }

        let owner = listener.listener_id();
        for registry in self.initialized() {
            registry.unregister_owner(owner);
        }
        self.scheduler.clear_owner(owner);

        tracing::debug!(listener = listener.name(), listener_id = %owner, "listener unregistered");

        for child in listener.children() {
            self.unregister_listener(child.as_ref());
        }
    }

    /// Moves every hook of `listener` and its children to the inactive region.
    pub fn suspend_listener(&self, listener: &dyn Listener) {
        let owner = listener.listener_id();
        for registry in self.initialized() {
            registry.suspend_owner(owner);
        }

        tracing::trace!(listener = listener.name(), listener_id = %owner, "listener suspended");

        for child in listener.children() {
            self.suspend_listener(child.as_ref());
        }
    }

    /// Moves the hooks of `listener` back to the active region, if the
    /// listener currently wants to be on the hook list, then recurses into
    /// its children.
    pub fn attempt_resume_listener(&self, listener: &dyn Listener) {
        if !listener.should_be_on_hook_list() {
            return;
        }

        let owner = listener.listener_id();
        for registry in self.initialized() {
            registry.resume_owner(owner);
        }

        tracing::trace!(listener = listener.name(), listener_id = %owner, "listener resumed");

        for child in listener.children() {
            self.attempt_resume_listener(child.as_ref());
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Teardown
    // ─────────────────────────────────────────────────────────────────────

    /// Removes every hook and every scheduled action.
    pub fn clear(&self) {
        for registry in self.initialized() {
            tracing::trace!(event = %registry.kind(), hooks = registry.hook_count(), "clearing registry");
            registry.clear();
        }
        self.scheduler.clear();
    }

    /// Clears the bus and refuses further dispatch.
    pub fn shutdown(&self) {
        self.clear();
        self.shut_down.store(true, Ordering::Release);
        tracing::info!("event bus shut down");
    }

    /// Returns `true` once [`shutdown`](Self::shutdown) was called.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("kinds", &self.catalogue.len())
            .field(
                "hooks",
                &self
                    .initialized()
                    .map(|registry| registry.hook_count())
                    .sum::<usize>(),
            )
            .field("scheduler", &self.scheduler)
            .field("config", &self.config)
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

fn verify_parent_lists(owner: &dyn Listener) {
    let Some(parent) = owner.parent() else {
        return;
    };
    let id = owner.listener_id();
    assert!(
        parent
            .children()
            .iter()
            .any(|child| child.listener_id() == id),
        "listener '{}' has parent '{}' which does not list it as a child",
        owner.name(),
        parent.name()
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// ListenerExt
// ─────────────────────────────────────────────────────────────────────────────

/// Listener-side shorthands for registration and lifecycle operations.
///
/// # Example
///
/// ```
/// use tickbus_event::prelude::*;
///
/// struct Tick;
/// impl Event for Tick {}
///
/// let bus = EventBus::new(EventCatalogue::new().with::<Tick>());
/// let module = ToggleListener::new("module", true);
///
/// module.handler::<Tick>(&bus, |_| Ok(())).unwrap();
/// module.suspend_events(&bus);
/// assert_eq!(bus.active_hook_count::<Tick>(), 0);
///
/// module.attempt_resume_events(&bus);
/// assert_eq!(bus.active_hook_count::<Tick>(), 1);
/// ```
pub trait ListenerExt {
    /// Returns this listener as a shared trait object.
    fn listener_ref(&self) -> ListenerRef;

    /// Registers a hook with default options.
    ///
    /// # Errors
    ///
    /// See [`EventBus::register`].
    fn handler<E: Event>(
        &self,
        bus: &EventBus,
        handler: impl Fn(&E) -> HandlerResult + Send + Sync + 'static,
    ) -> Result<HookHandle<E>, EventError> {
        bus.register(&self.listener_ref(), HookOptions::default(), handler)
    }

    /// Registers a hook with explicit options.
    ///
    /// # Errors
    ///
    /// See [`EventBus::register`].
    fn handler_with<E: Event>(
        &self,
        bus: &EventBus,
        options: HookOptions,
        handler: impl Fn(&E) -> HandlerResult + Send + Sync + 'static,
    ) -> Result<HookHandle<E>, EventError> {
        bus.register(&self.listener_ref(), options, handler)
    }

    /// See [`EventBus::unregister_listener`].
    fn unregister(&self, bus: &EventBus) {
        bus.unregister_listener(self.listener_ref().as_ref());
    }

    /// See [`EventBus::suspend_listener`].
    fn suspend_events(&self, bus: &EventBus) {
        bus.suspend_listener(self.listener_ref().as_ref());
    }

    /// See [`EventBus::attempt_resume_listener`].
    fn attempt_resume_events(&self, bus: &EventBus) {
        bus.attempt_resume_listener(self.listener_ref().as_ref());
    }
}

impl<L: Listener> ListenerExt for Arc<L> {
    fn listener_ref(&self) -> ListenerRef {
        Arc::clone(self) as ListenerRef
    }
}

impl ListenerExt for ListenerRef {
    fn listener_ref(&self) -> ListenerRef {
        Arc::clone(self)
    }
}
