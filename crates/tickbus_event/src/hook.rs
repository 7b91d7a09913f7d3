//! Hooks: a callback bound to one event kind and owned by one listener.

use core::fmt;
use core::marker::PhantomData;
use core::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use crate::error::HandlerResult;
use crate::kind::{Event, EventKind};
use crate::listener::{Listener, ListenerId, ListenerRef};

// ─────────────────────────────────────────────────────────────────────────────
// HookId
// ─────────────────────────────────────────────────────────────────────────────

/// Identity of a registered hook.
///
/// Ids increase monotonically in registration order; the registry uses them
/// to order hooks of equal priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HookId(u64);

impl HookId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw ID value.
    #[must_use]
    pub fn index(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for HookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hook_{}", self.0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// HookOptions
// ─────────────────────────────────────────────────────────────────────────────

/// Registration options for a hook.
///
/// # Example
///
/// ```
/// use tickbus_event::hook::HookOptions;
///
/// let options = HookOptions::new().with_priority(100).ignoring_inactive();
/// assert_eq!(options.priority, 100);
/// assert!(options.ignore_inactive);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HookOptions {
    /// Fire even when the owner reports not running.
    pub ignore_inactive: bool,
    /// Higher priorities fire first.
    pub priority: i16,
}

impl HookOptions {
    /// Default options: priority 0, skipped while the owner is not running.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the priority.
    #[must_use]
    pub fn with_priority(mut self, priority: i16) -> Self {
        self.priority = priority;
        self
    }

    /// Makes the hook fire regardless of its owner's running state.
    #[must_use]
    pub fn ignoring_inactive(mut self) -> Self {
        self.ignore_inactive = true;
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Hook
// ─────────────────────────────────────────────────────────────────────────────

type BoxedHandler<E> = Box<dyn Fn(&E) -> HandlerResult + Send + Sync>;

/// A registered callback for events of type `E`.
///
/// The owner is held weakly: the registry references listeners, it never
/// keeps them alive.
pub struct Hook<E: Event> {
    id: HookId,
    owner: Weak<dyn Listener>,
    owner_id: ListenerId,
    owner_name: Arc<str>,
    handler: BoxedHandler<E>,
    options: HookOptions,
}

impl<E: Event> Hook<E> {
    /// Creates a hook owned by `owner`.
    pub fn new(
        owner: &ListenerRef,
        options: HookOptions,
        handler: impl Fn(&E) -> HandlerResult + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: HookId::next(),
            owner: Arc::downgrade(owner),
            owner_id: owner.listener_id(),
            owner_name: Arc::from(owner.name()),
            handler: Box::new(handler),
            options,
        }
    }

    /// Returns the hook's identity.
    #[must_use]
    pub fn id(&self) -> HookId {
        self.id
    }

    /// Returns the owning listener, if it is still alive.
    #[must_use]
    pub fn owner(&self) -> Option<ListenerRef> {
        self.owner.upgrade()
    }

    /// Returns `false` once the owning listener has been dropped.
    #[must_use]
    pub fn owner_alive(&self) -> bool {
        self.owner.strong_count() > 0
    }

    /// Returns the owning listener's identity.
    #[must_use]
    pub fn owner_id(&self) -> ListenerId {
        self.owner_id
    }

    /// Returns the owning listener's name, captured at registration.
    #[must_use]
    pub fn owner_name(&self) -> &str {
        &self.owner_name
    }

    /// Returns the hook's priority.
    #[must_use]
    pub fn priority(&self) -> i16 {
        self.options.priority
    }

    /// Returns `true` if the hook fires regardless of the owner's running state.
    #[must_use]
    pub fn ignores_inactive(&self) -> bool {
        self.options.ignore_inactive
    }

    /// Invokes the callback.
    pub fn invoke(&self, event: &E) -> HandlerResult {
        (self.handler)(event)
    }
}

impl<E: Event> fmt::Debug for Hook<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook")
            .field("id", &self.id)
            .field("event", &EventKind::of::<E>().short_name())
            .field("owner", &self.owner_name)
            .field("priority", &self.options.priority)
            .field("ignore_inactive", &self.options.ignore_inactive)
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Handles
// ─────────────────────────────────────────────────────────────────────────────

/// Typed handle to a registered hook.
pub struct HookHandle<E: Event> {
    id: HookId,
    _marker: PhantomData<fn(&E)>,
}

impl<E: Event> HookHandle<E> {
    pub(crate) fn new(id: HookId) -> Self {
        Self {
            id,
            _marker: PhantomData,
        }
    }

    /// Returns the hook's identity.
    #[must_use]
    pub fn id(&self) -> HookId {
        self.id
    }

    /// Returns the event kind the hook is bound to.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        EventKind::of::<E>()
    }

    /// Erases the event type.
    #[must_use]
    pub fn erase(&self) -> AnyHookHandle {
        AnyHookHandle {
            kind: self.kind(),
            id: self.id,
        }
    }
}

impl<E: Event> Clone for HookHandle<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E: Event> Copy for HookHandle<E> {}

impl<E: Event> PartialEq for HookHandle<E> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<E: Event> Eq for HookHandle<E> {}

impl<E: Event> fmt::Debug for HookHandle<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookHandle")
            .field("id", &self.id)
            .field("event", &EventKind::of::<E>().short_name())
            .finish()
    }
}

/// Hook handle with the event type erased.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnyHookHandle {
    kind: EventKind,
    id: HookId,
}

impl AnyHookHandle {
    /// Returns the event kind the hook is bound to.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Returns the hook's identity.
    #[must_use]
    pub fn id(&self) -> HookId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::ToggleListener;

    struct Ping;
    impl Event for Ping {}

    #[test]
    fn hook_ids_follow_registration_order() {
        let first = HookId::next();
        let second = HookId::next();
        assert!(first < second);
    }

    #[test]
    fn hook_captures_owner_identity() {
        let owner: ListenerRef = ToggleListener::new("owner", true);
        let hook = Hook::<Ping>::new(&owner, HookOptions::new().with_priority(7), |_| Ok(()));

        assert_eq!(hook.owner_id(), owner.listener_id());
        assert_eq!(hook.owner_name(), "owner");
        assert_eq!(hook.priority(), 7);
        assert!(!hook.ignores_inactive());
        assert!(hook.owner().is_some());

        drop(owner);
        assert!(hook.owner().is_none(), "hooks never keep their owner alive");
    }

    #[test]
    fn handle_erasure_keeps_kind_and_id() {
        let handle = HookHandle::<Ping>::new(HookId::next());
        let erased = handle.erase();
        assert_eq!(erased.id(), handle.id());
        assert_eq!(erased.kind(), EventKind::of::<Ping>());
    }
}
