//! The listener capability tree.
//!
//! Anything that owns hooks implements [`Listener`]. Listeners form a tree:
//! a child is running only while its parent is running, and lifecycle
//! operations on the bus ([`unregister_listener`], [`suspend_listener`],
//! [`attempt_resume_listener`]) cascade from a listener to all its children.
//!
//! Concrete listeners embed a [`ListenerCore`] which carries the identity,
//! the destructed flag and the (non-owning) parent link used by the default
//! [`Listener::running`] implementation.
//!
//! [`unregister_listener`]: crate::bus::EventBus::unregister_listener
//! [`suspend_listener`]: crate::bus::EventBus::suspend_listener
//! [`attempt_resume_listener`]: crate::bus::EventBus::attempt_resume_listener

use core::fmt;
use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

/// Shared, type-erased reference to a listener.
pub type ListenerRef = Arc<dyn Listener>;

// ─────────────────────────────────────────────────────────────────────────────
// ListenerId
// ─────────────────────────────────────────────────────────────────────────────

/// Process-unique identity of a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
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

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener_{}", self.0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ListenerCore
// ─────────────────────────────────────────────────────────────────────────────

/// Identity and lifecycle state shared by every listener implementation.
pub struct ListenerCore {
    id: ListenerId,
    name: String,
    destructed: AtomicBool,
    parent: Option<Weak<dyn Listener>>,
}

impl ListenerCore {
    /// Creates the core of a root listener.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: ListenerId::next(),
            name: name.into(),
            destructed: AtomicBool::new(false),
            parent: None,
        }
    }

    /// Creates the core of a listener nested under `parent`.
    ///
    /// The parent is held weakly. The parent must also list the new listener
    /// in its [`children`](Listener::children).
    #[must_use]
    pub fn with_parent(name: impl Into<String>, parent: &ListenerRef) -> Self {
        Self {
            parent: Some(Arc::downgrade(parent)),
            ..Self::new(name)
        }
    }

    /// Returns the listener's identity.
    #[must_use]
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Returns the listener's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` once the listener has been unregistered.
    #[must_use]
    pub fn is_destructed(&self) -> bool {
        self.destructed.load(Ordering::Acquire)
    }

    /// Returns `true` if this listener was created with a parent.
    #[must_use]
    pub fn has_parent(&self) -> bool {
        self.parent.is_some()
    }

    /// Returns the parent, if it is still alive.
    #[must_use]
    pub fn parent(&self) -> Option<ListenerRef> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    /// Marks the listener destructed. Returns `false` if it already was.
    pub(crate) fn destruct(&self) -> bool {
        !self.destructed.swap(true, Ordering::AcqRel)
    }
}

impl fmt::Debug for ListenerCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerCore")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("destructed", &self.is_destructed())
            .field("has_parent", &self.has_parent())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Listener Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Capability contract of every hook owner.
///
/// # Running vs. hook list membership
///
/// [`running`](Self::running) is consulted on every dispatch to decide whether
/// a hook is invoked. [`should_be_on_hook_list`](Self::should_be_on_hook_list)
/// is only consulted when the listener's state may have changed (registration
/// and [`attempt_resume_listener`](crate::bus::EventBus::attempt_resume_listener))
/// to decide whether its hooks belong in the active region at all.
///
/// # Example
///
/// ```
/// use tickbus_event::listener::{Listener, ListenerCore};
///
/// struct Hud {
///     core: ListenerCore,
/// }
///
/// impl Listener for Hud {
///     fn core(&self) -> &ListenerCore {
///         &self.core
///     }
/// }
///
/// let hud = Hud { core: ListenerCore::new("hud") };
/// assert!(hud.running());
/// ```
pub trait Listener: Send + Sync + 'static {
    /// Returns the embedded identity and lifecycle state.
    fn core(&self) -> &ListenerCore;

    /// Returns the listener's identity.
    fn listener_id(&self) -> ListenerId {
        self.core().id()
    }

    /// Returns the listener's name for diagnostics.
    fn name(&self) -> &str {
        self.core().name()
    }

    /// Whether hooks of this listener are invoked.
    ///
    /// Default: not destructed, and the parent (if any) is alive and running.
    fn running(&self) -> bool {
        let core = self.core();
        if core.is_destructed() {
            return false;
        }
        if !core.has_parent() {
            return true;
        }
        self.parent().is_some_and(|parent| parent.running())
    }

    /// Parent listener, if any.
    fn parent(&self) -> Option<ListenerRef> {
        self.core().parent()
    }

    /// Child listeners reached by cascading lifecycle operations.
    fn children(&self) -> Vec<ListenerRef> {
        Vec::new()
    }

    /// Whether this listener's hooks belong in the active region.
    fn should_be_on_hook_list(&self) -> bool {
        true
    }
}

impl fmt::Debug for dyn Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("id", &self.listener_id())
            .field("name", &self.name())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ToggleListener
// ─────────────────────────────────────────────────────────────────────────────

/// A listener with an on/off switch and nested sub-listeners.
///
/// Running and hook-list membership both follow the switch. Toggling only
/// flips the flag; moving hooks in or out of the active region is done
/// explicitly through the bus.
///
/// # Example
///
/// ```
/// use tickbus_event::listener::{Listener, ToggleListener};
///
/// let module = ToggleListener::new("module", true);
/// let sub = ToggleListener::child_of(&module, "sub", true);
///
/// assert!(sub.running());
/// module.set_enabled(false);
/// assert!(!sub.running(), "a stopped parent stops its children");
/// ```
pub struct ToggleListener {
    core: ListenerCore,
    enabled: AtomicBool,
    children: RwLock<Vec<ListenerRef>>,
}

impl ToggleListener {
    /// Creates a root toggle.
    #[must_use]
    pub fn new(name: impl Into<String>, enabled: bool) -> Arc<Self> {
        Arc::new(Self {
            core: ListenerCore::new(name),
            enabled: AtomicBool::new(enabled),
            children: RwLock::new(Vec::new()),
        })
    }

    /// Creates a toggle nested under `parent` and adds it to the parent's children.
    #[must_use]
    pub fn child_of(parent: &Arc<Self>, name: impl Into<String>, enabled: bool) -> Arc<Self> {
        let parent_ref: ListenerRef = Arc::clone(parent) as ListenerRef;
        let child = Arc::new(Self {
            core: ListenerCore::with_parent(name, &parent_ref),
            enabled: AtomicBool::new(enabled),
            children: RwLock::new(Vec::new()),
        });
        parent.add_child(Arc::clone(&child) as ListenerRef);
        child
    }

    /// Appends a child listener.
    pub fn add_child(&self, child: ListenerRef) {
        self.children.write().push(child);
    }

    /// Returns the switch state.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Flips the switch.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }
}

impl Listener for ToggleListener {
    fn core(&self) -> &ListenerCore {
        &self.core
    }

    fn running(&self) -> bool {
        if !self.is_enabled() || self.core.is_destructed() {
            return false;
        }
        if !self.core.has_parent() {
            return true;
        }
        self.parent().is_some_and(|parent| parent.running())
    }

    fn children(&self) -> Vec<ListenerRef> {
        self.children.read().clone()
    }

    fn should_be_on_hook_list(&self) -> bool {
        self.is_enabled()
    }
}
