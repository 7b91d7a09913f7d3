//! Per-event-kind hook registry.
//!
//! A [`HookRegistry`] holds one immutable [`HookList`] snapshot behind an
//! [`ArcSwap`]. Readers load the snapshot without locking; writers compute a
//! new snapshot with a pure transform and publish it with compare-and-swap,
//! retrying against the fresh snapshot if another writer got there first.
//!
//! # Snapshot layout
//!
//! ```text
//!  hooks:  [ a0 a1 a2 | i0 i1 ]
//!            active     inactive
//!            ^ sorted by priority (desc), then registration order
//!  active_len = 3
//! ```
//!
//! The first `active_len` hooks are the ones the dispatcher invokes. The
//! remaining hooks are registered but suspended; their order is irrelevant.

use core::cell::Cell;
use core::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use downcast_rs::{DowncastSync, impl_downcast};

use crate::hook::{Hook, HookId};
use crate::kind::{Event, EventKind};
use crate::listener::ListenerId;

// ─────────────────────────────────────────────────────────────────────────────
// HookList
// ─────────────────────────────────────────────────────────────────────────────

/// Immutable snapshot of every hook registered for one event kind.
pub struct HookList<E: Event> {
    hooks: Vec<Arc<Hook<E>>>,
    active_len: usize,
}

impl<E: Event> HookList<E> {
    /// Creates an empty snapshot.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            hooks: Vec::new(),
            active_len: 0,
        }
    }

    /// All hooks, active region first.
    #[must_use]
    pub fn all(&self) -> &[Arc<Hook<E>>] {
        &self.hooks
    }

    /// Active hooks in dispatch order.
    #[must_use]
    pub fn active(&self) -> &[Arc<Hook<E>>] {
        &self.hooks[..self.active_len]
    }

    /// Registered but suspended hooks.
    #[must_use]
    pub fn inactive(&self) -> &[Arc<Hook<E>>] {
        &self.hooks[self.active_len..]
    }

    /// Number of active hooks.
    #[must_use]
    pub fn active_len(&self) -> usize {
        self.active_len
    }

    /// Number of registered hooks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Returns `true` if no hook is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Returns the index of the hook, if registered.
    #[must_use]
    pub fn position(&self, id: HookId) -> Option<usize> {
        self.hooks.iter().position(|hook| hook.id() == id)
    }

    /// Returns `true` if the hook is registered.
    #[must_use]
    pub fn contains(&self, id: HookId) -> bool {
        self.position(id).is_some()
    }

    /// Returns `true` if the hook is registered and active.
    #[must_use]
    pub fn is_active(&self, id: HookId) -> bool {
        self.position(id).is_some_and(|idx| idx < self.active_len)
    }

    fn index_of(&self, id: HookId) -> usize {
        match self.position(id) {
            Some(idx) => idx,
            None => panic!(
                "{id} is not part of the hook list for event '{}'",
                EventKind::of::<E>().type_name()
            ),
        }
    }

    /// Returns a snapshot with `hook` appended to the inactive region.
    ///
    /// # Panics
    ///
    /// Panics if the hook is already registered.
    #[must_use]
    pub(crate) fn with_hook(&self, hook: Arc<Hook<E>>) -> Self {
        assert!(
            !self.contains(hook.id()),
            "{} is already registered for event '{}'",
            hook.id(),
            EventKind::of::<E>().type_name()
        );

        let mut hooks = Vec::with_capacity(self.hooks.len() + 1);
        hooks.extend(self.hooks.iter().cloned());
        hooks.push(hook);

        Self {
            hooks,
            active_len: self.active_len,
        }
    }

    /// Returns a snapshot with the hook moved into the active region.
    ///
    /// Returns `self` unchanged if the hook is already active.
    ///
    /// # Panics
    ///
    /// Panics if the hook is not registered.
    #[must_use]
    pub(crate) fn with_activated(self: &Arc<Self>, id: HookId) -> Arc<Self> {
        let idx = self.index_of(id);

        if idx < self.active_len {
            return Arc::clone(self);
        }

        let mut hooks = self.hooks.clone();
        let hook = hooks.remove(idx);
        let at = insertion_point(&hooks[..self.active_len], &hook);
        hooks.insert(at, hook);

        Arc::new(Self {
            hooks,
            active_len: self.active_len + 1,
        })
    }

    /// Returns a snapshot with the hook deactivated, or removed entirely if
    /// `unregister` is set.
    ///
    /// Returns `self` unchanged if the hook is already inactive and stays registered.
    ///
    /// # Panics
    ///
    /// Panics if the hook is not registered.
    #[must_use]
    pub(crate) fn with_deactivated(self: &Arc<Self>, id: HookId, unregister: bool) -> Arc<Self> {
        let idx = self.index_of(id);
        let was_active = idx < self.active_len;

        if !was_active && !unregister {
            return Arc::clone(self);
        }

        let mut hooks = self.hooks.clone();
        let hook = hooks.remove(idx);
        if !unregister {
            hooks.push(hook);
        }

        Arc::new(Self {
            hooks,
            active_len: if was_active {
                self.active_len - 1
            } else {
                self.active_len
            },
        })
    }

    /// Deactivates (or removes) every hook owned by `owner` in one step.
    #[must_use]
    pub(crate) fn with_owner_deactivated(
        self: &Arc<Self>,
        owner: ListenerId,
        unregister: bool,
    ) -> Arc<Self> {
        let owned_active = self.active().iter().any(|hook| hook.owner_id() == owner);
        let owned_inactive = self.inactive().iter().any(|hook| hook.owner_id() == owner);

        if !owned_active && !(unregister && owned_inactive) {
            return Arc::clone(self);
        }

        let mut hooks = Vec::with_capacity(self.hooks.len());
        let mut demoted = Vec::new();

        for hook in self.active() {
            if hook.owner_id() == owner {
                demoted.push(Arc::clone(hook));
            } else {
                hooks.push(Arc::clone(hook));
            }
        }
        let active_len = hooks.len();

        for hook in self.inactive() {
            if !(unregister && hook.owner_id() == owner) {
                hooks.push(Arc::clone(hook));
            }
        }
        if !unregister {
            hooks.extend(demoted);
        }

        Arc::new(Self { hooks, active_len })
    }

    /// Activates every inactive hook owned by `owner` in one step.
    #[must_use]
    pub(crate) fn with_owner_activated(self: &Arc<Self>, owner: ListenerId) -> Arc<Self> {
        if !self.inactive().iter().any(|hook| hook.owner_id() == owner) {
            return Arc::clone(self);
        }

        let mut active = self.active().to_vec();
        let mut rest = Vec::new();

        for hook in self.inactive() {
            if hook.owner_id() == owner {
                let at = insertion_point(&active, hook);
                active.insert(at, Arc::clone(hook));
            } else {
                rest.push(Arc::clone(hook));
            }
        }

        let active_len = active.len();
        active.extend(rest);

        Arc::new(Self {
            hooks: active,
            active_len,
        })
    }

    /// Drops every hook whose owner no longer exists.
    #[must_use]
    pub(crate) fn without_dropped_owners(self: &Arc<Self>) -> Arc<Self> {
        if self.hooks.iter().all(|hook| hook.owner_alive()) {
            return Arc::clone(self);
        }

        let mut hooks: Vec<_> = self
            .active()
            .iter()
            .filter(|hook| hook.owner_alive())
            .cloned()
            .collect();
        let active_len = hooks.len();
        hooks.extend(
            self.inactive()
                .iter()
                .filter(|hook| hook.owner_alive())
                .cloned(),
        );

        Arc::new(Self { hooks, active_len })
    }
}

impl<E: Event> fmt::Debug for HookList<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookList")
            .field("event", &EventKind::of::<E>().short_name())
            .field("len", &self.hooks.len())
            .field("active_len", &self.active_len)
            .finish()
    }
}

/// Index at which `hook` joins a sorted active region.
///
/// The region is ordered by priority (descending), then by hook id. Existing
/// hooks never move relative to each other.
fn insertion_point<E: Event>(active: &[Arc<Hook<E>>], hook: &Hook<E>) -> usize {
    active.partition_point(|other| {
        other.priority() > hook.priority()
            || (other.priority() == hook.priority() && other.id() < hook.id())
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// HookRegistry
// ─────────────────────────────────────────────────────────────────────────────

/// Lock-free registry for the hooks of one event kind.
pub struct HookRegistry<E: Event> {
    list: ArcSwap<HookList<E>>,
}

impl<E: Event> Default for HookRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Event> HookRegistry<E> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            list: ArcSwap::from_pointee(HookList::empty()),
        }
    }

    /// Loads the current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<HookList<E>> {
        self.list.load_full()
    }

    /// Publishes `f(current)` with compare-and-swap, retrying on contention.
    ///
    /// `f` may run several times and must not have side effects.
    fn edit_with(&self, f: impl Fn(&Arc<HookList<E>>) -> Arc<HookList<E>>) {
        let mut retries = 0usize;
        loop {
            let current = self.list.load_full();
            let next = f(&current);
            if Arc::ptr_eq(&current, &next) {
                return;
            }

            let previous = self.list.compare_and_swap(&current, next);
            if Arc::ptr_eq(&previous, &current) {
                if retries > 0 {
                    tracing::trace!(
                        event = EventKind::of::<E>().short_name(),
                        retries,
                        "hook list updated after contention"
                    );
                }
                return;
            }
            retries += 1;
        }
    }

    /// Registers `hook`, activating it immediately if `activate` is set.
    ///
    /// # Panics
    ///
    /// Panics if the hook is already registered.
    pub fn register(&self, hook: Arc<Hook<E>>, activate: bool) {
        let id = hook.id();
        self.edit_with(|list| {
            let list = Arc::new(list.with_hook(Arc::clone(&hook)));
            if activate {
                list.with_activated(id)
            } else {
                list
            }
        });
    }

    /// Moves the hook into the active region.
    ///
    /// # Panics
    ///
    /// Panics if the hook is not registered.
    pub fn activate(&self, id: HookId) {
        self.edit_with(|list| list.with_activated(id));
    }

    /// Moves the hook out of the active region, or removes it if `unregister`.
    ///
    /// # Panics
    ///
    /// Panics if the hook is not registered.
    pub fn deactivate(&self, id: HookId, unregister: bool) {
        self.edit_with(|list| list.with_deactivated(id, unregister));
    }

    /// Removes the hook if it is still registered. Returns whether it was.
    pub fn remove_if_present(&self, id: HookId) -> bool {
        let removed = Cell::new(false);
        self.edit_with(|list| {
            removed.set(list.contains(id));
            if removed.get() {
                list.with_deactivated(id, true)
            } else {
                Arc::clone(list)
            }
        });
        removed.get()
    }

    /// Removes the hooks of listeners that were dropped without being
    /// unregistered.
    pub fn prune_dropped_owners(&self) {
        self.edit_with(HookList::without_dropped_owners);
    }

    /// Resets the registry to the empty snapshot.
    pub fn clear(&self) {
        self.list.store(Arc::new(HookList::empty()));
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ErasedRegistry
// ─────────────────────────────────────────────────────────────────────────────

/// Type-erased view of a [`HookRegistry`], used for listener-wide operations
/// that must touch every event kind.
pub(crate) trait ErasedRegistry: DowncastSync {
    fn kind(&self) -> EventKind;
    fn hook_count(&self) -> usize;
    fn active_hook_count(&self) -> usize;
    fn owned_hook_count(&self, owner: ListenerId) -> usize;
    fn unregister_owner(&self, owner: ListenerId);
    fn suspend_owner(&self, owner: ListenerId);
    fn resume_owner(&self, owner: ListenerId);
    fn remove_hook(&self, id: HookId) -> bool;
    fn clear(&self);
}

impl_downcast!(sync ErasedRegistry);

impl<E: Event> ErasedRegistry for HookRegistry<E> {
    fn kind(&self) -> EventKind {
        EventKind::of::<E>()
    }

    fn hook_count(&self) -> usize {
        self.list.load().len()
    }

    fn active_hook_count(&self) -> usize {
        self.list.load().active_len()
    }

    fn owned_hook_count(&self, owner: ListenerId) -> usize {
        self.list
            .load()
            .all()
            .iter()
            .filter(|hook| hook.owner_id() == owner)
            .count()
    }

    fn unregister_owner(&self, owner: ListenerId) {
        self.edit_with(|list| list.with_owner_deactivated(owner, true));
    }

    fn suspend_owner(&self, owner: ListenerId) {
        self.edit_with(|list| list.with_owner_deactivated(owner, false));
    }

    fn resume_owner(&self, owner: ListenerId) {
        self.edit_with(|list| list.with_owner_activated(owner));
    }

    fn remove_hook(&self, id: HookId) -> bool {
        self.remove_if_present(id)
    }

    fn clear(&self) {
        HookRegistry::clear(self);
    }
}
