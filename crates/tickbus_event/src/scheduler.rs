//! One-shot actions deferred to the next dispatch of an event kind.
//!
//! The bus drains the queue of a kind once at the start of every
//! [`fire`](crate::bus::EventBus::fire) of that kind, before any hook runs.
//! Each action runs at most once; actions whose owner has been dropped or
//! unregistered are discarded.

use core::any::Any;
use core::fmt;
use std::sync::{Arc, Weak};

use hashbrown::HashMap;
use parking_lot::Mutex;

use crate::error::HandlerResult;
use crate::kind::{Event, EventCatalogue, EventKind};
use crate::listener::{Listener, ListenerId, ListenerRef};

type Action<E> = Box<dyn FnOnce(&E) -> HandlerResult + Send>;

struct Entry {
    owner: Weak<dyn Listener>,
    owner_id: ListenerId,
    owner_name: Arc<str>,
    key: Option<u64>,
    // Holds an `Action<E>` for the kind of the queue it sits in.
    action: Box<dyn Any + Send>,
}

/// A drained action, ready to run.
pub(crate) struct ScheduledAction<E: Event> {
    pub(crate) owner: Weak<dyn Listener>,
    pub(crate) owner_id: ListenerId,
    pub(crate) owner_name: Arc<str>,
    pub(crate) action: Action<E>,
}

/// Per-kind queues of deferred one-shot actions.
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
/// let owner: ListenerRef = ToggleListener::new("inventory", true);
/// let runs = Arc::new(AtomicUsize::new(0));
///
/// let counter = Arc::clone(&runs);
/// assert!(bus.scheduler().schedule::<Tick>(&owner, Some(7), move |_| {
///     counter.fetch_add(1, Ordering::SeqCst);
///     Ok(())
/// }));
/// assert!(!bus.scheduler().schedule::<Tick>(&owner, Some(7), |_| Ok(())));
///
/// bus.fire(Tick);
/// bus.fire(Tick);
/// assert_eq!(runs.load(Ordering::SeqCst), 1);
/// ```
pub struct EventScheduler {
    queues: Mutex<HashMap<EventKind, Vec<Entry>>>,
}

impl EventScheduler {
    /// Creates a scheduler with one empty queue per catalogue kind.
    #[must_use]
    pub fn new(catalogue: &EventCatalogue) -> Self {
        let queues = catalogue
            .kinds()
            .iter()
            .map(|kind| (*kind, Vec::new()))
            .collect();
        Self {
            queues: Mutex::new(queues),
        }
    }

    /// Queues `action` for the next dispatch of `E`.
    ///
    /// Returns `false` without queueing if `E` is not a catalogue kind, or if
    /// an action with the same `unique_key` is already pending for `E`.
    pub fn schedule<E: Event>(
        &self,
        owner: &ListenerRef,
        unique_key: Option<u64>,
        action: impl FnOnce(&E) -> HandlerResult + Send + 'static,
    ) -> bool {
        let kind = EventKind::of::<E>();
        let mut queues = self.queues.lock();

        let Some(queue) = queues.get_mut(&kind) else {
            tracing::debug!(event = %kind, "refusing to schedule action for unknown event kind");
            return false;
        };

        if let Some(key) = unique_key
            && queue.iter().any(|entry| entry.key == Some(key))
        {
            tracing::trace!(event = %kind, key, "action with this key is already pending");
            return false;
        }

        let action: Action<E> = Box::new(action);
        queue.push(Entry {
            owner: Arc::downgrade(owner),
            owner_id: owner.listener_id(),
            owner_name: Arc::from(owner.name()),
            key: unique_key,
            action: Box::new(action),
        });
        true
    }

    /// Returns `true` if an action with `key` is pending for `E`.
    #[must_use]
    pub fn is_scheduled<E: Event>(&self, key: u64) -> bool {
        self.queues
            .lock()
            .get(&EventKind::of::<E>())
            .is_some_and(|queue| queue.iter().any(|entry| entry.key == Some(key)))
    }

    /// Number of actions pending for `E`.
    #[must_use]
    pub fn pending<E: Event>(&self) -> usize {
        self.queues
            .lock()
            .get(&EventKind::of::<E>())
            .map_or(0, Vec::len)
    }

    /// Discards every pending action owned by `owner`.
    pub fn clear_owner(&self, owner: ListenerId) {
        let mut queues = self.queues.lock();
        for queue in queues.values_mut() {
            queue.retain(|entry| entry.owner_id != owner);
        }
    }

    /// Discards every pending action.
    pub fn clear(&self) {
        let mut queues = self.queues.lock();
        for queue in queues.values_mut() {
            queue.clear();
        }
    }

    /// Takes the pending actions for `E`, in scheduling order.
    ///
    /// The lock is released before the caller runs them, so actions may
    /// schedule follow-ups for the next dispatch.
    pub(crate) fn take<E: Event>(&self) -> Vec<ScheduledAction<E>> {
        let entries = {
            let mut queues = self.queues.lock();
            match queues.get_mut(&EventKind::of::<E>()) {
                Some(queue) if !queue.is_empty() => core::mem::take(queue),
                _ => return Vec::new(),
            }
        };

        entries
            .into_iter()
            .filter_map(|entry| match entry.action.downcast::<Action<E>>() {
                Ok(action) => Some(ScheduledAction {
                    owner: entry.owner,
                    owner_id: entry.owner_id,
                    owner_name: entry.owner_name,
                    action: *action,
                }),
                Err(_) => {
                    tracing::error!(
                        event = EventKind::of::<E>().short_name(),
                        listener = %entry.owner_name,
                        "scheduled action stored under the wrong event kind"
                    );
                    None
                }
            })
            .collect()
    }
}

impl fmt::Debug for EventScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let queues = self.queues.lock();
        f.debug_struct("EventScheduler")
            .field("kinds", &queues.len())
            .field("pending", &queues.values().map(Vec::len).sum::<usize>())
            .finish()
    }
}
