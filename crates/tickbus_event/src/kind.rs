//! Event kind identifiers for the closed event catalogue.
//!
//! Every occurrence delivered through the bus is a value of some type that
//! implements [`Event`]. The bus keys its registries by [`EventKind`], which
//! wraps the event type's `TypeId`. The set of kinds a bus knows about is
//! fixed when the bus is built, see [`EventCatalogue`].

use core::any::TypeId;
use core::fmt;
use variadics_please::all_tuples;

/// Identifier for an event kind, derived from the event type.
///
/// # Example
///
/// ```
/// # use tickbus_event::kind::{Event, EventKind};
/// pub struct PacketReceived {
///     pub len: usize,
/// }
/// impl Event for PacketReceived {}
///
/// let kind = EventKind::of::<PacketReceived>();
/// assert!(kind.type_name().ends_with("PacketReceived"));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventKind {
    type_id: TypeId,
    type_name: &'static str,
}

impl EventKind {
    /// Creates an `EventKind` for the given event type.
    #[must_use]
    pub fn of<E: Event>() -> Self {
        Self {
            type_id: TypeId::of::<E>(),
            type_name: core::any::type_name::<E>(),
        }
    }

    /// Returns the underlying `TypeId`.
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns the full type name for debugging.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns the type name without its module path.
    #[must_use]
    pub fn short_name(&self) -> &'static str {
        self.type_name
            .rsplit("::")
            .next()
            .unwrap_or(self.type_name)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Event Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Marker trait for event payload types.
///
/// Events are immutable once fired; hooks receive them by shared reference.
/// Payloads must be shareable across threads because registration may happen
/// on a different thread than the one driving [`fire`](crate::bus::EventBus::fire).
pub trait Event: Send + Sync + 'static {}

// ─────────────────────────────────────────────────────────────────────────────
// IntoEventKinds Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Trait for types that can be converted into a list of event kinds.
///
/// Implemented for single events and tuples of events so a catalogue can be
/// declared in one call.
pub trait IntoEventKinds {
    /// Returns the event kinds for this type.
    fn event_kinds() -> Vec<EventKind>;
}

impl<E: Event> IntoEventKinds for E {
    fn event_kinds() -> Vec<EventKind> {
        vec![EventKind::of::<E>()]
    }
}

macro_rules! impl_into_event_kinds_for_tuple {
    ($($E:ident),*) => {
        impl<$($E: Event),*> IntoEventKinds for ($($E,)*) {
            fn event_kinds() -> Vec<EventKind> {
                vec![$(EventKind::of::<$E>()),*]
            }
        }
    };
}

// Tuples from 2 to 16 elements
all_tuples!(impl_into_event_kinds_for_tuple, 2, 16, E);

// ─────────────────────────────────────────────────────────────────────────────
// EventCatalogue
// ─────────────────────────────────────────────────────────────────────────────

/// The closed set of event kinds a bus dispatches.
///
/// Each kind gets its own registry when the bus is built. Kinds cannot be
/// added afterwards, which lets readers look registries up without locking.
///
/// # Example
///
/// ```
/// # use tickbus_event::kind::{Event, EventCatalogue};
/// struct Tick;
/// impl Event for Tick {}
/// struct Render;
/// impl Event for Render {}
///
/// let catalogue = EventCatalogue::new().with::<(Tick, Render)>();
/// assert_eq!(catalogue.len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct EventCatalogue {
    kinds: Vec<EventKind>,
}

impl EventCatalogue {
    /// Creates an empty catalogue.
    #[must_use]
    pub fn new() -> Self {
        Self { kinds: Vec::new() }
    }

    /// Adds one or more event kinds. Duplicates are ignored.
    #[must_use]
    pub fn with<K: IntoEventKinds>(mut self) -> Self {
        for kind in K::event_kinds() {
            if !self.kinds.contains(&kind) {
                self.kinds.push(kind);
            }
        }
        self
    }

    /// Returns whether the catalogue contains the given kind.
    #[must_use]
    pub fn contains(&self, kind: EventKind) -> bool {
        self.kinds.contains(&kind)
    }

    /// Returns the kinds in declaration order.
    #[must_use]
    pub fn kinds(&self) -> &[EventKind] {
        &self.kinds
    }

    /// Returns the number of kinds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    /// Returns `true` if no kind has been declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EventA;
    impl Event for EventA {}

    struct EventB;
    impl Event for EventB {}

    struct EventC;
    impl Event for EventC {}

    #[test]
    fn event_kind_equality() {
        let id1 = EventKind::of::<EventA>();
        let id2 = EventKind::of::<EventA>();
        let id3 = EventKind::of::<EventB>();

        assert_eq!(id1, id2);
        assert_ne!(id1, id3);
    }

    #[test]
    fn event_kind_names() {
        let kind = EventKind::of::<EventA>();
        assert!(kind.type_name().contains("EventA"));
        assert_eq!(kind.short_name(), "EventA");
        assert_eq!(kind.to_string(), "EventA");
    }

    #[test]
    fn into_event_kinds_tuple_keeps_order() {
        let kinds = <(EventA, EventB, EventC)>::event_kinds();
        assert_eq!(
            kinds,
            vec![
                EventKind::of::<EventA>(),
                EventKind::of::<EventB>(),
                EventKind::of::<EventC>()
            ]
        );
    }

    #[test]
    fn catalogue_ignores_duplicates() {
        let catalogue = EventCatalogue::new()
            .with::<(EventA, EventB)>()
            .with::<EventA>();

        assert_eq!(catalogue.len(), 2);
        assert!(catalogue.contains(EventKind::of::<EventB>()));
        assert!(!catalogue.contains(EventKind::of::<EventC>()));
    }
}
