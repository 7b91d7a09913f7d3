//! Priority event bus with a listener capability tree (Layer 1).
//!
//! `tickbus_event` delivers typed events to hooks registered by listeners.
//! Hooks are kept per event kind in immutable, priority-sorted snapshots that
//! writers replace with compare-and-swap, so dispatch never takes a lock and
//! registration can happen from any thread.
//!
//! # Core Concepts
//!
//! - [`Event`] - Marker trait for event payloads
//! - [`EventCatalogue`] - The closed set of kinds a bus dispatches
//! - [`Listener`] - Owner of hooks; listeners form a parent/child tree
//! - [`EventBus`] - Registration, dispatch and listener lifecycle
//! - [`EventScheduler`] - One-shot actions deferred to the next dispatch of a kind
//!
//! # Example
//!
//! ```
//! use tickbus_event::prelude::*;
//!
//! struct Tick;
//! impl Event for Tick {}
//!
//! let bus = EventBus::new(EventCatalogue::new().with::<Tick>());
//! let module = ToggleListener::new("module", true);
//!
//! module.handler::<Tick>(&bus, |_| Ok(())).unwrap();
//!
//! bus.fire(Tick);
//!
//! module.set_enabled(false);
//! bus.fire(Tick); // skipped: the module is not running
//! ```
//!
//! # Architecture
//!
//! This crate is Layer 1 of tickbus:
//!
//! - **Layer 1** (`tickbus_event`): kinds, listeners, hooks, registries, bus (this crate)
//! - **Layer 2** (`tickbus_sequence`): suspendable sequences driven by events
//! - **Support** (`tickbus_core`): tracing subscriber setup

/// Bus configuration.
pub mod config;

/// The event bus and listener lifecycle operations.
pub mod bus;

/// Error types.
pub mod error;

/// Hooks, hook options and handles.
pub mod hook;

/// Event kinds and the event catalogue.
pub mod kind;

/// The listener capability tree.
pub mod listener;

/// Per-kind hook registries and snapshots.
pub mod registry;

/// One-shot deferred actions.
pub mod scheduler;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use crate::bus::{EventBus, ListenerExt};
    pub use crate::config::BusConfig;
    pub use crate::error::{EventError, HandlerError, HandlerResult};
    pub use crate::hook::{AnyHookHandle, HookHandle, HookId, HookOptions};
    pub use crate::kind::{Event, EventCatalogue, EventKind, IntoEventKinds};
    pub use crate::listener::{Listener, ListenerCore, ListenerId, ListenerRef, ToggleListener};
    pub use crate::registry::HookList;
    pub use crate::scheduler::EventScheduler;
}

// Re-export key types at crate root for convenience
pub use bus::{EventBus, ListenerExt};
pub use config::BusConfig;
pub use error::{EventError, HandlerError, HandlerResult};
pub use hook::{HookHandle, HookOptions};
pub use kind::{Event, EventCatalogue, EventKind};
pub use listener::{Listener, ListenerCore, ListenerRef, ToggleListener};
pub use scheduler::EventScheduler;
