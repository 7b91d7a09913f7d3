//! Shared test utilities for `tickbus_event` integration tests.
//!
//! Import via `mod test_utils;` in test files.

#![allow(
    dead_code,
    missing_docs,
    reason = "shared test utilities, not all items used in every test binary"
)]

use std::sync::Arc;

use parking_lot::Mutex;
use tickbus_event::prelude::*;

// ═══════════════════════════════════════════════════════════════════════════════
// EVENTS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick;
impl Event for Tick {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chat {
    pub message: String,
}
impl Event for Chat {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPressed {
    pub code: u32,
}
impl Event for KeyPressed {}

/// A bus knowing every test event.
pub fn test_bus() -> EventBus {
    EventBus::new(EventCatalogue::new().with::<(Tick, Chat, KeyPressed)>())
}

// ═══════════════════════════════════════════════════════════════════════════════
// CALL RECORDING
// ═══════════════════════════════════════════════════════════════════════════════

/// Records the labels of invoked hooks in invocation order.
#[derive(Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<&'static str>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a hook callback that records `label`.
    pub fn recorder<E: Event>(&self, label: &'static str) -> impl Fn(&E) -> HandlerResult + Send + Sync + 'static {
        let calls = Arc::clone(&self.calls);
        move |_| {
            calls.lock().push(label);
            Ok(())
        }
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }

    pub fn count(&self, label: &str) -> usize {
        self.calls.lock().iter().filter(|call| **call == label).count()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}

/// Registers a recording hook with the given priority.
pub fn record<E: Event>(
    bus: &EventBus,
    owner: &ListenerRef,
    log: &CallLog,
    label: &'static str,
    options: HookOptions,
) -> HookHandle<E> {
    bus.register::<E>(owner, options, log.recorder(label))
        .expect("event kind is part of the test catalogue")
}
