//! # Tickbus Internal Library
//!
//! Re-exports the core tickbus crates for convenience.

/// Layer 1: Event bus, hooks, listeners and the event scheduler.
pub use tickbus_event;

/// Layer 2: Tick-synchronized sequences.
pub use tickbus_sequence;

/// Ambient infrastructure: tracing setup.
pub use tickbus_core;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use tickbus_core::prelude::*;
    pub use tickbus_event::prelude::*;
    pub use tickbus_sequence::prelude::*;
}
