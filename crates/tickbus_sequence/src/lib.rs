//! Tick-synchronized, suspendable sequences for tickbus (Layer 2).
//!
//! A sequence is an `async` body bound to a listener. It runs inside the
//! `fire` call that launched it until it awaits one of the wait primitives on
//! [`SequenceContext`], and continues inside the later `fire` call that
//! satisfies the wait. No executor or thread is involved: the event loop is
//! the scheduler.
//!
//! # Core Concepts
//!
//! - [`Sequence`] - A launched body and its lifecycle state
//! - [`SequenceContext`] - Wait primitives (`wait_ticks`, `wait_until`, `wait_event`, ...)
//! - [`SequenceExt`] - `sequence_handler` and `tick_handler` for listeners
//! - [`TickSequence`] - A body relaunched on ticks while its listener runs
//! - [`Tick`] - The event tick-based waits count
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use tickbus_event::prelude::*;
//! use tickbus_sequence::prelude::*;
//!
//! #[derive(Clone)]
//! struct Chat(String);
//! impl Event for Chat {}
//!
//! let bus = Arc::new(EventBus::new(EventCatalogue::new().with::<(Tick, Chat)>()));
//! let module = ToggleListener::new("auto-reply", true);
//!
//! module
//!     .sequence_handler::<Chat, _, _>(&bus, HookOptions::new(), |ctx, chat| async move {
//!         ctx.wait_ticks(10).await;
//!         let _reply = format!("re: {}", chat.0);
//!     })
//!     .unwrap();
//!
//! bus.fire(Chat("hello".into()));
//! for _ in 0..10 {
//!     bus.fire(Tick);
//! }
//! ```

/// Listener-side registration of sequence handlers.
pub mod ext;

/// Sequences and their lifecycle.
pub mod sequence;

/// The tick event and sequence configuration.
pub mod tick;

/// Wait primitives.
pub mod wait;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use crate::ext::{SequenceExt, TickSequence};
    pub use crate::sequence::{Sequence, SequenceId, SequenceState, WaitCondition};
    pub use crate::tick::{SequenceConfig, Tick};
    pub use crate::wait::{SequenceContext, WaitFor};
}

// Re-export key types at crate root for convenience
pub use ext::{SequenceExt, TickSequence};
pub use sequence::{Sequence, SequenceState};
pub use tick::{SequenceConfig, Tick};
pub use wait::SequenceContext;
