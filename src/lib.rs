//! An in-process event bus with priority-ordered hooks, listener trees and
//! tick-synchronized cooperative sequences.
//!

pub use tickbus_internal::*;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use tickbus_internal::prelude::*;
}
