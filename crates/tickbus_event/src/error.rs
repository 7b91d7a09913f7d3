//! Error types for the event bus.

/// Error returned by a hook callback.
///
/// Any error type can be boxed into this. Failures are logged by the
/// dispatcher and never reach the code that fired the event.
pub type HandlerError = Box<dyn core::error::Error + Send + Sync + 'static>;

/// Result returned by hook callbacks.
pub type HandlerResult = Result<(), HandlerError>;

/// Errors returned by registration APIs on the [`EventBus`](crate::bus::EventBus).
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    /// The event kind is not part of the bus catalogue.
    #[error("event '{kind}' is not part of the event catalogue")]
    UnknownEvent {
        /// Type name of the event.
        kind: &'static str,
    },

    /// The owning listener was dropped before the operation completed.
    #[error("listener '{name}' was dropped")]
    ListenerDropped {
        /// Name of the dropped listener.
        name: String,
    },
}

/// Extracts the message of a caught panic payload.
#[must_use]
pub fn panic_message(payload: &(dyn core::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| payload.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic")
}
