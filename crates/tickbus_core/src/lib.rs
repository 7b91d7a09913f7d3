//! Ambient infrastructure shared by tickbus binaries.
//!
//! The bus crates only emit `tracing` events. This crate turns them into
//! output: see [`TracingConfig`].

/// Global tracing subscriber configuration.
pub mod tracing_config;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use crate::tracing_config::{TracingConfig, TracingFormat};
}

pub use tracing_config::{TracingConfig, TracingFormat};
