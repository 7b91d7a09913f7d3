//! Bus configuration.

/// Configuration for an [`EventBus`](crate::bus::EventBus).
///
/// # Example
///
/// ```
/// use tickbus_event::config::BusConfig;
///
/// let config = BusConfig::new()
///     .with_isolate_panics(false)
///     .with_verify_listener_tree(true);
/// assert!(!config.isolate_panics);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusConfig {
    /// Catch panics raised by hook callbacks and scheduled actions, log them,
    /// and continue dispatch. When disabled a panic unwinds through `fire`.
    pub isolate_panics: bool,
    /// Check at registration that a listener's parent lists it as a child.
    pub verify_listener_tree: bool,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            isolate_panics: true,
            verify_listener_tree: cfg!(debug_assertions),
        }
    }
}

impl BusConfig {
    /// Creates a config with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether callback panics are isolated.
    #[must_use]
    pub fn with_isolate_panics(mut self, enabled: bool) -> Self {
        self.isolate_panics = enabled;
        self
    }

    /// Sets whether the parent/child relation is verified on registration.
    #[must_use]
    pub fn with_verify_listener_tree(mut self, enabled: bool) -> Self {
        self.verify_listener_tree = enabled;
        self
    }
}
