//! The tick event and sequence configuration.

use tickbus_event::kind::Event;

/// One step of the driving loop.
///
/// Tick-based waits count occurrences of this event. Buses that run
/// sequences must include it in their catalogue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Tick;

impl Event for Tick {}

/// Configuration shared by the sequences a handler launches.
///
/// # Example
///
/// ```
/// use tickbus_sequence::tick::SequenceConfig;
///
/// let config = SequenceConfig::new().with_ticks_per_second(60);
/// assert_eq!(config.ticks_for_seconds(2), 120);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceConfig {
    /// Rate of the driving loop, used to convert seconds into ticks.
    pub ticks_per_second: u32,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            ticks_per_second: 20,
        }
    }
}

impl SequenceConfig {
    /// Creates a config with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the tick rate.
    #[must_use]
    pub fn with_ticks_per_second(mut self, ticks_per_second: u32) -> Self {
        self.ticks_per_second = ticks_per_second;
        self
    }

    /// Number of ticks spanning `seconds`.
    #[must_use]
    pub fn ticks_for_seconds(&self, seconds: u32) -> u32 {
        seconds.saturating_mul(self.ticks_per_second)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_rate_is_twenty_ticks_per_second() {
        assert_eq!(SequenceConfig::default().ticks_per_second, 20);
        assert_eq!(SequenceConfig::default().ticks_for_seconds(3), 60);
    }

    #[test]
    fn conversion_saturates() {
        let config = SequenceConfig::new().with_ticks_per_second(u32::MAX);
        assert_eq!(config.ticks_for_seconds(2), u32::MAX);
    }
}
