//! Example client loop built with tickbus.
//!
//! A root `client` listener owns two modules:
//!
//! - `pulse` runs a [`TickSequence`] that records a pulse once per second of ticks
//! - `auto-reply` launches one sequence per [`Chat`] message, replying after a
//!   short delay, or after the user confirms with `Y` for `!confirm` messages
//!
//! Pressing `P` toggles `pulse`. The toggle is deferred to the next tick
//! through the bus's [`EventScheduler`](tickbus_event::EventScheduler), so
//! repeated presses within one tick toggle once.
//!
//! ```text
//! client
//! ├── pulse        (Tick → TickSequence)
//! └── auto-reply   (Chat → sequence, KeyPressed → wait_event)
//! ```

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tickbus_event::prelude::*;
use tickbus_sequence::prelude::*;

/// Scheduler key of the deferred pulse toggle.
const TOGGLE_PULSE: u64 = 1;

/// A chat line received from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chat {
    /// Who sent it.
    pub sender: String,
    /// Message text.
    pub message: String,
}

impl Event for Chat {}

/// A key press from the local user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPressed {
    /// The key, uppercased.
    pub key: char,
}

impl Event for KeyPressed {}

/// What the modules did so far.
#[derive(Debug, Default)]
pub struct Stats {
    pulses: Mutex<u32>,
    replies: Mutex<Vec<String>>,
}

impl Stats {
    /// Number of pulses recorded.
    #[must_use]
    pub fn pulses(&self) -> u32 {
        *self.pulses.lock()
    }

    /// Replies sent, in order.
    #[must_use]
    pub fn replies(&self) -> Vec<String> {
        self.replies.lock().clone()
    }

    fn pulse(&self) {
        *self.pulses.lock() += 1;
    }

    fn reply(&self, reply: String) {
        tracing::info!(%reply, "sending reply");
        self.replies.lock().push(reply);
    }
}

/// Client settings.
#[derive(Debug, Clone, Copy)]
pub struct ClientConfig {
    /// Rate of the driving loop.
    pub ticks_per_second: u32,
    /// Ticks between a chat message and its automatic reply.
    pub reply_delay: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            ticks_per_second: 20,
            reply_delay: 10,
        }
    }
}

/// The bus, its modules and the tick counter.
pub struct Client {
    bus: Arc<EventBus>,
    root: Arc<ToggleListener>,
    pulse: Arc<ToggleListener>,
    auto_reply: Arc<ToggleListener>,
    pulse_task: TickSequence,
    stats: Arc<Stats>,
    ticks: u64,
}

impl Client {
    /// Builds the bus and registers every module.
    ///
    /// # Errors
    ///
    /// Returns an error if a module registers for a kind missing from the
    /// catalogue.
    pub fn new(config: ClientConfig) -> Result<Self, EventError> {
        let bus = Arc::new(EventBus::new(
            EventCatalogue::new().with::<(Tick, Chat, KeyPressed)>(),
        ));
        let root = ToggleListener::new("client", true);
        let pulse = ToggleListener::child_of(&root, "pulse", true);
        let auto_reply = ToggleListener::child_of(&root, "auto-reply", true);
        let stats = Arc::new(Stats::default());
        let sequences = SequenceConfig::new().with_ticks_per_second(config.ticks_per_second);

        let pulse_stats = Arc::clone(&stats);
        let pulse_task = pulse.tick_handler_with(&bus, sequences, move |ctx| {
            let stats = Arc::clone(&pulse_stats);
            async move {
                ctx.wait_seconds(1).await;
                stats.pulse();
                tracing::debug!(pulses = stats.pulses(), "pulse");
            }
        })?;

        let reply_stats = Arc::clone(&stats);
        let reply_delay = config.reply_delay;
        auto_reply.sequence_handler_with::<Chat, _, _>(
            &bus,
            HookOptions::new(),
            sequences,
            move |ctx, chat| {
                let stats = Arc::clone(&reply_stats);
                async move {
                    if chat.message == "!confirm" {
                        ctx.wait_event::<KeyPressed>(|press| press.key == 'Y')
                            .await;
                        stats.reply(format!("@{} confirmed", chat.sender));
                        return;
                    }
                    ctx.wait_ticks(reply_delay).await;
                    stats.reply(format!("@{} re: {}", chat.sender, chat.message));
                }
            },
        )?;

        let toggles = Arc::downgrade(&bus);
        let target = Arc::clone(&pulse);
        let owner: ListenerRef = Arc::clone(&root) as ListenerRef;
        root.handler::<KeyPressed>(&bus, move |press| {
            if press.key == 'P' {
                schedule_toggle(&toggles, &owner, &target);
            }
            Ok(())
        })?;

        Ok(Self {
            bus,
            root,
            pulse,
            auto_reply,
            pulse_task,
            stats,
            ticks: 0,
        })
    }

    /// Fires one tick.
    pub fn tick(&mut self) {
        self.ticks += 1;
        let _span = tracing::trace_span!("tick", n = self.ticks).entered();
        self.bus.fire(Tick);
    }

    /// Fires `n` ticks.
    pub fn run(&mut self, n: usize) {
        for _ in 0..n {
            self.tick();
        }
    }

    /// Delivers a chat line.
    pub fn receive_chat(&self, sender: &str, message: &str) {
        self.bus.fire(Chat {
            sender: sender.to_owned(),
            message: message.to_owned(),
        });
    }

    /// Delivers a key press.
    pub fn press(&self, key: char) {
        self.bus.fire(KeyPressed {
            key: key.to_ascii_uppercase(),
        });
    }

    /// Enables or disables `auto-reply`.
    pub fn set_auto_reply(&self, enabled: bool) {
        set_module(&self.bus, &self.auto_reply, enabled);
    }

    /// Returns `true` while the pulse module is enabled.
    #[must_use]
    pub fn pulse_enabled(&self) -> bool {
        self.pulse.is_enabled()
    }

    /// Times the pulse sequence was launched.
    #[must_use]
    pub fn pulse_launches(&self) -> usize {
        self.pulse_task.launches()
    }

    /// What the modules did so far.
    #[must_use]
    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// Ticks fired so far.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// The underlying bus.
    #[must_use]
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Unregisters every module and shuts the bus down.
    pub fn shutdown(self) {
        self.root.unregister(&self.bus);
        self.bus.shutdown();
        tracing::info!(ticks = self.ticks, "client shut down");
    }
}

fn set_module(bus: &EventBus, module: &Arc<ToggleListener>, enabled: bool) {
    module.set_enabled(enabled);
    if enabled {
        module.attempt_resume_events(bus);
    } else {
        module.suspend_events(bus);
    }
    tracing::info!(module = module.name(), enabled, "module toggled");
}

fn schedule_toggle(bus: &Weak<EventBus>, owner: &ListenerRef, target: &Arc<ToggleListener>) {
    let Some(strong) = bus.upgrade() else {
        return;
    };
    let weak = bus.clone();
    let target = Arc::clone(target);
    let queued = strong
        .scheduler()
        .schedule::<Tick>(owner, Some(TOGGLE_PULSE), move |_| {
            if let Some(bus) = weak.upgrade() {
                set_module(&bus, &target, !target.is_enabled());
            }
            Ok(())
        });
    if !queued {
        tracing::debug!("pulse toggle already pending");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> Client {
        Client::new(ClientConfig {
            ticks_per_second: 4,
            reply_delay: 2,
        })
        .unwrap()
    }

    #[test]
    fn pulses_once_per_second_of_ticks() {
        let mut client = client();
        client.run(20);
        assert_eq!(client.stats().pulses(), 4);
    }

    #[test]
    fn replies_after_the_delay() {
        let mut client = client();
        client.receive_chat("alice", "hi");
        client.tick();
        assert!(client.stats().replies().is_empty());
        client.tick();
        assert_eq!(client.stats().replies(), vec!["@alice re: hi"]);
    }

    #[test]
    fn confirm_waits_for_the_key() {
        let mut client = client();
        client.receive_chat("bob", "!confirm");
        client.run(10);
        assert!(client.stats().replies().is_empty());

        client.press('n');
        client.press('y');
        assert_eq!(client.stats().replies(), vec!["@bob confirmed"]);
    }

    #[test]
    fn repeated_presses_toggle_once_per_tick() {
        let mut client = client();
        client.press('p');
        client.press('p');
        assert!(client.pulse_enabled());

        client.tick();
        assert!(!client.pulse_enabled());

        let pulses = client.stats().pulses();
        client.run(12);
        assert_eq!(client.stats().pulses(), pulses);

        client.press('p');
        client.run(12);
        assert!(client.pulse_enabled());
        assert!(client.stats().pulses() > pulses);
    }

    #[test]
    fn suspended_replies_resume_with_the_module() {
        let mut client = client();
        client.receive_chat("carol", "later");
        client.set_auto_reply(false);
        client.run(5);
        assert!(client.stats().replies().is_empty());

        client.set_auto_reply(true);
        client.receive_chat("carol", "now");
        client.run(2);
        assert_eq!(
            client.stats().replies(),
            vec!["@carol re: later", "@carol re: now"]
        );
    }

    #[test]
    fn shutdown_removes_every_hook() {
        let mut client = client();
        client.run(3);
        let bus = Arc::clone(client.bus());
        client.shutdown();
        assert_eq!(bus.hook_count::<Tick>(), 0);
        assert_eq!(bus.hook_count::<Chat>(), 0);
        assert_eq!(bus.hook_count::<KeyPressed>(), 0);
        assert!(bus.is_shut_down());
    }
}
