//! Example client loop.
//!
//! Drives a [`Client`] for a few simulated seconds: chat arrives, the user
//! presses keys, modules are toggled, and everything is logged through
//! `tracing`.
//!
//! # Usage
//!
//! ```bash
//! ticker [seconds]
//! RUST_LOG=tickbus_event=trace ticker 5
//! ```

use example::{Client, ClientConfig};
use tickbus_core::{TracingConfig, TracingFormat};

fn main() {
    let mut subscriber = TracingConfig::new().with_format(TracingFormat::Compact);
    if let Ok(filter) = std::env::var("RUST_LOG") {
        subscriber = subscriber.with_env_filter(filter);
    }
    subscriber.init();

    let seconds = match std::env::args().nth(1).map(|arg| arg.parse::<u64>()) {
        None => 5,
        Some(Ok(seconds)) => seconds,
        Some(Err(error)) => {
            tracing::error!(%error, "expected a number of seconds");
            std::process::exit(1);
        }
    };

    let config = ClientConfig::default();
    let mut client = match Client::new(config) {
        Ok(client) => client,
        Err(error) => {
            tracing::error!(%error, "failed to set up the client");
            std::process::exit(1);
        }
    };

    let total = seconds * u64::from(config.ticks_per_second);
    for _ in 0..total {
        client.tick();
        match client.ticks() {
            5 => client.receive_chat("alice", "hello"),
            12 => client.receive_chat("bob", "!confirm"),
            30 => client.press('y'),
            40 => {
                client.press('p');
                client.press('p');
            }
            60 => client.set_auto_reply(false),
            61 => client.receive_chat("carol", "anyone?"),
            75 => client.set_auto_reply(true),
            80 => client.press('p'),
            _ => {}
        }
    }

    tracing::info!(
        ticks = client.ticks(),
        pulses = client.stats().pulses(),
        launches = client.pulse_launches(),
        replies = ?client.stats().replies(),
        "done"
    );
    client.shutdown();
}
