//! Dispatch ordering, running-state filtering and failure isolation.

mod test_utils;

use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use test_utils::{CallLog, Chat, KeyPressed, Tick, record, test_bus};
use tickbus_event::prelude::*;

/// A listener whose running state is switched independently of its
/// hook-list membership.
struct Switch {
    core: ListenerCore,
    running: AtomicBool,
}

impl Switch {
    fn new(name: &str, running: bool) -> Arc<Self> {
        Arc::new(Self {
            core: ListenerCore::new(name),
            running: AtomicBool::new(running),
        })
    }

    fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }
}

impl Listener for Switch {
    fn core(&self) -> &ListenerCore {
        &self.core
    }

    fn running(&self) -> bool {
        self.running.load(Ordering::SeqCst) && !self.core.is_destructed()
    }
}

#[test]
fn equal_priorities_fire_in_registration_order() {
    let bus = test_bus();
    let owner: ListenerRef = ToggleListener::new("owner", true);
    let log = CallLog::new();

    record::<Tick>(&bus, &owner, &log, "A", HookOptions::new().with_priority(10));
    record::<Tick>(&bus, &owner, &log, "B", HookOptions::new().with_priority(5));
    record::<Tick>(&bus, &owner, &log, "C", HookOptions::new().with_priority(10));

    bus.fire(Tick);

    assert_eq!(log.calls(), vec!["A", "C", "B"]);
}

#[test]
fn late_activation_keeps_registration_order_among_equals() {
    let bus = test_bus();
    let early = ToggleListener::new("early", false);
    let late: ListenerRef = ToggleListener::new("late", true);
    let early_ref: ListenerRef = early.clone();
    let log = CallLog::new();

    let a = record::<Tick>(&bus, &early_ref, &log, "A", HookOptions::new().with_priority(10));
    record::<Tick>(&bus, &late, &log, "C", HookOptions::new().with_priority(10));
    assert!(!bus.is_active(a));

    early.set_enabled(true);
    bus.activate(a);
    bus.fire(Tick);

    assert_eq!(log.calls(), vec!["A", "C"]);
}

#[test]
fn negative_priorities_fire_last() {
    let bus = test_bus();
    let owner: ListenerRef = ToggleListener::new("owner", true);
    let log = CallLog::new();

    record::<Tick>(&bus, &owner, &log, "low", HookOptions::new().with_priority(i16::MIN));
    record::<Tick>(&bus, &owner, &log, "default", HookOptions::new());
    record::<Tick>(&bus, &owner, &log, "high", HookOptions::new().with_priority(i16::MAX));

    bus.fire(Tick);

    assert_eq!(log.calls(), vec!["high", "default", "low"]);
}

#[test]
fn stopped_listener_is_skipped_until_running_again() {
    let bus = test_bus();
    let switch = Switch::new("switch", false);
    let owner: ListenerRef = switch.clone();
    let log = CallLog::new();

    let handle = record::<Tick>(&bus, &owner, &log, "hook", HookOptions::new());
    assert!(bus.is_active(handle), "the hook sits in the active region");

    bus.fire(Tick);
    assert_eq!(log.count("hook"), 0);

    switch.set_running(true);
    bus.fire(Tick);
    assert_eq!(log.count("hook"), 1);
}

#[test]
fn ignore_inactive_hooks_fire_regardless_of_running() {
    let bus = test_bus();
    let switch = Switch::new("switch", false);
    let owner: ListenerRef = switch.clone();
    let log = CallLog::new();

    record::<Tick>(&bus, &owner, &log, "always", HookOptions::new().ignoring_inactive());
    record::<Tick>(&bus, &owner, &log, "gated", HookOptions::new());

    bus.fire(Tick);
    bus.fire(Tick);

    assert_eq!(log.count("always"), 2);
    assert_eq!(log.count("gated"), 0);
}

#[test]
fn stopped_parent_gates_child_hooks() {
    let bus = test_bus();
    let parent = ToggleListener::new("parent", true);
    let child = ToggleListener::child_of(&parent, "child", true);
    let child_ref: ListenerRef = child.clone();
    let log = CallLog::new();

    record::<Tick>(&bus, &child_ref, &log, "child", HookOptions::new());

    parent.set_enabled(false);
    bus.fire(Tick);
    assert_eq!(log.count("child"), 0);

    parent.set_enabled(true);
    bus.fire(Tick);
    assert_eq!(log.count("child"), 1);
}

#[test]
fn hooks_of_dropped_owners_are_skipped_and_pruned() {
    let bus = test_bus();
    let log = CallLog::new();
    let survivor: ListenerRef = ToggleListener::new("survivor", true);
    let dropped = {
        let short_lived: ListenerRef = ToggleListener::new("short-lived", true);
        record::<Tick>(&bus, &short_lived, &log, "dropped", HookOptions::new())
    };
    record::<Tick>(&bus, &survivor, &log, "survivor", HookOptions::new());
    assert_eq!(bus.hook_count::<Tick>(), 2);

    bus.fire(Tick);

    assert_eq!(log.calls(), vec!["survivor"]);
    assert_eq!(bus.hook_count::<Tick>(), 1);
    assert!(!bus.is_registered(dropped));

    bus.fire(Tick);
    assert_eq!(log.calls(), vec!["survivor", "survivor"]);
}

#[test]
fn hooks_only_receive_their_own_kind() {
    let bus = test_bus();
    let owner: ListenerRef = ToggleListener::new("owner", true);
    let log = CallLog::new();

    record::<Tick>(&bus, &owner, &log, "tick", HookOptions::new());
    record::<KeyPressed>(&bus, &owner, &log, "key", HookOptions::new());

    bus.fire(KeyPressed { code: 32 });
    bus.fire(KeyPressed { code: 65 });

    assert_eq!(log.calls(), vec!["key", "key"]);
}

#[test]
fn fire_hands_the_event_back() {
    let bus = test_bus();
    let owner: ListenerRef = ToggleListener::new("owner", true);
    let seen = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&seen);
    bus.register::<Chat>(&owner, HookOptions::new(), move |chat| {
        counter.fetch_add(chat.message.len(), Ordering::SeqCst);
        Ok(())
    })
    .unwrap();

    let chat = bus.fire(Chat {
        message: "hello".to_owned(),
    });

    assert_eq!(chat.message, "hello");
    assert_eq!(seen.load(Ordering::SeqCst), 5);
}

#[test]
fn error_in_one_hook_does_not_affect_the_others() {
    let bus = test_bus();
    let owner: ListenerRef = ToggleListener::new("owner", true);
    let log = CallLog::new();

    record::<Tick>(&bus, &owner, &log, "before", HookOptions::new().with_priority(1));
    bus.register::<Tick>(&owner, HookOptions::new(), |_| Err("nope".into()))
        .unwrap();
    bus.register::<Tick>(&owner, HookOptions::new(), |_| panic!("boom"))
        .unwrap();
    record::<Tick>(&bus, &owner, &log, "after", HookOptions::new().with_priority(-1));

    bus.fire(Tick);
    bus.fire(Tick);

    assert_eq!(log.calls(), vec!["before", "after", "before", "after"]);
}

#[test]
fn registration_during_dispatch_applies_from_next_fire() {
    let bus = Arc::new(test_bus());
    let owner: ListenerRef = ToggleListener::new("owner", true);
    let log = CallLog::new();
    let registered = Arc::new(AtomicBool::new(false));

    let weak_bus: Weak<EventBus> = Arc::downgrade(&bus);
    let weak_owner = Arc::downgrade(&owner);
    let late_log = log.clone();
    let flag = Arc::clone(&registered);
    bus.register::<Tick>(&owner, HookOptions::new().with_priority(1), move |_| {
        if !flag.swap(true, Ordering::SeqCst)
            && let (Some(bus), Some(owner)) = (weak_bus.upgrade(), weak_owner.upgrade())
        {
            bus.register::<Tick>(&owner, HookOptions::new(), late_log.recorder("late"))?;
        }
        Ok(())
    })
    .unwrap();

    bus.fire(Tick);
    assert_eq!(log.count("late"), 0, "the running dispatch uses its snapshot");

    bus.fire(Tick);
    assert_eq!(log.count("late"), 1);
}

#[test]
fn hook_unregistering_itself_finishes_current_dispatch() {
    let bus = Arc::new(test_bus());
    let owner: ListenerRef = ToggleListener::new("owner", true);
    let log = CallLog::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let own_handle = Arc::new(parking_lot::Mutex::new(None::<HookHandle<Tick>>));

    let weak_bus = Arc::downgrade(&bus);
    let slot = Arc::clone(&own_handle);
    let counter = Arc::clone(&calls);
    let handle = bus
        .register::<Tick>(&owner, HookOptions::new().with_priority(5), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            if let (Some(bus), Some(handle)) = (weak_bus.upgrade(), *slot.lock()) {
                bus.unregister_hook(handle);
            }
            Ok(())
        })
        .unwrap();
    *own_handle.lock() = Some(handle);
    record::<Tick>(&bus, &owner, &log, "next", HookOptions::new());

    bus.fire(Tick);
    bus.fire(Tick);

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(log.count("next"), 2);
    assert!(!bus.is_registered(handle));
}

#[test]
fn deactivated_hook_keeps_its_registration() {
    let bus = test_bus();
    let owner: ListenerRef = ToggleListener::new("owner", true);
    let log = CallLog::new();

    let handle = record::<Tick>(&bus, &owner, &log, "hook", HookOptions::new());
    bus.deactivate(handle);
    bus.fire(Tick);
    assert_eq!(log.count("hook"), 0);
    assert!(bus.is_registered(handle));

    bus.activate(handle);
    bus.activate(handle);
    bus.fire(Tick);
    assert_eq!(log.count("hook"), 1);
    assert_eq!(bus.hook_count::<Tick>(), 1);
}

#[test]
fn scheduled_action_runs_once_before_hooks() {
    let bus = test_bus();
    let owner: ListenerRef = ToggleListener::new("owner", true);
    let log = CallLog::new();

    record::<Tick>(&bus, &owner, &log, "hook", HookOptions::new().with_priority(100));
    let action_log = log.clone();
    assert!(bus.scheduler().schedule::<Tick>(&owner, Some(1), move |tick| {
        action_log.recorder::<Tick>("scheduled")(tick)
    }));

    bus.fire(Tick);
    bus.fire(Tick);

    assert_eq!(log.calls(), vec!["scheduled", "hook", "hook"]);
    assert!(!bus.scheduler().is_scheduled::<Tick>(1));
}

#[test]
fn scheduled_action_of_dropped_owner_is_discarded() {
    let bus = test_bus();
    let log = CallLog::new();
    {
        let owner: ListenerRef = ToggleListener::new("owner", true);
        let action_log = log.clone();
        bus.scheduler().schedule::<Tick>(&owner, None, move |tick| {
            action_log.recorder::<Tick>("scheduled")(tick)
        });
    }

    bus.fire(Tick);

    assert!(log.calls().is_empty());
    assert_eq!(bus.scheduler().pending::<Tick>(), 0);
}

#[test]
fn scheduled_action_can_reschedule_for_the_next_fire() {
    let bus = Arc::new(test_bus());
    let owner: ListenerRef = ToggleListener::new("owner", true);
    let runs = Arc::new(AtomicUsize::new(0));

    let weak_bus = Arc::downgrade(&bus);
    let weak_owner = Arc::downgrade(&owner);
    let counter = Arc::clone(&runs);
    bus.scheduler().schedule::<Tick>(&owner, Some(1), move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        if let (Some(bus), Some(owner)) = (weak_bus.upgrade(), weak_owner.upgrade()) {
            let counter = Arc::clone(&counter);
            bus.scheduler().schedule::<Tick>(&owner, Some(1), move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }
        Ok(())
    });

    bus.fire(Tick);
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert!(bus.scheduler().is_scheduled::<Tick>(1));

    bus.fire(Tick);
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}
