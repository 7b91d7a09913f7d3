//! Cascading lifecycle operations over the listener tree.

mod test_utils;

use std::sync::Arc;

use test_utils::{CallLog, Chat, KeyPressed, Tick, record, test_bus};
use tickbus_event::prelude::*;

fn active_labels(bus: &EventBus, log: &CallLog) -> Vec<&'static str> {
    log.clear();
    bus.fire(Tick);
    log.calls()
}

#[test]
fn unregister_cascades_to_every_descendant_and_kind() {
    let bus = test_bus();
    let root = ToggleListener::new("root", true);
    let child = ToggleListener::child_of(&root, "child", true);
    let grandchild = ToggleListener::child_of(&child, "grandchild", true);
    let bystander = ToggleListener::new("bystander", true);
    let log = CallLog::new();

    for (listener, label) in [
        (Arc::clone(&root), "root"),
        (Arc::clone(&child), "child"),
        (Arc::clone(&grandchild), "grandchild"),
        (Arc::clone(&bystander), "bystander"),
    ] {
        let owner: ListenerRef = listener;
        record::<Tick>(&bus, &owner, &log, label, HookOptions::new());
        record::<KeyPressed>(&bus, &owner, &log, label, HookOptions::new());
    }

    root.unregister(&bus);

    assert_eq!(bus.hook_count::<Tick>(), 1);
    assert_eq!(bus.hook_count::<KeyPressed>(), 1);
    assert_eq!(bus.listener_hook_count(grandchild.as_ref()), 0);
    assert!(grandchild.core().is_destructed());
    assert!(!grandchild.running());

    assert_eq!(active_labels(&bus, &log), vec!["bystander"]);
}

#[test]
fn unregister_is_irreversible_and_idempotent() {
    let bus = test_bus();
    let module = ToggleListener::new("module", true);
    let log = CallLog::new();
    let owner: ListenerRef = module.clone();
    record::<Tick>(&bus, &owner, &log, "module", HookOptions::new().ignoring_inactive());

    module.unregister(&bus);
    module.unregister(&bus);
    module.attempt_resume_events(&bus);

    assert_eq!(bus.hook_count::<Tick>(), 0);
    assert!(active_labels(&bus, &log).is_empty());
    assert!(matches!(
        module.handler::<Tick>(&bus, |_| Ok(())),
        Err(EventError::ListenerDropped { .. })
    ));
}

#[test]
fn unregister_discards_pending_scheduled_actions() {
    let bus = test_bus();
    let module = ToggleListener::new("module", true);
    let owner: ListenerRef = module.clone();
    bus.scheduler().schedule::<Chat>(&owner, Some(3), |_| Ok(()));

    module.unregister(&bus);

    assert!(!bus.scheduler().is_scheduled::<Chat>(3));
}

#[test]
fn suspend_then_resume_restores_the_exact_order() {
    let bus = test_bus();
    let first = ToggleListener::new("first", true);
    let second = ToggleListener::new("second", true);
    let first_ref: ListenerRef = first.clone();
    let second_ref: ListenerRef = second.clone();
    let log = CallLog::new();

    record::<Tick>(&bus, &first_ref, &log, "f10a", HookOptions::new().with_priority(10));
    record::<Tick>(&bus, &second_ref, &log, "s10", HookOptions::new().with_priority(10));
    record::<Tick>(&bus, &first_ref, &log, "f10b", HookOptions::new().with_priority(10));
    record::<Tick>(&bus, &second_ref, &log, "s0", HookOptions::new());
    record::<Tick>(&bus, &first_ref, &log, "f-5", HookOptions::new().with_priority(-5));

    let before = active_labels(&bus, &log);
    assert_eq!(before, vec!["f10a", "s10", "f10b", "s0", "f-5"]);

    first.suspend_events(&bus);
    assert_eq!(active_labels(&bus, &log), vec!["s10", "s0"]);
    assert_eq!(bus.hook_count::<Tick>(), 5, "suspended hooks stay registered");

    first.attempt_resume_events(&bus);
    assert_eq!(active_labels(&bus, &log), before);
}

#[test]
fn suspend_cascades_to_children() {
    let bus = test_bus();
    let parent = ToggleListener::new("parent", true);
    let child = ToggleListener::child_of(&parent, "child", true);
    let child_ref: ListenerRef = child.clone();
    let log = CallLog::new();
    let handle = record::<Tick>(&bus, &child_ref, &log, "child", HookOptions::new().ignoring_inactive());

    parent.suspend_events(&bus);
    assert!(!bus.is_active(handle));

    parent.attempt_resume_events(&bus);
    assert!(bus.is_active(handle));
}

#[test]
fn resume_is_refused_while_listener_wants_off_the_list() {
    let bus = test_bus();
    let module = ToggleListener::new("module", true);
    let sub = ToggleListener::child_of(&module, "sub", true);
    let module_ref: ListenerRef = module.clone();
    let sub_ref: ListenerRef = sub.clone();
    let log = CallLog::new();

    let own = record::<Tick>(&bus, &module_ref, &log, "module", HookOptions::new());
    let nested = record::<Tick>(&bus, &sub_ref, &log, "sub", HookOptions::new());

    module.suspend_events(&bus);
    module.set_enabled(false);
    module.attempt_resume_events(&bus);
    assert!(!bus.is_active(own));
    assert!(!bus.is_active(nested), "children are not visited when the parent refuses");

    module.set_enabled(true);
    sub.set_enabled(false);
    module.attempt_resume_events(&bus);
    assert!(bus.is_active(own));
    assert!(!bus.is_active(nested));
}

#[test]
fn disabled_listener_registers_inactive_hooks() {
    let bus = test_bus();
    let module = ToggleListener::new("module", false);
    let log = CallLog::new();

    let handle = module
        .handler_with::<Tick>(&bus, HookOptions::new().ignoring_inactive(), log.recorder("module"))
        .unwrap();
    assert!(!bus.is_active(handle));
    assert!(active_labels(&bus, &log).is_empty());

    module.set_enabled(true);
    module.attempt_resume_events(&bus);
    assert_eq!(active_labels(&bus, &log), vec!["module"]);
}

#[test]
fn lifecycle_operations_work_through_trait_objects() {
    let bus = test_bus();
    let module: ListenerRef = ToggleListener::new("module", true);
    let log = CallLog::new();
    record::<Tick>(&bus, &module, &log, "module", HookOptions::new());

    bus.suspend_listener(module.as_ref());
    assert_eq!(bus.active_hook_count::<Tick>(), 0);

    bus.attempt_resume_listener(module.as_ref());
    assert_eq!(bus.active_hook_count::<Tick>(), 1);

    bus.unregister_listener(module.as_ref());
    assert_eq!(bus.hook_count::<Tick>(), 0);
}
