//! Navigation lock reference counting and deferred actions

use super::test_utils::Harness;
use parking_lot::Mutex;
use std::sync::Arc;

type Log = Arc<Mutex<Vec<&'static str>>>;

fn recorder() -> (Log, impl Fn(&'static str) -> Box<dyn FnOnce() + Send>) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = log.clone();
    let action = move |name: &'static str| -> Box<dyn FnOnce() + Send> {
        let sink = sink.clone();
        Box::new(move || sink.lock().push(name))
    };
    (log, action)
}

#[test]
fn test_two_locks_released_in_reverse_run_last_action_once() {
    let harness = Harness::new();
    let (log, action) = recorder();

    let first = harness.registry.create_navigation_lock();
    let second = harness.registry.create_navigation_lock();
    assert_eq!(first.holders(), 2);

    assert!(harness.registry.is_navigation_locked(action("a")));
    assert!(harness.registry.is_navigation_locked(action("b")));

    drop(second);
    assert!(harness.registry.is_navigation_blocked());
    assert_eq!(harness.sequencer.pending(), 0);

    drop(first);
    assert!(!harness.registry.is_navigation_blocked());
    assert_eq!(harness.sequencer.pending(), 1);
    assert_eq!(harness.sequencer.run_until_idle(), 1);
    assert_eq!(*log.lock(), vec!["b"]);

    // Nothing left to run.
    assert_eq!(harness.sequencer.run_until_idle(), 0);
    harness.registry.detach_browser();
}

#[test]
fn test_unlocked_navigation_is_not_deferred() {
    let harness = Harness::new();
    let (log, action) = recorder();

    assert!(!harness.registry.is_navigation_blocked());
    // The action is dropped, not stored.
    assert!(!harness.registry.is_navigation_locked(action("dropped")));
    assert!(!harness.registry.run_or_defer_navigation(action("now")));
    assert_eq!(*log.lock(), vec!["now"]);
    assert_eq!(harness.sequencer.pending(), 0);
    harness.registry.detach_browser();
}

#[test]
fn test_release_without_pending_action_posts_nothing() {
    let harness = Harness::new();
    let lock = harness.registry.create_navigation_lock();
    let clone = lock.clone();
    assert_eq!(lock.holders(), 2);
    drop(lock);
    drop(clone);
    assert_eq!(harness.sequencer.pending(), 0);
    harness.registry.detach_browser();
}

#[test]
fn test_new_lock_after_release_starts_empty() {
    let harness = Harness::new();
    let (log, action) = recorder();

    let lock = harness.registry.create_navigation_lock();
    assert!(harness.registry.run_or_defer_navigation(action("first")));
    drop(lock);

    let lock = harness.registry.create_navigation_lock();
    assert_eq!(lock.holders(), 1);
    assert!(harness.registry.run_or_defer_navigation(action("second")));
    drop(lock);

    assert_eq!(harness.sequencer.run_until_idle(), 2);
    assert_eq!(*log.lock(), vec!["first", "second"]);
    harness.registry.detach_browser();
}
