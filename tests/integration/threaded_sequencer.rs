//! Registry driven by a dedicated sequencing thread while other threads
//! perform lookups

use super::test_utils::host;
use frametrack::config::FrameTrackConfig;
use frametrack::registry::{BrowserOptions, FrameRegistry};
use frametrack::replay::{RecordingHandler, ReplayBrowser};
use frametrack::sequencer::Sequencer;
use frametrack::types::{BrowserId, FrameId, FrameTreeNodeId, LifecycleState};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::channel;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Run `task` on the sequencing thread and wait for its result.
fn on_sequencer<T, F>(sequencer: &Arc<dyn Sequencer>, task: F) -> T
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = channel();
    sequencer.post(Box::new(move || {
        let _ = tx.send(task());
    }));
    rx.recv().unwrap()
}

#[test]
fn test_mutations_on_worker_and_lookups_elsewhere() {
    let mut config = FrameTrackConfig::default();
    config.sequencer.thread_name = "frametrack-it".to_string();
    let (registry, worker) =
        FrameRegistry::with_thread_sequencer(BrowserOptions::new(BrowserId(2)), &config).unwrap();
    let sequencer: Arc<dyn Sequencer> = worker.clone();
    let recorder = RecordingHandler::new();

    let setup = registry.clone();
    let handler = recorder.clone();
    let thread_name = on_sequencer(&sequencer, move || {
        setup.attach_browser(ReplayBrowser::new(BrowserId(2), Some(handler)));
        setup.register(&host(1, 1, 1, true), false);
        for routing_id in 2..10 {
            setup.register(&host(1, routing_id, routing_id, false), false);
        }
        thread::current().name().map(|name| name.to_string())
    });
    assert_eq!(thread_name.as_deref(), Some("frametrack-it"));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let registry = registry.clone();
            thread::spawn(move || {
                for routing_id in 1..10 {
                    let frame = registry.frame_for_route(1, routing_id, false).frame();
                    assert_eq!(
                        frame.map(|f| f.identifier()),
                        Some(FrameId::from_route(1, routing_id))
                    );
                }
                registry.all_frames().len()
            })
        })
        .collect();
    for reader in readers {
        assert_eq!(reader.join().unwrap(), 9);
    }

    let teardown = registry.clone();
    on_sequencer(&sequencer, move || teardown.detach_browser());
    assert_eq!(recorder.notifications().len(), 9 + 1 + 9 + 1);
    assert_eq!(registry.frame_count(), 0);

    worker.shutdown();
}

#[test]
fn test_navigation_action_runs_on_sequencing_thread() {
    let (registry, worker) = FrameRegistry::with_thread_sequencer(
        BrowserOptions::new(BrowserId(5)),
        &FrameTrackConfig::default(),
    )
    .unwrap();
    let sequencer: Arc<dyn Sequencer> = worker.clone();
    let (tx, rx) = channel();

    let locked = registry.clone();
    let check = worker.clone();
    on_sequencer(&sequencer, move || {
        let lock = locked.create_navigation_lock();
        let deferred = locked.run_or_defer_navigation(move || {
            let _ = tx.send(check.is_current());
        });
        drop(lock);
        deferred
    });

    assert!(rx.recv().unwrap());
    assert!(!registry.is_navigation_blocked());
    worker.shutdown();
}

#[test]
fn test_lookups_during_worker_churn() {
    let (registry, worker) = FrameRegistry::with_thread_sequencer(
        BrowserOptions::new(BrowserId(3)),
        &FrameTrackConfig::default(),
    )
    .unwrap();
    let sequencer: Arc<dyn Sequencer> = worker.clone();
    let recorder = RecordingHandler::new();

    let setup = registry.clone();
    let handler = recorder.clone();
    on_sequencer(&sequencer, move || {
        setup.attach_browser(ReplayBrowser::new(BrowserId(3), Some(handler)));
        setup.register(&host(1, 1, 1, true), false);
    });

    let stop = Arc::new(AtomicBool::new(false));
    let hits = Arc::new(AtomicUsize::new(0));
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let registry = registry.clone();
            let stop = stop.clone();
            let hits = hits.clone();
            thread::spawn(move || {
                while !stop.load(Ordering::SeqCst) {
                    for slot in 1..6 {
                        if let Some(frame) = registry.frame_for_route(1, slot, false).frame() {
                            assert_eq!(frame.identifier(), FrameId::from_route(1, slot));
                            hits.fetch_add(1, Ordering::Relaxed);
                        }
                        let node = FrameTreeNodeId(slot);
                        if let Some(frame) = registry.frame_for_node(node, false).frame() {
                            assert_eq!(frame.node_id(), Some(node));
                        }
                    }
                    for frame in registry.all_frames() {
                        assert_eq!(frame.identifier().process_id(), 1);
                    }
                }
            })
        })
        .collect();

    let churn = registry.clone();
    let (done_tx, done_rx) = channel();
    sequencer.post(Box::new(move || {
        for _ in 0..200 {
            for slot in 2..6 {
                let sub = host(1, slot, slot, false);
                churn.register(&sub, false);
                churn.transition_lifecycle_state(
                    &sub,
                    LifecycleState::Active,
                    LifecycleState::InBackForwardCache,
                );
                churn.transition_lifecycle_state(
                    &sub,
                    LifecycleState::InBackForwardCache,
                    LifecycleState::Active,
                );
                churn.unregister(&sub);
            }
        }
        let _ = done_tx.send(churn.frame_count());
    }));

    let remaining = done_rx
        .recv_timeout(Duration::from_secs(30))
        .expect("worker churn did not finish");
    stop.store(true, Ordering::SeqCst);
    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(remaining, 1);
    assert!(hits.load(Ordering::Relaxed) > 0);

    let teardown = registry.clone();
    on_sequencer(&sequencer, move || teardown.detach_browser());
    // 800 created/detached pairs plus the main frame's created, main changed
    // and teardown pair.
    assert_eq!(recorder.notifications().len(), 800 * 2 + 4);
    worker.shutdown();
}
