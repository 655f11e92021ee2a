//! Property-based tests for index consistency and notification order

use frametrack::config::RegistryConfig;
use frametrack::registry::{BrowserOptions, FrameRegistry};
use frametrack::replay::{Notification, RecordingHandler, ReplayBrowser};
use frametrack::sequencer::ManualSequencer;
use frametrack::types::{BrowserId, FrameHost, FrameId, FrameTreeNodeId, LifecycleState};
use proptest::prelude::*;
use proptest::test_runner::{Config, TestRunner};
use std::collections::HashMap;

#[derive(Debug, Clone)]
enum Op {
    Register {
        process_id: i32,
        routing_id: i32,
        speculative: bool,
    },
    Unregister {
        process_id: i32,
        routing_id: i32,
    },
    Suspend {
        process_id: i32,
        routing_id: i32,
    },
    Resume {
        process_id: i32,
        routing_id: i32,
    },
}

/// Identity is a function of the route so repeated registrations agree.
fn host(process_id: i32, routing_id: i32, speculative: bool) -> FrameHost {
    let node = routing_id % 3;
    FrameHost {
        process_id,
        routing_id,
        node_id: FrameTreeNodeId(node),
        is_main_frame: node == 0,
        is_speculative: speculative,
    }
}

fn is_guest_view(routing_id: i32) -> bool {
    routing_id == 5
}

fn op_strategy() -> impl Strategy<Value = Op> {
    let route = (1..4i32, 0..7i32);
    prop_oneof![
        3 => (route.clone(), any::<bool>()).prop_map(|((process_id, routing_id), speculative)| {
            Op::Register {
                process_id,
                routing_id,
                speculative,
            }
        }),
        2 => route.clone().prop_map(|(process_id, routing_id)| Op::Unregister {
            process_id,
            routing_id,
        }),
        1 => route.clone().prop_map(|(process_id, routing_id)| Op::Suspend {
            process_id,
            routing_id,
        }),
        1 => route.prop_map(|(process_id, routing_id)| Op::Resume {
            process_id,
            routing_id,
        }),
    ]
}

fn apply(registry: &FrameRegistry, op: &Op) {
    match *op {
        Op::Register {
            process_id,
            routing_id,
            speculative,
        } => {
            registry.register(
                &host(process_id, routing_id, speculative),
                is_guest_view(routing_id),
            );
        }
        Op::Unregister {
            process_id,
            routing_id,
        } => registry.unregister(&host(process_id, routing_id, false)),
        Op::Suspend {
            process_id,
            routing_id,
        } => registry.transition_lifecycle_state(
            &host(process_id, routing_id, false),
            LifecycleState::Active,
            LifecycleState::InBackForwardCache,
        ),
        Op::Resume {
            process_id,
            routing_id,
        } => registry.transition_lifecycle_state(
            &host(process_id, routing_id, false),
            LifecycleState::InBackForwardCache,
            LifecycleState::Active,
        ),
    }
}

fn check_indices(registry: &FrameRegistry) -> Result<(), TestCaseError> {
    let snapshot = registry.snapshot();
    let enumerated: Vec<FrameId> = snapshot.iter().map(|row| row.frame_id).collect();
    prop_assert_eq!(registry.indexed_frame_ids(), enumerated);

    let current = snapshot.iter().filter(|row| row.is_current_main_frame).count();
    prop_assert!(current <= 1, "{} current main frames", current);

    for row in &snapshot {
        let by_id = registry.frame_for_id(row.frame_id, true);
        prop_assert_eq!(by_id.is_guest_view(), row.is_guest_view);
        prop_assert!(!by_id.is_missing());
        prop_assert!(!registry.frame_for_node(row.node_id, false).is_missing());
    }

    for frame in registry.all_frames() {
        let row = snapshot
            .iter()
            .find(|row| row.frame_id == frame.identifier())
            .cloned();
        prop_assert!(row.is_some());
        let row = row.unwrap();
        prop_assert!(!row.is_speculative && !row.is_suspended && !row.is_guest_view);
    }

    if let Some(main) = registry.main_frame() {
        prop_assert!(main.is_valid());
        prop_assert!(main.is_main());
    }
    Ok(())
}

/// Per frame id, notifications alternate created/detached.
fn check_lifecycles(notifications: &[Notification], torn_down: bool) -> Result<(), TestCaseError> {
    let mut alive: HashMap<FrameId, bool> = HashMap::new();
    for notification in notifications {
        match notification {
            Notification::FrameCreated { frame } => {
                let was_alive = alive.insert(frame.frame_id, true).unwrap_or(false);
                prop_assert!(!was_alive, "{} created twice", frame.frame_id);
            }
            Notification::FrameDetached { frame } => {
                let was_alive = alive.insert(frame.frame_id, false).unwrap_or(false);
                prop_assert!(was_alive, "{} detached without being alive", frame.frame_id);
            }
            Notification::MainFrameChanged { .. } => {}
        }
    }
    if torn_down {
        let leaked: Vec<&FrameId> = alive.iter().filter(|(_, v)| **v).map(|(k, _)| k).collect();
        prop_assert!(leaked.is_empty(), "never detached: {:?}", leaked);
    }
    Ok(())
}

#[test]
fn test_random_sequences_keep_registry_consistent() {
    let mut runner = TestRunner::new(Config {
        cases: 128,
        ..Config::default()
    });

    runner
        .run(&prop::collection::vec(op_strategy(), 1..40), |ops| {
            let recorder = RecordingHandler::new();
            let registry = FrameRegistry::new(
                BrowserOptions::new(BrowserId(1)),
                &RegistryConfig {
                    strict_invariants: true,
                    warn_on_speculative_lookup: false,
                },
                ManualSequencer::new(),
            )
            .unwrap();
            registry.attach_browser(ReplayBrowser::new(BrowserId(1), Some(recorder.clone())));

            for op in &ops {
                apply(&registry, op);
                check_indices(&registry)?;
                check_lifecycles(&recorder.notifications(), false)?;
            }

            registry.detach_browser();
            prop_assert_eq!(registry.frame_count(), 0);
            prop_assert!(registry.main_frame().is_none());
            check_lifecycles(&recorder.notifications(), true)?;
            Ok(())
        })
        .unwrap();
}

#[test]
fn test_unregister_twice_is_noop() {
    let mut runner = TestRunner::default();

    runner
        .run(&(1..4i32, 0..7i32), |(process_id, routing_id)| {
            let recorder = RecordingHandler::new();
            let registry = FrameRegistry::new(
                BrowserOptions::new(BrowserId(1)),
                &RegistryConfig::default(),
                ManualSequencer::new(),
            )
            .unwrap();
            registry.attach_browser(ReplayBrowser::new(BrowserId(1), Some(recorder.clone())));

            let frame_host = host(process_id, routing_id, false);
            registry.register(&frame_host, is_guest_view(routing_id));
            registry.unregister(&frame_host);
            let after_first = recorder.notifications().len();
            registry.unregister(&frame_host);

            prop_assert_eq!(recorder.notifications().len(), after_first);
            prop_assert_eq!(registry.frame_count(), 0);
            registry.detach_browser();
            Ok(())
        })
        .unwrap();
}
