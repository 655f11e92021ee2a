//! Guest views are tracked but never resolve to a frame handle

use super::test_utils::{host, Harness};
use frametrack::types::{FrameId, FrameTreeNodeId};

#[test]
fn test_guest_view_lookups_report_guest_view() {
    let harness = Harness::new();
    harness.registry.register(&host(1, 1, 1, true), false);
    harness.recorder.take();

    let guest = host(2, 5, 5, false);
    assert!(harness.registry.register(&guest, true).is_none());
    assert!(harness.recorder.take().is_empty());

    for prefer_speculative in [false, true] {
        assert!(harness
            .registry
            .frame_for_host(&guest, prefer_speculative)
            .is_guest_view());
        assert!(harness
            .registry
            .frame_for_route(2, 5, prefer_speculative)
            .is_guest_view());
        assert!(harness
            .registry
            .frame_for_id(FrameId::from_route(2, 5), prefer_speculative)
            .is_guest_view());
        assert!(harness
            .registry
            .frame_for_node(FrameTreeNodeId(5), prefer_speculative)
            .is_guest_view());
    }
    assert!(harness
        .registry
        .frame_for_node(FrameTreeNodeId(5), false)
        .as_frame()
        .is_none());

    harness.registry.detach_browser();
}

#[test]
fn test_guest_views_are_counted_but_not_enumerated() {
    let harness = Harness::new();
    harness.registry.register(&host(1, 1, 1, true), false);
    harness.registry.register(&host(2, 5, 5, false), true);

    assert_eq!(harness.registry.frame_count(), 2);
    assert_eq!(harness.registry.all_frames().len(), 1);
    assert!(harness.registry.is_registered(FrameId::from_route(2, 5)));

    let snapshot = harness.registry.snapshot();
    let guest = snapshot.iter().find(|row| row.is_guest_view).unwrap();
    assert!(!guest.valid);
    assert!(!guest.is_current_main_frame);

    harness.registry.detach_browser();
}

#[test]
fn test_unregistering_guest_view_is_silent() {
    let harness = Harness::new();
    let guest = host(2, 5, 5, false);
    harness.registry.register(&guest, true);
    harness.registry.unregister(&guest);
    harness.registry.unregister(&guest);

    assert!(harness.recorder.take().is_empty());
    assert_eq!(harness.registry.frame_count(), 0);
    assert!(harness.registry.frame_for_host(&guest, false).is_missing());
    harness.registry.detach_browser();
}
