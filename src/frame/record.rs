//! Internal per-host bookkeeping record.

use crate::frame::Frame;
use crate::types::{FrameHost, FrameId, FrameTreeNodeId};
use std::sync::Arc;

/// Arena key for a record. Never reused within one registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct RecordKey(pub u64);

#[derive(Debug)]
pub(crate) struct FrameRecord {
    pub frame_id: FrameId,
    pub node_id: FrameTreeNodeId,
    pub is_guest_view: bool,
    pub is_main_frame: bool,
    pub is_speculative: bool,
    pub is_suspended: bool,
    /// None for guest views
    pub frame: Option<Arc<Frame>>,
}

impl FrameRecord {
    pub fn new(host: &FrameHost, is_guest_view: bool, frame: Option<Arc<Frame>>) -> Self {
        FrameRecord {
            frame_id: host.frame_id(),
            node_id: host.node_id,
            is_guest_view,
            is_main_frame: host.is_main_frame,
            is_speculative: host.is_speculative,
            is_suspended: false,
            frame,
        }
    }

    /// A detached handle never counts as the current main frame.
    pub fn is_current_main_frame(&self) -> bool {
        let live = self.frame.as_ref().map(|f| f.is_valid()).unwrap_or(false);
        live && self.is_main_frame && !self.is_speculative && !self.is_suspended
    }

    /// Whether this record holds the given handle
    pub fn holds(&self, frame: &Arc<Frame>) -> bool {
        self.frame
            .as_ref()
            .map(|own| Arc::ptr_eq(own, frame))
            .unwrap_or(false)
    }
}
