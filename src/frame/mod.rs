//! Frame Handles
//!
//! Public handles for frames tracked by a [`FrameRegistry`](crate::registry::FrameRegistry).
//! A handle outlives its engine host: once the host goes away the handle is
//! detached and reports itself invalid, but callers may keep holding it.

pub(crate) mod record;

use crate::types::{BrowserId, FrameHost, FrameId, FrameTreeNodeId};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Frame handle
pub struct Frame {
    identifier: FrameId,
    node_id: Option<FrameTreeNodeId>,
    browser_id: BrowserId,
    is_main: bool,
    parent_id: Option<FrameId>,
    temporary: bool,
    attached: AtomicBool,
}

impl Frame {
    /// Create a handle bound to an engine host
    pub(crate) fn for_host(browser_id: BrowserId, host: &FrameHost) -> Arc<Self> {
        Arc::new(Frame {
            identifier: host.frame_id(),
            node_id: Some(host.node_id),
            browser_id,
            is_main: host.is_main_frame,
            parent_id: None,
            temporary: false,
            attached: AtomicBool::new(true),
        })
    }

    /// Create a temporary sub-frame handle that has no engine host yet
    pub(crate) fn temporary(browser_id: BrowserId, parent_id: FrameId) -> Arc<Self> {
        Arc::new(Frame {
            identifier: FrameId::INVALID,
            node_id: None,
            browser_id,
            is_main: false,
            parent_id: Some(parent_id),
            temporary: true,
            attached: AtomicBool::new(true),
        })
    }

    pub fn identifier(&self) -> FrameId {
        self.identifier
    }

    pub fn node_id(&self) -> Option<FrameTreeNodeId> {
        self.node_id
    }

    pub fn browser_id(&self) -> BrowserId {
        self.browser_id
    }

    pub fn is_main(&self) -> bool {
        self.is_main
    }

    /// Parent identifier, only known for temporary frames
    pub fn parent_id(&self) -> Option<FrameId> {
        self.parent_id
    }

    pub fn is_temporary(&self) -> bool {
        self.temporary
    }

    /// False once the frame has been detached from its host
    pub fn is_valid(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }

    /// Detach from the host. Returns true only for the call that performed
    /// the transition.
    pub(crate) fn detach(&self) -> bool {
        self.attached.swap(false, Ordering::AcqRel)
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("identifier", &self.identifier)
            .field("node_id", &self.node_id)
            .field("is_main", &self.is_main)
            .field("temporary", &self.temporary)
            .field("valid", &self.is_valid())
            .finish()
    }
}

/// Serializable view of a frame handle, used in notifications and reports
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameRef {
    pub frame_id: FrameId,
    pub node_id: Option<FrameTreeNodeId>,
    pub is_main: bool,
    pub valid: bool,
}

impl From<&Frame> for FrameRef {
    fn from(frame: &Frame) -> Self {
        FrameRef {
            frame_id: frame.identifier(),
            node_id: frame.node_id(),
            is_main: frame.is_main(),
            valid: frame.is_valid(),
        }
    }
}
