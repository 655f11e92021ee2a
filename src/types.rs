//! Identifier types shared across the registry.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Browser identifier (positive, stable for the browser's lifetime)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BrowserId(pub i32);

impl BrowserId {
    pub fn is_valid(&self) -> bool {
        self.0 > 0
    }
}

/// Composite frame identifier: render process id in the high 32 bits,
/// render routing id in the low 32 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FrameId(pub i64);

impl FrameId {
    /// Identifier carried by frames that have no engine host
    pub const INVALID: FrameId = FrameId(-4);

    pub fn from_route(process_id: i32, routing_id: i32) -> Self {
        let high = (process_id as u32 as u64) << 32;
        let low = routing_id as u32 as u64;
        FrameId((high | low) as i64)
    }

    pub fn process_id(&self) -> i32 {
        ((self.0 as u64) >> 32) as u32 as i32
    }

    pub fn routing_id(&self) -> i32 {
        (self.0 as u64 & 0xffff_ffff) as u32 as i32
    }

    pub fn is_valid(&self) -> bool {
        self.0 >= 0
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.process_id(), self.routing_id())
    }
}

/// Frame tree node identifier: one logical slot in the frame hierarchy,
/// stable across cross-origin process swaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FrameTreeNodeId(pub i32);

impl FrameTreeNodeId {
    pub fn is_valid(&self) -> bool {
        self.0 >= 0
    }
}

/// Engine-reported description of a frame host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameHost {
    pub process_id: i32,
    pub routing_id: i32,
    pub node_id: FrameTreeNodeId,
    /// True when the host has no parent frame
    pub is_main_frame: bool,
    /// True when the host is not (yet) the current host for its node
    #[serde(default)]
    pub is_speculative: bool,
}

impl FrameHost {
    pub fn frame_id(&self) -> FrameId {
        FrameId::from_route(self.process_id, self.routing_id)
    }

    /// Both route components are non-negative, so the packed id is valid and
    /// never equal to [`FrameId::INVALID`].
    pub fn has_valid_route(&self) -> bool {
        self.process_id >= 0 && self.routing_id >= 0
    }
}

/// Lifecycle states a frame host may move between
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Speculative,
    PendingCommit,
    Prerendering,
    Active,
    InBackForwardCache,
    RunningUnloadHandlers,
    ReadyToBeDeleted,
}
