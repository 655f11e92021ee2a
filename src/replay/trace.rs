//! JSON-lines trace format.
//!
//! One event per line, tagged by `"event"`. Blank lines and `#` comments
//! are skipped.

use crate::error::ReplayError;
use crate::types::{FrameHost, FrameId, LifecycleState};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Engine event recorded in a trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TraceEvent {
    BrowserAttached {
        /// Whether the browser installs a frame handler
        #[serde(default = "default_true")]
        handler: bool,
    },
    FrameCreated {
        #[serde(flatten)]
        host: FrameHost,
        #[serde(default)]
        guest_view: bool,
    },
    LifecycleChanged {
        process_id: i32,
        routing_id: i32,
        old: LifecycleState,
        new: LifecycleState,
    },
    FrameDestroyed {
        process_id: i32,
        routing_id: i32,
    },
    LockNavigation,
    UnlockNavigation,
    Navigate {
        url: String,
    },
    BrowserDetached,
}

fn default_true() -> bool {
    true
}

impl TraceEvent {
    /// Composite id of the frame the event refers to, if any
    pub fn frame_id(&self) -> Option<FrameId> {
        match self {
            TraceEvent::FrameCreated { host, .. } => Some(host.frame_id()),
            TraceEvent::LifecycleChanged {
                process_id,
                routing_id,
                ..
            }
            | TraceEvent::FrameDestroyed {
                process_id,
                routing_id,
            } => Some(FrameId::from_route(*process_id, *routing_id)),
            _ => None,
        }
    }
}

/// Parse trace text into events paired with their 1-based line numbers.
pub fn parse_trace(input: &str) -> Result<Vec<(usize, TraceEvent)>, ReplayError> {
    let mut events = Vec::new();
    for (index, raw) in input.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let event = serde_json::from_str(line).map_err(|e| ReplayError::Parse {
            line: index + 1,
            message: e.to_string(),
        })?;
        events.push((index + 1, event));
    }
    Ok(events)
}

/// Read and parse a trace file.
pub fn load_trace(path: &Path) -> Result<Vec<(usize, TraceEvent)>, ReplayError> {
    let input = std::fs::read_to_string(path)?;
    parse_trace(&input)
}
