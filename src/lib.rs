//! Frametrack: Frame Registry Bookkeeping for Embedded Browsers
//!
//! Tracks the frame hosts an embedded browser engine reports for one browser
//! instance, hands out stable frame handles, keeps the current main frame
//! up to date and delivers ordered lifecycle notifications to a client
//! handler. Navigation can be deferred behind reference-counted locks.

pub mod cli;
pub mod config;
pub mod error;
pub mod frame;
pub mod logging;
pub mod registry;
pub mod replay;
pub mod sequencer;
pub mod types;

pub use error::{ApiError, RegistryError, ReplayError};
pub use frame::{Frame, FrameRef};
pub use registry::{
    BrowserHost, BrowserOptions, FrameHandler, FrameLookup, FrameRegistry, FrameSnapshot,
    NavigationLock,
};
pub use sequencer::{ManualSequencer, Sequencer, ThreadSequencer};
pub use types::{BrowserId, FrameHost, FrameId, FrameTreeNodeId, LifecycleState};
