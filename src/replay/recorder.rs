//! Frame handler that records every notification it receives.

use crate::frame::{Frame, FrameRef};
use crate::registry::{BrowserHost, FrameHandler};
use crate::types::BrowserId;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;

/// Notification as observed by a handler
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    FrameCreated {
        frame: FrameRef,
    },
    FrameDetached {
        frame: FrameRef,
    },
    MainFrameChanged {
        old: Option<FrameRef>,
        new: Option<FrameRef>,
    },
}

impl Notification {
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::FrameCreated { .. } => "frame_created",
            Notification::FrameDetached { .. } => "frame_detached",
            Notification::MainFrameChanged { .. } => "main_frame_changed",
        }
    }
}

#[derive(Debug, Default)]
pub struct RecordingHandler {
    notifications: Mutex<Vec<Notification>>,
}

impl RecordingHandler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Copy of everything recorded so far
    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().clone()
    }

    /// Drain the recorded notifications
    pub fn take(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.notifications.lock())
    }

    fn push(&self, notification: Notification) {
        self.notifications.lock().push(notification);
    }
}

impl FrameHandler for RecordingHandler {
    fn on_frame_created(&self, _browser: &Arc<dyn BrowserHost>, frame: &Arc<Frame>) {
        self.push(Notification::FrameCreated {
            frame: FrameRef::from(frame.as_ref()),
        });
    }

    fn on_frame_detached(&self, _browser: &Arc<dyn BrowserHost>, frame: &Arc<Frame>) {
        self.push(Notification::FrameDetached {
            frame: FrameRef::from(frame.as_ref()),
        });
    }

    fn on_main_frame_changed(
        &self,
        _browser: &Arc<dyn BrowserHost>,
        old_frame: Option<&Arc<Frame>>,
        new_frame: Option<&Arc<Frame>>,
    ) {
        self.push(Notification::MainFrameChanged {
            old: old_frame.map(|f| FrameRef::from(f.as_ref())),
            new: new_frame.map(|f| FrameRef::from(f.as_ref())),
        });
    }
}

/// Minimal browser handle for replay and tests
pub struct ReplayBrowser {
    browser_id: BrowserId,
    handler: Option<Arc<dyn FrameHandler>>,
}

impl ReplayBrowser {
    pub fn new(browser_id: BrowserId, handler: Option<Arc<dyn FrameHandler>>) -> Arc<Self> {
        Arc::new(ReplayBrowser {
            browser_id,
            handler,
        })
    }
}

impl BrowserHost for ReplayBrowser {
    fn browser_id(&self) -> BrowserId {
        self.browser_id
    }

    fn frame_handler(&self) -> Option<Arc<dyn FrameHandler>> {
        self.handler.clone()
    }
}
