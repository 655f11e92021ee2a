//! Trace Replay
//!
//! Drives a [`FrameRegistry`] from a recorded sequence of engine events and
//! reports what a frame handler observed. The replay runs on the calling
//! thread, which acts as the sequencing thread.

pub mod recorder;
pub mod trace;

pub use recorder::{Notification, RecordingHandler, ReplayBrowser};
pub use trace::{load_trace, parse_trace, TraceEvent};

use crate::config::RegistryConfig;
use crate::error::ReplayError;
use crate::registry::{BrowserOptions, FrameHandler, FrameRegistry, FrameSnapshot, NavigationLock};
use crate::sequencer::ManualSequencer;
use crate::types::{FrameHost, FrameId, FrameTreeNodeId};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Outcome of a replay
#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub events: usize,
    pub notifications: Vec<Notification>,
    pub frames: Vec<FrameSnapshot>,
    pub main_frame: Option<FrameId>,
    /// Navigations in the order they actually ran
    pub navigations: Vec<String>,
}

pub struct Replayer {
    registry: Arc<FrameRegistry>,
    sequencer: Arc<ManualSequencer>,
    recorder: Arc<RecordingHandler>,
    hosts: HashMap<FrameId, FrameHost>,
    locks: Vec<NavigationLock>,
    navigations: Arc<Mutex<Vec<String>>>,
    applied: usize,
}

impl Replayer {
    pub fn new(options: BrowserOptions, config: &RegistryConfig) -> Result<Self, ReplayError> {
        let sequencer = ManualSequencer::new();
        let registry = FrameRegistry::new(options, config, sequencer.clone())?;
        Ok(Replayer {
            registry,
            sequencer,
            recorder: RecordingHandler::new(),
            hosts: HashMap::new(),
            locks: Vec::new(),
            navigations: Arc::new(Mutex::new(Vec::new())),
            applied: 0,
        })
    }

    pub fn registry(&self) -> &Arc<FrameRegistry> {
        &self.registry
    }

    pub fn recorder(&self) -> &Arc<RecordingHandler> {
        &self.recorder
    }

    /// Apply one event, then run any work it posted to the sequencer.
    pub fn apply(&mut self, line: usize, event: &TraceEvent) -> Result<(), ReplayError> {
        debug!(line, ?event, "Applying trace event");
        match event {
            TraceEvent::BrowserAttached { handler } => {
                if self.registry.browser().is_some() {
                    return Err(ReplayError::InvalidEvent {
                        line,
                        message: "browser already attached".to_string(),
                    });
                }
                let handler: Option<Arc<dyn FrameHandler>> = if *handler {
                    Some(self.recorder.clone())
                } else {
                    None
                };
                self.registry
                    .attach_browser(ReplayBrowser::new(self.registry.browser_id(), handler));
            }
            TraceEvent::FrameCreated { host, guest_view } => {
                self.hosts.insert(host.frame_id(), *host);
                self.registry.register(host, *guest_view);
            }
            TraceEvent::LifecycleChanged {
                process_id,
                routing_id,
                old,
                new,
            } => {
                let host = self.host_for(*process_id, *routing_id);
                self.registry.transition_lifecycle_state(&host, *old, *new);
            }
            TraceEvent::FrameDestroyed {
                process_id,
                routing_id,
            } => {
                let host = self.host_for(*process_id, *routing_id);
                self.registry.unregister(&host);
                self.hosts.remove(&host.frame_id());
            }
            TraceEvent::LockNavigation => {
                self.locks.push(self.registry.create_navigation_lock());
            }
            TraceEvent::UnlockNavigation => {
                if self.locks.pop().is_none() {
                    return Err(ReplayError::InvalidEvent {
                        line,
                        message: "unlock_navigation without a held lock".to_string(),
                    });
                }
            }
            TraceEvent::Navigate { url } => {
                let log = self.navigations.clone();
                let url = url.clone();
                let deferred = self
                    .registry
                    .run_or_defer_navigation(move || log.lock().push(url));
                if deferred {
                    debug!(line, "Navigation deferred by navigation lock");
                }
            }
            TraceEvent::BrowserDetached => {
                if self.registry.browser().is_none() {
                    return Err(ReplayError::InvalidEvent {
                        line,
                        message: "browser not attached".to_string(),
                    });
                }
                self.registry.detach_browser();
            }
        }

        self.sequencer.run_until_idle();
        self.applied += 1;
        Ok(())
    }

    /// Apply every event and produce the report.
    pub fn run(mut self, events: &[(usize, TraceEvent)]) -> Result<ReplayReport, ReplayError> {
        for (line, event) in events {
            self.apply(*line, event)?;
        }
        Ok(self.finish())
    }

    /// Release held navigation locks, capture the report and tear down the
    /// browser if the trace left it attached.
    pub fn finish(mut self) -> ReplayReport {
        self.locks.clear();
        self.sequencer.run_until_idle();

        let report = ReplayReport {
            events: self.applied,
            notifications: self.recorder.take(),
            frames: self.registry.snapshot(),
            main_frame: self.registry.main_frame().map(|f| f.identifier()),
            navigations: self.navigations.lock().clone(),
        };
        info!(
            events = report.events,
            notifications = report.notifications.len(),
            frames = report.frames.len(),
            "Replay finished"
        );

        if self.registry.browser().is_some() {
            self.registry.detach_browser();
            self.sequencer.run_until_idle();
        }
        report
    }

    fn host_for(&self, process_id: i32, routing_id: i32) -> FrameHost {
        let frame_id = FrameId::from_route(process_id, routing_id);
        self.hosts.get(&frame_id).copied().unwrap_or(FrameHost {
            process_id,
            routing_id,
            node_id: FrameTreeNodeId(-1),
            is_main_frame: false,
            is_speculative: false,
        })
    }
}
