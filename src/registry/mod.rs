//! Frame Registry
//!
//! Per-browser bookkeeping of the frame hosts reported by the engine. Each
//! host gets one record, reachable by composite frame id and by frame tree
//! node id. The registry tracks the current main frame and emits ordered
//! notifications to the browser's [`FrameHandler`].
//!
//! Mutation and navigation-lock operations belong to the sequencing thread.
//! Lookups may be called from any thread.

mod navigation;
mod notify;
mod state;

pub use navigation::NavigationLock;
pub use notify::FrameNotifyAction;

use crate::config::{FrameTrackConfig, RegistryConfig};
use crate::error::RegistryError;
use crate::frame::record::FrameRecord;
use crate::frame::Frame;
use crate::sequencer::{Sequencer, ThreadSequencer};
use crate::types::{BrowserId, FrameHost, FrameId, FrameTreeNodeId, LifecycleState};
use navigation::NavigationLockInner;
use notify::{DispatchScope, NotificationState};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use state::RegistryState;
use std::sync::{Arc, Weak};
use tracing::{debug, error, trace, warn};

/// Public browser object the registry is attached to
pub trait BrowserHost: Send + Sync {
    fn browser_id(&self) -> BrowserId;

    /// Handler that receives frame notifications, if the client installed one
    fn frame_handler(&self) -> Option<Arc<dyn FrameHandler>>;
}

/// Receiver of frame lifecycle notifications
pub trait FrameHandler: Send + Sync {
    fn on_frame_created(&self, _browser: &Arc<dyn BrowserHost>, _frame: &Arc<Frame>) {}

    fn on_frame_detached(&self, _browser: &Arc<dyn BrowserHost>, _frame: &Arc<Frame>) {}

    fn on_main_frame_changed(
        &self,
        _browser: &Arc<dyn BrowserHost>,
        _old_frame: Option<&Arc<Frame>>,
        _new_frame: Option<&Arc<Frame>>,
    ) {
    }
}

/// Result of a frame lookup
#[derive(Debug, Clone)]
pub enum FrameLookup {
    Found(Arc<Frame>),
    /// Matched a guest view, which has no frame handle
    GuestView,
    Missing,
}

impl FrameLookup {
    pub fn frame(self) -> Option<Arc<Frame>> {
        match self {
            FrameLookup::Found(frame) => Some(frame),
            _ => None,
        }
    }

    pub fn as_frame(&self) -> Option<&Arc<Frame>> {
        match self {
            FrameLookup::Found(frame) => Some(frame),
            _ => None,
        }
    }

    pub fn is_guest_view(&self) -> bool {
        matches!(self, FrameLookup::GuestView)
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, FrameLookup::Missing)
    }
}

/// Immutable browser identity
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    pub browser_id: BrowserId,
    pub is_popup: bool,
    pub is_windowless: bool,
    pub extra_info: Option<Value>,
}

impl BrowserOptions {
    pub fn new(browser_id: BrowserId) -> Self {
        BrowserOptions {
            browser_id,
            is_popup: false,
            is_windowless: false,
            extra_info: None,
        }
    }
}

/// Introspection row for one live record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameSnapshot {
    pub frame_id: FrameId,
    pub node_id: FrameTreeNodeId,
    pub is_main_frame: bool,
    pub is_guest_view: bool,
    pub is_speculative: bool,
    pub is_suspended: bool,
    pub is_current_main_frame: bool,
    pub valid: bool,
}

impl FrameSnapshot {
    pub(crate) fn of(record: &FrameRecord) -> Self {
        FrameSnapshot {
            frame_id: record.frame_id,
            node_id: record.node_id,
            is_main_frame: record.is_main_frame,
            is_guest_view: record.is_guest_view,
            is_speculative: record.is_speculative,
            is_suspended: record.is_suspended,
            is_current_main_frame: record.is_current_main_frame(),
            valid: record.frame.as_ref().map(|f| f.is_valid()).unwrap_or(false),
        }
    }
}

/// Frame registry for one browser instance
pub struct FrameRegistry {
    browser_id: BrowserId,
    is_popup: bool,
    is_windowless: bool,
    extra_info: Option<Arc<Value>>,
    config: RegistryConfig,
    self_ref: Weak<FrameRegistry>,
    pub(crate) sequencer: Arc<dyn Sequencer>,
    navigation_lock: Mutex<Weak<NavigationLockInner>>,
    pub(crate) notifications: Mutex<NotificationState>,
    pub(crate) state: Mutex<RegistryState>,
}

impl FrameRegistry {
    pub fn new(
        options: BrowserOptions,
        config: &RegistryConfig,
        sequencer: Arc<dyn Sequencer>,
    ) -> Result<Arc<Self>, RegistryError> {
        if !options.browser_id.is_valid() {
            return Err(RegistryError::InvalidBrowserId(options.browser_id));
        }
        debug!(browser_id = options.browser_id.0, "Creating frame registry");

        Ok(Arc::new_cyclic(|self_ref| FrameRegistry {
            browser_id: options.browser_id,
            is_popup: options.is_popup,
            is_windowless: options.is_windowless,
            extra_info: options.extra_info.map(Arc::new),
            config: config.clone(),
            self_ref: self_ref.clone(),
            sequencer,
            navigation_lock: Mutex::new(Weak::new()),
            notifications: Mutex::new(NotificationState::default()),
            state: Mutex::new(RegistryState::new()),
        }))
    }

    /// Registry driven by a dedicated sequencing thread. Mutations must be
    /// posted to the returned sequencer.
    pub fn with_thread_sequencer(
        options: BrowserOptions,
        config: &FrameTrackConfig,
    ) -> Result<(Arc<Self>, Arc<ThreadSequencer>), RegistryError> {
        let sequencer = ThreadSequencer::from_config(&config.sequencer)?;
        let registry = Self::new(options, &config.registry, sequencer.clone())?;
        Ok((registry, sequencer))
    }

    pub fn browser_id(&self) -> BrowserId {
        self.browser_id
    }

    pub fn is_popup(&self) -> bool {
        self.is_popup
    }

    pub fn is_windowless(&self) -> bool {
        self.is_windowless
    }

    pub fn extra_info(&self) -> Option<Arc<Value>> {
        self.extra_info.clone()
    }

    /// None before the browser is attached or after it is detached
    pub fn browser(&self) -> Option<Arc<dyn BrowserHost>> {
        self.state.lock().browser.clone()
    }

    /// Attach the browser handle and cache its frame handler.
    pub fn attach_browser(&self, browser: Arc<dyn BrowserHost>) {
        let mut scope = DispatchScope::open(self);
        if scope.browser.is_some() {
            warn!(browser_id = self.browser_id.0, "Browser already attached; replacing");
        }
        if browser.browser_id() != self.browser_id {
            warn!(
                expected = self.browser_id.0,
                actual = browser.browser_id().0,
                "Attached browser reports a different id"
            );
        }

        self.notifications.lock().handler = browser.frame_handler();
        scope.browser = Some(browser);
        debug!(browser_id = self.browser_id.0, "Browser attached");
    }

    /// Clear the browser handle and tear down every frame.
    ///
    /// Notifications produced by the teardown still reach the handler that
    /// was installed when it started; later submissions are discarded.
    pub fn detach_browser(&self) {
        let mut scope = DispatchScope::open(self);
        let Some(old_browser) = scope.browser.take() else {
            warn!(browser_id = self.browser_id.0, "Detach requested without an attached browser");
            return;
        };

        let records = scope.drain();
        debug!(
            browser_id = self.browser_id.0,
            frames = records.len(),
            "Browser detached; removing all frames"
        );

        // Everything but the main frame is detached here.
        for record in &records {
            if let Some(frame) = &record.frame {
                if !scope.is_main_frame(frame) && frame.detach() {
                    self.notify_frame_detached(&old_browser, frame);
                }
            }
        }

        if scope.main_frame.is_some() {
            self.set_main_frame(&mut scope, &Some(old_browser), None);
        }

        for temporary in scope.take_temporaries() {
            if let Some(frame) = temporary.upgrade() {
                frame.detach();
            }
        }

        self.notifications.lock().handler = None;
    }

    /// Ensure a record exists for `host` and return its handle.
    ///
    /// Registering a known host only upgrades it from speculative to
    /// committed. Guest views are tracked but have no handle.
    pub fn register(&self, host: &FrameHost, is_guest_view: bool) -> Option<Arc<Frame>> {
        self.require_sequencer("register");
        if !Self::accepts_host(host, "register") {
            return None;
        }
        let frame_id = host.frame_id();
        let mut scope = DispatchScope::open(self);
        let browser = scope.browser.clone();

        if let Some(key) = scope.key_for_id(frame_id) {
            let mut upgraded_main = None;
            let frame = {
                let record = scope.get_mut(key)?;
                if record.node_id != host.node_id
                    || record.is_main_frame != host.is_main_frame
                    || record.is_guest_view != is_guest_view
                {
                    self.invariant_violation(&format!(
                        "frame id {} registered again with different identity",
                        frame_id
                    ));
                }

                if !record.is_guest_view && record.is_speculative && !host.is_speculative {
                    trace!(frame_id = %frame_id, "Upgrading speculative frame");
                    record.is_speculative = false;
                    if record.is_main_frame {
                        upgraded_main = record.frame.clone();
                    }
                }
                record.frame.clone()
            };

            if let Some(main) = upgraded_main {
                self.set_main_frame(&mut scope, &browser, Some(main));
            }
            scope.refresh_node_index(key);
            self.check_invariants(&scope);
            return frame;
        }

        let frame = if is_guest_view {
            None
        } else {
            Some(Frame::for_host(self.browser_id, host))
        };

        if let Some(frame) = &frame {
            self.notify_frame_created(frame);
            if host.is_main_frame && !host.is_speculative {
                self.set_main_frame(&mut scope, &browser, Some(frame.clone()));
            }
        }

        debug!(
            frame_id = %frame_id,
            node_id = host.node_id.0,
            main = host.is_main_frame,
            speculative = host.is_speculative,
            guest_view = is_guest_view,
            "Frame registered"
        );
        scope.insert(FrameRecord::new(host, is_guest_view, frame.clone()));
        self.check_invariants(&scope);
        frame
    }

    /// Track entry into and exit from the back/forward cache.
    pub fn transition_lifecycle_state(
        &self,
        host: &FrameHost,
        old_state: LifecycleState,
        new_state: LifecycleState,
    ) {
        self.require_sequencer("transition_lifecycle_state");
        if !Self::accepts_host(host, "transition_lifecycle_state") {
            return;
        }
        let entering = new_state == LifecycleState::InBackForwardCache;
        let leaving = old_state == LifecycleState::InBackForwardCache;
        if entering == leaving {
            return;
        }

        let frame_id = host.frame_id();
        let mut scope = DispatchScope::open(self);
        let Some(key) = scope.key_for_id(frame_id) else {
            warn!(frame_id = %frame_id, "Lifecycle change for unknown frame");
            return;
        };

        let reinstate = {
            let Some(record) = scope.get_mut(key) else {
                return;
            };
            if record.is_suspended == entering {
                warn!(
                    frame_id = %frame_id,
                    suspended = record.is_suspended,
                    "Unexpected back/forward cache transition"
                );
            }
            record.is_suspended = entering;
            trace!(frame_id = %frame_id, suspended = entering, "Frame lifecycle changed");

            if leaving && record.is_main_frame && !record.is_speculative {
                record.frame.clone()
            } else {
                None
            }
        };

        if let Some(frame) = reinstate {
            if !frame.is_valid() {
                debug!(frame_id = %frame_id, "Restored main frame was already detached");
            } else if !scope.is_main_frame(&frame) {
                let browser = scope.browser.clone();
                self.set_main_frame(&mut scope, &browser, Some(frame));
                scope.refresh_node_index(key);
            }
        }
        self.check_invariants(&scope);
    }

    /// Drop the record for `host`. Unknown hosts are ignored.
    pub fn unregister(&self, host: &FrameHost) {
        self.require_sequencer("unregister");
        if !Self::accepts_host(host, "unregister") {
            return;
        }
        let frame_id = host.frame_id();
        let mut scope = DispatchScope::open(self);
        let Some(record) = scope.remove(frame_id) else {
            debug!(frame_id = %frame_id, "Unregister for unknown frame ignored");
            return;
        };
        debug!(frame_id = %frame_id, "Frame unregistered");

        let browser = scope.browser.clone();
        if let Some(frame) = &record.frame {
            if scope.is_main_frame(frame) {
                self.set_main_frame(&mut scope, &browser, None);
            } else if frame.detach() {
                if let Some(browser) = &browser {
                    self.notify_frame_detached(browser, frame);
                }
            }
        }
    }

    /// Current main frame; None after the browser is detached.
    pub fn main_frame(&self) -> Option<Arc<Frame>> {
        let state = self.state.lock();
        state.browser.as_ref()?;
        state.main_frame.clone()
    }

    /// Handle for a sub-frame that has no engine host yet. Falls back to the
    /// main frame as parent when `parent_id` is unknown.
    pub fn create_temporary_subframe(&self, parent_id: FrameId) -> Option<Arc<Frame>> {
        let parent = self
            .frame_for_id(parent_id, false)
            .frame()
            .or_else(|| self.main_frame())?;
        let frame = Frame::temporary(self.browser_id, parent.identifier());
        self.state.lock().push_temporary(&frame);
        Some(frame)
    }

    pub fn frame_for_host(&self, host: &FrameHost, prefer_speculative: bool) -> FrameLookup {
        self.frame_for_id(host.frame_id(), prefer_speculative)
    }

    pub fn frame_for_route(
        &self,
        process_id: i32,
        routing_id: i32,
        prefer_speculative: bool,
    ) -> FrameLookup {
        if process_id < 0 || routing_id < 0 {
            return FrameLookup::Missing;
        }
        self.frame_for_id(FrameId::from_route(process_id, routing_id), prefer_speculative)
    }

    /// Lookup by composite id. A speculative match resolves to the settled
    /// frame for the same slot unless `prefer_speculative` is set.
    pub fn frame_for_id(&self, frame_id: FrameId, prefer_speculative: bool) -> FrameLookup {
        if !frame_id.is_valid() {
            return FrameLookup::Missing;
        }

        let state = self.state.lock();
        let Some(record) = state.find_by_id(frame_id) else {
            return FrameLookup::Missing;
        };
        if record.is_guest_view {
            return FrameLookup::GuestView;
        }

        if record.is_speculative && !prefer_speculative {
            if record.is_main_frame {
                if let Some(main) = &state.main_frame {
                    return FrameLookup::Found(main.clone());
                }
            } else {
                let (settled, settled_speculative) = state.node_lookup(record.node_id);
                if !settled.is_missing() && !settled_speculative {
                    return settled;
                }
            }
            if self.config.warn_on_speculative_lookup {
                warn!(frame_id = %frame_id, "Returning a speculative frame");
            }
        }

        RegistryState::resolve(record)
    }

    /// Lookup by frame tree node id.
    pub fn frame_for_node(
        &self,
        node_id: FrameTreeNodeId,
        prefer_speculative: bool,
    ) -> FrameLookup {
        if !node_id.is_valid() {
            return FrameLookup::Missing;
        }

        let state = self.state.lock();
        if prefer_speculative {
            if let Some(record) = state.speculative_for_node(node_id) {
                return RegistryState::resolve(record);
            }
        } else if let Some(main) = &state.main_frame {
            if main.node_id() == Some(node_id) && main.is_valid() {
                return FrameLookup::Found(main.clone());
            }
        }

        let (lookup, speculative) = state.node_lookup(node_id);
        if speculative && self.config.warn_on_speculative_lookup {
            warn!(node_id = node_id.0, "Returning a speculative frame for node");
        }
        lookup
    }

    /// Handles that are neither speculative nor suspended. Guest views are
    /// excluded.
    pub fn all_frames(&self) -> Vec<Arc<Frame>> {
        let state = self.state.lock();
        let mut frames: Vec<Arc<Frame>> = state
            .records()
            .filter(|r| !r.is_speculative && !r.is_suspended)
            .filter_map(|r| r.frame.clone())
            .collect();
        frames.sort_by_key(|f| f.identifier());
        frames
    }

    /// Number of live records, guest views included
    pub fn frame_count(&self) -> usize {
        self.state.lock().len()
    }

    pub fn is_registered(&self, frame_id: FrameId) -> bool {
        self.state.lock().key_for_id(frame_id).is_some()
    }

    /// Ids reachable through the composite id index
    pub fn indexed_frame_ids(&self) -> Vec<FrameId> {
        let mut ids: Vec<FrameId> = self.state.lock().indexed_ids().copied().collect();
        ids.sort();
        ids
    }

    /// One row per live record, ordered by frame id
    pub fn snapshot(&self) -> Vec<FrameSnapshot> {
        let state = self.state.lock();
        let mut rows: Vec<FrameSnapshot> = state.records().map(FrameSnapshot::of).collect();
        rows.sort_by_key(|row| row.frame_id);
        rows
    }

    /// Block navigation until every clone of the returned token is dropped.
    pub fn create_navigation_lock(&self) -> NavigationLock {
        self.require_sequencer("create_navigation_lock");
        let mut slot = self.navigation_lock.lock();
        if let Some(inner) = slot.upgrade() {
            return NavigationLock { inner };
        }
        let inner = Arc::new(NavigationLockInner::new(self.sequencer.clone()));
        *slot = Arc::downgrade(&inner);
        trace!(browser_id = self.browser_id.0, "Navigation lock acquired");
        NavigationLock { inner }
    }

    /// True while a navigation lock is alive.
    pub fn is_navigation_blocked(&self) -> bool {
        self.navigation_lock.lock().strong_count() > 0
    }

    /// When navigation is blocked, store `pending_action` as the single
    /// action to run on release and return true. Otherwise drop it and
    /// return false.
    pub fn is_navigation_locked<F>(&self, pending_action: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.require_sequencer("is_navigation_locked");
        let inner = self.navigation_lock.lock().upgrade();
        match inner {
            Some(inner) => {
                inner.set_pending(Box::new(pending_action));
                true
            }
            None => false,
        }
    }

    /// Run `action` now, or defer it until the navigation lock is released.
    /// Returns true when deferred.
    pub fn run_or_defer_navigation<F>(&self, action: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.require_sequencer("run_or_defer_navigation");
        let inner = self.navigation_lock.lock().upgrade();
        match inner {
            Some(inner) => {
                inner.set_pending(Box::new(action));
                true
            }
            None => {
                action();
                false
            }
        }
    }

    /// Deliver `action` to the frame handler, queueing it behind an open
    /// dispatch scope. Discarded when no handler is installed.
    pub fn maybe_execute_frame_notification(&self, action: FrameNotifyAction) {
        let ready = self.notifications.lock().submit(action);
        if let Some((handler, action)) = ready {
            action(handler.as_ref());
        }
    }

    fn notify_frame_created(&self, frame: &Arc<Frame>) {
        debug_assert!(!frame.is_temporary());
        let registry = self.self_ref.clone();
        let frame = frame.clone();
        self.maybe_execute_frame_notification(Box::new(move |handler| {
            // Skipped if the browser went away before delivery.
            let browser = registry.upgrade().and_then(|r| r.browser());
            if let Some(browser) = browser {
                handler.on_frame_created(&browser, &frame);
            }
        }));
    }

    fn notify_frame_detached(&self, browser: &Arc<dyn BrowserHost>, frame: &Arc<Frame>) {
        debug_assert!(!frame.is_temporary());
        let browser = browser.clone();
        let frame = frame.clone();
        self.maybe_execute_frame_notification(Box::new(move |handler| {
            handler.on_frame_detached(&browser, &frame);
        }));
    }

    fn notify_main_frame_changed(
        &self,
        browser: &Arc<dyn BrowserHost>,
        old_frame: Option<Arc<Frame>>,
        new_frame: Option<Arc<Frame>>,
    ) {
        let browser = browser.clone();
        self.maybe_execute_frame_notification(Box::new(move |handler| {
            handler.on_main_frame_changed(&browser, old_frame.as_ref(), new_frame.as_ref());
        }));
    }

    /// Replace the main frame reference. The previous main frame is
    /// detached unless its record is parked in the back/forward cache.
    fn set_main_frame(
        &self,
        state: &mut RegistryState,
        browser: &Option<Arc<dyn BrowserHost>>,
        frame: Option<Arc<Frame>>,
    ) {
        let old_frame = state.main_frame.take();
        if let (Some(old), Some(new)) = (&old_frame, &frame) {
            if Arc::ptr_eq(old, new) {
                state.main_frame = old_frame;
                return;
            }
        }

        if let Some(old) = &old_frame {
            let parked = state
                .record_holding(old)
                .map(|r| r.is_suspended)
                .unwrap_or(false);
            if !parked && old.detach() {
                if let Some(browser) = browser {
                    self.notify_frame_detached(browser, old);
                }
            }
        }

        state.main_frame = frame.clone();
        debug!(
            old = ?old_frame.as_ref().map(|f| f.identifier()),
            new = ?frame.as_ref().map(|f| f.identifier()),
            "Main frame changed"
        );
        if let Some(browser) = browser {
            self.notify_main_frame_changed(browser, old_frame, frame);
        }
    }

    fn check_invariants(&self, state: &RegistryState) {
        let current = state.current_main_frame_count();
        if current > 1 {
            self.invariant_violation(&format!(
                "{} records claim to be the current main frame",
                current
            ));
        }
    }

    fn invariant_violation(&self, message: &str) {
        error!(browser_id = self.browser_id.0, "Frame registry invariant violated: {}", message);
        if self.config.strict_invariants {
            panic!("frame registry invariant violated: {}", message);
        }
    }

    fn accepts_host(host: &FrameHost, operation: &str) -> bool {
        if host.has_valid_route() {
            return true;
        }
        warn!(
            operation,
            process_id = host.process_id,
            routing_id = host.routing_id,
            "Ignoring frame host with an invalid route"
        );
        false
    }

    fn require_sequencer(&self, operation: &str) {
        if !self.sequencer.is_current() {
            warn!(operation, "Registry operation called off the sequencing thread");
            debug_assert!(
                self.sequencer.is_current(),
                "{} must run on the sequencing thread",
                operation
            );
        }
    }
}

impl Drop for FrameRegistry {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if state.browser.is_some() || state.len() > 0 {
            warn!(
                browser_id = self.browser_id.0,
                frames = state.len(),
                "Frame registry dropped with the browser still attached"
            );
        }
    }
}
