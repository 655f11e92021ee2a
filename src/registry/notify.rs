//! Notification ordering.
//!
//! Mutations that may produce handler callbacks run inside a
//! [`DispatchScope`]. The scope holds the state lock; notifications
//! submitted while it is open are queued and delivered in submission order
//! after the state lock has been released. A scope closed from inside one of
//! those callbacks appends its queue to the delivery in progress, so the
//! queues of successive scopes never interleave.

use crate::registry::state::RegistryState;
use crate::registry::{FrameHandler, FrameRegistry};
use parking_lot::{Mutex, MutexGuard};
use std::collections::{HashMap, VecDeque};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use tracing::trace;

/// Deferred handler callback
pub type FrameNotifyAction = Box<dyn FnOnce(&dyn FrameHandler) + Send + 'static>;

/// Guarded by the notification lock
#[derive(Default)]
pub(crate) struct NotificationState {
    pub handler: Option<Arc<dyn FrameHandler>>,
    /// Some while a dispatch scope is open
    pub queue: Option<VecDeque<FrameNotifyAction>>,
    /// Per-thread backlog of a delivery in progress. Scopes closed from
    /// inside a callback append here instead of delivering themselves.
    deliveries: HashMap<ThreadId, VecDeque<FrameNotifyAction>>,
}

impl NotificationState {
    /// Queue `action` if a scope is open, otherwise hand it back with the
    /// handler it should run against. Without a handler the action is
    /// dropped.
    pub fn submit(
        &mut self,
        action: FrameNotifyAction,
    ) -> Option<(Arc<dyn FrameHandler>, FrameNotifyAction)> {
        let handler = self.handler.clone()?;
        match self.queue.as_mut() {
            Some(queue) => {
                queue.push_back(action);
                None
            }
            None => Some((handler, action)),
        }
    }
}

/// Scope during which frame notifications are queued
pub(crate) struct DispatchScope<'a> {
    registry: &'a FrameRegistry,
    handler: Option<Arc<dyn FrameHandler>>,
    state: Option<MutexGuard<'a, RegistryState>>,
}

impl<'a> DispatchScope<'a> {
    pub fn open(registry: &'a FrameRegistry) -> Self {
        // The state lock serializes scopes; take it before marking the
        // notification state as queued.
        let state = registry.state.lock();
        let handler = {
            let mut notifications = registry.notifications.lock();
            debug_assert!(notifications.queue.is_none(), "nested dispatch scope");
            notifications.queue = Some(VecDeque::new());
            // Kept for delivery even if the registry drops its handler.
            notifications.handler.clone()
        };

        DispatchScope {
            registry,
            handler,
            state: Some(state),
        }
    }

    fn deliver(&self, handler: Arc<dyn FrameHandler>, thread: ThreadId) {
        // Handlers must not start navigations from inside callbacks.
        let _navigation_lock = if self.registry.sequencer.is_current() {
            Some(self.registry.create_navigation_lock())
        } else {
            None
        };
        let _backlog = BacklogGuard {
            notifications: &self.registry.notifications,
            thread,
        };

        loop {
            let next = self
                .registry
                .notifications
                .lock()
                .deliveries
                .get_mut(&thread)
                .and_then(|backlog| backlog.pop_front());
            match next {
                Some(action) => action(handler.as_ref()),
                None => break,
            }
        }
    }
}

impl Deref for DispatchScope<'_> {
    type Target = RegistryState;

    fn deref(&self) -> &RegistryState {
        self.state.as_deref().expect("dispatch scope state released")
    }
}

impl DerefMut for DispatchScope<'_> {
    fn deref_mut(&mut self) -> &mut RegistryState {
        self.state.as_deref_mut().expect("dispatch scope state released")
    }
}

impl Drop for DispatchScope<'_> {
    fn drop(&mut self) {
        let thread = thread::current().id();
        let deliver_with = {
            let mut notifications = self.registry.notifications.lock();
            let mut queue = notifications.queue.take().unwrap_or_default();
            let handler = self.handler.take().or_else(|| notifications.handler.clone());

            if let Some(backlog) = notifications.deliveries.get_mut(&thread) {
                backlog.append(&mut queue);
                None
            } else if queue.is_empty() {
                None
            } else {
                // Without a handler the queue is discarded here.
                handler.map(|handler| {
                    trace!(count = queue.len(), "Delivering queued frame notifications");
                    notifications.deliveries.insert(thread, queue);
                    handler
                })
            }
        };

        // Release the state lock before calling out.
        self.state.take();

        if let Some(handler) = deliver_with {
            self.deliver(handler, thread);
        }
    }
}

/// Removes the thread's backlog when delivery ends, even by unwinding.
struct BacklogGuard<'a> {
    notifications: &'a Mutex<NotificationState>,
    thread: ThreadId,
}

impl Drop for BacklogGuard<'_> {
    fn drop(&mut self) {
        self.notifications.lock().deliveries.remove(&self.thread);
    }
}
