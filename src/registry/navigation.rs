//! Navigation lock: a reference-counted gate that defers navigation while
//! any token is alive.

use crate::sequencer::{Sequencer, Task};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

pub(crate) struct NavigationLockInner {
    pending: Mutex<Option<Task>>,
    sequencer: Arc<dyn Sequencer>,
}

impl NavigationLockInner {
    pub fn new(sequencer: Arc<dyn Sequencer>) -> Self {
        NavigationLockInner {
            pending: Mutex::new(None),
            sequencer,
        }
    }

    /// Replace the pending action. Only the most recent one survives.
    pub fn set_pending(&self, action: Task) {
        let replaced = self.pending.lock().replace(action).is_some();
        if replaced {
            debug!("Replaced pending navigation action");
        }
    }
}

impl Drop for NavigationLockInner {
    fn drop(&mut self) {
        if let Some(action) = self.pending.get_mut().take() {
            debug!("Navigation lock released; posting pending action");
            self.sequencer.post(action);
        }
    }
}

/// Token blocking navigation for as long as it (or any clone) is alive.
///
/// Obtained from [`super::FrameRegistry::create_navigation_lock`].
#[derive(Clone)]
pub struct NavigationLock {
    pub(crate) inner: Arc<NavigationLockInner>,
}

impl NavigationLock {
    /// Number of live tokens sharing this lock
    pub fn holders(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

impl fmt::Debug for NavigationLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NavigationLock")
            .field("holders", &self.holders())
            .field("has_pending", &self.inner.pending.lock().is_some())
            .finish()
    }
}
